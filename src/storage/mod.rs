//! Persistence collaborators.
//!
//! Handlers and the dashboard only talk to [`Storage`]. [`MemoryStorage`]
//! keeps everything in process and backs the tests; [`PgStorage`] maps the
//! same operations onto PostgreSQL.

use crate::entities::{
    Coupon, Gender, Order, OrderItem, OrderStatus, Product, Review, Role, ShippingInfo, User,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Inclusive creation-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductFilter {
    All,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    All,
    Gender(Gender),
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSort {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct ProductSearch {
    pub name: Option<String>,
    pub max_price: Option<f64>,
    pub category: Option<String>,
    pub sort: Option<PriceSort>,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub stock: i32,
    pub category: String,
    pub photo: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub gender: Gender,
    pub dob: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user: String,
    pub shipping_info: ShippingInfo,
    pub subtotal: f64,
    pub tax: f64,
    pub shipping_charges: f64,
    pub discount: f64,
    pub total: f64,
    pub order_items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product: Uuid,
    pub user: String,
    pub rating: f64,
    pub comment: Option<String>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_product(&self, product: NewProduct) -> Result<Product>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn save_product(&self, product: &Product) -> Result<()>;
    async fn delete_product(&self, id: Uuid) -> Result<bool>;
    async fn all_products(&self) -> Result<Vec<Product>>;
    async fn latest_products(&self, limit: u64) -> Result<Vec<Product>>;
    async fn products_created_between(&self, range: DateRange) -> Result<Vec<Product>>;
    async fn count_products(&self, filter: ProductFilter) -> Result<u64>;
    async fn product_categories(&self) -> Result<Vec<String>>;
    async fn products_per_category(&self) -> Result<BTreeMap<String, u64>>;
    /// Returns one page of matches and the total number of matches.
    async fn search_products(&self, search: &ProductSearch) -> Result<(Vec<Product>, u64)>;
    /// Subtracts `quantity` from the product's stock. `false` if it does not exist.
    async fn reduce_stock(&self, id: Uuid, quantity: i32) -> Result<bool>;

    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn find_user(&self, id: &str) -> Result<Option<User>>;
    async fn delete_user(&self, id: &str) -> Result<bool>;
    async fn all_users(&self) -> Result<Vec<User>>;
    async fn users_created_between(&self, range: DateRange) -> Result<Vec<User>>;
    async fn count_users(&self, filter: UserFilter) -> Result<u64>;

    async fn create_order(&self, order: NewOrder) -> Result<Order>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn save_order(&self, order: &Order) -> Result<()>;
    async fn delete_order(&self, id: Uuid) -> Result<bool>;
    async fn all_orders(&self) -> Result<Vec<Order>>;
    async fn orders_for_user(&self, user: &str) -> Result<Vec<Order>>;
    async fn orders_created_between(&self, range: DateRange) -> Result<Vec<Order>>;
    async fn count_orders(&self, status: Option<OrderStatus>) -> Result<u64>;
    async fn recent_orders(&self, limit: u64) -> Result<Vec<Order>>;

    async fn create_coupon(&self, code: String, amount: f64) -> Result<Coupon>;
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>>;
    async fn all_coupons(&self) -> Result<Vec<Coupon>>;
    async fn delete_coupon(&self, id: Uuid) -> Result<Option<Coupon>>;

    /// Inserts the review, or replaces the rating and comment of the one the
    /// user already left on this product.
    async fn upsert_review(&self, review: NewReview) -> Result<Review>;
    async fn find_review(&self, id: Uuid) -> Result<Option<Review>>;
    async fn delete_review(&self, id: Uuid) -> Result<bool>;
    async fn reviews_for_product(&self, product: Uuid) -> Result<Vec<Review>>;
}
