use super::{
    DateRange, NewOrder, NewProduct, NewReview, NewUser, PriceSort, ProductFilter, ProductSearch,
    Storage, UserFilter,
};
use crate::entities::{Coupon, Order, OrderStatus, Product, Review, Role, Timestamped, User};
use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::{cmp::Reverse, collections::BTreeMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Collections {
    products: Vec<Product>,
    users: Vec<User>,
    orders: Vec<Order>,
    coupons: Vec<Coupon>,
    reviews: Vec<Review>,
}

/// Process-local storage. "Latest" reads order by `created_at`, like the
/// postgres backend, so seeded history sorts the same on both.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<Collections>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts fully formed records, keeping their ids and timestamps.
    pub async fn seed_products(&self, products: impl IntoIterator<Item = Product>) {
        self.data.write().await.products.extend(products);
    }

    pub async fn seed_users(&self, users: impl IntoIterator<Item = User>) {
        self.data.write().await.users.extend(users);
    }

    pub async fn seed_orders(&self, orders: impl IntoIterator<Item = Order>) {
        self.data.write().await.orders.extend(orders);
    }
}

fn count<T>(items: &[T], keep: impl Fn(&T) -> bool) -> u64 {
    items.iter().filter(|item| keep(item)).count() as u64
}

fn newest_first<T: Timestamped + Clone>(items: &[T], limit: u64) -> Vec<T> {
    let mut newest: Vec<&T> = items.iter().rev().collect();
    // Stable: records created at the same instant keep latest-inserted first.
    newest.sort_by_key(|item| Reverse(item.created_at()));
    newest
        .into_iter()
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: product.name,
            price: product.price,
            stock: product.stock,
            category: product.category,
            photo: product.photo,
            created_at: now,
            updated_at: now,
        };
        self.data.write().await.products.push(product.clone());
        Ok(product)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let data = self.data.read().await;
        Ok(data.products.iter().find(|p| p.id == id).cloned())
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        let mut data = self.data.write().await;
        let stored = data
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| eyre!("product {} does not exist", product.id))?;
        *stored = Product {
            updated_at: Utc::now(),
            ..product.clone()
        };
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.products.len();
        data.products.retain(|p| p.id != id);
        data.reviews.retain(|r| r.product != id);
        Ok(data.products.len() != before)
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        Ok(self.data.read().await.products.clone())
    }

    async fn latest_products(&self, limit: u64) -> Result<Vec<Product>> {
        Ok(newest_first(&self.data.read().await.products, limit))
    }

    async fn products_created_between(&self, range: DateRange) -> Result<Vec<Product>> {
        let data = self.data.read().await;
        Ok(data
            .products
            .iter()
            .filter(|p| range.contains(p.created_at))
            .cloned()
            .collect())
    }

    async fn count_products(&self, filter: ProductFilter) -> Result<u64> {
        let data = self.data.read().await;
        Ok(match filter {
            ProductFilter::All => data.products.len() as u64,
            ProductFilter::OutOfStock => count(&data.products, |p| p.stock == 0),
        })
    }

    async fn product_categories(&self) -> Result<Vec<String>> {
        let data = self.data.read().await;
        let mut categories: Vec<String> =
            data.products.iter().map(|p| p.category.clone()).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn products_per_category(&self) -> Result<BTreeMap<String, u64>> {
        let data = self.data.read().await;
        let mut counts = BTreeMap::new();
        for product in &data.products {
            *counts.entry(product.category.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn search_products(&self, search: &ProductSearch) -> Result<(Vec<Product>, u64)> {
        let data = self.data.read().await;
        let needle = search.name.as_ref().map(|n| n.to_lowercase());

        let mut matches: Vec<Product> = data
            .products
            .iter()
            .filter(|p| {
                needle
                    .as_ref()
                    .map_or(true, |n| p.name.to_lowercase().contains(n))
                    && search.max_price.map_or(true, |max| p.price <= max)
                    && search.category.as_ref().map_or(true, |c| &p.category == c)
            })
            .cloned()
            .collect();

        match search.sort {
            Some(PriceSort::Asc) => matches.sort_by(|a, b| a.price.total_cmp(&b.price)),
            Some(PriceSort::Desc) => matches.sort_by(|a, b| b.price.total_cmp(&a.price)),
            None => {}
        }

        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(usize::try_from(search.offset)?)
            .take(usize::try_from(search.limit)?)
            .collect();

        Ok((page, total))
    }

    async fn reduce_stock(&self, id: Uuid, quantity: i32) -> Result<bool> {
        let mut data = self.data.write().await;
        Ok(data.products.iter_mut().find(|p| p.id == id).map_or(false, |p| {
            p.stock -= quantity;
            p.updated_at = Utc::now();
            true
        }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();
        let user = User {
            id: user.id,
            name: user.name,
            email: user.email,
            photo: user.photo,
            role: Role::User,
            gender: user.gender,
            dob: user.dob,
            created_at: now,
            updated_at: now,
        };
        let mut data = self.data.write().await;
        if data.users.iter().any(|u| u.id == user.id) {
            return Err(eyre!("user {} already exists", user.id));
        }
        data.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn delete_user(&self, id: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.users.len();
        data.users.retain(|u| u.id != id);
        Ok(data.users.len() != before)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        Ok(self.data.read().await.users.clone())
    }

    async fn users_created_between(&self, range: DateRange) -> Result<Vec<User>> {
        let data = self.data.read().await;
        Ok(data
            .users
            .iter()
            .filter(|u| range.contains(u.created_at))
            .cloned()
            .collect())
    }

    async fn count_users(&self, filter: UserFilter) -> Result<u64> {
        let data = self.data.read().await;
        Ok(match filter {
            UserFilter::All => data.users.len() as u64,
            UserFilter::Gender(gender) => count(&data.users, |u| u.gender == gender),
            UserFilter::Role(role) => count(&data.users, |u| u.role == role),
        })
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user: order.user,
            shipping_info: order.shipping_info,
            subtotal: order.subtotal,
            tax: order.tax,
            shipping_charges: order.shipping_charges,
            discount: order.discount,
            total: order.total,
            status: OrderStatus::Processing,
            order_items: order.order_items,
            created_at: now,
            updated_at: now,
        };
        self.data.write().await.orders.push(order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let data = self.data.read().await;
        Ok(data.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let mut data = self.data.write().await;
        let stored = data
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| eyre!("order {} does not exist", order.id))?;
        *stored = Order {
            updated_at: Utc::now(),
            ..order.clone()
        };
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.orders.len();
        data.orders.retain(|o| o.id != id);
        Ok(data.orders.len() != before)
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.data.read().await.orders.clone())
    }

    async fn orders_for_user(&self, user: &str) -> Result<Vec<Order>> {
        let data = self.data.read().await;
        Ok(data.orders.iter().filter(|o| o.user == user).cloned().collect())
    }

    async fn orders_created_between(&self, range: DateRange) -> Result<Vec<Order>> {
        let data = self.data.read().await;
        Ok(data
            .orders
            .iter()
            .filter(|o| range.contains(o.created_at))
            .cloned()
            .collect())
    }

    async fn count_orders(&self, status: Option<OrderStatus>) -> Result<u64> {
        let data = self.data.read().await;
        Ok(status.map_or(data.orders.len() as u64, |status| {
            count(&data.orders, |o| o.status == status)
        }))
    }

    async fn recent_orders(&self, limit: u64) -> Result<Vec<Order>> {
        Ok(newest_first(&self.data.read().await.orders, limit))
    }

    async fn create_coupon(&self, code: String, amount: f64) -> Result<Coupon> {
        let mut data = self.data.write().await;
        if data.coupons.iter().any(|c| c.code == code) {
            return Err(eyre!("coupon {code} already exists"));
        }
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code,
            amount,
        };
        data.coupons.push(coupon.clone());
        Ok(coupon)
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let data = self.data.read().await;
        Ok(data.coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn all_coupons(&self) -> Result<Vec<Coupon>> {
        Ok(self.data.read().await.coupons.clone())
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<Option<Coupon>> {
        let mut data = self.data.write().await;
        let position = data.coupons.iter().position(|c| c.id == id);
        Ok(position.map(|i| data.coupons.remove(i)))
    }

    async fn upsert_review(&self, review: NewReview) -> Result<Review> {
        let now = Utc::now();
        let mut data = self.data.write().await;

        if let Some(existing) = data
            .reviews
            .iter_mut()
            .find(|r| r.product == review.product && r.user == review.user)
        {
            existing.rating = review.rating;
            existing.comment = review.comment;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let review = Review {
            id: Uuid::new_v4(),
            product: review.product,
            user: review.user,
            rating: review.rating,
            comment: review.comment,
            created_at: now,
            updated_at: now,
        };
        data.reviews.push(review.clone());
        Ok(review)
    }

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>> {
        let data = self.data.read().await;
        Ok(data.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.reviews.len();
        data.reviews.retain(|r| r.id != id);
        Ok(data.reviews.len() != before)
    }

    async fn reviews_for_product(&self, product: Uuid) -> Result<Vec<Review>> {
        let data = self.data.read().await;
        Ok(data
            .reviews
            .iter()
            .filter(|r| r.product == product)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_product(name: &str, price: f64, category: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            price,
            stock: 3,
            category: category.to_string(),
            photo: String::new(),
        }
    }

    #[tokio::test]
    async fn latest_follows_creation_time_not_insertion() {
        let storage = MemoryStorage::new();
        let at = |day| Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
        let product = |name: &str, day| Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: 5.0,
            stock: 1,
            category: "mugs".to_string(),
            photo: String::new(),
            created_at: at(day),
            updated_at: at(day),
        };
        storage
            .seed_products([product("newest", 20), product("oldest", 1), product("middle", 10)])
            .await;

        let latest = storage.latest_products(2).await.unwrap();
        let names: Vec<_> = latest.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["newest", "middle"]);
    }

    #[tokio::test]
    async fn search_filters_sorts_and_pages() {
        let storage = MemoryStorage::new();
        for (name, price) in [("Trail Shoe", 90.0), ("Road Shoe", 60.0), ("Sun Hat", 20.0)] {
            let category = if name.ends_with("Hat") { "hats" } else { "shoes" };
            storage
                .create_product(new_product(name, price, category))
                .await
                .unwrap();
        }

        let search = ProductSearch {
            name: Some("shoe".into()),
            sort: Some(PriceSort::Asc),
            limit: 1,
            offset: 0,
            ..ProductSearch::default()
        };
        let (page, total) = storage.search_products(&search).await.unwrap();

        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Road Shoe");

        let cheap = ProductSearch {
            max_price: Some(50.0),
            limit: 10,
            ..ProductSearch::default()
        };
        let (page, total) = storage.search_products(&cheap).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].category, "hats");
    }

    #[tokio::test]
    async fn reviews_are_one_per_user_and_product() {
        let storage = MemoryStorage::new();
        let product = storage
            .create_product(new_product("Sun Hat", 20.0, "hats"))
            .await
            .unwrap();

        let review = |rating| NewReview {
            product: product.id,
            user: "u1".into(),
            rating,
            comment: None,
        };

        let first = storage.upsert_review(review(2.0)).await.unwrap();
        let second = storage.upsert_review(review(4.5)).await.unwrap();

        assert_eq!(first.id, second.id);
        let reviews = storage.reviews_for_product(product.id).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].rating, 4.5);

        storage.delete_product(product.id).await.unwrap();
        assert!(storage.find_review(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stock_reduction_reports_unknown_products() {
        let storage = MemoryStorage::new();
        let product = storage
            .create_product(new_product("Road Shoe", 60.0, "shoes"))
            .await
            .unwrap();

        assert!(storage.reduce_stock(product.id, 3).await.unwrap());
        assert!(!storage.reduce_stock(Uuid::new_v4(), 1).await.unwrap());
        assert_eq!(
            storage.count_products(ProductFilter::OutOfStock).await.unwrap(),
            1
        );
    }
}
