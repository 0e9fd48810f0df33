//! Admin dashboard assembly.
//!
//! Each function issues its storage reads concurrently, runs the chart
//! helpers over the results and returns the object the routes cache under
//! the matching `admin-*` key.

use crate::{
    charts::{category_percentage, month_buckets, percentage_change, Measure},
    entities::{Gender, Order, OrderStatus, Role},
    storage::{DateRange, ProductFilter, Storage, UserFilter},
};
use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use color_eyre::{eyre::eyre, Result};
use futures_util::future::try_join_all;
use metrics::histogram;
use serde::Serialize;
use std::{collections::BTreeMap, time::Instant};
use uuid::Uuid;

const LATEST_TRANSACTIONS: u64 = 4;
/// Share of gross income booked as marketing cost.
const MARKETING_COST_RATE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Percentages {
    pub products: f64,
    pub orders: f64,
    pub users: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    pub product: u64,
    pub orders: u64,
    pub users: u64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueChart {
    pub order: Vec<f64>,
    pub revenue: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRatio {
    pub male: u64,
    pub female: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionUser {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub discount: f64,
    pub status: OrderStatus,
    pub quantity: usize,
    pub user: TransactionUser,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub percentage: Percentages,
    pub count: Counts,
    pub bar_chart: RevenueChart,
    pub categories: BTreeMap<String, f64>,
    pub user_ratio: UserRatio,
    pub latest_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderFulfillment {
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAvailability {
    pub in_stock: u64,
    pub out_of_stock: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueDistribution {
    pub marketing_cost: f64,
    pub discount: f64,
    pub burnt: f64,
    pub production_cost: f64,
    pub net_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAgeGroup {
    pub teen: u64,
    pub adult: u64,
    pub old: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCount {
    pub admin: u64,
    pub customer: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieCharts {
    pub order_fulfillment_ratio: OrderFulfillment,
    pub product_categories_ratio: BTreeMap<String, f64>,
    pub stock_availability: StockAvailability,
    pub revenue_distribution: RevenueDistribution,
    pub user_age_group: UserAgeGroup,
    pub user_count: UserCount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarCharts {
    pub products: Vec<f64>,
    pub users: Vec<f64>,
    pub orders: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineCharts {
    pub users: Vec<f64>,
    pub products: Vec<f64>,
    pub discount: Vec<f64>,
    pub revenue: Vec<f64>,
}

fn month_start(today: DateTime<Utc>) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(today.year(), today.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| eyre!("no first day of month for {today}"))
}

fn months_ago(today: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    today
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| eyre!("cannot go back {months} months from {today}"))
}

fn revenue(orders: &[Order]) -> f64 {
    orders.iter().map(|o| o.total).sum()
}

fn order_total(order: &Order) -> Option<f64> {
    Some(order.total)
}

fn order_discount(order: &Order) -> Option<f64> {
    Some(order.discount)
}

pub async fn stats(storage: &dyn Storage, today: DateTime<Utc>) -> Result<DashboardStats> {
    let start = Instant::now();

    let current_start = month_start(today)?;
    let current_month = DateRange::new(current_start, today);
    let last_month = DateRange::new(
        months_ago(current_start, 1)?,
        current_start - Duration::microseconds(1),
    );
    let last_six_months = DateRange::new(months_ago(today, 6)?, today);

    let (
        current_month_products,
        last_month_products,
        current_month_users,
        last_month_users,
        current_month_orders,
        last_month_orders,
        product_count,
        user_count,
        all_orders,
        last_six_month_orders,
        categories,
        per_category,
        male_users,
        recent_orders,
    ) = tokio::try_join!(
        storage.products_created_between(current_month),
        storage.products_created_between(last_month),
        storage.users_created_between(current_month),
        storage.users_created_between(last_month),
        storage.orders_created_between(current_month),
        storage.orders_created_between(last_month),
        storage.count_products(ProductFilter::All),
        storage.count_users(UserFilter::All),
        storage.all_orders(),
        storage.orders_created_between(last_six_months),
        storage.product_categories(),
        storage.products_per_category(),
        storage.count_users(UserFilter::Gender(Gender::Male)),
        storage.recent_orders(LATEST_TRANSACTIONS),
    )?;

    let buyers = try_join_all(
        recent_orders
            .iter()
            .map(|order| storage.find_user(&order.user)),
    )
    .await?;

    let latest_transactions = recent_orders
        .into_iter()
        .zip(buyers)
        .map(|(order, buyer)| Transaction {
            id: order.id,
            discount: order.discount,
            status: order.status,
            quantity: order.order_items.len(),
            user: TransactionUser {
                id: order.user,
                name: buyer.map(|u| u.name),
            },
            amount: order.total,
        })
        .collect();

    let stats = DashboardStats {
        percentage: Percentages {
            products: percentage_change(
                current_month_products.len() as f64,
                last_month_products.len() as f64,
            ),
            orders: percentage_change(
                current_month_orders.len() as f64,
                last_month_orders.len() as f64,
            ),
            users: percentage_change(
                current_month_users.len() as f64,
                last_month_users.len() as f64,
            ),
            revenue: percentage_change(revenue(&current_month_orders), revenue(&last_month_orders)),
        },
        count: Counts {
            product: product_count,
            orders: all_orders.len() as u64,
            users: user_count,
            total_revenue: revenue(&all_orders),
        },
        bar_chart: RevenueChart {
            order: month_buckets(6, &last_six_month_orders, today, &Measure::Count),
            revenue: month_buckets(6, &last_six_month_orders, today, &Measure::Sum(order_total)),
        },
        categories: category_percentage(&categories, &per_category, product_count),
        user_ratio: UserRatio {
            male: male_users,
            female: user_count.saturating_sub(male_users),
        },
        latest_transactions,
    };

    histogram!("storefront_query", start.elapsed(), "type" => "admin_stats");
    Ok(stats)
}

pub async fn pie_charts(storage: &dyn Storage, today: DateTime<Utc>) -> Result<PieCharts> {
    let start = Instant::now();

    let (
        processing,
        shipped,
        delivered,
        categories,
        per_category,
        product_count,
        out_of_stock,
        orders,
        users,
        admins,
        customers,
    ) = tokio::try_join!(
        storage.count_orders(Some(OrderStatus::Processing)),
        storage.count_orders(Some(OrderStatus::Shipped)),
        storage.count_orders(Some(OrderStatus::Delivered)),
        storage.product_categories(),
        storage.products_per_category(),
        storage.count_products(ProductFilter::All),
        storage.count_products(ProductFilter::OutOfStock),
        storage.all_orders(),
        storage.all_users(),
        storage.count_users(UserFilter::Role(Role::Admin)),
        storage.count_users(UserFilter::Role(Role::User)),
    )?;

    let gross_income: f64 = orders.iter().map(|o| o.total).sum();
    let discount: f64 = orders.iter().map(|o| o.discount).sum();
    let production_cost: f64 = orders.iter().map(|o| o.shipping_charges).sum();
    let burnt: f64 = orders.iter().map(|o| o.tax).sum();

    let birthday = today.date_naive();
    let mut user_age_group = UserAgeGroup {
        teen: 0,
        adult: 0,
        old: 0,
    };
    for user in &users {
        match user.age(birthday) {
            age if age < 20 => user_age_group.teen += 1,
            age if age <= 40 => user_age_group.adult += 1,
            _ => user_age_group.old += 1,
        }
    }

    let charts = PieCharts {
        order_fulfillment_ratio: OrderFulfillment {
            processing,
            shipped,
            delivered,
        },
        product_categories_ratio: category_percentage(&categories, &per_category, product_count),
        stock_availability: StockAvailability {
            in_stock: product_count.saturating_sub(out_of_stock),
            out_of_stock,
        },
        revenue_distribution: RevenueDistribution {
            marketing_cost: (gross_income * MARKETING_COST_RATE).round(),
            discount,
            burnt,
            production_cost,
            // Marketing cost is reported but not deducted from the margin.
            net_margin: gross_income - discount - burnt,
        },
        user_age_group,
        user_count: UserCount {
            admin: admins,
            customer: customers,
        },
    };

    histogram!("storefront_query", start.elapsed(), "type" => "admin_pie_charts");
    Ok(charts)
}

pub async fn bar_charts(storage: &dyn Storage, today: DateTime<Utc>) -> Result<BarCharts> {
    let start = Instant::now();

    let six_months = DateRange::new(months_ago(today, 6)?, today);
    let twelve_months = DateRange::new(months_ago(today, 12)?, today);

    let (products, users, orders) = tokio::try_join!(
        storage.products_created_between(six_months),
        storage.users_created_between(six_months),
        storage.orders_created_between(twelve_months),
    )?;

    let charts = BarCharts {
        products: month_buckets(6, &products, today, &Measure::Count),
        users: month_buckets(6, &users, today, &Measure::Count),
        orders: month_buckets(12, &orders, today, &Measure::Count),
    };

    histogram!("storefront_query", start.elapsed(), "type" => "admin_bar_charts");
    Ok(charts)
}

pub async fn line_charts(storage: &dyn Storage, today: DateTime<Utc>) -> Result<LineCharts> {
    let start = Instant::now();

    let twelve_months = DateRange::new(months_ago(today, 12)?, today);

    let (products, users, orders) = tokio::try_join!(
        storage.products_created_between(twelve_months),
        storage.users_created_between(twelve_months),
        storage.orders_created_between(twelve_months),
    )?;

    let charts = LineCharts {
        users: month_buckets(12, &users, today, &Measure::Count),
        products: month_buckets(12, &products, today, &Measure::Count),
        discount: month_buckets(12, &orders, today, &Measure::Sum(order_discount)),
        revenue: month_buckets(12, &orders, today, &Measure::Sum(order_total)),
    };

    histogram!("storefront_query", start.elapsed(), "type" => "admin_line_charts");
    Ok(charts)
}
