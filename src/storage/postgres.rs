use super::{
    DateRange, NewOrder, NewProduct, NewReview, NewUser, PriceSort, ProductFilter, ProductSearch,
    Storage, UserFilter,
};
use crate::entities::{
    Coupon, Order, OrderItem, OrderStatus, Product, Review, Role, ShippingInfo, User,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::{eyre::Error, Result};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    photo: String,
    role: String,
    gender: String,
    dob: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            photo: row.photo,
            role: row.role.parse()?,
            gender: row.gender.parse()?,
            dob: row.dob,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    shipping_info: Json<ShippingInfo>,
    subtotal: f64,
    tax: f64,
    shipping_charges: f64,
    discount: f64,
    total: f64,
    status: String,
    order_items: Json<Vec<OrderItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = Error;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user: row.user_id,
            shipping_info: row.shipping_info.0,
            subtotal: row.subtotal,
            tax: row.tax,
            shipping_charges: row.shipping_charges,
            discount: row.discount,
            total: row.total,
            status: row.status.parse()?,
            order_items: row.order_items.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn count(value: i64) -> Result<u64> {
    Ok(u64::try_from(value)?)
}

const SEARCH_FILTER: &str = "WHERE ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%')
    AND ($2::FLOAT8 IS NULL OR price <= $2)
    AND ($3::TEXT IS NULL OR category = $3)";

#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    /// Inserts or overwrites a product, keeping its id and timestamps.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, name, price, stock, category, photo, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, price = EXCLUDED.price, stock = EXCLUDED.stock,
                category = EXCLUDED.category, photo = EXCLUDED.photo,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.category)
        .bind(&product.photo)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        Ok(sqlx::query_as::<_, Product>(
            "INSERT INTO products (id, name, price, stock, category, photo)
            VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.category)
        .bind(product.photo)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "UPDATE products SET name = $2, price = $3, stock = $4, category = $5, photo = $6,
            updated_at = NOW() WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.category)
        .bind(&product.photo)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        Ok(
            sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn latest_products(&self, limit: u64) -> Result<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>(
            "SELECT * FROM products ORDER BY created_at DESC LIMIT $1",
        )
        .bind(i64::try_from(limit)?)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn products_created_between(&self, range: DateRange) -> Result<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE created_at >= $1 AND created_at <= $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_products(&self, filter: ProductFilter) -> Result<u64> {
        let sql = match filter {
            ProductFilter::All => "SELECT COUNT(*) FROM products",
            ProductFilter::OutOfStock => "SELECT COUNT(*) FROM products WHERE stock = 0",
        };
        count(
            sqlx::query_scalar::<_, i64>(sql)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn product_categories(&self) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM products ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn products_per_category(&self) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT category, COUNT(*) FROM products GROUP BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(category, n)| -> Result<(String, u64)> { Ok((category, count(n)?)) })
            .collect()
    }

    async fn search_products(&self, search: &ProductSearch) -> Result<(Vec<Product>, u64)> {
        let order = match search.sort {
            Some(PriceSort::Asc) => "ORDER BY price ASC",
            Some(PriceSort::Desc) => "ORDER BY price DESC",
            None => "ORDER BY created_at ASC",
        };

        let page_sql = format!("SELECT * FROM products {SEARCH_FILTER} {order} LIMIT $4 OFFSET $5");
        let count_sql = format!("SELECT COUNT(*) FROM products {SEARCH_FILTER}");

        let page = sqlx::query_as::<_, Product>(&page_sql)
            .bind(search.name.as_deref())
            .bind(search.max_price)
            .bind(search.category.as_deref())
            .bind(i64::try_from(search.limit)?)
            .bind(i64::try_from(search.offset)?)
            .fetch_all(&self.pool)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(search.name.as_deref())
            .bind(search.max_price)
            .bind(search.category.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok((page, count(total)?))
    }

    async fn reduce_stock(&self, id: Uuid, quantity: i32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, name, email, photo, role, gender, dob)
            VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(user.id)
        .bind(user.name)
        .bind(user.email)
        .bind(user.photo)
        .bind(Role::User.as_str())
        .bind(user.gender.as_str())
        .bind(user.dob)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn delete_user(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        convert(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn users_created_between(&self, range: DateRange) -> Result<Vec<User>> {
        convert(
            sqlx::query_as::<_, UserRow>(
                "SELECT * FROM users WHERE created_at >= $1 AND created_at <= $2",
            )
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?,
        )
    }

    async fn count_users(&self, filter: UserFilter) -> Result<u64> {
        let query = match filter {
            UserFilter::All => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users"),
            UserFilter::Gender(gender) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE gender = $1")
                    .bind(gender.as_str())
            }
            UserFilter::Role(role) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
                    .bind(role.as_str())
            }
        };
        count(query.fetch_one(&self.pool).await?)
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders (id, user_id, shipping_info, subtotal, tax, shipping_charges,
                discount, total, status, order_items)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(order.user)
        .bind(Json(order.shipping_info))
        .bind(order.subtotal)
        .bind(order.tax)
        .bind(order.shipping_charges)
        .bind(order.discount)
        .bind(order.total)
        .bind(OrderStatus::Processing.as_str())
        .bind(Json(order.order_items))
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(order.id)
            .bind(order.status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        convert(
            sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn orders_for_user(&self, user: &str) -> Result<Vec<Order>> {
        convert(
            sqlx::query_as::<_, OrderRow>(
                "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at ASC",
            )
            .bind(user)
            .fetch_all(&self.pool)
            .await?,
        )
    }

    async fn orders_created_between(&self, range: DateRange) -> Result<Vec<Order>> {
        convert(
            sqlx::query_as::<_, OrderRow>(
                "SELECT * FROM orders WHERE created_at >= $1 AND created_at <= $2",
            )
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?,
        )
    }

    async fn count_orders(&self, status: Option<OrderStatus>) -> Result<u64> {
        let query = match status {
            None => sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders"),
            Some(status) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE status = $1")
                    .bind(status.as_str())
            }
        };
        count(query.fetch_one(&self.pool).await?)
    }

    async fn recent_orders(&self, limit: u64) -> Result<Vec<Order>> {
        convert(
            sqlx::query_as::<_, OrderRow>(
                "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1",
            )
            .bind(i64::try_from(limit)?)
            .fetch_all(&self.pool)
            .await?,
        )
    }

    async fn create_coupon(&self, code: String, amount: f64) -> Result<Coupon> {
        Ok(sqlx::query_as::<_, Coupon>(
            "INSERT INTO coupons (id, code, amount) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(
            sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn all_coupons(&self) -> Result<Vec<Coupon>> {
        Ok(sqlx::query_as::<_, Coupon>("SELECT * FROM coupons")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<Option<Coupon>> {
        Ok(
            sqlx::query_as::<_, Coupon>("DELETE FROM coupons WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn upsert_review(&self, review: NewReview) -> Result<Review> {
        Ok(sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (id, product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (product_id, user_id) DO UPDATE SET
                rating = EXCLUDED.rating, comment = EXCLUDED.comment, updated_at = NOW()
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(review.product)
        .bind(review.user)
        .bind(review.rating)
        .bind(review.comment)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_review(&self, id: Uuid) -> Result<Option<Review>> {
        Ok(
            sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reviews_for_product(&self, product: Uuid) -> Result<Vec<Review>> {
        Ok(sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC",
        )
        .bind(product)
        .fetch_all(&self.pool)
        .await?)
    }
}
