use crate::{error::AppError, AppState};
use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

pub mod dashboard;
pub mod order;
pub mod payment;
pub mod product;
pub mod review;
pub mod user;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// All API routes, mounted under `/api/v1`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/user/new", post(user::new_user))
        .route("/user/all", get(user::all_users))
        .route("/user/:id", get(user::get_user).delete(user::delete_user))
        .route("/product/new", post(product::new_product))
        .route("/product/latest", get(product::latest))
        .route("/product/categories", get(product::categories))
        .route("/product/admin-products", get(product::admin_products))
        .route("/product/all", get(product::search))
        .route("/product/review/:id", delete(review::delete_review))
        .route(
            "/product/:id",
            get(product::single)
                .put(product::update)
                .delete(product::delete_product),
        )
        .route("/product/:id/reviews", get(review::reviews))
        .route("/product/:id/review", post(review::new_review))
        .route("/order/new", post(order::new_order))
        .route("/order/my", get(order::my_orders))
        .route("/order/all", get(order::all_orders))
        .route(
            "/order/:id",
            get(order::single)
                .put(order::process)
                .delete(order::delete_order),
        )
        .route("/payment/coupon/new", post(payment::new_coupon))
        .route("/payment/discount", get(payment::apply_discount))
        .route("/payment/coupon/all", get(payment::all_coupons))
        .route("/payment/coupon/:id", delete(payment::delete_coupon))
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/dashboard/pie", get(dashboard::pie_charts))
        .route("/dashboard/bar", get(dashboard::bar_charts))
        .route("/dashboard/line", get(dashboard::line_charts));

    Router::new()
        .nest("/api/v1", api)
        .route("/cache-stats", get(cache_stats))
        .with_state(state)
}

#[derive(Debug, Serialize, Clone, Copy)]
pub struct CacheStats {
    pub entry_count: u64,
}

#[allow(clippy::unused_async)]
pub async fn cache_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, AppError> {
    Ok(Json(CacheStats {
        entry_count: state.cache.entry_count(),
    }))
}
