use super::Message;
use crate::{
    cache::CacheKey,
    entities::{Order, OrderItem, ShippingInfo},
    error::AppError,
    invalidation::InvalidationSignal,
    storage::{NewOrder, Storage},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use metrics::increment_counter;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    #[validate]
    pub shipping_info: ShippingInfo,
    #[validate(length(min = 1, message = "Please provide all the fields"))]
    pub user: String,
    #[validate(range(min = 0.0))]
    pub subtotal: f64,
    #[validate(range(min = 0.0))]
    pub tax: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub shipping_charges: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub discount: f64,
    #[validate(range(min = 0.0))]
    pub total: f64,
    #[validate]
    pub order_items: Vec<OrderItem>,
}

pub async fn new_order(
    State(state): State<AppState>,
    Json(payload): Json<NewOrderRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    if payload.order_items.is_empty() {
        return Err(AppError::bad_request("No Items in the order"));
    }
    payload.validate()?;

    for item in &payload.order_items {
        if state.storage.find_product(item.product_id).await?.is_none() {
            return Err(AppError::not_found(format!(
                "Product {} not found",
                item.product_id
            )));
        }
    }

    let order = state
        .storage
        .create_order(NewOrder {
            user: payload.user,
            shipping_info: payload.shipping_info,
            subtotal: payload.subtotal,
            tax: payload.tax,
            shipping_charges: payload.shipping_charges,
            discount: payload.discount,
            total: payload.total,
            order_items: payload.order_items,
        })
        .await?;

    let signal = InvalidationSignal::new()
        .product()
        .order()
        .admin()
        .product_ids(order.order_items.iter().map(|item| item.product_id))
        .order_id(order.id)
        .user_id(order.user.clone());

    // The order is stored: evict even if restocking fails halfway.
    let restocked = reduce_stock(state.storage.as_ref(), &order).await;
    state.invalidate(signal).await;
    restocked?;

    increment_counter!("storefront_order_created");
    info!("Created order {} for user {}", order.id, order.user);

    Ok((
        StatusCode::CREATED,
        Json(Message::new("Order created successfully")),
    ))
}

async fn reduce_stock(storage: &dyn Storage, order: &Order) -> color_eyre::Result<()> {
    for item in &order.order_items {
        if !storage.reduce_stock(item.product_id, item.quantity).await? {
            warn!(
                "Product {} of order {} is gone, stock not reduced",
                item.product_id, order.id
            );
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Default)]
pub struct MyOrdersQuery {
    pub id: Option<String>,
}

pub async fn my_orders(
    State(state): State<AppState>,
    Query(query): Query<MyOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let user = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("You should login first!"))?;

    let orders = state
        .cache
        .get_or_try_insert_with(CacheKey::MyOrders(user.clone()), async {
            let orders = state.storage.orders_for_user(&user).await?;
            if orders.is_empty() {
                return Err(AppError::not_found("No Orders found!"));
            }
            Ok(orders)
        })
        .await?;

    Ok(Json(orders))
}

pub async fn all_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .cache
        .get_or_try_insert_with(CacheKey::AllOrders, async {
            let orders = state.storage.all_orders().await?;
            if orders.is_empty() {
                return Err(AppError::not_found("No Orders Found"));
            }
            Ok(orders)
        })
        .await?;

    Ok(Json(orders))
}

pub async fn single(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .cache
        .get_or_try_insert_with(CacheKey::Order(id), async {
            state
                .storage
                .find_order(id)
                .await?
                .ok_or_else(|| AppError::not_found("Cannot find order details"))
        })
        .await?;

    Ok(Json(order))
}

/// Moves the order one step along Processing -> Shipped -> Delivered.
pub async fn process(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let mut order = state
        .storage
        .find_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Cannot find order details"))?;

    order.status = order.status.advance();
    state.storage.save_order(&order).await?;
    info!("Order {id} is now {}", order.status);

    state
        .invalidate(
            InvalidationSignal::new()
                .order()
                .admin()
                .order_id(id)
                .user_id(order.user),
        )
        .await;

    Ok(Json(Message::new("Order processed!")))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let order = state
        .storage
        .find_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Cannot find order details"))?;

    state.storage.delete_order(id).await?;
    info!("Deleted order {id}");

    state
        .invalidate(
            InvalidationSignal::new()
                .order()
                .admin()
                .order_id(id)
                .user_id(order.user),
        )
        .await;

    Ok(Json(Message::new("Order deleted successfully!")))
}
