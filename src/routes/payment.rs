use super::Message;
use crate::{entities::Coupon, error::AppError, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct NewCouponRequest {
    #[validate(length(min = 1, message = "Please enter both coupon and amount"))]
    pub coupon: String,
    #[validate(range(min = 0.0, message = "Please enter both coupon and amount"))]
    pub amount: f64,
}

pub async fn new_coupon(
    State(state): State<AppState>,
    Json(payload): Json<NewCouponRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    payload.validate()?;

    if state.storage.find_coupon(&payload.coupon).await?.is_some() {
        return Err(AppError::bad_request(format!(
            "Coupon {} already exists",
            payload.coupon
        )));
    }

    let coupon = state
        .storage
        .create_coupon(payload.coupon, payload.amount)
        .await?;
    info!("Created coupon {}", coupon.code);

    Ok((
        StatusCode::CREATED,
        Json(Message::new(format!(
            "Coupon {} Created Successfully",
            coupon.code
        ))),
    ))
}

#[derive(Debug, Deserialize, Default)]
pub struct DiscountQuery {
    pub coupon: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Discount {
    pub discount: f64,
}

pub async fn apply_discount(
    State(state): State<AppState>,
    Query(query): Query<DiscountQuery>,
) -> Result<Json<Discount>, AppError> {
    let code = query
        .coupon
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("Please provide coupon"))?;

    let coupon = state
        .storage
        .find_coupon(&code)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid Coupon"))?;

    Ok(Json(Discount {
        discount: coupon.amount,
    }))
}

pub async fn all_coupons(State(state): State<AppState>) -> Result<Json<Vec<Coupon>>, AppError> {
    let coupons = state.storage.all_coupons().await?;
    if coupons.is_empty() {
        return Err(AppError::not_found("No Coupons Found"));
    }
    Ok(Json(coupons))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let coupon = state
        .storage
        .delete_coupon(id)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid coupon"))?;
    info!("Deleted coupon {}", coupon.code);

    Ok(Json(Message::new(format!(
        "Coupon {} Deleted Successfully",
        coupon.code
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::ResponseCache, storage::MemoryStorage};
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(Arc::new(MemoryStorage::new()), ResponseCache::new(100), 8)
    }

    fn query(coupon: Option<&str>) -> Query<DiscountQuery> {
        Query(DiscountQuery {
            coupon: coupon.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn discount_comes_from_the_coupon() {
        let state = state();
        let request = NewCouponRequest {
            coupon: "SUMMER10".into(),
            amount: 10.0,
        };
        let (status, _) = new_coupon(State(state.clone()), Json(request))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(discount) = apply_discount(State(state.clone()), query(Some("SUMMER10")))
            .await
            .unwrap();
        assert_eq!(discount, Discount { discount: 10.0 });

        assert!(matches!(
            apply_discount(State(state.clone()), query(Some("WINTER"))).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            apply_discount(State(state), query(None)).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn deleting_removes_the_coupon() {
        let state = state();
        assert!(matches!(
            all_coupons(State(state.clone())).await,
            Err(AppError::NotFound(_))
        ));

        let request = NewCouponRequest {
            coupon: "ONCE".into(),
            amount: 5.0,
        };
        let _ = new_coupon(State(state.clone()), Json(request)).await.unwrap();
        let Json(coupons) = all_coupons(State(state.clone())).await.unwrap();

        let _ = delete_coupon(State(state.clone()), Path(coupons[0].id))
            .await
            .unwrap();
        assert!(matches!(
            delete_coupon(State(state), Path(coupons[0].id)).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_code_is_a_client_error() {
        let state = state();
        let request = || NewCouponRequest {
            coupon: "TWICE".into(),
            amount: 3.0,
        };
        let _ = new_coupon(State(state.clone()), Json(request())).await.unwrap();

        assert!(matches!(
            new_coupon(State(state.clone()), Json(request())).await,
            Err(AppError::BadRequest(_))
        ));
        let Json(coupons) = all_coupons(State(state)).await.unwrap();
        assert_eq!(coupons.len(), 1);
    }
}
