use super::Message;
use crate::{
    cache::CacheKey,
    entities::Review,
    error::AppError,
    invalidation::InvalidationSignal,
    storage::NewReview,
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct NewReviewRequest {
    #[validate(length(min = 1, message = "You should login first!"))]
    pub user: String,
    #[validate(range(min = 0.5, max = 5.0, message = "Rating must be between 0.5 and 5"))]
    pub rating: f64,
    #[validate(length(max = 200, message = "Comment must not be more than 200 characters"))]
    pub comment: Option<String>,
}

pub async fn reviews(
    State(state): State<AppState>,
    Path(product): Path<Uuid>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = state
        .cache
        .get_or_try_insert_with(CacheKey::Reviews(product), async {
            Ok::<_, AppError>(state.storage.reviews_for_product(product).await?)
        })
        .await?;

    Ok(Json(reviews))
}

pub async fn new_review(
    State(state): State<AppState>,
    Path(product): Path<Uuid>,
    Json(payload): Json<NewReviewRequest>,
) -> Result<Json<Message>, AppError> {
    payload.validate()?;

    if state.storage.find_product(product).await?.is_none() {
        return Err(AppError::not_found("No product found"));
    }

    let review = state
        .storage
        .upsert_review(NewReview {
            product,
            user: payload.user,
            rating: payload.rating,
            comment: payload.comment.filter(|c| !c.trim().is_empty()),
        })
        .await?;
    info!("Review {} saved for product {product}", review.id);

    state
        .invalidate(InvalidationSignal::new().review().product_ids([product]))
        .await;

    Ok(Json(Message::new("Review added")))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let review = state
        .storage
        .find_review(id)
        .await?
        .ok_or_else(|| AppError::not_found("No review found"))?;

    state.storage.delete_review(id).await?;
    info!("Deleted review {id}");

    state
        .invalidate(InvalidationSignal::new().review().product_ids([review.product]))
        .await;

    Ok(Json(Message::new("Review deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::ResponseCache,
        storage::{MemoryStorage, NewProduct, Storage},
    };
    use std::sync::Arc;

    async fn state_with_product() -> (AppState, Uuid) {
        let storage = Arc::new(MemoryStorage::new());
        let product = storage
            .create_product(NewProduct {
                name: "Sun Hat".into(),
                price: 20.0,
                stock: 5,
                category: "hats".into(),
                photo: String::new(),
            })
            .await
            .unwrap();
        (AppState::new(storage, ResponseCache::new(100), 8), product.id)
    }

    fn request(rating: f64) -> NewReviewRequest {
        NewReviewRequest {
            user: "u1".into(),
            rating,
            comment: Some("fits well".into()),
        }
    }

    #[tokio::test]
    async fn new_review_refreshes_the_cached_list() {
        let (state, product) = state_with_product().await;

        let Json(before) = reviews(State(state.clone()), Path(product)).await.unwrap();
        assert!(before.is_empty());
        assert!(state.cache.has(&CacheKey::Reviews(product)));

        let _ = new_review(State(state.clone()), Path(product), Json(request(4.0)))
            .await
            .unwrap();
        assert!(!state.cache.has(&CacheKey::Reviews(product)));

        let Json(after) = reviews(State(state.clone()), Path(product)).await.unwrap();
        assert_eq!(after.len(), 1);

        let _ = delete_review(State(state.clone()), Path(after[0].id))
            .await
            .unwrap();
        let Json(after_delete) = reviews(State(state), Path(product)).await.unwrap();
        assert!(after_delete.is_empty());
    }

    #[tokio::test]
    async fn ratings_outside_the_scale_are_rejected() {
        let (state, product) = state_with_product().await;
        let result = new_review(State(state), Path(product), Json(request(6.0))).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn reviews_need_an_existing_product() {
        let (state, _) = state_with_product().await;
        let result = new_review(State(state), Path(Uuid::new_v4()), Json(request(3.0))).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
