use super::Message;
use crate::{
    entities::{Gender, User},
    error::AppError,
    invalidation::InvalidationSignal,
    storage::NewUser,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct NewUserRequest {
    #[serde(rename = "_id")]
    #[validate(length(min = 1, message = "Please add all fields"))]
    pub id: String,
    #[validate(length(min = 1, message = "Please add all fields"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[serde(default)]
    pub photo: String,
    pub gender: Gender,
    pub dob: NaiveDate,
}

/// Registers a user, or greets one that already exists.
pub async fn new_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUserRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    if let Some(user) = state.storage.find_user(&payload.id).await? {
        return Ok((
            StatusCode::OK,
            Json(Message::new(format!("{} logged in successfully!", user.name))),
        ));
    }

    payload.validate()?;

    let user = state
        .storage
        .create_user(NewUser {
            id: payload.id,
            name: payload.name,
            email: payload.email,
            photo: payload.photo,
            gender: payload.gender,
            dob: payload.dob,
        })
        .await?;
    info!("Registered user {}", user.id);

    state.invalidate(InvalidationSignal::new().admin()).await;

    Ok((
        StatusCode::CREATED,
        Json(Message::new(format!("Welcome, {}", user.name))),
    ))
}

pub async fn all_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = state.storage.all_users().await?;
    if users.is_empty() {
        return Err(AppError::not_found("No Users Found"));
    }
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state
        .storage
        .find_user(&id)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid Id"))?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, AppError> {
    if !state.storage.delete_user(&id).await? {
        return Err(AppError::bad_request("Invalid Id"));
    }
    info!("Deleted user {id}");

    state.invalidate(InvalidationSignal::new().admin()).await;

    Ok(Json(Message::new("User deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{CacheKey, ResponseCache},
        dashboard::BarCharts,
        storage::MemoryStorage,
    };
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(Arc::new(MemoryStorage::new()), ResponseCache::new(100), 8)
    }

    fn request(id: &str, email: &str) -> NewUserRequest {
        NewUserRequest {
            id: id.to_string(),
            name: "Ada".to_string(),
            email: email.to_string(),
            photo: String::new(),
            gender: Gender::Female,
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn registering_twice_greets_the_existing_user() {
        let state = state();
        let (status, _) = new_user(State(state.clone()), Json(request("u1", "ada@example.com")))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let (status, Json(message)) =
            new_user(State(state.clone()), Json(request("u1", "ada@example.com")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(message.message, "Ada logged in successfully!");

        let Json(users) = all_users(State(state)).await.unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let result = new_user(State(state()), Json(request("u1", "not-an-email"))).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn user_writes_evict_admin_views() {
        let state = state();
        let charts = BarCharts {
            products: vec![0.0; 6],
            users: vec![0.0; 6],
            orders: vec![0.0; 12],
        };
        state.cache.set(CacheKey::AdminBarCharts, charts).await;

        let _ = new_user(State(state.clone()), Json(request("u1", "ada@example.com")))
            .await
            .unwrap();
        assert!(!state.cache.has(&CacheKey::AdminBarCharts));

        let _ = delete_user(State(state.clone()), Path("u1".to_string()))
            .await
            .unwrap();
        assert!(matches!(
            get_user(State(state), Path("u1".to_string())).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
