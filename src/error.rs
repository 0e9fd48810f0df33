use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use color_eyre::eyre::eyre;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// A required input is absent or malformed.
    #[error("{0}")]
    BadRequest(String),

    /// A lookup by id found nothing.
    #[error("{0}")]
    NotFound(String),

    #[error("Something went wrong: {0}")]
    Internal(#[from] color_eyre::eyre::Error),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Errors from a shared cache computation reach every waiter behind an `Arc`.
impl From<Arc<Self>> for AppError {
    fn from(shared: Arc<Self>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| match shared.as_ref() {
            Self::BadRequest(message) => Self::BadRequest(message.clone()),
            Self::NotFound(message) => Self::NotFound(message.clone()),
            Self::Internal(err) => Self::Internal(eyre!("{err:#}")),
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let Self::Internal(err) = &self {
            tracing::error!("request failed: {err:?}");
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(
            AppError::bad_request("Please provide all the fields")
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("No product found").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(eyre!("connection reset"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn shared_errors_keep_their_kind() {
        let shared = Arc::new(AppError::not_found("No Orders Found"));
        let waiter = Arc::clone(&shared);

        assert!(matches!(AppError::from(waiter), AppError::NotFound(m) if m == "No Orders Found"));
        assert!(matches!(AppError::from(shared), AppError::NotFound(_)));

        let internal = Arc::new(AppError::from(eyre!("pool timed out")));
        let _held = Arc::clone(&internal);
        assert_eq!(
            AppError::from(internal).to_string(),
            "Something went wrong: pool timed out"
        );
    }
}
