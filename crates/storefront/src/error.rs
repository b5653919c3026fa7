//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors become a JSON body
//! `{"error": <kind>, "detail": <message>, "hint"?: <remediation>}`:
//!
//! | Kind | Status | Examples |
//! |---|---|---|
//! | `validation_error` | 400 | malformed body, bad quantity, empty order |
//! | `unauthorized` | 401 | no session, wrong password |
//! | `forbidden` | 403 | non-admin on an admin route |
//! | `not_found` | 404 | unknown id, or another user's row |
//! | `conflict` | 409 | insufficient stock, taken e-mail, invalid status move |
//! | `internal_error` | 500 | database failure (detail is never exposed) |
//!
//! Server errors are captured to Sentry and logged before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::address_book::AddressBookError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::orders::OrderError;
use crate::services::uploads::UploadError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order workflow failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Address book operation failed.
    #[error("Address error: {0}")]
    Address(#[from] AddressBookError),

    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// File upload failed.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// State conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {e}"))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidContact(_)
                | AuthError::InvalidUsername(_)
                | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::NotAdmin => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists(_) => StatusCode::CONFLICT,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(err) => match err {
                CartError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
                CartError::NotFound | CartError::ProductNotFound => StatusCode::NOT_FOUND,
                CartError::Repository(err) => repository_status(err),
            },
            Self::Order(err) => match err {
                OrderError::EmptyOrder
                | OrderError::InvalidAddress(_)
                | OrderError::InvalidPaymentMethod(_)
                | OrderError::Pricing(_) => StatusCode::BAD_REQUEST,
                OrderError::ProductNotFound(_)
                | OrderError::AddressNotFound
                | OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::InsufficientStock { .. }
                | OrderError::OrderNumberExhausted
                | OrderError::InvalidStatusTransition(_) => StatusCode::CONFLICT,
                OrderError::OrderCreationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
                OrderError::Repository(err) => repository_status(err),
            },
            Self::Address(err) => match err {
                AddressBookError::Invalid(_) => StatusCode::BAD_REQUEST,
                AddressBookError::NotFound => StatusCode::NOT_FOUND,
                AddressBookError::Conflict(_) => StatusCode::CONFLICT,
                AddressBookError::Repository(err) => repository_status(err),
            },
            Self::Catalog(err) => match err {
                CatalogError::Invalid(_) => StatusCode::BAD_REQUEST,
                CatalogError::NotFound => StatusCode::NOT_FOUND,
                CatalogError::Repository(err) => repository_status(err),
            },
            Self::Upload(err) => match err {
                UploadError::Empty | UploadError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
                UploadError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client can do about a conflict.
    const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Order(OrderError::InsufficientStock { .. }) => {
                Some("Reduce the quantity or remove the item, then retry")
            }
            Self::Order(OrderError::OrderNumberExhausted) => Some("Retry the request"),
            Self::Order(OrderError::InvalidStatusTransition(_)) => {
                Some("Reload the order to see its current status")
            }
            Self::Auth(AuthError::UserAlreadyExists(_)) => {
                Some("Choose a different username, email or phone")
            }
            Self::Address(AddressBookError::Conflict(_)) => Some("Retry the request"),
            _ => None,
        }
    }

    /// Message safe to show the client.
    fn detail(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Database(err) => err.to_string(),
            Self::Auth(err) => err.to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Order(err) => err.to_string(),
            Self::Address(err) => err.to_string(),
            Self::Catalog(err) => err.to_string(),
            Self::Upload(err) => err.to_string(),
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Internal(msg) => msg.clone(),
        }
    }
}

const fn kind(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "validation_error",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::CONFLICT => "conflict",
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        _ => "internal_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            error: kind(status),
            detail: self.detail(),
            hint: self.hint(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
