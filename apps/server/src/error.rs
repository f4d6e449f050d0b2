//! # API Error Type
//!
//! What a failed request answers with.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler ── Result<T, ApiError>                                         │
//! │     │                                                                   │
//! │     ├── DbError::NotFound ──────────────► 404 NOT_FOUND                 │
//! │     ├── CoreError::InsufficientStock ───► 409 INSUFFICIENT_STOCK        │
//! │     ├── CoreError::PermissionDenied ────► 403 PERMISSION_DENIED         │
//! │     ├── ValidationError ────────────────► 400 VALIDATION_ERROR          │
//! │     └── DbError::QueryFailed ───────────► 500 DATABASE_ERROR            │
//! │                                            (details only in the log)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The body is always:
//! ```json
//! { "code": "NOT_FOUND", "message": "Product not found: 6f1c..." }
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vitrina_core::{CoreError, ValidationError};
use vitrina_db::DbError;

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Missing, expired or invalid token; bad credentials (401)
    Unauthorized,

    /// Permission or store scope missing (403)
    PermissionDenied,

    /// Duplicate value (409)
    Conflict,

    /// Insufficient stock (409)
    InsufficientStock,

    /// Register not open / already open (409)
    RegisterError,

    /// Document in the wrong status, disabled store, transfer rules (422)
    BusinessLogic,

    /// Cart operation failed (422)
    CartError,

    /// Payment does not fit the sale (422)
    PaymentError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::Conflict | ErrorCode::InsufficientStock | ErrorCode::RegisterError => {
                StatusCode::CONFLICT
            }
            ErrorCode::BusinessLogic | ErrorCode::CartError | ErrorCode::PaymentError => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    /// The one answer for every failed login.
    pub fn invalid_credentials() -> Self {
        ApiError::unauthorized("Invalid credentials")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::Core(e) => e.into(),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let code = match err {
            CoreError::NotFound { entity, id } => return ApiError::not_found(&entity, &id),
            CoreError::Validation(e) => return e.into(),
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::RegisterNotOpen { .. } | CoreError::RegisterAlreadyOpen { .. } => {
                ErrorCode::RegisterError
            }
            CoreError::PermissionDenied(_) | CoreError::StoreAccessDenied { .. } => {
                ErrorCode::PermissionDenied
            }
            CoreError::CartTooLarge { .. }
            | CoreError::NotInCart(_)
            | CoreError::EmptyCart => ErrorCode::CartError,
            CoreError::QuantityTooLarge { .. } => ErrorCode::ValidationError,
            CoreError::InvalidPaymentAmount { .. } => ErrorCode::PaymentError,
            CoreError::RoleInUse { .. } => ErrorCode::Conflict,
            CoreError::InvalidStatus { .. }
            | CoreError::StoreDisabled(_)
            | CoreError::VoidNotAllowed { .. }
            | CoreError::InvalidTransfer { .. } => ErrorCode::BusinessLogic,
        };
        ApiError::new(code, message)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Malformed JSON bodies answer in the same shape as every other error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrina_core::Permission;

    #[test]
    fn test_code_serializes_screaming() {
        let err = ApiError::new(ErrorCode::InsufficientStock, "x");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_STOCK");
        assert_eq!(json["message"], "x");
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = CoreError::PermissionDenied(Permission::VoidSales).into();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert_eq!(err.code.status(), StatusCode::FORBIDDEN);

        let err: ApiError = CoreError::RegisterNotOpen {
            store_id: "s".into(),
        }
        .into();
        assert_eq!(err.code.status(), StatusCode::CONFLICT);

        let err: ApiError = CoreError::EmptyCart.into();
        assert_eq!(err.code, ErrorCode::CartError);
    }

    #[test]
    fn test_db_error_hides_details() {
        let err: ApiError = DbError::QueryFailed("near \"SELEC\": syntax error".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("SELEC"));
    }

    #[test]
    fn test_wrapped_core_error_keeps_its_code() {
        let err: ApiError = DbError::Core(CoreError::not_found("Sale", "s-1")).into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Sale not found: s-1");
    }
}
