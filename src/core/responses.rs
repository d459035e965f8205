use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use anyhow::Error;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq)]
pub enum AppErrorType {
    NotFoundError,
    DbError,
    AuthError,
    PayloadValidationError,
    ValidationError { errors: BTreeMap<String, String> },
    InvalidTransition,
    StorageFailure,
    InternalServerError,
    ForbiddenError,
}

#[derive(Debug, PartialEq)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: Option<String>,
    pub cause: Option<String>,
}

#[derive(Serialize)]
pub struct AppErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

impl AppError {
    pub fn message(&self) -> String {
        match &*self {
            AppError {
                message: Some(message),
                ..
            } => message.clone(),

            AppError {
                message: None,
                error_type: AppErrorType::NotFoundError,
                ..
            } => "The requested item was not found".to_string(),
            AppError {
                message: None,
                error_type: AppErrorType::ValidationError { .. },
                ..
            } => "One or more fields failed validation".to_string(),
            AppError {
                message: None,
                error_type: AppErrorType::StorageFailure,
                ..
            } => "File storage is temporarily unavailable".to_string(),
            _ => "An unexpected error has occurred".to_string(),
        }
    }

    pub fn db_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::DbError,
            message: Some(error.to_string()),
        }
    }

    pub fn not_found(message: impl ToString) -> AppError {
        AppError {
            cause: None,
            error_type: AppErrorType::NotFoundError,
            message: Some(message.to_string()),
        }
    }

    pub fn forbidden_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::ForbiddenError,
            message: Some(error.to_string()),
        }
    }

    pub fn unauthorized(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::AuthError,
            message: Some(error.to_string()),
        }
    }

    pub fn internal_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::InternalServerError,
            message: Some(error.to_string()),
        }
    }

    pub fn validation(errors: BTreeMap<String, String>) -> AppError {
        AppError {
            cause: None,
            error_type: AppErrorType::ValidationError { errors },
            message: None,
        }
    }

    pub fn invalid_transition(from: &str, to: &str) -> AppError {
        AppError {
            cause: None,
            error_type: AppErrorType::InvalidTransition,
            message: Some(format!(
                "A request in status '{}' cannot be moved to '{}'",
                from, to
            )),
        }
    }

    // Storage failures keep the on-disk path out of the caller-facing message.
    pub fn storage_failure(cause: impl ToString) -> AppError {
        AppError {
            cause: Some(cause.to_string()),
            error_type: AppErrorType::StorageFailure,
            message: None,
        }
    }

    pub fn field_errors(&self) -> Option<BTreeMap<String, String>> {
        match &self.error_type {
            AppErrorType::ValidationError { errors } => Some(errors.clone()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: Error) -> Self {
        AppError {
            message: None,
            cause: Some(error.to_string()),
            error_type: AppErrorType::DbError,
        }
    }
}
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::DbError,
            message: Some(error.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let errors = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let message = errors
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .collect();

        AppError::validation(errors)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.error_type {
            AppErrorType::AuthError => StatusCode::UNAUTHORIZED,
            AppErrorType::DbError
            | AppErrorType::StorageFailure
            | AppErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            AppErrorType::NotFoundError => StatusCode::NOT_FOUND,
            AppErrorType::PayloadValidationError | AppErrorType::ValidationError { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppErrorType::InvalidTransition => StatusCode::CONFLICT,
            AppErrorType::ForbiddenError => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(AppErrorResponse {
            success: false,
            message: self.message(),
            errors: self.field_errors(),
        })
    }
}

#[derive(Serialize)]
pub struct AppSuccessResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<crate::models::pagination::PaginationMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::assert_some;

    #[test]
    fn validation_errors_map_to_bad_request_with_field_messages() {
        let mut errors = BTreeMap::new();
        errors.insert("comments".to_string(), "too short".to_string());
        let error = AppError::validation(errors);

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        let fields = assert_some!(error.field_errors());
        assert_eq!(fields.get("comments").map(String::as_str), Some("too short"));
    }

    #[test]
    fn invalid_transition_maps_to_conflict() {
        let error = AppError::invalid_transition("Rejected", "Pending");
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_failure_does_not_leak_the_cause() {
        let error = AppError::storage_failure("open /var/data/blobs/abc: permission denied");
        assert!(!error.message().contains("/var/data"));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
