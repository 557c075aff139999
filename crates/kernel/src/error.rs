//! Application error types.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::content::SchemaError;

/// Field-level validation failures for one edit form.
///
/// `basename` is the namespaced address of the form that failed, so the
/// messages can be attached back to the right descriptor when the form is
/// redisplayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    pub basename: String,
    pub errors: BTreeMap<String, Vec<String>>,
    /// Raw submitted text, keyed by field name, for redisplay.
    pub submitted: BTreeMap<String, String>,
}

impl FieldErrors {
    pub fn new(basename: impl Into<String>) -> Self {
        Self {
            basename: basename.into(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages for a single field.
    pub fn for_field(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Errors surfaced by the CMS services and HTTP layer.
#[derive(Debug, Error)]
pub enum CmsError {
    /// Bad submission, bad XML, duplicate draft, invalid choice.
    #[error("{0}")]
    Validation(String),

    #[error("form `{}` has invalid fields", .0.basename)]
    FormValidation(FieldErrors),

    #[error("{0} not found")]
    NotFound(String),

    /// The operation is not allowed in the current state; nothing was changed.
    #[error("{0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl CmsError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the error is something an editor can fix (shown as a message
    /// rather than an error page).
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            CmsError::Validation(_) | CmsError::FormValidation(_) | CmsError::InvariantViolation(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CmsError::Validation(_) | CmsError::FormValidation(_) => StatusCode::BAD_REQUEST,
            CmsError::NotFound(_) => StatusCode::NOT_FOUND,
            CmsError::InvariantViolation(_) => StatusCode::CONFLICT,
            CmsError::Schema(SchemaError::UnknownNode(_) | SchemaError::UnknownTemplate(_)) => {
                StatusCode::NOT_FOUND
            }
            CmsError::Schema(_) => StatusCode::BAD_REQUEST,
            CmsError::Unauthorized => StatusCode::UNAUTHORIZED,
            CmsError::Forbidden => StatusCode::FORBIDDEN,
            CmsError::Database(_) | CmsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CmsError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            CmsError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            CmsError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

/// Result type alias using CmsError.
pub type CmsResult<T> = Result<T, CmsError>;

/// Map a storage-level unique violation to a validation message.
pub(crate) fn unique_violation(err: anyhow::Error, message: &str) -> CmsError {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            CmsError::Validation(message.to_string())
        }
        _ => CmsError::Internal(err),
    }
}
