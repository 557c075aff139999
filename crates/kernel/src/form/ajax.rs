//! Replies for AJAX section saves.
//!
//! Section forms may post through a hidden iframe so uploads work without a
//! page reload. The browser can only read the iframe document back, so the
//! JSON status is delivered HTML-escaped inside a `<textarea>`.

use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;
use crate::routes::helpers::html_escape;

/// Field name used for messages that belong to the form as a whole.
pub const NON_FIELD: &str = "__all__";

/// Outcome of an AJAX save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AjaxOutcome {
    Ok,
    Error,
}

/// Messages for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AjaxFieldError {
    pub field: String,
    pub messages: Vec<String>,
}

/// The `{status, errors}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AjaxStatus {
    pub status: AjaxOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<AjaxFieldError>,
}

impl AjaxStatus {
    pub fn ok() -> Self {
        Self {
            status: AjaxOutcome::Ok,
            errors: Vec::new(),
        }
    }

    pub fn from_field_errors(errors: &FieldErrors) -> Self {
        Self {
            status: AjaxOutcome::Error,
            errors: errors
                .errors
                .iter()
                .map(|(field, messages)| AjaxFieldError {
                    field: field.clone(),
                    messages: messages.clone(),
                })
                .collect(),
        }
    }

    /// An error that is not tied to a single field.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: AjaxOutcome::Error,
            errors: vec![AjaxFieldError {
                field: NON_FIELD.to_string(),
                messages: vec![message.into()],
            }],
        }
    }

    /// `<textarea>{json}</textarea>` with the JSON HTML-escaped.
    pub fn to_textarea(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| r#"{"status":"error"}"#.into());
        format!("<textarea>{}</textarea>", html_escape(&json))
    }
}

impl IntoResponse for AjaxStatus {
    fn into_response(self) -> Response {
        Html(self.to_textarea()).into_response()
    }
}
