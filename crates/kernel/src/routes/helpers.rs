//! Shared route helpers for admin page rendering.

use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::error::{CmsError, CmsResult};
use crate::state::AppState;

/// Mount point of the admin surface.
pub const ADMIN_BASE: &str = "/admin/cms";

/// One-shot notice carried on a redirect's query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notice {
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Base context for every admin screen: `admin_base`, `languages`,
/// `localized`, plus the notice when present.
pub fn admin_context(state: &AppState, notice: &Notice) -> tera::Context {
    let config = state.config();
    let mut context = tera::Context::new();
    context.insert("admin_base", ADMIN_BASE);
    context.insert("languages", &config.languages);
    context.insert("localized", &config.localized);
    context.insert("message", &notice.message);
    context.insert("error", &notice.error);
    context
}

/// Render an admin template.
pub fn render_admin(
    state: &AppState,
    template: &str,
    context: &tera::Context,
) -> CmsResult<Response> {
    let html = state.theme().tera().render(template, context).map_err(|e| {
        tracing::error!(error = %e, template = %template, "failed to render template");
        CmsError::Internal(e.into())
    })?;
    Ok(Html(html).into_response())
}

/// Redirect to `url` with a notice in the query string.
pub fn redirect_with(url: &str, key: &str, message: &str) -> Response {
    let sep = if url.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{url}{sep}{key}={}", urlencoding::encode(message))).into_response()
}

/// Admin URL of a page.
pub fn page_url(id: impl std::fmt::Display) -> String {
    format!("{ADMIN_BASE}/pages/{id}")
}

/// HTML-escape a string for safe output.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
