//! Front-end routes: resolved CMS pages and the sitemap.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use crate::error::{CmsError, CmsResult};
use crate::resolver::ResolvedPage;
use crate::sitemap::Sitemap;
use crate::state::AppState;

/// Fallback when no page template matches.
const DEFAULT_PAGE_TEMPLATE: &str = "cms/page.html";

/// Create the front router. CMS pages are served by the fallback.
///
/// Uploaded files are served from `UPLOADS_DIR` when `FILES_URL` is a local
/// path; an absolute URL means another server hosts them.
pub fn router(state: &AppState) -> Router<AppState> {
    let mut router = Router::new().route("/sitemap.xml", get(sitemap));
    let files_url = state.config().files_url.trim_end_matches('/');
    if files_url.starts_with('/') && files_url.len() > 1 {
        router = router.nest_service(files_url, ServeDir::new(&state.config().uploads_dir));
    }
    router.fallback(serve_page)
}

/// GET /sitemap.xml
async fn sitemap(State(state): State<AppState>) -> CmsResult<Response> {
    let sitemap = Sitemap::load(state.db(), state.sitemap_options()).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        sitemap.to_xml(),
    )
        .into_response())
}

/// Render the page resolved by the page middleware, or 404.
async fn serve_page(
    State(state): State<AppState>,
    resolved: Option<Extension<Arc<ResolvedPage>>>,
) -> CmsResult<Response> {
    let Some(Extension(resolved)) = resolved else {
        return Ok(not_found(&state));
    };

    let page_template = state
        .pages()
        .templates()
        .get(&resolved.page.template)
        .and_then(|t| t.page_template.clone());
    let by_id = format!("pages/{}.html", resolved.page.template);
    let mut suggestions: Vec<&str> = Vec::with_capacity(3);
    if let Some(selector) = page_template.as_deref() {
        suggestions.push(selector);
    }
    suggestions.push(&by_id);
    suggestions.push(DEFAULT_PAGE_TEMPLATE);
    let template = state
        .theme()
        .resolve_template(&suggestions)
        .ok_or_else(|| {
            CmsError::not_found(format!("page template for {}", resolved.page.template))
        })?;

    let mut context = tera::Context::new();
    for (key, value) in &state.config().render_extra_context {
        context.insert(key.as_str(), value);
    }
    context.insert("cms", &resolved.page);
    context.insert("sections", &resolved.sections);
    context.insert("preview", &resolved.preview);

    let html = state
        .theme()
        .tera()
        .render(&template, &context)
        .map_err(|e| CmsError::Internal(e.into()))?;
    Ok(Html(html).into_response())
}

fn not_found(state: &AppState) -> Response {
    let body = state
        .theme()
        .tera()
        .render("cms/404.html", &tera::Context::new())
        .unwrap_or_else(|_| "Page not found".to_string());
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}
