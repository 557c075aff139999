//! Page resolution middleware.
//!
//! Resolves the CMS page serving each front-end GET request and stores it in
//! request extensions as an `Arc<ResolvedPage>`. Resolution failures are logged
//! and the request continues without a page.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};

use crate::resolver::PageRequest;
use crate::state::AppState;

/// Whether `path` is `prefix` itself or lies below it.
fn under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    !prefix.is_empty()
        && path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Paths that never map to CMS pages. `files_url` is the configured
/// upload prefix.
fn is_system_path(path: &str, files_url: &str) -> bool {
    under(path, "/admin")
        || under(path, files_url)
        || path == "/health"
        || path == "/sitemap.xml"
}

pub async fn resolve_cms_page(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method();
    if (method != Method::GET && method != Method::HEAD)
        || is_system_path(request.uri().path(), &state.config().files_url)
    {
        return next.run(request).await;
    }

    let page_request = PageRequest::from_parts(request.uri(), request.headers());
    match state.resolver().resolve(&page_request).await {
        Ok(Some(resolved)) => {
            request.extensions_mut().insert(Arc::new(resolved));
        }
        Ok(None) => {
            tracing::debug!(path = %page_request.path, "no cms page for path");
        }
        Err(e) => {
            tracing::warn!(path = %page_request.path, error = %e, "cms page resolution failed");
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_paths_are_skipped() {
        assert!(is_system_path("/admin/cms/pages", "/files"));
        assert!(is_system_path("/files/cms/image/a.png", "/files"));
        assert!(is_system_path("/sitemap.xml", "/files"));
        assert!(!is_system_path("/", "/files"));
        assert!(!is_system_path("/about/", "/files"));
    }

    #[test]
    fn upload_prefix_follows_configuration() {
        assert!(is_system_path("/media/cms/image/a.png", "/media/"));
        assert!(!is_system_path("/files/cms/image/a.png", "/media"));
        assert!(!is_system_path("/mediakit/", "/media"));
        assert!(!is_system_path("/administration/", "/media"));
    }
}
