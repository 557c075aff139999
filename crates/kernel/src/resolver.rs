//! Request-time page resolution.
//!
//! Maps an inbound request (path, optional `cms_url` overrides, optional
//! explicit `cmsid`, locale) to the page that should serve it, then loads
//! that page's section HTML either from the rendered cache or, in admin
//! mode, by rendering the raw values.

use std::collections::BTreeMap;

use axum::extract::Query;
use axum::http::{HeaderMap, Uri};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::cache::locale_tags;
use crate::content::naming::normalize_path;
use crate::error::CmsResult;
use crate::models::{Page, PageState};
use crate::services::PageService;

/// Query parameter selecting a page by id (admin mode only).
pub const CMSID: &str = "cmsid";
/// Query parameter overriding the request locale.
pub const CMS_LOCALE: &str = "cms_locale";
/// Query parameter adding candidate paths, tried after the request path.
pub const CMS_URL: &str = "cms_url";

/// The parts of a request the resolver looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub path: String,
    pub cms_urls: Vec<String>,
    pub cmsid: Option<String>,
    pub locale: String,
}

impl PageRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn from_parts(uri: &Uri, headers: &HeaderMap) -> Self {
        let mut request = Self::new(uri.path());
        // Pairs keep repeated `cms_url` keys; malformed query strings are ignored.
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .unwrap_or_else(|_| Query(Vec::new()));
        for (key, value) in pairs {
            match key.as_str() {
                CMSID if !value.is_empty() => request.cmsid = Some(value),
                CMS_LOCALE => request.locale = value,
                CMS_URL if !value.is_empty() => request.cms_urls.push(value),
                _ => {}
            }
        }
        if request.locale.is_empty() {
            request.locale = headers
                .get("accept-language")
                .and_then(|v| v.to_str().ok())
                .and_then(preferred_language)
                .unwrap_or_default();
        }
        request
    }

    /// Normalized paths to try, the request path first.
    pub fn candidate_paths(&self) -> Vec<String> {
        let own = normalize_path(&self.path);
        let mut paths: Vec<String> = self.cms_urls.iter().map(|p| normalize_path(p)).collect();
        if !paths.contains(&own) {
            paths.insert(0, own);
        }
        paths
    }
}

/// A page ready to serve.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPage {
    pub page: Page,
    /// Section name → HTML.
    pub sections: BTreeMap<String, String>,
    /// Rendered from raw values rather than the rendered cache.
    pub preview: bool,
}

/// Resolves requests to pages through the path cache.
#[derive(Clone)]
pub struct Resolver {
    pages: PageService,
    admin_enabled: bool,
}

impl Resolver {
    pub fn new(pages: PageService, admin_enabled: bool) -> Self {
        Self {
            pages,
            admin_enabled,
        }
    }

    fn states(&self) -> &'static [PageState] {
        if self.admin_enabled {
            &[PageState::Live, PageState::Draft]
        } else {
            &[PageState::Live]
        }
    }

    /// Page id for `paths`, trying every locale tag of `locale` per path and
    /// live before draft.
    pub async fn id_from_cache(&self, paths: &[String], locale: &str) -> CmsResult<Option<Uuid>> {
        let cache = self.pages.cache();
        let tags = if cache.is_localized() {
            locale_tags(locale)
        } else {
            vec![String::new()]
        };
        for path in paths {
            for tag in &tags {
                for &state in self.states() {
                    if let Some(id) = cache.lookup(self.pages.pool(), path, tag, state).await? {
                        return Ok(Some(id));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Page id serving `request`.
    pub async fn page_id(&self, request: &PageRequest) -> CmsResult<Option<Uuid>> {
        if self.admin_enabled {
            if let Some(raw) = &request.cmsid {
                return Ok(match raw.parse::<Uuid>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        debug!(cmsid = %raw, "ignoring malformed cmsid");
                        None
                    }
                });
            }
        }
        self.id_from_cache(&request.candidate_paths(), &request.locale)
            .await
    }

    /// Resolve and load the page serving `request`.
    pub async fn resolve(&self, request: &PageRequest) -> CmsResult<Option<ResolvedPage>> {
        let Some(id) = self.page_id(request).await? else {
            return Ok(None);
        };
        let page = match Page::find_by_id(self.pages.pool(), id).await? {
            Some(page) => page,
            None => {
                // Stale cache entry.
                debug!(page_id = %id, "resolved page no longer exists");
                self.pages.cache().invalidate();
                return Ok(None);
            }
        };

        let sections = if self.admin_enabled {
            self.pages.preview_sections(&page).await?
        } else {
            self.pages.load_rendered(&page).await?
        };
        debug!(page_id = %id, path = %page.url, preview = self.admin_enabled, "page resolved");
        Ok(Some(ResolvedPage {
            page,
            sections,
            preview: self.admin_enabled,
        }))
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("admin_enabled", &self.admin_enabled)
            .finish()
    }
}

/// Highest-quality tag of an `Accept-Language` header, lowercased.
fn preferred_language(header: &str) -> Option<String> {
    let mut best: Option<(String, f32)> = None;
    for part in header.split(',') {
        let mut segments = part.trim().split(';');
        let Some(tag) = segments.next().map(str::trim).filter(|t| !t.is_empty() && *t != "*")
        else {
            continue;
        };
        let quality = segments
            .find_map(|s| s.trim().strip_prefix("q=").and_then(|q| q.trim().parse::<f32>().ok()))
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        if quality > 0.0 && best.as_ref().is_none_or(|(_, q)| quality > *q) {
            best = Some((tag.to_lowercase(), quality));
        }
    }
    best.map(|(tag, _)| tag)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn request_path_is_tried_first() {
        let uri: Uri = "/about?cms_url=/shared/&cms_url=team".parse().unwrap();
        let request = PageRequest::from_parts(&uri, &HeaderMap::new());
        assert_eq!(request.candidate_paths(), ["/about/", "/shared/", "/team/"]);
    }

    #[test]
    fn request_path_listed_in_overrides_keeps_its_place() {
        let uri: Uri = "/about/?cms_url=/shared/&cms_url=/about/".parse().unwrap();
        let request = PageRequest::from_parts(&uri, &HeaderMap::new());
        assert_eq!(request.candidate_paths(), ["/shared/", "/about/"]);
    }

    #[test]
    fn locale_from_query_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert("accept-language", "de;q=0.5, fr".parse().unwrap());

        let uri: Uri = "/?cms_locale=en-gb&cmsid=abc".parse().unwrap();
        let request = PageRequest::from_parts(&uri, &headers);
        assert_eq!(request.locale, "en-gb");
        assert_eq!(request.cmsid.as_deref(), Some("abc"));

        let uri: Uri = "/".parse().unwrap();
        assert_eq!(PageRequest::from_parts(&uri, &headers).locale, "fr");
    }

    #[test]
    fn accept_language_picks_highest_quality() {
        assert_eq!(preferred_language("en-US;q=0.8, pt-BR"), Some("pt-br".into()));
        assert_eq!(preferred_language("*, de;q=0.1"), Some("de".into()));
        assert_eq!(preferred_language(""), None);
    }

    #[test]
    fn query_components_are_decoded() {
        let uri: Uri = "/x/?cms_url=%2Fa+b%2F&flag&cms_locale=de%2Dat".parse().unwrap();
        let request = PageRequest::from_parts(&uri, &HeaderMap::new());
        assert_eq!(request.cms_urls, ["/a b/"]);
        assert_eq!(request.locale, "de-at");
    }
}
