//! Path-resolution cache backed by Moka.
//!
//! Maps `(path, locale, state)` to the page serving it. Without
//! localization the locale is ignored. The whole cache is rebuilt after any
//! page-state change; lookups against a cache that was never built (or was
//! invalidated) rebuild it once first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use moka::future::Cache;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Page, PageState};

/// Maximum cached path entries.
const MAX_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PathKey {
    url: String,
    locale: String,
    state: PageState,
}

/// Process-wide path → page cache.
#[derive(Clone)]
pub struct PathCache {
    inner: Arc<PathCacheInner>,
}

struct PathCacheInner {
    entries: Cache<PathKey, Uuid>,
    ready: AtomicBool,
    localized: bool,
}

impl PathCache {
    pub fn new(localized: bool) -> Self {
        Self {
            inner: Arc::new(PathCacheInner {
                entries: Cache::builder().max_capacity(MAX_CAPACITY).build(),
                ready: AtomicBool::new(false),
                localized,
            }),
        }
    }

    pub fn is_localized(&self) -> bool {
        self.inner.localized
    }

    fn key(&self, url: &str, locale: &str, state: PageState) -> PathKey {
        PathKey {
            url: url.to_string(),
            locale: if self.inner.localized {
                locale.to_string()
            } else {
                String::new()
            },
            state,
        }
    }

    /// Reload every draft and live page from the database.
    pub async fn rebuild(&self, pool: &SqlitePool) -> Result<usize> {
        let rows = Page::path_entries(pool).await?;
        self.inner.entries.invalidate_all();
        for row in &rows {
            let key = self.key(&row.url, &row.locale, row.state);
            self.inner.entries.insert(key, row.id).await;
        }
        self.inner.ready.store(true, Ordering::Release);
        info!(entries = rows.len(), "path cache rebuilt");
        Ok(rows.len())
    }

    /// Drop everything; the next lookup rebuilds.
    pub fn invalidate(&self) {
        self.inner.entries.invalidate_all();
        self.inner.ready.store(false, Ordering::Release);
        debug!("path cache invalidated");
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Page serving `url` in `state`, rebuilding first when needed.
    pub async fn lookup(
        &self,
        pool: &SqlitePool,
        url: &str,
        locale: &str,
        state: PageState,
    ) -> Result<Option<Uuid>> {
        if !self.is_ready() {
            self.rebuild(pool).await?;
        }
        Ok(self.inner.entries.get(&self.key(url, locale, state)).await)
    }
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCache")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Locale fallback chain: `en-gb` → `["en-gb", "en", ""]`.
pub fn locale_tags(locale: &str) -> Vec<String> {
    let locale = locale.trim().to_lowercase().replace('_', "-");
    let mut tags = Vec::new();
    let mut current = locale.as_str();
    while !current.is_empty() {
        tags.push(current.to_string());
        current = match current.rfind('-') {
            Some(idx) => &current[..idx],
            None => "",
        };
    }
    tags.push(String::new());
    tags
}
