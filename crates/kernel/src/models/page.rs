//! Page model and CRUD operations.
//!
//! A page belongs to one path and moves through `draft → live → archived`.
//! Rows are always read joined with their path so callers get the URL and
//! locale alongside the page.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use uuid::Uuid;

/// Page lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PageState {
    Draft,
    Live,
    Archived,
}

impl PageState {
    pub const ALL: [PageState; 3] = [PageState::Draft, PageState::Live, PageState::Archived];

    pub fn as_str(self) -> &'static str {
        match self {
            PageState::Draft => "draft",
            PageState::Live => "live",
            PageState::Archived => "archived",
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(PageState::Draft),
            "live" => Ok(PageState::Live),
            "archived" => Ok(PageState::Archived),
            other => bail!("unknown page state `{other}`"),
        }
    }
}

/// Page record joined with its path.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Page {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub path_id: Uuid,

    /// Normalized URL of the owning path.
    pub url: String,

    /// Locale of the owning path.
    pub locale: String,

    /// Page template id.
    pub template: String,

    pub state: PageState,

    pub description: String,

    /// Unix timestamp of the last save.
    pub updated: i64,

    pub meta_title: String,
    pub meta_description: String,
    pub meta_keywords: String,

    /// Storage key of the search preview image, empty when unset.
    pub search_image: String,

    pub search_text: String,
}

/// Editable page metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMeta {
    pub description: String,
    pub meta_title: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub search_text: String,
}

/// Input for creating a page.
#[derive(Debug, Clone)]
pub struct CreatePage {
    pub path_id: Uuid,
    pub template: String,
    pub meta: PageMeta,
    pub search_image: String,
}

/// Admin list filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageFilter {
    pub state: Option<PageState>,
    pub template: Option<String>,
    pub locale: Option<String>,
    /// Substring of the URL or description.
    pub q: Option<String>,
}

/// Cache entry: which page serves a path in a given state.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PathEntry {
    pub url: String,
    pub locale: String,
    pub state: PageState,
    pub id: Uuid,
}

const PAGE_SELECT: &str = r#"
    SELECT p.id, p.path_id, t.path AS url, t.locale, p.template, p.state, p.description,
           p.updated, p.meta_title, p.meta_description, p.meta_keywords, p.search_image,
           p.search_text
    FROM cms_page p
    JOIN cms_path t ON t.id = p.path_id
"#;

impl Page {
    pub fn is_draft(&self) -> bool {
        self.state == PageState::Draft
    }

    pub fn is_live(&self) -> bool {
        self.state == PageState::Live
    }

    /// URL that previews this exact page regardless of its state.
    pub fn preview_url(&self) -> String {
        format!(
            "{}?cmsid={}&cms_locale={}",
            self.url,
            self.id,
            urlencoding::encode(&self.locale)
        )
    }

    pub fn meta(&self) -> PageMeta {
        PageMeta {
            description: self.description.clone(),
            meta_title: self.meta_title.clone(),
            meta_description: self.meta_description.clone(),
            meta_keywords: self.meta_keywords.clone(),
            search_text: self.search_text.clone(),
        }
    }

    /// Insert a new draft page and return its ID.
    pub async fn create<'e, E>(executor: E, input: &CreatePage) -> Result<Uuid>
    where
        E: SqliteExecutor<'e>,
    {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO cms_page (id, path_id, template, state, description, updated, meta_title,
                                  meta_description, meta_keywords, search_image, search_text)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(input.path_id)
        .bind(&input.template)
        .bind(PageState::Draft)
        .bind(&input.meta.description)
        .bind(now)
        .bind(&input.meta.meta_title)
        .bind(&input.meta.meta_description)
        .bind(&input.meta.meta_keywords)
        .bind(&input.search_image)
        .bind(&input.meta.search_text)
        .execute(executor)
        .await
        .context("failed to create page")?;

        Ok(id)
    }

    /// Find a page by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let page = sqlx::query_as::<_, Page>(&format!("{PAGE_SELECT} WHERE p.id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("failed to fetch page by id")?;

        Ok(page)
    }

    /// Whether `path_id` has a draft other than `except`.
    pub async fn has_draft<'e, E>(executor: E, path_id: Uuid, except: Option<Uuid>) -> Result<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM cms_page
                WHERE path_id = ? AND state = 'draft' AND (? IS NULL OR id != ?)
            )
            "#,
        )
        .bind(path_id)
        .bind(except)
        .bind(except)
        .fetch_one(executor)
        .await
        .context("failed to check for draft")?;

        Ok(exists)
    }

    /// Set the lifecycle state.
    pub async fn set_state<'e, E>(executor: E, id: Uuid, state: PageState) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("UPDATE cms_page SET state = ?, updated = ? WHERE id = ?")
            .bind(state)
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(executor)
            .await
            .context("failed to set page state")?;

        Ok(())
    }

    /// Move every live page on `path_id` except `except` to archived.
    pub async fn archive_live<'e, E>(executor: E, path_id: Uuid, except: Uuid) -> Result<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE cms_page SET state = 'archived' WHERE path_id = ? AND state = 'live' AND id != ?",
        )
        .bind(path_id)
        .bind(except)
        .execute(executor)
        .await
        .context("failed to archive live pages")?;

        Ok(result.rows_affected())
    }

    /// Replace the editable metadata and move the page to `path_id`.
    pub async fn update_meta<'e, E>(
        executor: E,
        id: Uuid,
        path_id: Uuid,
        meta: &PageMeta,
    ) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE cms_page
            SET path_id = ?, description = ?, meta_title = ?, meta_description = ?,
                meta_keywords = ?, search_text = ?, updated = ?
            WHERE id = ?
            "#,
        )
        .bind(path_id)
        .bind(&meta.description)
        .bind(&meta.meta_title)
        .bind(&meta.meta_description)
        .bind(&meta.meta_keywords)
        .bind(&meta.search_text)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(executor)
        .await
        .context("failed to update page")?;

        Ok(())
    }

    pub async fn set_search_image<'e, E>(executor: E, id: Uuid, key: &str) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("UPDATE cms_page SET search_image = ? WHERE id = ?")
            .bind(key)
            .bind(id)
            .execute(executor)
            .await
            .context("failed to set search image")?;

        Ok(())
    }

    /// Bump the last-saved timestamp.
    pub async fn touch<'e, E>(executor: E, id: Uuid) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("UPDATE cms_page SET updated = ? WHERE id = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(executor)
            .await
            .context("failed to touch page")?;

        Ok(())
    }

    /// Delete the page row. Values and rendered rows must be gone already.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM cms_page WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await
            .context("failed to delete page")?;

        Ok(result.rows_affected() > 0)
    }

    /// Other draft or live pages on the same URL, in any locale.
    pub async fn similar<'e, E>(executor: E, id: Uuid, url: &str) -> Result<Vec<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let pages = sqlx::query_as::<_, Page>(&format!(
            "{PAGE_SELECT} WHERE t.path = ? AND p.id != ? AND p.state IN ('draft', 'live') \
             ORDER BY t.locale, p.updated DESC"
        ))
        .bind(url)
        .bind(id)
        .fetch_all(executor)
        .await
        .context("failed to list similar pages")?;

        Ok(pages)
    }

    /// Live pages ordered by URL.
    pub async fn list_live<'e, E>(executor: E) -> Result<Vec<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let pages = sqlx::query_as::<_, Page>(&format!(
            "{PAGE_SELECT} WHERE p.state = 'live' ORDER BY t.path, t.locale"
        ))
        .fetch_all(executor)
        .await
        .context("failed to list live pages")?;

        Ok(pages)
    }

    /// Filtered listing, newest first, with the unpaginated total.
    pub async fn list(
        pool: &SqlitePool,
        filter: &PageFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM cms_page p JOIN cms_path t ON t.id = p.path_id",
        );
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(pool)
            .await
            .context("failed to count pages")?;

        let mut query = QueryBuilder::<Sqlite>::new(PAGE_SELECT);
        push_filter(&mut query, filter);
        query.push(" ORDER BY p.updated DESC, p.id DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);
        let pages = query
            .build_query_as::<Page>()
            .fetch_all(pool)
            .await
            .context("failed to list pages")?;

        Ok((pages, total))
    }

    /// Draft and live pages for the path-resolution cache.
    pub async fn path_entries<'e, E>(executor: E) -> Result<Vec<PathEntry>>
    where
        E: SqliteExecutor<'e>,
    {
        let entries = sqlx::query_as::<_, PathEntry>(
            r#"
            SELECT t.path AS url, t.locale, p.state, p.id
            FROM cms_page p
            JOIN cms_path t ON t.id = p.path_id
            WHERE p.state IN ('draft', 'live')
            "#,
        )
        .fetch_all(executor)
        .await
        .context("failed to load path entries")?;

        Ok(entries)
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &PageFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(state) = filter.state {
        query.push(" AND p.state = ").push_bind(state);
    }
    if let Some(template) = filter.template.as_deref().filter(|t| !t.is_empty()) {
        query.push(" AND p.template = ").push_bind(template.to_string());
    }
    if let Some(locale) = &filter.locale {
        query.push(" AND t.locale = ").push_bind(locale.clone());
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let needle = q.to_lowercase();
        query
            .push(" AND (instr(lower(t.path), ")
            .push_bind(needle.clone())
            .push(") > 0 OR instr(lower(p.description), ")
            .push_bind(needle)
            .push(") > 0)");
    }
}
