//! Page lifecycle service.
//!
//! Owns every operation that touches page rows: creation, metadata updates,
//! section saves, rendering into the cache, the `draft → live → archived`
//! transitions, copies and XML interchange. Multi-row transitions run in a
//! single transaction; the path cache is rebuilt after each one commits.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::audit::{AuditAction, AuditEntry, AuditService};
use crate::cache::PathCache;
use crate::config::Config;
use crate::content::naming::{normalize_path, split_first};
use crate::content::{PageTemplate, PendingRaw, SchemaError, TemplateRegistry, TypeRegistry};
use crate::error::{CmsError, CmsResult, unique_violation};
use crate::file;
use crate::form::{FormDescriptor, Submission, UploadedFile};
use crate::interchange::{self, PageDocument, ValueRecord};
use crate::models::{
    CmsPath, CmsValue, CreatePage, Page, PageFilter, PageMeta, PageState, Rendered,
};
use crate::theme::TemplateRenderer;

const ENTITY: &str = "page";
const DRAFT_EXISTS: &str = "Another draft page exists for this URL.";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Page service settings taken from [`Config`].
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub languages: Vec<String>,
    pub images_upload_to: String,
    pub paginate_by: u32,
    pub render_extra_context: Map<String, Value>,
}

impl PageSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            languages: config.languages.clone(),
            images_upload_to: config.images_upload_to.clone(),
            paginate_by: config.paginate_by,
            render_extra_context: config.render_extra_context.clone(),
        }
    }
}

/// Input for creating a page.
#[derive(Debug, Clone, Default)]
pub struct NewPage {
    pub url: String,
    pub locale: String,
    pub template: String,
    pub meta: PageMeta,
}

/// Input for updating a page.
#[derive(Debug, Clone, Default)]
pub struct PageUpdate {
    pub url: String,
    pub locale: String,
    pub meta: PageMeta,
    pub search_image: Option<UploadedFile>,
    pub clear_search_image: bool,
}

/// One page of an admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct PageList {
    pub pages: Vec<Page>,
    pub total: i64,
    pub page_no: u32,
    pub num_pages: u32,
}

/// Section summary for the page edit screen.
#[derive(Debug, Clone, Serialize)]
pub struct SectionStatus {
    pub name: String,
    pub title: String,
    pub description: String,
    pub done: u8,
}

/// Page lifecycle service.
#[derive(Clone)]
pub struct PageService {
    pool: SqlitePool,
    templates: Arc<TemplateRegistry>,
    types: Arc<TypeRegistry>,
    renderer: Arc<dyn TemplateRenderer>,
    cache: PathCache,
    audit: AuditService,
    settings: Arc<PageSettings>,
}

impl PageService {
    pub fn new(
        pool: SqlitePool,
        templates: Arc<TemplateRegistry>,
        types: Arc<TypeRegistry>,
        renderer: Arc<dyn TemplateRenderer>,
        cache: PathCache,
        settings: PageSettings,
    ) -> Self {
        Self {
            audit: AuditService::new(pool.clone()),
            pool,
            templates,
            types,
            renderer,
            cache,
            settings: Arc::new(settings),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn settings(&self) -> &PageSettings {
        &self.settings
    }

    fn check_locale(&self, locale: &str) -> CmsResult<()> {
        if locale.is_empty() || self.settings.languages.iter().any(|l| l == locale) {
            Ok(())
        } else {
            Err(CmsError::Validation(format!(
                "Select a valid choice. {locale} is not one of the available choices."
            )))
        }
    }

    fn check_template(&self, template: &str) -> CmsResult<()> {
        if self.templates.contains(template) {
            Ok(())
        } else {
            Err(CmsError::Validation(format!(
                "Select a valid choice. {template} is not one of the available choices."
            )))
        }
    }

    async fn rebuild_cache(&self) {
        if let Err(e) = self.cache.rebuild(&self.pool).await {
            // Lookups rebuild on demand.
            warn!(error = %e, "path cache rebuild failed");
            self.cache.invalidate();
        }
    }

    async fn log(&self, actor: &str, id: Uuid, action: AuditAction, message: &str) {
        if let Err(e) = self.audit.log(actor, ENTITY, id, action, message).await {
            warn!(page_id = %id, error = %e, "failed to write audit entry");
        }
    }

    /// Find a page by ID.
    pub async fn get(&self, id: Uuid) -> CmsResult<Page> {
        Page::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CmsError::not_found(format!("page {id}")))
    }

    /// The schema a page was created with.
    pub fn template_for(&self, page: &Page) -> CmsResult<&PageTemplate> {
        Ok(self.templates.require(&page.template)?)
    }

    /// Create a draft page, creating its path when needed.
    pub async fn create(&self, actor: &str, input: NewPage) -> CmsResult<Page> {
        self.check_template(&input.template)?;
        self.check_locale(&input.locale)?;

        let path = CmsPath::get_or_create(&self.pool, &input.url, &input.locale).await?;
        if Page::has_draft(&self.pool, path.id, None).await? {
            return Err(CmsError::Validation(DRAFT_EXISTS.into()));
        }
        let id = Page::create(
            &self.pool,
            &CreatePage {
                path_id: path.id,
                template: input.template,
                meta: input.meta,
                search_image: String::new(),
            },
        )
        .await
        .map_err(|e| unique_violation(e, DRAFT_EXISTS))?;

        info!(page_id = %id, path = %path.path, locale = %path.locale, "page created");
        self.log(actor, id, AuditAction::Addition, "created").await;
        self.rebuild_cache().await;
        self.get(id).await
    }

    /// Filtered, paginated listing. `page_no` starts at 1.
    pub async fn list(&self, filter: &PageFilter, page_no: u32) -> CmsResult<PageList> {
        let per_page = self.settings.paginate_by.max(1);
        let page_no = page_no.max(1);
        let offset = i64::from(page_no - 1) * i64::from(per_page);
        let (pages, total) =
            Page::list(&self.pool, filter, i64::from(per_page), offset).await?;
        let num_pages = u32::try_from((total + i64::from(per_page) - 1) / i64::from(per_page))
            .unwrap_or(u32::MAX)
            .max(1);
        Ok(PageList {
            pages,
            total,
            page_no,
            num_pages,
        })
    }

    /// Update metadata, move the page to another path, and replace or clear
    /// the search image.
    pub async fn update(&self, actor: &str, id: Uuid, update: PageUpdate) -> CmsResult<Page> {
        let page = self.get(id).await?;
        self.check_locale(&update.locale)?;

        let search_image = match &update.search_image {
            Some(upload) if !file::is_image(&upload.data) => {
                return Err(CmsError::Validation(INVALID_IMAGE.into()));
            }
            Some(upload) => Some(
                file::store_upload(self.types.files(), &self.settings.images_upload_to, upload)
                    .await?,
            ),
            None if update.clear_search_image => Some(String::new()),
            None => None,
        };

        let path = CmsPath::get_or_create(&self.pool, &update.url, &update.locale).await?;
        let moved = path.id != page.path_id;
        if moved && page.is_draft() && Page::has_draft(&self.pool, path.id, Some(id)).await? {
            return Err(CmsError::Validation(DRAFT_EXISTS.into()));
        }

        let mut tx = self.pool.begin().await?;
        Page::update_meta(&mut *tx, id, path.id, &update.meta)
            .await
            .map_err(|e| unique_violation(e, DRAFT_EXISTS))?;
        if let Some(key) = &search_image {
            Page::set_search_image(&mut *tx, id, key).await?;
        }
        tx.commit().await?;

        info!(page_id = %id, path = %path.path, "page updated");
        self.log(actor, id, AuditAction::Change, "metadata updated").await;
        if moved {
            self.rebuild_cache().await;
        }
        self.get(id).await
    }

    /// A fresh template instance loaded with every value of `page`.
    pub async fn load(&self, page: &Page) -> CmsResult<PageTemplate> {
        let values = CmsValue::for_page(&self.pool, page.id).await?;
        let mut template = self.template_for(page)?.instantiate();
        template.load(values.iter().map(|v| (v.name.as_str(), v.value.as_str())));
        Ok(template)
    }

    /// A fresh template instance with only `section`'s values loaded.
    pub async fn load_section(&self, page: &Page, section: &str) -> CmsResult<PageTemplate> {
        let mut template = self.template_for(page)?.instantiate();
        if template.get_section(section).is_none() {
            return Err(SchemaError::UnknownNode(section.to_string()).into());
        }
        let values = CmsValue::under(&self.pool, page.id, section).await?;
        template.load(values.iter().map(|v| (v.name.as_str(), v.value.as_str())));
        Ok(template)
    }

    /// Cached section HTML of `page`.
    pub async fn load_rendered(&self, page: &Page) -> CmsResult<BTreeMap<String, String>> {
        Ok(Rendered::for_page(&self.pool, page.id)
            .await?
            .into_iter()
            .map(|r| (r.name, r.value.trim().to_string()))
            .collect())
    }

    /// Freshly rendered section HTML of `page`, shaped like [`Self::load_rendered`].
    pub async fn preview_sections(&self, page: &Page) -> CmsResult<BTreeMap<String, String>> {
        Ok(self
            .render_sections(page)
            .await?
            .into_iter()
            .map(|(name, html)| (name, html.trim().to_string()))
            .collect())
    }

    /// Edit form for one section, loaded with its current values.
    pub async fn section_form(&self, page: &Page, section: &str) -> CmsResult<FormDescriptor> {
        let template = self.load_section(page, section).await?;
        let section = template
            .get_section(section)
            .ok_or_else(|| SchemaError::UnknownNode(section.to_string()))?;
        Ok(section.inc_form()?)
    }

    /// Completion summary of every section.
    pub async fn section_overview(&self, page: &Page) -> CmsResult<Vec<SectionStatus>> {
        let template = self.load(page).await?;
        Ok(template
            .sections()
            .iter()
            .map(|s| SectionStatus {
                name: s.name.clone(),
                title: s.title.clone(),
                description: s.description.clone(),
                done: s.done_percent(),
            })
            .collect())
    }

    /// Validate a section form and upsert its values. The form is addressed
    /// by the submission's `basename`, which must lie inside `section`.
    pub async fn save_section(
        &self,
        actor: &str,
        id: Uuid,
        section: &str,
        submission: &Submission,
    ) -> CmsResult<usize> {
        let page = self.get(id).await?;
        let template = self.template_for(&page)?;

        let basename = match submission.basename() {
            "" => section,
            basename => basename,
        };
        if split_first(basename).0 != section {
            return Err(SchemaError::UnknownNode(basename.to_string()).into());
        }
        let pending = template.save(basename, submission, &self.types)?;

        let mut rows = Vec::with_capacity(pending.len());
        for value in pending {
            let raw = match value.raw {
                PendingRaw::Text(text) => text,
                PendingRaw::Upload(upload) => {
                    file::store_upload(
                        self.types.files(),
                        &self.settings.images_upload_to,
                        &upload,
                    )
                    .await?
                }
            };
            rows.push((value.name, value.type_name, raw));
        }

        let mut tx = self.pool.begin().await?;
        for (name, type_name, raw) in &rows {
            CmsValue::upsert(&mut *tx, id, name, type_name, raw).await?;
        }
        Page::touch(&mut *tx, id).await?;
        tx.commit().await?;

        debug!(page_id = %id, basename = %basename, values = rows.len(), "section saved");
        self.log(actor, id, AuditAction::Change, &format!("saved {basename}"))
            .await;
        Ok(rows.len())
    }

    /// Delete every value at or below `basename`.
    pub async fn clear_section(&self, actor: &str, id: Uuid, basename: &str) -> CmsResult<u64> {
        let page = self.get(id).await?;
        let template = self.template_for(&page)?;
        if template.get_section(split_first(basename).0).is_none() {
            return Err(SchemaError::UnknownNode(basename.to_string()).into());
        }

        let mut tx = self.pool.begin().await?;
        let removed = CmsValue::delete_under(&mut *tx, id, basename).await?;
        Page::touch(&mut *tx, id).await?;
        tx.commit().await?;

        debug!(page_id = %id, basename = %basename, removed, "values cleared");
        self.log(actor, id, AuditAction::Deletion, &format!("cleared {basename}"))
            .await;
        Ok(removed)
    }

    /// Render every section of `page` with its current values.
    pub async fn render_sections(&self, page: &Page) -> CmsResult<Vec<(String, String)>> {
        let template = self.load(page).await?;
        let mut extra = self.settings.render_extra_context.clone();
        extra.insert(
            "cms".into(),
            serde_json::to_value(page).map_err(anyhow::Error::from)?,
        );
        Ok(template.render_sections(self.renderer.as_ref(), &self.types, &extra)?)
    }

    async fn write_rendered(
        conn: &mut sqlx::SqliteConnection,
        id: Uuid,
        rendered: &[(String, String)],
    ) -> CmsResult<()> {
        Rendered::delete_for_page(&mut *conn, id).await?;
        for (name, html) in rendered {
            Rendered::upsert(&mut *conn, id, name, html).await?;
        }
        Ok(())
    }

    /// Regenerate the rendered cache of a page.
    pub async fn refresh(&self, actor: &str, id: Uuid) -> CmsResult<usize> {
        let page = self.get(id).await?;
        let rendered = self.render_sections(&page).await?;

        let mut tx = self.pool.begin().await?;
        Self::write_rendered(&mut tx, id, &rendered).await?;
        tx.commit().await?;

        info!(page_id = %id, sections = rendered.len(), "page refreshed");
        self.log(actor, id, AuditAction::Change, "refreshed").await;
        Ok(rendered.len())
    }

    /// Make `id` the live page of its path. The previous live page is
    /// archived and the rendered cache regenerated, all in one transaction.
    pub async fn publish(&self, actor: &str, id: Uuid) -> CmsResult<Page> {
        let page = self.get(id).await?;
        let rendered = self.render_sections(&page).await?;

        let mut tx = self.pool.begin().await?;
        let archived = Page::archive_live(&mut *tx, page.path_id, id).await?;
        Self::write_rendered(&mut tx, id, &rendered).await?;
        Page::set_state(&mut *tx, id, PageState::Live).await?;
        AuditService::log_with(&mut *tx, actor, ENTITY, id, AuditAction::Change, "published")
            .await?;
        tx.commit().await?;

        info!(page_id = %id, path = %page.url, archived, "page published");
        self.rebuild_cache().await;
        self.get(id).await
    }

    /// Archive a page. Its rendered cache is kept.
    pub async fn unpublish(&self, actor: &str, id: Uuid) -> CmsResult<Page> {
        self.get(id).await?;
        Page::set_state(&self.pool, id, PageState::Archived).await?;

        info!(page_id = %id, "page unpublished");
        self.log(actor, id, AuditAction::Change, "unpublished").await;
        self.rebuild_cache().await;
        self.get(id).await
    }

    /// Delete a page with its values and rendered cache. Live pages must be
    /// unpublished first.
    pub async fn delete(&self, actor: &str, id: Uuid) -> CmsResult<()> {
        let page = self.get(id).await?;
        if page.is_live() {
            return Err(CmsError::InvariantViolation(
                "Live pages cannot be deleted.".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        CmsValue::delete_for_page(&mut *tx, id).await?;
        Rendered::delete_for_page(&mut *tx, id).await?;
        Page::delete(&mut *tx, id).await?;
        AuditService::log_with(
            &mut *tx,
            actor,
            ENTITY,
            id,
            AuditAction::Deletion,
            &format!("deleted {}", page.url),
        )
        .await?;
        tx.commit().await?;

        info!(page_id = %id, path = %page.url, "page deleted");
        self.rebuild_cache().await;
        Ok(())
    }

    /// Copy a page and all its values to a new draft under `url`.
    pub async fn copy(&self, actor: &str, id: Uuid, url: &str, locale: &str) -> CmsResult<Page> {
        let source = self.get(id).await?;
        self.check_locale(locale)?;

        let path = CmsPath::get_or_create(&self.pool, url, locale).await?;
        if Page::has_draft(&self.pool, path.id, None).await? {
            return Err(CmsError::Validation(DRAFT_EXISTS.into()));
        }

        let mut tx = self.pool.begin().await?;
        let copy_id = Page::create(
            &mut *tx,
            &CreatePage {
                path_id: path.id,
                template: source.template.clone(),
                meta: source.meta(),
                search_image: source.search_image.clone(),
            },
        )
        .await
        .map_err(|e| unique_violation(e, DRAFT_EXISTS))?;
        let copied = CmsValue::copy(&mut *tx, id, copy_id).await?;
        tx.commit().await?;

        info!(page_id = %copy_id, source = %id, path = %path.path, values = copied, "page copied");
        self.log(actor, copy_id, AuditAction::Addition, &format!("copied from {id}"))
            .await;
        self.rebuild_cache().await;
        self.get(copy_id).await
    }

    /// Other draft or live pages on the same URL.
    pub async fn similar_pages(&self, page: &Page) -> CmsResult<Vec<Page>> {
        Ok(Page::similar(&self.pool, page.id, &page.url).await?)
    }

    /// Audit entries of a page, newest first.
    pub async fn history(&self, id: Uuid) -> CmsResult<Vec<AuditEntry>> {
        Ok(self.audit.history(ENTITY, id).await?)
    }

    /// Serialize a page and its values, image payloads inlined.
    pub async fn export_xml(&self, id: Uuid) -> CmsResult<(Page, String)> {
        let page = self.get(id).await?;
        let values = CmsValue::for_page(&self.pool, id).await?;

        let search_image = if page.search_image.is_empty() {
            None
        } else {
            Some(self.types.encode_xml("image", &page.search_image).await?)
        };
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            records.push(ValueRecord {
                value: self.types.encode_xml(&value.type_name, &value.value).await?,
                name: value.name,
                type_name: value.type_name,
            });
        }

        let doc = PageDocument {
            path: page.url.clone(),
            template: page.template.clone(),
            locale: page.locale.clone(),
            meta: page.meta(),
            search_image,
            values: records,
        };
        let xml = interchange::to_xml(&doc).map_err(anyhow::Error::from)?;
        info!(page_id = %id, values = doc.values.len(), "page exported");
        Ok((page, xml))
    }

    /// Check that `xml` can be imported: well formed, a known template, a
    /// path, and no draft already on that path.
    pub async fn validate_xml(&self, xml: &str) -> CmsResult<PageDocument> {
        let doc = interchange::from_xml(xml).map_err(|e| {
            CmsError::Validation(format!("Malformed XML or not an XML document: {e}"))
        })?;
        if doc.template.is_empty() || !self.templates.contains(&doc.template) {
            return Err(CmsError::Validation(format!(
                "Malformed XML: wrong template {}",
                doc.template
            )));
        }
        if doc.path.trim().is_empty() {
            return Err(CmsError::Validation("Malformed XML: missing path".into()));
        }
        self.check_locale(&doc.locale)?;
        if let Some(path) = CmsPath::find(&self.pool, &doc.path, &doc.locale).await? {
            if Page::has_draft(&self.pool, path.id, None).await? {
                return Err(CmsError::Validation(DRAFT_EXISTS.into()));
            }
        }
        Ok(doc)
    }

    /// Validate and import a page document as a new draft.
    pub async fn import_xml(&self, actor: &str, xml: &str) -> CmsResult<Page> {
        let doc = self.validate_xml(xml).await?;
        let upload_to = &self.settings.images_upload_to;

        let search_image = match &doc.search_image {
            Some(image) => self.types.decode_xml("image", image, upload_to).await?,
            None => String::new(),
        };
        let mut values = Vec::with_capacity(doc.values.len());
        for record in &doc.values {
            let raw = self
                .types
                .decode_xml(&record.type_name, &record.value, upload_to)
                .await?;
            values.push((record.name.as_str(), record.type_name.as_str(), raw));
        }

        let mut tx = self.pool.begin().await?;
        let path = CmsPath::get_or_create(&mut *tx, &doc.path, &doc.locale).await?;
        let id = Page::create(
            &mut *tx,
            &CreatePage {
                path_id: path.id,
                template: doc.template.clone(),
                meta: doc.meta.clone(),
                search_image,
            },
        )
        .await
        .map_err(|e| unique_violation(e, DRAFT_EXISTS))?;
        for (name, type_name, raw) in &values {
            CmsValue::upsert(&mut *tx, id, name, type_name, raw).await?;
        }
        tx.commit().await?;

        info!(
            page_id = %id,
            path = %normalize_path(&doc.path),
            values = values.len(),
            "page imported"
        );
        self.log(actor, id, AuditAction::Addition, "imported").await;
        self.rebuild_cache().await;
        self.get(id).await
    }
}

impl std::fmt::Debug for PageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageService")
            .field("templates", &self.templates.len())
            .finish()
    }
}
