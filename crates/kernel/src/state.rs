//! Application state shared across all handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::cache::PathCache;
use crate::config::Config;
use crate::content::{TemplateRegistry, TypeRegistry, loader};
use crate::db;
use crate::file::{FileStorage, LocalFileStorage};
use crate::resolver::Resolver;
use crate::services::{PageService, PageSettings};
use crate::sitemap::SitemapOptions;
use crate::theme::ThemeEngine;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// SQLite connection pool.
    db: SqlitePool,

    /// Tera engine for admin screens, edit forms and section templates.
    theme: Arc<ThemeEngine>,

    /// Backend for image values.
    files: Arc<dyn FileStorage>,

    /// Page lifecycle operations.
    pages: PageService,

    /// Front-end request → page resolution.
    resolver: Resolver,

    sitemap: SitemapOptions,
}

impl AppState {
    /// Build state from configuration: open the database, load Tera
    /// templates and page template definitions, and warm the path cache.
    pub async fn new(config: Config) -> Result<Self> {
        let db = db::create_pool(&config)
            .await
            .context("failed to create database pool")?;

        let files: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
            &config.uploads_dir,
            config.files_url.clone(),
        ));

        info!(template_dir = %config.templates_dir.display(), "loading templates from directory");
        let theme = Arc::new(ThemeEngine::new(&config.templates_dir).unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "failed to load templates, using empty engine");
            ThemeEngine::empty()
        }));

        let types = TypeRegistry::new(files.clone());
        let templates = Self::load_page_templates(&config.pages_dir, &types)?;

        let state = Self::from_parts(config, db, theme, files, types, templates);
        state
            .pages()
            .cache()
            .rebuild(state.db())
            .await
            .context("failed to warm path cache")?;
        Ok(state)
    }

    fn load_page_templates(dir: &Path, types: &TypeRegistry) -> Result<TemplateRegistry> {
        loader::load_dir(dir, types)
            .with_context(|| format!("failed to load page templates from {}", dir.display()))
    }

    /// Assemble state from ready-made parts.
    pub fn from_parts(
        config: Config,
        db: SqlitePool,
        theme: Arc<ThemeEngine>,
        files: Arc<dyn FileStorage>,
        types: TypeRegistry,
        templates: TemplateRegistry,
    ) -> Self {
        let pages = PageService::new(
            db.clone(),
            Arc::new(templates),
            Arc::new(types),
            theme.clone(),
            PathCache::new(config.localized),
            PageSettings::from_config(&config),
        );
        let resolver = Resolver::new(pages.clone(), config.admin_enabled);
        let sitemap = SitemapOptions::from_config(&config);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                theme,
                files,
                pages,
                resolver,
                sitemap,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    pub fn theme(&self) -> &ThemeEngine {
        &self.inner.theme
    }

    pub fn files(&self) -> &Arc<dyn FileStorage> {
        &self.inner.files
    }

    pub fn pages(&self) -> &PageService {
        &self.inner.pages
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    pub fn sitemap_options(&self) -> &SitemapOptions {
        &self.inner.sitemap
    }

    /// Check database health.
    pub async fn db_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("port", &self.inner.config.port)
            .finish()
    }
}
