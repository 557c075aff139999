//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// SQLite connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 5).
    pub database_max_connections: u32,

    /// Tera templates for admin screens, edit forms and sections.
    pub templates_dir: PathBuf,

    /// TOML page template definitions.
    pub pages_dir: PathBuf,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,

    /// strftime pattern for image upload directories.
    pub images_upload_to: String,

    /// Public site URL, used for sitemap links.
    pub site_url: String,

    /// Resolve pages per locale.
    pub localized: bool,

    /// Accepted page locales.
    pub languages: Vec<String>,

    /// Honour explicit `cmsid` and serve raw values instead of the rendered cache.
    pub admin_enabled: bool,

    /// Bearer token granting full admin capabilities. Admin is closed when unset.
    pub admin_token: Option<String>,

    /// Rows per page in admin listings.
    pub paginate_by: u32,

    /// Merged into every section render context.
    pub render_extra_context: Map<String, Value>,

    pub sitemap_changefreq: String,
    pub sitemap_priority: f32,
}

impl Config {
    /// Load configuration from `.env` and environment variables.
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine; variables may come from the process.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let port = or("PORT", "3000")
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = or("DATABASE_URL", "sqlite://folio.db?mode=rwc");

        let mut database_max_connections = or("DATABASE_MAX_CONNECTIONS", "5")
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;
        if is_memory_url(&database_url) {
            database_max_connections = 1;
        }

        let languages: Vec<String> = or("LANGUAGES", "en")
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let paginate_by: u32 = or("PAGINATE_BY", "30")
            .parse()
            .context("PAGINATE_BY must be a valid u32")?;
        if paginate_by == 0 {
            bail!("PAGINATE_BY must be positive");
        }

        let render_extra_context = match var("RENDER_EXTRA_CONTEXT") {
            Some(raw) if !raw.trim().is_empty() => {
                match serde_json::from_str(&raw).context("RENDER_EXTRA_CONTEXT must be JSON")? {
                    Value::Object(map) => map,
                    _ => bail!("RENDER_EXTRA_CONTEXT must be a JSON object"),
                }
            }
            _ => Map::new(),
        };

        let sitemap_priority = or("SITEMAP_PRIORITY", "0.5")
            .parse()
            .context("SITEMAP_PRIORITY must be a number")?;

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            templates_dir: PathBuf::from(or("TEMPLATES_DIR", "./templates")),
            pages_dir: PathBuf::from(or("PAGES_DIR", "./pages")),
            uploads_dir: PathBuf::from(or("UPLOADS_DIR", "./uploads")),
            files_url: or("FILES_URL", "/files"),
            images_upload_to: or("IMAGES_UPLOAD_TO", "cms/image/%Y/%m/%d"),
            site_url: or("SITE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            localized: parse_bool(var("LOCALIZED").as_deref(), false)
                .context("LOCALIZED must be a boolean")?,
            languages,
            admin_enabled: parse_bool(var("ADMIN_ENABLED").as_deref(), true)
                .context("ADMIN_ENABLED must be a boolean")?,
            admin_token: var("ADMIN_TOKEN").filter(|t| !t.is_empty()),
            paginate_by,
            render_extra_context,
            sitemap_changefreq: or("SITEMAP_CHANGEFREQ", "weekly"),
            sitemap_priority,
        })
    }
}

pub(crate) fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn parse_bool(raw: Option<&str>, default: bool) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("`{other}` is not a boolean"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, "sqlite://folio.db?mode=rwc");
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.files_url, "/files");
        assert_eq!(config.images_upload_to, "cms/image/%Y/%m/%d");
        assert_eq!(config.languages, vec!["en".to_string()]);
        assert!(config.admin_enabled);
        assert!(!config.localized);
        assert!(config.admin_token.is_none());
        assert_eq!(config.paginate_by, 30);
        assert!(config.render_extra_context.is_empty());
        assert_eq!(config.sitemap_changefreq, "weekly");
    }

    #[test]
    fn memory_databases_use_one_connection() {
        let config = config(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "8"),
        ])
        .unwrap();
        assert_eq!(config.database_max_connections, 1);
    }

    #[test]
    fn parses_lists_and_flags() {
        let config = config(&[
            ("LANGUAGES", "en, de ,FR,"),
            ("LOCALIZED", "yes"),
            ("ADMIN_ENABLED", "off"),
            ("SITE_URL", "https://example.com/"),
        ])
        .unwrap();
        assert_eq!(config.languages, ["en", "de", "fr"]);
        assert!(config.localized);
        assert!(!config.admin_enabled);
        assert_eq!(config.site_url, "https://example.com");
    }

    #[test]
    fn extra_context_must_be_an_object() {
        let ok = config(&[("RENDER_EXTRA_CONTEXT", r#"{"site": "Folio"}"#)]).unwrap();
        assert_eq!(ok.render_extra_context["site"], "Folio");
        assert!(config(&[("RENDER_EXTRA_CONTEXT", "[1]")]).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config(&[("PORT", "http")]).is_err());
        assert!(config(&[("LOCALIZED", "maybe")]).is_err());
        assert!(config(&[("PAGINATE_BY", "0")]).is_err());
    }
}
