//! Sitemap of live pages.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/about/</loc>
//!     <lastmod>2025-01-01</lastmod>
//!     <changefreq>weekly</changefreq>
//!     <priority>0.5</priority>
//!   </url>
//! </urlset>
//! ```

use anyhow::Result;
use chrono::DateTime;
use quick_xml::escape::escape;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::content::naming::{full_url, normalize_path};
use crate::models::Page;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Sitemap entry options shared by every URL.
#[derive(Debug, Clone)]
pub struct SitemapOptions {
    pub site_url: String,
    pub changefreq: String,
    pub priority: f32,
    /// Restrict to these paths; `None` lists every live page.
    pub only: Option<Vec<String>>,
}

impl SitemapOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            site_url: config.site_url.clone(),
            changefreq: config.sitemap_changefreq.clone(),
            priority: config.sitemap_priority,
            only: None,
        }
    }
}

/// Single URL entry.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlEntry {
    pub loc: String,
    /// `YYYY-MM-DD`.
    pub lastmod: Option<String>,
}

/// Sitemap data.
#[derive(Debug, Clone)]
pub struct Sitemap {
    urls: Vec<UrlEntry>,
    changefreq: String,
    priority: f32,
}

impl Sitemap {
    pub fn from_pages(pages: &[Page], options: &SitemapOptions) -> Self {
        let only: Option<Vec<String>> = options
            .only
            .as_ref()
            .map(|paths| paths.iter().map(|p| normalize_path(p)).collect());
        let urls = pages
            .iter()
            .filter(|page| only.as_ref().is_none_or(|only| only.contains(&page.url)))
            .map(|page| UrlEntry {
                loc: full_url(&options.site_url, &page.url),
                lastmod: DateTime::from_timestamp(page.updated, 0)
                    .map(|d| d.format("%Y-%m-%d").to_string()),
            })
            .collect();
        Self {
            urls,
            changefreq: options.changefreq.clone(),
            priority: options.priority,
        }
    }

    /// Live pages straight from the database.
    pub async fn load(pool: &SqlitePool, options: &SitemapOptions) -> Result<Self> {
        let pages = Page::list_live(pool).await?;
        Ok(Self::from_pages(&pages, options))
    }

    pub fn urls(&self) -> &[UrlEntry] {
        &self.urls
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.urls.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
        xml.push('\n');
        for entry in &self.urls {
            xml.push_str("  <url>\n");
            xml.push_str(&format!("    <loc>{}</loc>\n", escape(entry.loc.as_str())));
            if let Some(lastmod) = &entry.lastmod {
                xml.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
            }
            if !self.changefreq.is_empty() {
                xml.push_str(&format!(
                    "    <changefreq>{}</changefreq>\n",
                    escape(self.changefreq.as_str())
                ));
            }
            xml.push_str(&format!("    <priority>{:.1}</priority>\n", self.priority));
            xml.push_str("  </url>\n");
        }
        xml.push_str("</urlset>\n");
        xml
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::PageState;
    use uuid::Uuid;

    fn page(url: &str, updated: i64) -> Page {
        Page {
            id: Uuid::now_v7(),
            path_id: Uuid::now_v7(),
            url: url.into(),
            locale: String::new(),
            template: "static".into(),
            state: PageState::Live,
            description: String::new(),
            updated,
            meta_title: String::new(),
            meta_description: String::new(),
            meta_keywords: String::new(),
            search_image: String::new(),
            search_text: String::new(),
        }
    }

    fn options() -> SitemapOptions {
        SitemapOptions {
            site_url: "https://example.com".into(),
            changefreq: "weekly".into(),
            priority: 0.5,
            only: None,
        }
    }

    #[test]
    fn entries_carry_location_and_lastmod() {
        let sitemap = Sitemap::from_pages(&[page("/a&b/", 86_400)], &options());
        let xml = sitemap.to_xml();
        assert!(xml.contains("<loc>https://example.com/a&amp;b/</loc>"));
        assert!(xml.contains("<lastmod>1970-01-02</lastmod>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.contains("<priority>0.5</priority>"));
    }

    #[test]
    fn only_restricts_paths() {
        let options = SitemapOptions {
            only: Some(vec!["about".into()]),
            ..options()
        };
        let sitemap = Sitemap::from_pages(&[page("/about/", 0), page("/team/", 0)], &options);
        assert_eq!(sitemap.urls().len(), 1);
        assert_eq!(sitemap.urls()[0].loc, "https://example.com/about/");
    }
}
