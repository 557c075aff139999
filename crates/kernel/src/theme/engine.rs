//! Theme engine backed by Tera.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tera::Tera;
use tracing::debug;

use super::TemplateRenderer;
use crate::content::naming::human_title;

/// Theme engine for rendering templates.
pub struct ThemeEngine {
    /// Tera template engine instance.
    tera: Tera,
}

impl ThemeEngine {
    /// Create a new theme engine loading templates from the given directory.
    pub fn new(template_dir: &Path) -> Result<Self> {
        let pattern = template_dir.join("**/*.html");
        let pattern_str = pattern
            .to_str()
            .context("invalid template directory path")?;

        let mut tera = Tera::new(pattern_str).context("failed to initialize Tera templates")?;
        Self::register_filters(&mut tera);

        let template_names: Vec<_> = tera.get_template_names().collect();
        debug!(count = template_names.len(), "loaded templates");

        Ok(Self { tera })
    }

    /// Create a theme engine from in-memory `(name, source)` templates.
    pub fn from_raw(templates: &[(&str, &str)]) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())
            .context("failed to parse templates")?;
        Self::register_filters(&mut tera);
        Ok(Self { tera })
    }

    /// Create a theme engine with no templates (for testing).
    pub fn empty() -> Self {
        let mut tera = Tera::default();
        Self::register_filters(&mut tera);
        Self { tera }
    }

    /// Register custom Tera filters.
    fn register_filters(tera: &mut Tera) {
        // Unix timestamp -> "October 16, 2026 14:05"
        tera.register_filter(
            "format_date",
            |value: &tera::Value, _args: &HashMap<String, tera::Value>| {
                let timestamp = match value {
                    tera::Value::Number(n) => n.as_i64().unwrap_or(0),
                    _ => return Ok(tera::Value::String(String::new())),
                };

                let formatted = chrono::DateTime::from_timestamp(timestamp, 0)
                    .map(|dt| dt.format("%B %-d, %Y %H:%M").to_string())
                    .unwrap_or_else(|| "Unknown date".to_string());

                Ok(tera::Value::String(formatted))
            },
        );

        tera.register_filter(
            "human_title",
            |value: &tera::Value, _args: &HashMap<String, tera::Value>| {
                let text = tera::try_get_value!("human_title", "value", String, value);
                Ok(tera::Value::String(human_title(&text)))
            },
        );
    }

    /// Get the underlying Tera instance for custom operations.
    pub fn tera(&self) -> &Tera {
        &self.tera
    }

    /// First existing template among `suggestions`.
    pub fn resolve_template(&self, suggestions: &[&str]) -> Option<String> {
        suggestions
            .iter()
            .find(|name| self.has_template(name))
            .map(|name| (*name).to_string())
    }
}

impl TemplateRenderer for ThemeEngine {
    fn render(&self, template: &str, context: &Value) -> Result<String> {
        let context = tera::Context::from_value(context.clone())
            .context("render context must be an object")?;
        self.tera
            .render(template, &context)
            .with_context(|| format!("failed to render template {template}"))
    }

    fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }
}

impl std::fmt::Debug for ThemeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeEngine")
            .field("templates", &self.tera.get_template_names().count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_json_contexts() {
        let engine =
            ThemeEngine::from_raw(&[("sections/simple.html", "<h1>{{ obj }}</h1>")]).unwrap();
        let html = engine
            .render("sections/simple.html", &json!({"obj": "Hi & bye"}))
            .unwrap();
        assert_eq!(html, "<h1>Hi &amp; bye</h1>");
    }

    #[test]
    fn rejects_non_object_contexts() {
        let engine = ThemeEngine::from_raw(&[("a.html", "x")]).unwrap();
        assert!(engine.render("a.html", &json!(["x"])).is_err());
    }

    #[test]
    fn missing_templates_fail() {
        assert!(ThemeEngine::empty().render("nope.html", &json!({})).is_err());
    }

    #[test]
    fn resolves_first_existing_template() {
        let engine = ThemeEngine::from_raw(&[("pages/default.html", "")]).unwrap();
        assert_eq!(
            engine.resolve_template(&["pages/static.html", "pages/default.html"]),
            Some("pages/default.html".to_string())
        );
        assert_eq!(engine.resolve_template(&["x.html"]), None);
    }

    #[test]
    fn filters_are_available() {
        let engine = ThemeEngine::from_raw(&[
            ("t.html", "{{ name | human_title }} {{ ts | format_date }}"),
        ])
        .unwrap();
        let html = engine
            .render("t.html", &json!({"name": "search_image", "ts": 0}))
            .unwrap();
        assert_eq!(html, "Search Image January 1, 1970 00:00");
    }
}
