//! Theme engine and template rendering.
//!
//! Provides Tera-based template rendering behind the [`TemplateRenderer`]
//! seam and turns edit-form descriptors into HTML.

mod engine;
mod render;

use serde_json::Value;

pub use engine::ThemeEngine;
pub use render::FormRenderer;

/// Renders a named template with a JSON object context.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> anyhow::Result<String>;

    /// Whether `template` can be rendered.
    fn has_template(&self, _template: &str) -> bool {
        true
    }
}
