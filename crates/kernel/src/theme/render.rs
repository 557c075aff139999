//! Form tree renderer - converts edit-form descriptors to HTML.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use super::TemplateRenderer;
use crate::form::{FormBody, FormDescriptor};

/// Rendered list row handed to the list form template.
#[derive(Serialize)]
struct RenderedRow<'a> {
    position: &'a str,
    blank: bool,
    forms: Vec<String>,
}

/// Renders a descriptor tree bottom-up: children become HTML strings
/// before their parent's template runs.
pub struct FormRenderer<'a> {
    renderer: &'a dyn TemplateRenderer,
}

impl<'a> FormRenderer<'a> {
    pub fn new(renderer: &'a dyn TemplateRenderer) -> Self {
        Self { renderer }
    }

    /// Render a descriptor and everything below it.
    pub fn render(&self, form: &FormDescriptor) -> Result<String> {
        let mut context = serde_json::to_value(form).context("failed to serialize form")?;

        match &form.body {
            FormBody::Value { .. } => {}
            FormBody::Group { subforms } => {
                let children = subforms
                    .iter()
                    .map(|sub| self.render(sub))
                    .collect::<Result<Vec<_>>>()?;
                context["children"] = Value::from(children);
            }
            FormBody::Several { rows } => {
                let mut rendered = Vec::with_capacity(rows.len());
                for row in rows {
                    let forms = row
                        .forms
                        .iter()
                        .map(|sub| self.render(sub))
                        .collect::<Result<Vec<_>>>()?;
                    rendered.push(RenderedRow {
                        position: &row.position,
                        blank: row.blank,
                        forms,
                    });
                }
                context["rows"] = serde_json::to_value(rendered)?;
            }
        }

        self.renderer
            .render(&form.tpl, &context)
            .with_context(|| format!("failed to render form {}", form.basename))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::{FieldSet, FieldType};
    use crate::theme::ThemeEngine;

    fn engine() -> ThemeEngine {
        ThemeEngine::from_raw(&[
            (
                "cms/edit/value.html",
                "[{{ basename | safe }}{% for f in fields %} {{ f.name }}={{ f.value }}{% endfor %}]",
            ),
            (
                "cms/edit/group.html",
                "<g {{ form_id }}>{% for c in children %}{{ c | safe }}{% endfor %}</g>",
            ),
            (
                "cms/edit/several.html",
                concat!(
                    "<l>{% for r in rows %}{{ r.position }}{% if r.blank %}+{% endif %}:",
                    "{% for f in r.forms %}{{ f | safe }}{% endfor %};{% endfor %}</l>",
                ),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn renders_groups_bottom_up() {
        let mut set = FieldSet::group([
            ("title", FieldSet::single("text", FieldType::Text)),
            ("body", FieldSet::single("text", FieldType::Text)),
        ]);
        set.load([("title/text", "Hi")]);
        let form = set.inc_form(&["content"]).unwrap();

        let engine = engine();
        let html = FormRenderer::new(&engine).render(&form).unwrap();
        assert_eq!(
            html,
            "<g content>[content/title text=Hi][content/body text=]</g>"
        );
    }

    #[test]
    fn renders_list_rows_with_blank_marker() {
        let mut set = FieldSet::several([("text", FieldSet::single("text", FieldType::Text))]);
        set.load([("1/text/text", "a")]);
        let form = set.inc_form(&["dots"]).unwrap();

        let engine = engine();
        let html = FormRenderer::new(&engine).render(&form).unwrap();
        assert_eq!(html, "<l>1:[dots/1/text text=a];2+:[dots/2/text text=];</l>");
    }

    #[test]
    fn html_templates_escape_basenames() {
        let engine = ThemeEngine::from_raw(&[("cms/edit/value.html", "{{ basename }}")]).unwrap();
        let form = FieldSet::single("text", FieldType::Text)
            .inc_form(&["content", "title"])
            .unwrap();
        let html = FormRenderer::new(&engine).render(&form).unwrap();
        assert_eq!(html, "content&#x2F;title");
    }

    #[test]
    fn missing_form_template_is_an_error() {
        let set = FieldSet::single("text", FieldType::Text);
        let form = set.inc_form(&["heading"]).unwrap();
        assert!(FormRenderer::new(&ThemeEngine::empty()).render(&form).is_err());
    }
}
