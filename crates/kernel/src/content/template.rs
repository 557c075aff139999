//! Page templates and their sections.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::SchemaError;
use super::fieldset::{FieldSet, PendingValue};
use super::naming::{human_title, split_first};
use super::type_registry::TypeRegistry;
use crate::error::CmsResult;
use crate::form::{FormDescriptor, Submission};
use crate::theme::TemplateRenderer;

/// One editable block of a page, rendered through its own template.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub title: String,
    pub description: String,
    /// Template selector used to render the section HTML.
    pub template: String,
    node: FieldSet,
}

impl Section {
    pub fn new(name: impl Into<String>, template: impl Into<String>, node: FieldSet) -> Self {
        let name = name.into();
        Self {
            title: human_title(&name),
            name,
            description: String::new(),
            template: template.into(),
            node,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn node(&self) -> &FieldSet {
        &self.node
    }

    /// Edit form for the whole section.
    pub fn inc_form(&self) -> Result<FormDescriptor, SchemaError> {
        self.node.inc_form(&[self.name.as_str()])
    }

    /// Share of filled leaf fields, 0-100.
    pub fn done_percent(&self) -> u8 {
        percent(self.node.done_percent())
    }

    /// Render context: `extra` plus `obj` (the loaded values), `section`,
    /// `title` and `filled`.
    pub fn context(&self, registry: &TypeRegistry, extra: &Map<String, Value>) -> Value {
        let mut ctx = extra.clone();
        ctx.insert("obj".into(), self.node.context(registry));
        ctx.insert("section".into(), Value::String(self.name.clone()));
        ctx.insert("title".into(), Value::String(self.title.clone()));
        ctx.insert("filled".into(), Value::Bool(self.node.is_filled()));
        Value::Object(ctx)
    }

    pub fn render(
        &self,
        renderer: &dyn TemplateRenderer,
        registry: &TypeRegistry,
        extra: &Map<String, Value>,
    ) -> anyhow::Result<String> {
        renderer.render(&self.template, &self.context(registry, extra))
    }
}

fn percent((total, filled): (usize, usize)) -> u8 {
    if total == 0 {
        return 0;
    }
    u8::try_from(filled * 100 / total).unwrap_or(100)
}

/// A page layout: an ordered list of sections.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Front-end template wrapping the rendered sections.
    pub page_template: Option<String>,
    sections: Vec<Section>,
}

impl PageTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            page_template: None,
            sections: Vec::new(),
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_page_template(mut self, template: impl Into<String>) -> Self {
        self.page_template = Some(template.into());
        self
    }

    /// Append a section; a section with the same name is replaced.
    pub fn section(mut self, section: Section) -> Self {
        match self.sections.iter_mut().find(|s| s.name == section.name) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
        self
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn get_section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// A fresh, unloaded copy for one page.
    pub fn instantiate(&self) -> PageTemplate {
        PageTemplate {
            sections: self
                .sections
                .iter()
                .map(|s| Section {
                    node: s.node.blank(),
                    ..s.clone()
                })
                .collect(),
            ..self.clone()
        }
    }

    /// Route flat value rows to their sections by first name segment.
    pub fn load<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut routed: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
        for (name, value) in pairs {
            let (section, rest) = split_first(name);
            routed.entry(section).or_default().push((rest, value));
        }
        for section in &mut self.sections {
            let pairs = routed.remove(section.name.as_str()).unwrap_or_default();
            section.node.load(pairs);
        }
        if !routed.is_empty() {
            debug!(
                template = %self.id,
                orphans = ?routed.keys().collect::<Vec<_>>(),
                "values for undeclared sections ignored"
            );
        }
    }

    /// Validate a section save addressed by `basename`
    /// (`section[/child...]`).
    pub fn save(
        &self,
        basename: &str,
        submission: &Submission,
        registry: &TypeRegistry,
    ) -> CmsResult<Vec<PendingValue>> {
        let (name, rest) = split_first(basename);
        let section = self
            .get_section(name)
            .ok_or_else(|| SchemaError::UnknownNode(basename.to_string()))?;
        section.node.save_at(name, rest, submission, registry)
    }

    /// Render every section, in declaration order.
    pub fn render_sections(
        &self,
        renderer: &dyn TemplateRenderer,
        registry: &TypeRegistry,
        extra: &Map<String, Value>,
    ) -> anyhow::Result<Vec<(String, String)>> {
        self.sections
            .iter()
            .map(|section| {
                let html = section.render(renderer, registry, extra)?;
                Ok((section.name.clone(), html))
            })
            .collect()
    }

    /// Overall share of filled leaf fields, 0-100.
    pub fn done_percent(&self) -> u8 {
        percent(self.sections.iter().fold((0, 0), |(t, f), s| {
            let (st, sf) = s.node.done_percent();
            (t + st, f + sf)
        }))
    }
}

/// Template choices sharing an id prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateChoiceGroup {
    pub group: String,
    pub choices: Vec<(String, String)>,
}

/// All page templates known to the process.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, PageTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, template: PageTemplate) -> Result<(), SchemaError> {
        if self.templates.contains_key(&template.id) {
            return Err(SchemaError::DuplicateName(template.id));
        }
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&PageTemplate> {
        self.templates.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&PageTemplate, SchemaError> {
        self.get(id)
            .ok_or_else(|| SchemaError::UnknownTemplate(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Choices for a template select, grouped by the id prefix before the
    /// first `.`. Ungrouped templates come first under an empty label.
    pub fn choices(&self) -> Vec<TemplateChoiceGroup> {
        let mut groups: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for template in self.templates.values() {
            let group = template
                .id
                .split_once('.')
                .map(|(prefix, _)| human_title(prefix))
                .unwrap_or_default();
            groups
                .entry(group)
                .or_default()
                .push((template.id.clone(), template.name.clone()));
        }
        groups
            .into_iter()
            .map(|(group, choices)| TemplateChoiceGroup { group, choices })
            .collect()
    }
}
