//! Page template definitions in TOML.
//!
//! Each `*.toml` file under the pages directory defines one template. The
//! template id is the file's path relative to that directory, without the
//! extension, with `/` replaced by `.` (`landing/home.toml` → `landing.home`).
//!
//! ```toml
//! name = "Static page"
//! template = "pages/static.html"
//!
//! [[sections]]
//! name = "heading"
//! template = "sections/simple.html"
//! node = { kind = "single", fields = [{ name = "text", type = "text" }] }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::SchemaError;
use super::field_type::FieldType;
use super::fieldset::FieldSet;
use super::template::{PageTemplate, Section, TemplateRegistry};
use super::type_registry::TypeRegistry;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PageDef {
    name: String,
    #[serde(default)]
    description: String,
    template: Option<String>,
    #[serde(default)]
    sections: Vec<SectionDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SectionDef {
    name: String,
    title: Option<String>,
    #[serde(default)]
    description: String,
    template: String,
    node: NodeDef,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum NodeDef {
    Value {
        fields: Vec<FieldDef>,
        #[serde(default)]
        order: Vec<String>,
        form_template: Option<String>,
    },
    Single {
        fields: Vec<FieldDef>,
        form_template: Option<String>,
    },
    Group {
        children: Vec<ChildDef>,
        #[serde(default)]
        order: Vec<String>,
        form_template: Option<String>,
    },
    Several {
        children: Vec<ChildDef>,
        up_to: Option<usize>,
        #[serde(default)]
        order: Vec<String>,
        form_template: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    choices: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct ChildDef {
    name: String,
    node: NodeDef,
}

impl NodeDef {
    fn build(self, types: &TypeRegistry) -> Result<FieldSet, SchemaError> {
        let (set, order, form_template) = match self {
            NodeDef::Value {
                fields,
                order,
                form_template,
            } => (FieldSet::value(build_fields(fields, types)?), order, form_template),
            NodeDef::Single {
                fields,
                form_template,
            } => (
                FieldSet::single_from(build_fields(fields, types)?)?,
                Vec::new(),
                form_template,
            ),
            NodeDef::Group {
                children,
                order,
                form_template,
            } => (FieldSet::group(build_children(children, types)?), order, form_template),
            NodeDef::Several {
                children,
                up_to,
                order,
                form_template,
            } => {
                let set = FieldSet::several(build_children(children, types)?);
                let set = match up_to {
                    Some(max) => set.up_to(max),
                    None => set,
                };
                (set, order, form_template)
            }
        };
        let set = set.ordered(&order);
        Ok(match form_template {
            Some(tpl) => set.with_form_template(tpl),
            None => set,
        })
    }
}

fn build_fields(
    fields: Vec<FieldDef>,
    types: &TypeRegistry,
) -> Result<Vec<(String, FieldType)>, SchemaError> {
    let mut out: Vec<(String, FieldType)> = Vec::with_capacity(fields.len());
    for field in fields {
        if out.iter().any(|(name, _)| *name == field.name) {
            return Err(SchemaError::DuplicateName(field.name));
        }
        let field_type = types.field_type(&field.type_name, field.choices)?;
        out.push((field.name, field_type));
    }
    Ok(out)
}

fn build_children(
    children: Vec<ChildDef>,
    types: &TypeRegistry,
) -> Result<Vec<(String, FieldSet)>, SchemaError> {
    let mut out: Vec<(String, FieldSet)> = Vec::with_capacity(children.len());
    for child in children {
        if out.iter().any(|(name, _)| *name == child.name) {
            return Err(SchemaError::DuplicateName(child.name));
        }
        out.push((child.name, child.node.build(types)?));
    }
    Ok(out)
}

/// Parse one template definition.
pub fn parse_page_template(
    id: &str,
    source: &str,
    types: &TypeRegistry,
) -> Result<PageTemplate, SchemaError> {
    let definition_error = |message: String| SchemaError::Definition {
        path: id.to_string(),
        message,
    };
    let def: PageDef = toml::from_str(source).map_err(|e| definition_error(e.to_string()))?;

    let mut template = PageTemplate::new(id, def.name).described(def.description);
    if let Some(page_template) = def.template {
        template = template.with_page_template(page_template);
    }
    for section_def in def.sections {
        if template.get_section(&section_def.name).is_some() {
            return Err(SchemaError::DuplicateName(section_def.name));
        }
        let node = section_def
            .node
            .build(types)
            .map_err(|e| definition_error(format!("section `{}`: {e}", section_def.name)))?;
        let mut section = Section::new(section_def.name, section_def.template, node)
            .described(section_def.description);
        if let Some(title) = section_def.title {
            section = section.titled(title);
        }
        template = template.section(section);
    }
    Ok(template)
}

/// Template id for a definition file under `root`.
fn template_id(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("."))
}

/// Load every `*.toml` definition under `dir`. A missing directory yields
/// an empty registry.
pub fn load_dir(dir: &Path, types: &TypeRegistry) -> Result<TemplateRegistry> {
    let mut registry = TemplateRegistry::new();
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "page template directory not found");
        return Ok(registry);
    }

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "toml"))
    {
        let path = entry.path();
        let id = template_id(dir, path)
            .with_context(|| format!("invalid template file name {}", path.display()))?;
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let template = parse_page_template(&id, &source, types)?;
        registry.register(template)?;
    }

    info!(count = registry.len(), dir = %dir.display(), "loaded page templates");
    Ok(registry)
}
