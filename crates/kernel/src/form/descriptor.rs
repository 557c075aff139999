//! Edit-form render descriptors.
//!
//! A descriptor is what a field-set node hands the renderer: the template
//! selector (`tpl`) plus the data that template needs. Composite nodes nest
//! the descriptors of their children.

use serde::Serialize;
use serde_json::Value;

use super::types::FormElement;
use crate::error::FieldErrors;

/// One widget in a value form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub element: FormElement,
    /// Current value as the widget expects it.
    pub value: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// One position of a repeated list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeveralRow {
    pub position: String,
    /// True for the trailing row offered for adding a new entry.
    pub blank: bool,
    pub forms: Vec<FormDescriptor>,
}

/// Variant-specific descriptor content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormBody {
    Value { fields: Vec<FormField> },
    Group { subforms: Vec<FormDescriptor> },
    Several { rows: Vec<SeveralRow> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormDescriptor {
    /// Template selector.
    pub tpl: String,
    pub basename: String,
    pub form_id: String,
    pub form_title: String,
    #[serde(flatten)]
    pub body: FormBody,
}

impl FormDescriptor {
    /// Widgets of a value form; empty for composites.
    pub fn fields(&self) -> &[FormField] {
        match &self.body {
            FormBody::Value { fields } => fields,
            _ => &[],
        }
    }

    /// Direct children in render order, blank rows included.
    pub fn children(&self) -> Vec<&FormDescriptor> {
        match &self.body {
            FormBody::Value { .. } => Vec::new(),
            FormBody::Group { subforms } => subforms.iter().collect(),
            FormBody::Several { rows } => rows.iter().flat_map(|row| row.forms.iter()).collect(),
        }
    }

    /// Rows offered for adding an entry.
    pub fn blank_rows(&self) -> usize {
        match &self.body {
            FormBody::Several { rows } => rows.iter().filter(|row| row.blank).count(),
            _ => 0,
        }
    }

    /// Find the descriptor for `basename` in this subtree.
    pub fn find(&self, basename: &str) -> Option<&FormDescriptor> {
        if self.basename == basename {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(basename))
    }

    /// Attach validation messages and the rejected input to the value form
    /// at `errors.basename`. Returns false when no form matched.
    pub fn apply_errors(&mut self, errors: &FieldErrors) -> bool {
        if self.basename == errors.basename {
            if let FormBody::Value { fields } = &mut self.body {
                for field in fields.iter_mut() {
                    field.errors = errors.for_field(&field.name).to_vec();
                    if let Some(submitted) = errors.submitted.get(&field.name) {
                        field.value = Value::String(submitted.clone());
                    }
                }
                return true;
            }
        }
        match &mut self.body {
            FormBody::Value { .. } => false,
            FormBody::Group { subforms } => subforms.iter_mut().any(|sub| sub.apply_errors(errors)),
            FormBody::Several { rows } => rows
                .iter_mut()
                .flat_map(|row| row.forms.iter_mut())
                .any(|sub| sub.apply_errors(errors)),
        }
    }
}
