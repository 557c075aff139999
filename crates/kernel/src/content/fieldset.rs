//! Field-set trees.
//!
//! A page section's editable content is a tree of field sets:
//!
//! - [`FieldSet::Value`]: named leaf fields; a *single* value set holds
//!   exactly one field.
//! - [`FieldSet::Group`]: named child field sets.
//! - [`FieldSet::Several`]: a list of positions, each holding one instance
//!   of every declared child field set.
//!
//! Value rows are stored flat under namespaced names. A group consumes one
//! name segment per level, a list consumes two (`position/child`), and a
//! value set consumes the final field name, so `dots/3/text/text` is the
//! `text` field of the single set `text` at position 3 of the list `dots`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use super::SchemaError;
use super::field_type::{DisplayValue, FieldType, PendingRaw};
use super::naming::{apply_order, form_id, human_title, join_name, split_first, split_two};
use super::type_registry::TypeRegistry;
use crate::error::{CmsError, CmsResult, FieldErrors};
use crate::form::{FormBody, FormDescriptor, FormField, SeveralRow, Submission};

pub const VALUE_FORM: &str = "cms/edit/value.html";
pub const GROUP_FORM: &str = "cms/edit/group.html";
pub const SEVERAL_FORM: &str = "cms/edit/several.html";

/// A validated value waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingValue {
    pub name: String,
    pub type_name: String,
    pub raw: PendingRaw,
}

/// Leaf fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSet {
    fields: Vec<(String, FieldType)>,
    single: bool,
    form_template: String,
    data: Option<BTreeMap<String, String>>,
}

/// Named child field sets.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSet {
    children: Vec<(String, FieldSet)>,
    form_template: String,
    loaded: bool,
}

/// Repeated child field sets addressed by position.
#[derive(Debug, Clone, PartialEq)]
pub struct SeveralSet {
    children: Vec<(String, FieldSet)>,
    up_to: Option<usize>,
    form_template: String,
    items: Option<Vec<SeveralItem>>,
}

/// One position of a [`SeveralSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeveralItem {
    pub position: String,
    pub sets: Vec<(String, FieldSet)>,
}

impl SeveralItem {
    pub fn get(&self, name: &str) -> Option<&FieldSet> {
        find_named(&self.sets, name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldSet {
    Value(ValueSet),
    Group(GroupSet),
    Several(SeveralSet),
}

fn find_named<'a, T>(items: &'a [(String, T)], name: &str) -> Option<&'a T> {
    items.iter().find(|(n, _)| n == name).map(|(_, t)| t)
}

fn named<I, S, T>(items: I) -> Vec<(String, T)>
where
    I: IntoIterator<Item = (S, T)>,
    S: Into<String>,
{
    items.into_iter().map(|(n, t)| (n.into(), t)).collect()
}

/// Numeric positions in numeric order, anything else after them.
fn compare_positions(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl FieldSet {
    /// A value set with the given fields, in the given order.
    pub fn value<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        FieldSet::Value(ValueSet {
            fields: named(fields),
            single: false,
            form_template: VALUE_FORM.to_string(),
            data: None,
        })
    }

    /// A value set holding one field.
    pub fn single(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldSet::Value(ValueSet {
            fields: vec![(name.into(), field_type)],
            single: true,
            form_template: VALUE_FORM.to_string(),
            data: None,
        })
    }

    /// A single value set from a field list, which must hold exactly one
    /// field.
    pub fn single_from<I, S>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        let mut fields = named(fields);
        if fields.len() != 1 {
            return Err(SchemaError::SingleFieldCount(fields.len()));
        }
        let (name, field_type) = fields.remove(0);
        Ok(Self::single(name, field_type))
    }

    pub fn group<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldSet)>,
        S: Into<String>,
    {
        FieldSet::Group(GroupSet {
            children: named(children),
            form_template: GROUP_FORM.to_string(),
            loaded: false,
        })
    }

    pub fn several<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldSet)>,
        S: Into<String>,
    {
        FieldSet::Several(SeveralSet {
            children: named(children),
            up_to: None,
            form_template: SEVERAL_FORM.to_string(),
            items: None,
        })
    }

    /// Cap a list at `max` positions. No effect on other variants.
    pub fn up_to(mut self, max: usize) -> Self {
        if let FieldSet::Several(several) = &mut self {
            several.up_to = Some(max);
        }
        self
    }

    /// Put the listed children first, the rest alphabetically.
    pub fn ordered<S: AsRef<str>>(self, order: &[S]) -> Self {
        let order: Vec<String> = order.iter().map(|s| s.as_ref().to_string()).collect();
        match self {
            FieldSet::Value(mut v) => {
                v.fields = apply_order(v.fields, &order);
                FieldSet::Value(v)
            }
            FieldSet::Group(mut g) => {
                g.children = apply_order(g.children, &order);
                FieldSet::Group(g)
            }
            FieldSet::Several(mut s) => {
                s.children = apply_order(s.children, &order);
                FieldSet::Several(s)
            }
        }
    }

    /// Override the edit-form template selector.
    pub fn with_form_template(mut self, template: impl Into<String>) -> Self {
        let template = template.into();
        match &mut self {
            FieldSet::Value(v) => v.form_template = template,
            FieldSet::Group(g) => g.form_template = template,
            FieldSet::Several(s) => s.form_template = template,
        }
        self
    }

    pub fn form_template(&self) -> &str {
        match self {
            FieldSet::Value(v) => &v.form_template,
            FieldSet::Group(g) => &g.form_template,
            FieldSet::Several(s) => &s.form_template,
        }
    }

    /// The same schema with no loaded state.
    pub fn blank(&self) -> Self {
        match self {
            FieldSet::Value(v) => FieldSet::Value(ValueSet {
                data: None,
                ..v.clone()
            }),
            FieldSet::Group(g) => FieldSet::Group(GroupSet {
                children: g
                    .children
                    .iter()
                    .map(|(n, c)| (n.clone(), c.blank()))
                    .collect(),
                form_template: g.form_template.clone(),
                loaded: false,
            }),
            FieldSet::Several(s) => FieldSet::Several(SeveralSet {
                children: s
                    .children
                    .iter()
                    .map(|(n, c)| (n.clone(), c.blank()))
                    .collect(),
                up_to: s.up_to,
                form_template: s.form_template.clone(),
                items: None,
            }),
        }
    }

    pub fn is_loaded(&self) -> bool {
        match self {
            FieldSet::Value(v) => v.data.is_some(),
            FieldSet::Group(g) => g.loaded,
            FieldSet::Several(s) => s.items.is_some(),
        }
    }

    /// Load `(name, raw value)` pairs relative to this node. Only the first
    /// call has an effect.
    pub fn load<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if self.is_loaded() {
            return;
        }
        match self {
            FieldSet::Value(v) => {
                let data = pairs
                    .into_iter()
                    .filter(|(name, _)| v.fields.iter().any(|(f, _)| f == name))
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect();
                v.data = Some(data);
            }
            FieldSet::Group(g) => {
                let mut routed: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
                for (name, value) in pairs {
                    let (child, rest) = split_first(name);
                    routed.entry(child).or_default().push((rest, value));
                }
                for (name, child) in &mut g.children {
                    child.load(routed.remove(name.as_str()).unwrap_or_default());
                }
                g.loaded = true;
            }
            FieldSet::Several(s) => {
                let mut positions: Vec<&str> = Vec::new();
                let mut routed: BTreeMap<(&str, &str), Vec<(&str, &str)>> = BTreeMap::new();
                for (name, value) in pairs {
                    let Some((pos, child, rest)) = split_two(name) else {
                        warn!(name = %name, "ignoring list value without a position");
                        continue;
                    };
                    if find_named(&s.children, child).is_none() {
                        continue;
                    }
                    if !positions.contains(&pos) {
                        positions.push(pos);
                    }
                    routed.entry((pos, child)).or_default().push((rest, value));
                }
                if let Some(bad) = positions.iter().find(|p| p.parse::<i64>().is_err()) {
                    warn!(position = %bad, "non-numeric list position sorts last");
                }
                positions.sort_by(|a, b| compare_positions(a, b));

                let items = positions
                    .into_iter()
                    .map(|pos| SeveralItem {
                        position: pos.to_string(),
                        sets: s
                            .children
                            .iter()
                            .map(|(name, schema)| {
                                let mut set = schema.blank();
                                set.load(routed.remove(&(pos, name.as_str())).unwrap_or_default());
                                (name.clone(), set)
                            })
                            .collect(),
                    })
                    .collect();
                s.items = Some(items);
            }
        }
    }

    /// Edit-form descriptor for the node addressed by `names`.
    pub fn inc_form(&self, names: &[&str]) -> Result<FormDescriptor, SchemaError> {
        let basename = join_name(names.iter());
        if self.form_template().is_empty() {
            return Err(SchemaError::MissingFormTemplate(basename));
        }
        let title = human_title(names.last().copied().unwrap_or_default());

        let body = match self {
            FieldSet::Value(v) => FormBody::Value {
                fields: v
                    .fields
                    .iter()
                    .map(|(name, ty)| FormField {
                        name: name.clone(),
                        element: ty.form_element(&human_title(name)),
                        value: ty.form_value(v.raw(name)),
                        errors: Vec::new(),
                    })
                    .collect(),
            },
            FieldSet::Group(g) => {
                let mut subforms = Vec::with_capacity(g.children.len());
                for (name, child) in &g.children {
                    let mut path = names.to_vec();
                    path.push(name);
                    subforms.push(child.inc_form(&path)?);
                }
                FormBody::Group { subforms }
            }
            FieldSet::Several(s) => {
                let items = s.items.as_deref().unwrap_or_default();
                let mut rows = Vec::with_capacity(items.len() + 1);
                for item in items {
                    rows.push(SeveralRow {
                        position: item.position.clone(),
                        blank: false,
                        forms: Self::row_forms(names, &item.position, &item.sets)?,
                    });
                }
                if s.accepts_more() {
                    let position = s.next_position().to_string();
                    let blanks: Vec<(String, FieldSet)> = s
                        .children
                        .iter()
                        .map(|(n, c)| (n.clone(), c.blank()))
                        .collect();
                    rows.push(SeveralRow {
                        forms: Self::row_forms(names, &position, &blanks)?,
                        position,
                        blank: true,
                    });
                }
                FormBody::Several { rows }
            }
        };

        Ok(FormDescriptor {
            tpl: self.form_template().to_string(),
            form_id: form_id(&basename),
            form_title: title,
            basename,
            body,
        })
    }

    fn row_forms(
        names: &[&str],
        position: &str,
        sets: &[(String, FieldSet)],
    ) -> Result<Vec<FormDescriptor>, SchemaError> {
        sets.iter()
            .map(|(name, set)| {
                let mut path = names.to_vec();
                path.push(position);
                path.push(name);
                set.inc_form(&path)
            })
            .collect()
    }

    /// Validate the submission for the node at `basename` (relative to this
    /// node) and return the rows to write.
    pub fn save(
        &self,
        basename: &str,
        submission: &Submission,
        registry: &TypeRegistry,
    ) -> CmsResult<Vec<PendingValue>> {
        self.save_at("", basename, submission, registry)
    }

    pub(crate) fn save_at(
        &self,
        prefix: &str,
        rest: &str,
        submission: &Submission,
        registry: &TypeRegistry,
    ) -> CmsResult<Vec<PendingValue>> {
        let unknown = || CmsError::from(SchemaError::UnknownNode(join_name([prefix, rest])));
        match self {
            FieldSet::Value(v) => {
                if !rest.is_empty() && find_named(&v.fields, rest).is_none() {
                    return Err(unknown());
                }
                v.save(prefix, submission, registry)
            }
            FieldSet::Group(g) => {
                let (name, tail) = split_first(rest);
                let child = find_named(&g.children, name).ok_or_else(unknown)?;
                child.save_at(&join_name([prefix, name]), tail, submission, registry)
            }
            FieldSet::Several(s) => {
                let (pos, name, tail) = split_two(rest).ok_or_else(unknown)?;
                if pos.parse::<u64>().is_err() {
                    return Err(SchemaError::InvalidPosition(pos.to_string()).into());
                }
                let child = find_named(&s.children, name).ok_or_else(unknown)?;
                child.save_at(&join_name([prefix, pos, name]), tail, submission, registry)
            }
        }
    }

    /// `(total, filled)` leaf field counts.
    pub fn done_percent(&self) -> (usize, usize) {
        match self {
            FieldSet::Value(v) => {
                let filled = v
                    .fields
                    .iter()
                    .filter(|(name, _)| v.raw(name).is_some_and(|raw| !raw.trim().is_empty()))
                    .count();
                (v.fields.len(), filled)
            }
            FieldSet::Group(g) => sum_counts(g.children.iter().map(|(_, c)| c.done_percent())),
            FieldSet::Several(s) => match s.items.as_deref() {
                Some(items) if !items.is_empty() => sum_counts(
                    items
                        .iter()
                        .flat_map(|item| item.sets.iter().map(|(_, c)| c.done_percent())),
                ),
                _ => {
                    let (total, _) = sum_counts(s.children.iter().map(|(_, c)| c.done_percent()));
                    (total, 0)
                }
            },
        }
    }

    pub fn is_filled(&self) -> bool {
        self.done_percent().1 > 0
    }

    /// Render context: display values nested the way the tree is.
    pub fn context(&self, registry: &TypeRegistry) -> Value {
        match self {
            FieldSet::Value(v) if v.single => v
                .fields
                .first()
                .map(|(name, ty)| display_json(ty.display(v.raw(name), registry)))
                .unwrap_or(Value::Null),
            FieldSet::Value(v) => {
                let mut map = Map::new();
                for (name, ty) in &v.fields {
                    map.insert(name.clone(), display_json(ty.display(v.raw(name), registry)));
                }
                Value::Object(map)
            }
            FieldSet::Group(g) => {
                let mut map = Map::new();
                for (name, child) in &g.children {
                    map.insert(name.clone(), child.context(registry));
                }
                Value::Object(map)
            }
            FieldSet::Several(s) => Value::Array(
                s.items
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|item| {
                        let mut map = Map::new();
                        map.insert("_position".into(), Value::String(item.position.clone()));
                        for (name, set) in &item.sets {
                            map.insert(name.clone(), set.context(registry));
                        }
                        Value::Object(map)
                    })
                    .collect(),
            ),
        }
    }

    /// Child of a group.
    pub fn child(&self, name: &str) -> Option<&FieldSet> {
        match self {
            FieldSet::Group(g) => find_named(&g.children, name),
            _ => None,
        }
    }

    /// Raw loaded value of a field of a value set.
    pub fn raw(&self, field: &str) -> Option<&str> {
        match self {
            FieldSet::Value(v) => v.raw(field),
            _ => None,
        }
    }

    /// Display value of a field of a value set.
    pub fn field_value(&self, field: &str, registry: &TypeRegistry) -> Option<DisplayValue> {
        match self {
            FieldSet::Value(v) => {
                find_named(&v.fields, field).map(|ty| ty.display(v.raw(field), registry))
            }
            _ => None,
        }
    }

    /// The one raw value of a single value set.
    pub fn single_raw(&self) -> Option<&str> {
        match self {
            FieldSet::Value(v) if v.single => v.fields.first().and_then(|(n, _)| v.raw(n)),
            _ => None,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, FieldSet::Value(v) if v.single)
    }

    /// Loaded positions of a list, in order.
    pub fn items(&self) -> &[SeveralItem] {
        match self {
            FieldSet::Several(s) => s.items.as_deref().unwrap_or_default(),
            _ => &[],
        }
    }

    /// Declared field names of a value set or child names of a composite.
    pub fn names(&self) -> Vec<&str> {
        match self {
            FieldSet::Value(v) => v.fields.iter().map(|(n, _)| n.as_str()).collect(),
            FieldSet::Group(g) => g.children.iter().map(|(n, _)| n.as_str()).collect(),
            FieldSet::Several(s) => s.children.iter().map(|(n, _)| n.as_str()).collect(),
        }
    }
}

impl ValueSet {
    fn raw(&self, field: &str) -> Option<&str> {
        self.data.as_ref()?.get(field).map(String::as_str)
    }

    fn save(
        &self,
        basename: &str,
        submission: &Submission,
        registry: &TypeRegistry,
    ) -> CmsResult<Vec<PendingValue>> {
        let mut errors = FieldErrors::new(basename);
        let mut pending = Vec::with_capacity(self.fields.len());
        for (name, ty) in &self.fields {
            if let Some(text) = submission.field(name) {
                errors.submitted.insert(name.clone(), text.to_string());
            }
            match ty.to_database(name, submission, registry) {
                Ok(Some(raw)) => pending.push(PendingValue {
                    name: join_name([basename, name.as_str()]),
                    type_name: ty.type_name().to_string(),
                    raw,
                }),
                Ok(None) => {}
                Err(message) => errors.add(name.clone(), message),
            }
        }
        if errors.is_empty() {
            Ok(pending)
        } else {
            Err(CmsError::FormValidation(errors))
        }
    }
}

impl SeveralSet {
    fn accepts_more(&self) -> bool {
        let used = self.items.as_ref().map_or(0, Vec::len);
        self.up_to.is_none_or(|max| used < max)
    }

    fn next_position(&self) -> i64 {
        self.items
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.position.parse::<i64>().ok())
            .max()
            .unwrap_or(0)
            + 1
    }
}

fn sum_counts(counts: impl Iterator<Item = (usize, usize)>) -> (usize, usize) {
    counts.fold((0, 0), |(t, f), (ct, cf)| (t + ct, f + cf))
}

fn display_json(value: DisplayValue) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
