//! Field type registry.
//!
//! Maps the type names persisted on value rows to their behaviour. Built
//! once at startup from the fixed table of scalar types plus any reference
//! kinds the embedding application registers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::SchemaError;
use super::field_type::{FieldType, TypeKind};
use crate::file::{self, FileStorage};

/// A registered type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeEntry {
    pub name: String,
    pub description: String,
    pub kind: TypeKind,
}

/// A candidate returned by a reference search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub id: String,
    pub label: String,
}

/// Resolves reference ids to external entities.
pub trait ReferenceLookup: Send + Sync {
    /// The entity for `id`, or `None` when it does not exist.
    fn resolve(&self, id: &str) -> Option<Value>;

    /// Candidates whose label contains `query` (case-insensitive).
    fn search(&self, query: &str, limit: usize) -> Vec<ReferenceEntry>;
}

/// An in-memory lookup over a fixed list of entities.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    entries: Vec<(ReferenceEntry, Value)>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(
        mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        entity: Value,
    ) -> Self {
        self.entries.push((
            ReferenceEntry {
                id: id.into(),
                label: label.into(),
            },
            entity,
        ));
        self
    }
}

impl ReferenceLookup for StaticLookup {
    fn resolve(&self, id: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.id == id)
            .map(|(_, entity)| entity.clone())
    }

    fn search(&self, query: &str, limit: usize) -> Vec<ReferenceEntry> {
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|(entry, _)| entry.label.to_lowercase().contains(&needle))
            .take(limit)
            .map(|(entry, _)| entry.clone())
            .collect()
    }
}

/// Value attributes as carried in the XML interchange format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlValue {
    pub value: String,
    /// Set for image values: the storage key the bytes were exported from.
    pub file_name: Option<String>,
}

const BUILTIN: &[(&str, &str, TypeKind)] = &[
    ("text", "Text", TypeKind::Text),
    ("richtext", "Rich text", TypeKind::RichText),
    ("option", "Option", TypeKind::Option),
    ("flag", "Flag", TypeKind::Flag),
    ("image", "Image", TypeKind::Image),
    ("date", "Date", TypeKind::Date),
    ("datetime", "Date and time", TypeKind::DateTime),
];

/// Registry of type names.
pub struct TypeRegistry {
    entries: BTreeMap<String, TypeEntry>,
    lookups: HashMap<String, Arc<dyn ReferenceLookup>>,
    files: Arc<dyn FileStorage>,
}

impl TypeRegistry {
    /// Registry with the built-in scalar types.
    pub fn new(files: Arc<dyn FileStorage>) -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(name, description, kind)| {
                (
                    (*name).to_string(),
                    TypeEntry {
                        name: (*name).to_string(),
                        description: (*description).to_string(),
                        kind: *kind,
                    },
                )
            })
            .collect();
        Self {
            entries,
            lookups: HashMap::new(),
            files,
        }
    }

    /// Add a reference kind. Names are lower-cased and must not clash with
    /// an existing type.
    pub fn register_reference(
        &mut self,
        kind: &str,
        description: &str,
        lookup: Arc<dyn ReferenceLookup>,
    ) -> Result<(), SchemaError> {
        let name = kind.to_lowercase();
        if self.entries.contains_key(&name) {
            return Err(SchemaError::DuplicateType(name));
        }
        debug!(kind = %name, "registered reference type");
        self.entries.insert(
            name.clone(),
            TypeEntry {
                name: name.clone(),
                description: description.to_string(),
                kind: TypeKind::Reference,
            },
        );
        self.lookups.insert(name, lookup);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TypeEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TypeEntry> {
        self.entries.values()
    }

    pub fn lookup(&self, kind: &str) -> Option<&Arc<dyn ReferenceLookup>> {
        self.lookups.get(kind)
    }

    pub fn files(&self) -> &dyn FileStorage {
        self.files.as_ref()
    }

    /// Build a field type from a declared type name. Option fields take
    /// their choices from `choices`.
    pub fn field_type(
        &self,
        name: &str,
        choices: Vec<(String, String)>,
    ) -> Result<FieldType, SchemaError> {
        let entry = self
            .get(&name.to_lowercase())
            .ok_or_else(|| SchemaError::UnknownFieldType(name.to_string()))?;
        Ok(match entry.kind {
            TypeKind::Text => FieldType::Text,
            TypeKind::RichText => FieldType::RichText,
            TypeKind::Option => FieldType::Option { choices },
            TypeKind::Flag => FieldType::Flag,
            TypeKind::Image => FieldType::Image,
            TypeKind::Date => FieldType::Date,
            TypeKind::DateTime => FieldType::DateTime,
            TypeKind::Reference => FieldType::Reference {
                kind: entry.name.clone(),
            },
        })
    }

    fn is_image(&self, type_name: &str) -> bool {
        self.get(type_name)
            .is_some_and(|entry| entry.kind == TypeKind::Image)
    }

    /// Encode a stored value for export. Image values carry their bytes as
    /// base64; everything else, including unregistered type names, passes
    /// through unchanged.
    pub async fn encode_xml(&self, type_name: &str, raw: &str) -> Result<XmlValue> {
        if !self.is_image(type_name) || raw.is_empty() {
            return Ok(XmlValue {
                value: raw.to_string(),
                file_name: None,
            });
        }
        match self.files.read(raw).await {
            Ok(data) => Ok(XmlValue {
                value: file::encode_base64(&data),
                file_name: Some(raw.to_string()),
            }),
            Err(e) => {
                warn!(key = %raw, error = %e, "image missing from storage, exporting key only");
                Ok(XmlValue {
                    value: raw.to_string(),
                    file_name: None,
                })
            }
        }
    }

    /// Inverse of [`TypeRegistry::encode_xml`]; image payloads are written
    /// back to storage and replaced by their key.
    pub async fn decode_xml(
        &self,
        type_name: &str,
        xml: &XmlValue,
        upload_to: &str,
    ) -> Result<String> {
        match (&xml.file_name, self.is_image(type_name)) {
            (Some(file_name), true) if !xml.value.is_empty() => {
                let data = file::decode_base64(&xml.value)
                    .with_context(|| format!("invalid image payload for {file_name}"))?;
                file::store_imported(self.files.as_ref(), upload_to, file_name, &data).await
            }
            _ => Ok(xml.value.clone()),
        }
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
