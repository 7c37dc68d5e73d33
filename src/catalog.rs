//! Entity metadata supplied by the host application.
//!
//! The resolver never inspects types itself. A [`FieldCatalog`] hands it one
//! [`EntityMetadata`] per declaring type, and the `parent` links describe the
//! inheritance chain from the most-derived type upward.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Source of per-entity field declarations.
pub trait FieldCatalog {
    /// Metadata for the entity declared under `name`, if known.
    fn entity(&self, name: &str) -> Option<&EntityMetadata>;
}

/// The fields one type declares itself, plus a link to its parent type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityMetadata {
    /// Physical table/source name, only meaningful on the queried type.
    pub source: Option<String>,
    /// Parent type name; `None` ends the chain.
    pub parent: Option<String>,
    /// Declared fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Whether the field maps to storage at all.
    #[serde(default = "default_persisted", alias = "exist")]
    pub persisted: bool,
    /// Explicit storage name. `{...}` marks a raw SQL expression.
    #[serde(default)]
    pub column: Option<String>,
}

fn default_persisted() -> bool {
    true
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persisted: true,
            column: None,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn transient(mut self) -> Self {
        self.persisted = false;
        self
    }
}

impl EntityMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// In-memory catalog, also the shape of the JSON metadata file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCatalog {
    #[serde(default)]
    pub entities: IndexMap<String, EntityMetadata>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, metadata: EntityMetadata) {
        self.entities.insert(name.into(), metadata);
    }

    pub fn with_entity(mut self, name: impl Into<String>, metadata: EntityMetadata) -> Self {
        self.insert(name, metadata);
        self
    }
}

impl FieldCatalog for MemoryCatalog {
    fn entity(&self, name: &str) -> Option<&EntityMetadata> {
        self.entities.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_defaults_from_json() {
        let json = r#"{
            "entities": {
                "User": {
                    "source": "t_user",
                    "parent": "Base",
                    "fields": [
                        { "name": "userName", "column": "user_name" },
                        { "name": "scratch", "exist": false }
                    ]
                },
                "Base": { "fields": [{ "name": "id" }] }
            }
        }"#;
        let catalog: MemoryCatalog = serde_json::from_str(json).unwrap();

        let user = catalog.entity("User").unwrap();
        assert_eq!(user.source.as_deref(), Some("t_user"));
        assert_eq!(user.parent.as_deref(), Some("Base"));
        assert_eq!(user.fields[0].column.as_deref(), Some("user_name"));
        assert!(user.fields[0].persisted);
        assert!(!user.fields[1].persisted);

        let base = catalog.entity("Base").unwrap();
        assert_eq!(base.source, None);
        assert_eq!(base.fields[0], FieldDescriptor::new("id"));
        assert!(catalog.entity("Missing").is_none());
    }

    #[test]
    fn test_builders() {
        let catalog = MemoryCatalog::new().with_entity(
            "Order",
            EntityMetadata::new()
                .source("t_order")
                .field(FieldDescriptor::new("total").column("{price * qty}"))
                .field(FieldDescriptor::new("cache").transient()),
        );
        let order = catalog.entity("Order").unwrap();
        assert_eq!(order.fields.len(), 2);
        assert_eq!(order.fields[0].column.as_deref(), Some("{price * qty}"));
        assert!(!order.fields[1].persisted);
    }
}
