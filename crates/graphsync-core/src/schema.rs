//! Static schema registry: domain type → labels, properties, relationships.
//!
//! The registry is built once (in code or from JSON) and shared read-only by
//! every mapper and session. Nothing in graphsync introspects domain types at
//! runtime.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};
use crate::types::{Entity, PropertyMap, Value};

/// Direction of an association relative to the entity declaring it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The declaring entity is the start node.
    #[default]
    Outgoing,
    /// The declaring entity is the end node.
    Incoming,
}

/// An association field declared on an entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationshipField {
    pub field: String,
    pub rel_type: String,
    pub target_type: String,
    #[serde(default)]
    pub direction: Direction,
}

impl RelationshipField {
    /// Fields sharing a signature encode the same family of facts.
    pub fn signature(&self) -> (&str, Direction, &str) {
        (&self.rel_type, self.direction, &self.target_type)
    }
}

/// Mapping metadata of one domain type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub type_name: String,
    /// Node labels; defaults to the type name when empty.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Persisted property names. Entity properties not listed here are ignored.
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<RelationshipField>,
}

impl EntityDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            labels: Vec::new(),
            properties: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.properties.push(name.into());
        self
    }

    /// Declare a field whose targets are end nodes of `rel_type`.
    pub fn outgoing(self, field: &str, rel_type: &str, target_type: &str) -> Self {
        self.relationship(field, rel_type, target_type, Direction::Outgoing)
    }

    /// Declare a field whose targets are start nodes of `rel_type`.
    pub fn incoming(self, field: &str, rel_type: &str, target_type: &str) -> Self {
        self.relationship(field, rel_type, target_type, Direction::Incoming)
    }

    fn relationship(
        mut self,
        field: &str,
        rel_type: &str,
        target_type: &str,
        direction: Direction,
    ) -> Self {
        self.relationships.push(RelationshipField {
            field: field.to_string(),
            rel_type: rel_type.to_string(),
            target_type: target_type.to_string(),
            direction,
        });
        self
    }

    /// Exact label set: sorted and deduplicated, falling back to the type name.
    pub fn label_set(&self) -> Vec<String> {
        let mut labels = if self.labels.is_empty() {
            vec![self.type_name.clone()]
        } else {
            self.labels.clone()
        };
        labels.sort();
        labels.dedup();
        labels
    }

    /// Every declared property of `entity`, `Null` where the entity does not
    /// carry it, so an update clears it in the store. Undeclared ones are
    /// ignored.
    pub fn persisted_properties(&self, entity: &Entity) -> PropertyMap {
        self.properties
            .iter()
            .map(|name| {
                let value = entity.properties.get(name).cloned().unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect()
    }

    /// Whether an entity of this type may fill a field declared with
    /// `target_type`: its own type, or one of its labels.
    pub fn satisfies(&self, target_type: &str) -> bool {
        self.type_name == target_type || self.labels.iter().any(|l| l == target_type)
    }
}

/// Lookup table from domain type name to its descriptor.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntityDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a descriptor.
    pub fn register(&mut self, descriptor: EntityDescriptor) {
        self.entities
            .insert(descriptor.type_name.clone(), descriptor);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, descriptor: EntityDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn resolve(&self, type_name: &str) -> Result<&EntityDescriptor> {
        self.entities
            .get(type_name)
            .ok_or_else(|| MappingError::Schema {
                type_name: type_name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Build a registry from a JSON array of descriptors.
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptors: Vec<EntityDescriptor> = serde_json::from_str(json)?;
        Ok(descriptors
            .into_iter()
            .fold(Self::new(), |registry, d| registry.with(d)))
    }
}
