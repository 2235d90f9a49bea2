//! Core domain types for the in-memory object graph.
//!
//! Domain objects live in an arena ([`ObjectGraph`]) and reference each other
//! through [`EntityRef`] indices, so cyclic graphs need no shared ownership.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Identity ─────────────────────────────────────────────────────

/// Identifier assigned by the graph store once a node has been written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable index of an entity inside an [`ObjectGraph`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntityRef(pub usize);

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity token of a relationship endpoint during a single traversal.
///
/// Persisted nodes are keyed by their store id, so two arena entries carrying
/// the same id denote the same node. Unsaved objects are keyed by arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    Persisted(NodeId),
    Transient(EntityRef),
}

impl NodeKey {
    pub fn persisted(&self) -> Option<NodeId> {
        match self {
            Self::Persisted(id) => Some(*id),
            Self::Transient(_) => None,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{id}"),
            Self::Transient(entity) => write!(f, "{entity}"),
        }
    }
}

// ── Properties ───────────────────────────────────────────────────

/// A scalar (or list of scalars) stored as a node property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Property bag of a node. Ordered so snapshots hash deterministically.
pub type PropertyMap = BTreeMap<String, Value>;

// ── Entities ─────────────────────────────────────────────────────

/// A domain object instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Domain type, resolved through the schema registry.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Store id; `None` until the first successful write.
    #[serde(default)]
    pub id: Option<NodeId>,
    #[serde(default)]
    pub properties: PropertyMap,
    /// Association field name → referenced entities, in field order.
    #[serde(default)]
    pub associations: BTreeMap<String, Vec<EntityRef>>,
}

impl Entity {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(NodeId(id));
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Entities referenced by an association field (empty if unset).
    pub fn targets(&self, field: &str) -> &[EntityRef] {
        self.associations.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Arena holding every object of a unit of work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectGraph {
    entities: Vec<Entity>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity and return its stable reference.
    pub fn add(&mut self, entity: Entity) -> EntityRef {
        self.entities.push(entity);
        EntityRef(self.entities.len() - 1)
    }

    pub fn get(&self, entity: EntityRef) -> Option<&Entity> {
        self.entities.get(entity.0)
    }

    pub fn get_mut(&mut self, entity: EntityRef) -> Option<&mut Entity> {
        self.entities.get_mut(entity.0)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityRef, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityRef(i), e))
    }

    /// Identity token for an entity: its store id when bound, else its slot.
    pub fn key_of(&self, entity: EntityRef) -> Option<NodeKey> {
        self.get(entity).map(|e| match e.id {
            Some(id) => NodeKey::Persisted(id),
            None => NodeKey::Transient(entity),
        })
    }

    /// Append `to` to an association field. Duplicates are kept, as a list would.
    pub fn link(&mut self, from: EntityRef, field: &str, to: EntityRef) {
        if let Some(entity) = self.get_mut(from) {
            entity
                .associations
                .entry(field.to_string())
                .or_default()
                .push(to);
        }
    }

    /// Remove every occurrence of `to` from an association field.
    pub fn unlink(&mut self, from: EntityRef, field: &str, to: EntityRef) {
        if let Some(targets) = self
            .get_mut(from)
            .and_then(|e| e.associations.get_mut(field))
        {
            targets.retain(|t| *t != to);
        }
    }

    /// Empty an association field.
    pub fn clear(&mut self, from: EntityRef, field: &str) {
        if let Some(entity) = self.get_mut(from) {
            entity.associations.remove(field);
        }
    }

    pub fn set_property(&mut self, entity: EntityRef, name: &str, value: impl Into<Value>) {
        if let Some(entity) = self.get_mut(entity) {
            entity.properties.insert(name.to_string(), value.into());
        }
    }

    /// Bind a store id to an entity after its node has been created.
    pub fn bind(&mut self, entity: EntityRef, id: NodeId) {
        if let Some(entity) = self.get_mut(entity) {
            entity.id = Some(id);
        }
    }

    /// Detach an entity from its store node (after the node was deleted).
    pub fn unbind(&mut self, entity: EntityRef) {
        if let Some(entity) = self.get_mut(entity) {
            entity.id = None;
        }
    }
}
