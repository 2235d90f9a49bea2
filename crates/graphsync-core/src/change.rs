//! Relationship facts and the closed set of changes a save can produce.
//!
//! The graph mapper emits [`Change`] values; the compiler batches them into
//! statements. Nothing else is allowed to describe a write.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::types::{EntityRef, NodeId, NodeKey, PropertyMap};

// ── Facts ────────────────────────────────────────────────────────

/// A relationship known to exist in the store.
///
/// Identity is `(start, rel_type, end)`. The type bounds only shape batching
/// and match predicates, so they take no part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedRelationship {
    pub start: NodeId,
    pub rel_type: String,
    pub end: NodeId,
    pub start_type: String,
    pub end_type: String,
}

impl MappedRelationship {
    pub fn new(
        start: NodeId,
        rel_type: impl Into<String>,
        end: NodeId,
        start_type: impl Into<String>,
        end_type: impl Into<String>,
    ) -> Self {
        Self {
            start,
            rel_type: rel_type.into(),
            end,
            start_type: start_type.into(),
            end_type: end_type.into(),
        }
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.start == id || self.end == id
    }

    fn identity(&self) -> (NodeId, &str, NodeId) {
        (self.start, &self.rel_type, self.end)
    }
}

impl PartialEq for MappedRelationship {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for MappedRelationship {}

impl Hash for MappedRelationship {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for MappedRelationship {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MappedRelationship {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for MappedRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.start, self.rel_type, self.end)
    }
}

/// A relationship expressed by the live object graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRelationship {
    pub start: NodeKey,
    pub rel_type: String,
    pub end: NodeKey,
    pub start_type: String,
    pub end_type: String,
}

impl LiveRelationship {
    /// Structural identity used for deduplication within a traversal.
    pub fn key(&self) -> (NodeKey, String, NodeKey) {
        (self.start, self.rel_type.clone(), self.end)
    }

    /// The stored form of this relationship, once both endpoints have ids.
    pub fn to_mapped(&self) -> Option<MappedRelationship> {
        Some(MappedRelationship::new(
            self.start.persisted()?,
            self.rel_type.clone(),
            self.end.persisted()?,
            self.start_type.clone(),
            self.end_type.clone(),
        ))
    }
}

impl From<&MappedRelationship> for LiveRelationship {
    fn from(fact: &MappedRelationship) -> Self {
        Self {
            start: NodeKey::Persisted(fact.start),
            rel_type: fact.rel_type.clone(),
            end: NodeKey::Persisted(fact.end),
            start_type: fact.start_type.clone(),
            end_type: fact.end_type.clone(),
        }
    }
}

impl fmt::Display for LiveRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.start, self.rel_type, self.end)
    }
}

// ── Changes ──────────────────────────────────────────────────────

/// One write-relevant delta.
#[derive(Debug, Clone)]
pub enum Change {
    CreateNode {
        entity: EntityRef,
        labels: Vec<String>,
        properties: PropertyMap,
    },
    UpdateNode {
        entity: EntityRef,
        id: NodeId,
        labels: Vec<String>,
        properties: PropertyMap,
    },
    CreateRelationship(LiveRelationship),
    DeleteRelationship(MappedRelationship),
    DeleteNode {
        entity: EntityRef,
        id: NodeId,
        labels: Vec<String>,
    },
}

/// Presence of a fact as decided by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

/// Non-fatal findings of a traversal.
#[derive(Debug)]
pub enum Diagnostic {
    /// An entity was excluded from the change-set.
    Schema {
        entity: EntityRef,
        error: MappingError,
    },
    /// Endpoints disagreed about a fact; the first-seen assertion was kept.
    Conflict {
        relationship: String,
        kept: Presence,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema { entity, error } => write!(f, "entity {entity} skipped: {error}"),
            Self::Conflict { relationship, kept } => {
                write!(f, "conflicting assertions for {relationship}, kept {kept:?}")
            }
        }
    }
}

/// The outcome of mapping one save invocation.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
    /// Entities whose state was examined, in visit order.
    pub visited: Vec<EntityRef>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn created_nodes(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.changes.iter().filter_map(|c| match c {
            Change::CreateNode { entity, .. } => Some(*entity),
            _ => None,
        })
    }

    pub fn updated_nodes(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.changes.iter().filter_map(|c| match c {
            Change::UpdateNode { entity, .. } => Some(*entity),
            _ => None,
        })
    }

    pub fn new_relationships(&self) -> impl Iterator<Item = &LiveRelationship> {
        self.changes.iter().filter_map(|c| match c {
            Change::CreateRelationship(rel) => Some(rel),
            _ => None,
        })
    }

    pub fn deleted_relationships(&self) -> impl Iterator<Item = &MappedRelationship> {
        self.changes.iter().filter_map(|c| match c {
            Change::DeleteRelationship(rel) => Some(rel),
            _ => None,
        })
    }

    pub fn deleted_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.changes.iter().filter_map(|c| match c {
            Change::DeleteNode { id, .. } => Some(*id),
            _ => None,
        })
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::Conflict { .. }))
    }
}
