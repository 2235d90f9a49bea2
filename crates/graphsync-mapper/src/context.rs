//! The mapping context: what this session believes the store holds.
//!
//! Three kinds of state are kept per session:
//! - a memo of every registered node's persisted properties (dirty checking)
//! - the set of relationship facts confirmed by the store
//! - a before picture per node: the relationships its fields expressed at the
//!   last reconciliation
//!
//! The context is only ever mutated after a successful write (see
//! [`SavePlan::reconcile`](crate::SavePlan::reconcile)) or by an explicit
//! load. Diffing reads it and never writes it.

use std::collections::{HashMap, HashSet};

use graphsync_core::{
    EntityRef, MappedRelationship, MappingError, NodeId, ObjectGraph, PropertyMap, Result,
    SchemaRegistry,
};

use crate::facts;
use crate::memo::compute_memo;

#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeMemo {
    type_name: String,
    hash: String,
}

/// Session state against which object graphs are diffed.
#[derive(Debug, Default)]
pub struct MappingContext {
    nodes: HashMap<NodeId, NodeMemo>,
    relationships: HashSet<MappedRelationship>,
    /// Registered facts indexed by each endpoint.
    by_node: HashMap<NodeId, HashSet<MappedRelationship>>,
    pictures: HashMap<NodeId, HashSet<MappedRelationship>>,
}

impl MappingContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nodes ────────────────────────────────────────────────────

    /// Record `id` as persisted with the given type and persisted properties.
    pub fn register_node(&mut self, id: NodeId, type_name: &str, properties: &PropertyMap) {
        self.nodes.insert(
            id,
            NodeMemo {
                type_name: type_name.to_string(),
                hash: compute_memo(type_name, properties),
            },
        );
    }

    /// Register an entity loaded from the store, together with its current
    /// relationships as its before picture.
    pub fn track(
        &mut self,
        registry: &SchemaRegistry,
        graph: &ObjectGraph,
        entity: EntityRef,
    ) -> Result<()> {
        let Some(owner) = graph.get(entity) else {
            return Err(MappingError::UnknownEntity(entity));
        };
        let descriptor = registry.resolve(&owner.type_name)?;
        if let Some(id) = owner.id {
            let properties = descriptor.persisted_properties(owner);
            self.register_node(id, &owner.type_name, &properties);
        }
        self.remember(registry, graph, entity)
    }

    /// Forget a node, its before picture and every fact touching it.
    pub fn deregister_node(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        self.pictures.remove(&id);
        for fact in self.by_node.remove(&id).unwrap_or_default() {
            self.deregister_relationship(&fact);
        }
        for picture in self.pictures.values_mut() {
            picture.retain(|fact| !fact.touches(id));
        }
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_type(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|memo| memo.type_name.as_str())
    }

    /// Whether the persisted state of `id` differs from its last snapshot.
    /// Unknown ids are dirty.
    pub fn is_dirty(&self, id: NodeId, type_name: &str, properties: &PropertyMap) -> bool {
        match self.nodes.get(&id) {
            Some(memo) => {
                memo.type_name != type_name || memo.hash != compute_memo(type_name, properties)
            }
            None => true,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ── Before pictures ──────────────────────────────────────────

    /// Replace the before picture of a persisted entity with the facts its
    /// fields express now. Transient entities have no picture.
    pub fn remember(
        &mut self,
        registry: &SchemaRegistry,
        graph: &ObjectGraph,
        entity: EntityRef,
    ) -> Result<()> {
        self.remember_where(registry, graph, entity, |_| true)
    }

    /// [`remember`](Self::remember), keeping only facts accepted by `keep`.
    pub(crate) fn remember_where(
        &mut self,
        registry: &SchemaRegistry,
        graph: &ObjectGraph,
        entity: EntityRef,
        keep: impl Fn(&MappedRelationship) -> bool,
    ) -> Result<()> {
        let Some(id) = graph.get(entity).and_then(|e| e.id) else {
            return Ok(());
        };
        let picture: HashSet<MappedRelationship> = facts::expressed(registry, graph, entity)?
            .iter()
            .filter_map(|rel| rel.to_mapped())
            .filter(|fact| keep(fact))
            .collect();
        self.pictures.insert(id, picture);
        Ok(())
    }

    /// Facts the fields of `id` expressed at the last reconciliation.
    pub fn picture(&self, id: NodeId) -> Option<&HashSet<MappedRelationship>> {
        self.pictures.get(&id)
    }

    // ── Relationships ────────────────────────────────────────────

    /// Record a fact confirmed by the store. Returns `false` if already known.
    pub fn register_relationship(&mut self, fact: MappedRelationship) -> bool {
        if self.relationships.contains(&fact) {
            return false;
        }
        for endpoint in [fact.start, fact.end] {
            self.by_node
                .entry(endpoint)
                .or_default()
                .insert(fact.clone());
        }
        self.relationships.insert(fact)
    }

    /// Forget a fact. Returns `false` if it was not registered.
    pub fn deregister_relationship(&mut self, fact: &MappedRelationship) -> bool {
        for endpoint in [fact.start, fact.end] {
            if let Some(facts) = self.by_node.get_mut(&endpoint) {
                facts.remove(fact);
                if facts.is_empty() {
                    self.by_node.remove(&endpoint);
                }
            }
        }
        self.relationships.remove(fact)
    }

    pub fn contains_relationship(&self, fact: &MappedRelationship) -> bool {
        self.relationships.contains(fact)
    }

    /// The registered copy of `fact`, carrying the type bounds it was
    /// registered with.
    pub fn registered(&self, fact: &MappedRelationship) -> Option<&MappedRelationship> {
        self.relationships.get(fact)
    }

    /// Registered facts with `id` as either endpoint.
    pub fn relationships_of(&self, id: NodeId) -> impl Iterator<Item = &MappedRelationship> {
        self.by_node.get(&id).into_iter().flatten()
    }

    pub fn all_relationships(&self) -> &HashSet<MappedRelationship> {
        &self.relationships
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Forget everything; the next save treats every fact as unknown.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.relationships.clear();
        self.by_node.clear();
        self.pictures.clear();
    }
}
