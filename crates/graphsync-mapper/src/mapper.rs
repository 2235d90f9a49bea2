//! Graph mapper: diff an object graph against the mapping context.
//!
//! A traversal walks the object graph breadth-first from one or more roots.
//! Every entity is examined once. Node changes come from the entity's own
//! state; relationship changes come from a ledger of assertions made by each
//! expanded entity about the facts its declared fields encode:
//!
//! - an expressed fact is *added* when the store does not hold it and the
//!   entity did not express it at the last reconciliation, else *kept*
//! - a fact the entity expressed before, or that is registered for one of
//!   its field signatures, is *removed* when no longer expressed
//!
//! Per fact the first added/removed assertion decides. A later contradicting
//! assertion is reported as a conflict and otherwise ignored.

use std::collections::{HashMap, HashSet, VecDeque};

use graphsync_core::{
    Change, ChangeSet, Diagnostic, Direction, Entity, EntityDescriptor, EntityRef,
    LiveRelationship, MappedRelationship, MappingError, NodeId, NodeKey, ObjectGraph, Presence,
    RelationshipField, SchemaRegistry,
};

use crate::context::MappingContext;
use crate::facts;

/// Produces change-sets from object graphs. Holds no state of its own.
pub struct GraphMapper<'a> {
    registry: &'a SchemaRegistry,
    context: &'a MappingContext,
    max_depth: Option<usize>,
}

impl<'a> GraphMapper<'a> {
    pub fn new(registry: &'a SchemaRegistry, context: &'a MappingContext) -> Self {
        Self {
            registry,
            context,
            max_depth: None,
        }
    }

    /// Bound the walk: entities deeper than `max_depth` are only expanded when
    /// they, or the entity they were reached from, are dirty.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Diff everything reachable from `root`.
    pub fn map(&self, graph: &ObjectGraph, root: EntityRef) -> ChangeSet {
        self.map_all(graph, &[root])
    }

    /// Diff everything reachable from any of `roots`, as one traversal.
    pub fn map_all(&self, graph: &ObjectGraph, roots: &[EntityRef]) -> ChangeSet {
        let mut traversal = Traversal::new(self, graph);
        for &root in roots {
            traversal.walk(root);
        }
        let changes = traversal.finish();
        tracing::debug!(
            roots = roots.len(),
            visited = changes.visited.len(),
            changes = changes.changes.len(),
            diagnostics = changes.diagnostics.len(),
            "Mapped object graph"
        );
        changes
    }

    /// Changes deleting the node of `entity` and every registered fact
    /// touching it. A never-saved entity yields an empty change-set.
    pub fn map_delete(&self, graph: &ObjectGraph, entity: EntityRef) -> ChangeSet {
        let mut set = ChangeSet::default();

        let descriptor = graph
            .get(entity)
            .ok_or(MappingError::UnknownEntity(entity))
            .and_then(|e| Ok((e.id, self.registry.resolve(&e.type_name)?)));
        let (id, descriptor) = match descriptor {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!(%entity, %error, "Cannot delete entity");
                set.diagnostics.push(Diagnostic::Schema { entity, error });
                return set;
            }
        };
        let Some(id) = id else {
            return set;
        };

        let mut facts: Vec<MappedRelationship> =
            self.context.relationships_of(id).cloned().collect();
        facts.sort();
        set.changes
            .extend(facts.into_iter().map(Change::DeleteRelationship));
        set.changes.push(Change::DeleteNode {
            entity,
            id,
            labels: descriptor.label_set(),
        });
        set
    }
}

// ── Fact ledger ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assertion {
    Added,
    Kept,
    Removed,
}

#[derive(Debug)]
struct LedgerEntry {
    relationship: LiveRelationship,
    decided: Option<Assertion>,
    contested: bool,
}

/// Assertions per fact, in first-seen order.
#[derive(Debug, Default)]
struct Ledger {
    entries: Vec<LedgerEntry>,
    index: HashMap<(NodeKey, String, NodeKey), usize>,
}

impl Ledger {
    fn assert(&mut self, relationship: LiveRelationship, assertion: Assertion) {
        let key = relationship.key();
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.entries.push(LedgerEntry {
                    relationship,
                    decided: None,
                    contested: false,
                });
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        if assertion == Assertion::Kept {
            return;
        }
        let entry = &mut self.entries[slot];
        match entry.decided {
            None => entry.decided = Some(assertion),
            Some(first) if first != assertion => entry.contested = true,
            Some(_) => {}
        }
    }
}

// ── Traversal ────────────────────────────────────────────────────

type Signature<'d> = (&'d str, Direction, &'d str);

struct Traversal<'a> {
    registry: &'a SchemaRegistry,
    context: &'a MappingContext,
    max_depth: Option<usize>,
    graph: &'a ObjectGraph,
    visited: HashSet<EntityRef>,
    /// Entities excluded by a schema failure.
    rejected: HashSet<EntityRef>,
    expanded: Vec<EntityRef>,
    node_changes: Vec<Change>,
    ledger: Ledger,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Traversal<'a> {
    fn new(mapper: &GraphMapper<'a>, graph: &'a ObjectGraph) -> Self {
        Self {
            registry: mapper.registry,
            context: mapper.context,
            max_depth: mapper.max_depth,
            graph,
            visited: HashSet::new(),
            rejected: HashSet::new(),
            expanded: Vec::new(),
            node_changes: Vec::new(),
            ledger: Ledger::default(),
            diagnostics: Vec::new(),
        }
    }

    fn walk(&mut self, root: EntityRef) {
        let mut queue = VecDeque::from([(root, 0usize, false)]);

        while let Some((current, depth, parent_dirty)) = queue.pop_front() {
            if !self.visited.insert(current) {
                continue;
            }
            let Some((entity, descriptor)) = self.admit(current) else {
                continue;
            };

            let dirty = self.classify(current, entity, descriptor);
            let within_bound = self.max_depth.map_or(true, |max| depth < max);
            if !(within_bound || dirty || parent_dirty) {
                tracing::trace!(entity = %current, depth, "Depth bound reached");
                continue;
            }

            self.expanded.push(current);
            for target in self.assert_fields(current, entity, descriptor) {
                if !self.visited.contains(&target) {
                    queue.push_back((target, depth + 1, dirty));
                }
            }
        }
    }

    /// Resolve an entity and its descriptor, or record why it is skipped.
    fn admit(&mut self, current: EntityRef) -> Option<(&'a Entity, &'a EntityDescriptor)> {
        let graph = self.graph;
        let registry = self.registry;
        let resolved = graph
            .get(current)
            .ok_or(MappingError::UnknownEntity(current))
            .and_then(|entity| Ok((entity, registry.resolve(&entity.type_name)?)));

        match resolved {
            Ok(found) => Some(found),
            Err(error) => {
                self.reject(current, error);
                None
            }
        }
    }

    fn reject(&mut self, entity: EntityRef, error: MappingError) {
        if self.rejected.insert(entity) {
            tracing::warn!(%entity, %error, "Entity excluded from change-set");
            self.diagnostics.push(Diagnostic::Schema { entity, error });
        }
    }

    /// Emit the node change for an entity. Returns whether it is dirty.
    fn classify(
        &mut self,
        current: EntityRef,
        entity: &Entity,
        descriptor: &EntityDescriptor,
    ) -> bool {
        let properties = descriptor.persisted_properties(entity);
        match entity.id {
            None => {
                self.node_changes.push(Change::CreateNode {
                    entity: current,
                    labels: descriptor.label_set(),
                    properties,
                });
                true
            }
            Some(id) if self.context.is_dirty(id, &entity.type_name, &properties) => {
                self.node_changes.push(Change::UpdateNode {
                    entity: current,
                    id,
                    labels: descriptor.label_set(),
                    properties,
                });
                true
            }
            Some(_) => false,
        }
    }

    /// Record the assertions of every declared field of an expanded entity.
    /// Returns the targets to visit.
    fn assert_fields(
        &mut self,
        current: EntityRef,
        entity: &Entity,
        descriptor: &'a EntityDescriptor,
    ) -> Vec<EntityRef> {
        let owner = match entity.id {
            Some(id) => NodeKey::Persisted(id),
            None => NodeKey::Transient(current),
        };

        // Fields sharing a signature express one family of facts.
        let mut families: Vec<(Signature<'a>, Vec<&'a RelationshipField>)> = Vec::new();
        for field in &descriptor.relationships {
            match families.iter_mut().find(|(sig, _)| *sig == field.signature()) {
                Some((_, fields)) => fields.push(field),
                None => families.push((field.signature(), vec![field])),
            }
        }

        let mut targets = Vec::new();
        for (signature, fields) in families {
            let mut expressed = HashSet::new();
            for field in fields {
                for &target in entity.targets(&field.field) {
                    let Some(other) = self.resolve_target(field, target) else {
                        continue;
                    };
                    let relationship = facts::orient(field, owner, &entity.type_name, other);
                    if expressed.insert(relationship.key()) {
                        self.assert_expressed(entity.id, relationship);
                    }
                    targets.push(target);
                }
            }
            if let Some(id) = entity.id {
                self.assert_removed(id, signature, &expressed);
            }
        }
        targets
    }

    fn resolve_target(&mut self, field: &RelationshipField, target: EntityRef) -> Option<NodeKey> {
        if self.rejected.contains(&target) {
            return None;
        }
        match facts::resolve_target(self.registry, self.graph, field, target) {
            Ok(key) => Some(key),
            Err(error @ MappingError::TargetMismatch { .. }) => {
                tracing::warn!(entity = %target, %error, "Association target skipped");
                self.diagnostics.push(Diagnostic::Schema {
                    entity: target,
                    error,
                });
                None
            }
            Err(error) => {
                self.reject(target, error);
                None
            }
        }
    }

    fn assert_expressed(&mut self, owner: Option<NodeId>, relationship: LiveRelationship) {
        let known = relationship.to_mapped().is_some_and(|fact| {
            self.context.contains_relationship(&fact)
                || owner
                    .and_then(|id| self.context.picture(id))
                    .is_some_and(|picture| picture.contains(&fact))
        });
        let assertion = if known {
            Assertion::Kept
        } else {
            Assertion::Added
        };
        self.ledger.assert(relationship, assertion);
    }

    fn assert_removed(
        &mut self,
        id: NodeId,
        (rel_type, direction, target_type): Signature<'_>,
        expressed: &HashSet<(NodeKey, String, NodeKey)>,
    ) {
        let in_family = |fact: &MappedRelationship| {
            fact.rel_type == rel_type
                && match direction {
                    Direction::Outgoing => fact.start == id && fact.end_type == target_type,
                    Direction::Incoming => fact.end == id && fact.start_type == target_type,
                }
        };

        let registered = self.context.relationships_of(id);
        let remembered = self.context.picture(id).into_iter().flatten();
        let stale: Vec<LiveRelationship> = registered
            .chain(remembered)
            .filter(|fact| in_family(fact))
            .map(LiveRelationship::from)
            .filter(|rel| !expressed.contains(&rel.key()))
            .collect();

        for relationship in stale {
            self.ledger.assert(relationship, Assertion::Removed);
        }
    }

    fn finish(self) -> ChangeSet {
        let mut changes = self.node_changes;
        let mut diagnostics = self.diagnostics;

        for entry in self.ledger.entries {
            let Some(decided) = entry.decided else {
                continue;
            };
            if entry.contested {
                let kept = match decided {
                    Assertion::Added => Presence::Present,
                    _ => Presence::Absent,
                };
                tracing::warn!(
                    relationship = %entry.relationship,
                    ?kept,
                    "Conflicting relationship assertions"
                );
                diagnostics.push(Diagnostic::Conflict {
                    relationship: entry.relationship.to_string(),
                    kept,
                });
            }

            match decided {
                Assertion::Added => changes.push(Change::CreateRelationship(entry.relationship)),
                Assertion::Removed => {
                    let registered = entry
                        .relationship
                        .to_mapped()
                        .and_then(|fact| self.context.registered(&fact).cloned());
                    if let Some(fact) = registered {
                        changes.push(Change::DeleteRelationship(fact));
                    }
                }
                Assertion::Kept => {}
            }
        }

        ChangeSet {
            changes,
            visited: self.expanded,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with(
                EntityDescriptor::new("Folder")
                    .property("name")
                    .outgoing("documents", "CONTAINS", "Document"),
            )
            .with(
                EntityDescriptor::new("Document")
                    .property("name")
                    .incoming("folder", "CONTAINS", "Folder"),
            )
    }

    #[test]
    fn ledger_first_decisive_assertion_wins() {
        let rel = LiveRelationship {
            start: NodeKey::Persisted(NodeId(1)),
            rel_type: "CONTAINS".to_string(),
            end: NodeKey::Persisted(NodeId(2)),
            start_type: "Folder".to_string(),
            end_type: "Document".to_string(),
        };
        let mut ledger = Ledger::default();
        ledger.assert(rel.clone(), Assertion::Kept);
        ledger.assert(rel.clone(), Assertion::Removed);
        ledger.assert(rel.clone(), Assertion::Added);
        ledger.assert(rel, Assertion::Kept);

        assert_eq!(ledger.entries.len(), 1);
        assert_eq!(ledger.entries[0].decided, Some(Assertion::Removed));
        assert!(ledger.entries[0].contested);
    }

    #[test]
    fn new_graph_creates_everything_once() {
        let registry = registry();
        let ctx = MappingContext::new();
        let mut graph = ObjectGraph::new();
        let folder = graph.add(Entity::new("Folder").with_property("name", "f"));
        let doc = graph.add(Entity::new("Document").with_property("name", "d"));
        graph.link(folder, "documents", doc);
        graph.link(doc, "folder", folder);

        let set = GraphMapper::new(&registry, &ctx).map(&graph, doc);
        assert_eq!(set.created_nodes().count(), 2);
        assert_eq!(set.new_relationships().count(), 1);
        assert!(set.diagnostics.is_empty());
        assert_eq!(set.visited, vec![doc, folder]);
    }

    #[test]
    fn subtype_in_supertype_field_is_not_a_mismatch() {
        let registry = SchemaRegistry::new()
            .with(EntityDescriptor::new("Voter").outgoing("voted_for", "VOTED_FOR", "Voter"))
            .with(EntityDescriptor::new("Candidate").label("Candidate").label("Voter"));
        let ctx = MappingContext::new();
        let mut graph = ObjectGraph::new();
        let voter = graph.add(Entity::new("Voter"));
        let candidate = graph.add(Entity::new("Candidate"));
        graph.link(voter, "voted_for", candidate);

        let set = GraphMapper::new(&registry, &ctx).map(&graph, voter);
        assert_eq!(set.created_nodes().count(), 2);
        assert_eq!(set.new_relationships().count(), 1);
        assert!(set.diagnostics.is_empty());
    }

    #[test]
    fn undeclared_properties_are_not_written() {
        let registry = registry();
        let ctx = MappingContext::new();
        let mut graph = ObjectGraph::new();
        let folder = graph.add(
            Entity::new("Folder")
                .with_property("name", "f")
                .with_property("cache", 1),
        );

        let set = GraphMapper::new(&registry, &ctx).map(&graph, folder);
        match &set.changes[0] {
            Change::CreateNode { properties, labels, .. } => {
                assert_eq!(properties.len(), 1);
                assert_eq!(labels, &vec!["Folder".to_string()]);
            }
            other => panic!("unexpected change {other:?}"),
        }
    }

    #[test]
    fn unknown_root_type_is_diagnosed() {
        let registry = registry();
        let ctx = MappingContext::new();
        let mut graph = ObjectGraph::new();
        let drive = graph.add(Entity::new("Drive"));

        let set = GraphMapper::new(&registry, &ctx).map(&graph, drive);
        assert!(set.is_empty());
        assert_eq!(set.diagnostics.len(), 1);
        assert!(matches!(
            set.diagnostics[0],
            Diagnostic::Schema { entity, ref error } if entity == drive && error.is_schema()
        ));
    }

    #[test]
    fn delete_of_transient_entity_is_empty() {
        let registry = registry();
        let ctx = MappingContext::new();
        let mut graph = ObjectGraph::new();
        let folder = graph.add(Entity::new("Folder"));

        let set = GraphMapper::new(&registry, &ctx).map_delete(&graph, folder);
        assert!(set.is_empty());
        assert!(set.diagnostics.is_empty());
    }

    #[test]
    fn delete_removes_touching_facts_first() {
        let registry = registry();
        let mut ctx = MappingContext::new();
        ctx.register_relationship(MappedRelationship::new(
            NodeId(1),
            "CONTAINS",
            NodeId(2),
            "Folder",
            "Document",
        ));
        let mut graph = ObjectGraph::new();
        let folder = graph.add(Entity::new("Folder").with_id(1));

        let set = GraphMapper::new(&registry, &ctx).map_delete(&graph, folder);
        assert_eq!(set.deleted_relationships().count(), 1);
        assert_eq!(set.deleted_nodes().collect::<Vec<_>>(), vec![NodeId(1)]);
        assert!(matches!(set.changes[0], Change::DeleteRelationship(_)));
    }
}
