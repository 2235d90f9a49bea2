//! Save plans: batched changes, their execution outcome, and reconciliation.
//!
//! A plan is built from one change-set. As statements execute, returned
//! `(correlation id, store id)` pairs are accepted into a [`Resolution`];
//! once every statement has run (or the first failure stopped the run)
//! [`SavePlan::reconcile`] applies exactly the confirmed effects to the
//! object graph and the mapping context.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use graphsync_core::{
    BatchKey, BatchRow, EntityRef, LiveRelationship, MappedRelationship, MappingError, NodeId,
    NodeKey, ObjectGraph, OperationKind, PropertyMap, Result, SchemaRegistry,
};

use crate::compiler::CompiledStatement;
use crate::context::MappingContext;

/// A relationship endpoint as known at planning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Persisted(NodeId),
    /// Correlation id of the node row creating the endpoint in this plan.
    Correlated(i64),
}

/// One row of a planned batch.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedRow {
    Node {
        /// Correlation id for creates, the store id for updates and deletes.
        reference: i64,
        entity: EntityRef,
        id: Option<NodeId>,
        properties: PropertyMap,
    },
    Relationship {
        reference: i64,
        relationship: LiveRelationship,
        start: Endpoint,
        end: Endpoint,
    },
}

impl PlannedRow {
    pub fn reference(&self) -> i64 {
        match self {
            Self::Node { reference, .. } | Self::Relationship { reference, .. } => *reference,
        }
    }

    /// The row as sent, with endpoints substituted by any ids resolved so far.
    pub fn to_batch_row(&self, resolution: &Resolution) -> BatchRow {
        match self {
            Self::Node {
                reference,
                id,
                properties,
                ..
            } => BatchRow::Node {
                node_ref: *reference,
                node_id: *id,
                properties: properties.clone(),
            },
            Self::Relationship {
                reference,
                start,
                end,
                ..
            } => BatchRow::Relationship {
                rel_ref: *reference,
                start: resolution.endpoint_id(*start),
                end: resolution.endpoint_id(*end),
            },
        }
    }
}

/// Rows of one operation kind sharing a structural key.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub kind: OperationKind,
    pub key: BatchKey,
    pub rows: Vec<PlannedRow>,
}

/// Execution outcome of a plan, filled in statement by statement.
#[derive(Debug, Default)]
pub struct Resolution {
    node_ids: HashMap<i64, NodeId>,
    relationship_ids: HashMap<i64, i64>,
    /// `(batch, row)` pairs the store confirmed.
    executed: HashSet<(usize, usize)>,
    poisoned: BTreeSet<usize>,
}

impl Resolution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store id assigned to the node created under `reference`.
    pub fn node_id(&self, reference: i64) -> Option<NodeId> {
        self.node_ids.get(&reference).copied()
    }

    /// Store id assigned to the relationship created under `reference`.
    pub fn relationship_id(&self, reference: i64) -> Option<i64> {
        self.relationship_ids.get(&reference).copied()
    }

    pub fn is_executed(&self, batch: usize, row: usize) -> bool {
        self.executed.contains(&(batch, row))
    }

    /// Batches whose results could not be trusted.
    pub fn poisoned(&self) -> impl Iterator<Item = usize> + '_ {
        self.poisoned.iter().copied()
    }

    pub fn is_poisoned(&self, batch: usize) -> bool {
        self.poisoned.contains(&batch)
    }

    fn endpoint_id(&self, endpoint: Endpoint) -> i64 {
        match endpoint {
            Endpoint::Persisted(id) => id.0,
            Endpoint::Correlated(reference) => {
                self.node_id(reference).map_or(reference, |id| id.0)
            }
        }
    }
}

/// What a reconciliation applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub nodes_deleted: usize,
    pub relationships_created: usize,
    pub relationships_deleted: usize,
    pub skipped_batches: usize,
}

/// Changes grouped into batches, in execution order.
#[derive(Debug, Clone, Default)]
pub struct SavePlan {
    batches: Vec<Batch>,
    visited: Vec<EntityRef>,
}

impl SavePlan {
    pub(crate) fn new(batches: Vec<Batch>, visited: Vec<EntityRef>) -> Self {
        Self { batches, visited }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, index: usize) -> Option<&Batch> {
        self.batches.get(index)
    }

    /// Indices of the batches of one operation kind.
    pub fn batches_of(&self, kind: OperationKind) -> impl Iterator<Item = usize> + '_ {
        self.batches
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.kind == kind)
            .map(|(i, _)| i)
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|b| b.rows.len()).sum()
    }

    pub fn visited(&self) -> &[EntityRef] {
        &self.visited
    }

    /// Record the outcome of executing one compiled statement.
    ///
    /// `returned` holds the `(reference, store id)` pairs of operations that
    /// return ids: creates, and updates, which return only the rows their
    /// `MATCH` found. It is ignored for the others. A pair naming a reference
    /// the statement did not send poisons the batch.
    pub fn accept(
        &self,
        resolution: &mut Resolution,
        statement: &CompiledStatement,
        returned: &[(i64, i64)],
    ) -> Result<()> {
        let batch = statement.batch;
        let rows = statement.rows.clone();
        let Some(planned) = self.batches.get(batch) else {
            return Err(MappingError::Reconciliation {
                batch,
                correlation: returned.first().map_or(0, |(r, _)| *r),
            });
        };
        let sent = rows.start.min(planned.rows.len())..rows.end.min(planned.rows.len());

        if !planned.kind.returns_ids() {
            resolution.executed.extend(sent.map(|row| (batch, row)));
            return Ok(());
        }

        for &(reference, id) in returned {
            let Some(row) = sent
                .clone()
                .find(|&row| planned.rows[row].reference() == reference)
            else {
                tracing::warn!(batch, correlation = reference, "Unknown correlation id returned");
                resolution.poisoned.insert(batch);
                return Err(MappingError::Reconciliation {
                    batch,
                    correlation: reference,
                });
            };
            resolution.executed.insert((batch, row));
            match planned.kind {
                OperationKind::CreateNodes => {
                    resolution.node_ids.insert(reference, NodeId(id));
                }
                OperationKind::CreateRelationships => {
                    resolution.relationship_ids.insert(reference, id);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply the confirmed effects of an execution.
    ///
    /// Binds new ids into the graph, refreshes node snapshots, registers and
    /// deregisters facts, and refreshes the before pictures of every expanded
    /// entity. Rows that did not execute and poisoned batches leave no trace,
    /// so the next save re-derives them.
    pub fn reconcile(
        &self,
        graph: &mut ObjectGraph,
        context: &mut MappingContext,
        resolution: &Resolution,
        registry: &SchemaRegistry,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let mut unconfirmed: Vec<&LiveRelationship> = Vec::new();
        let mut created: Vec<&LiveRelationship> = Vec::new();

        for (index, batch) in self.batches.iter().enumerate() {
            if resolution.is_poisoned(index) {
                tracing::warn!(batch = index, kind = ?batch.kind, "Skipping poisoned batch");
                summary.skipped_batches += 1;
                unconfirmed.extend(batch.rows.iter().filter_map(|row| match row {
                    PlannedRow::Relationship { relationship, .. } => Some(relationship),
                    PlannedRow::Node { .. } => None,
                }));
                continue;
            }

            for (position, row) in batch.rows.iter().enumerate() {
                let executed = resolution.is_executed(index, position);
                match (batch.kind, row) {
                    (
                        OperationKind::CreateNodes,
                        PlannedRow::Node {
                            reference,
                            entity,
                            properties,
                            ..
                        },
                    ) => {
                        let Some(id) = resolution.node_id(*reference) else {
                            continue;
                        };
                        graph.bind(*entity, id);
                        if let Some(bound) = graph.get(*entity) {
                            context.register_node(id, &bound.type_name, properties);
                        }
                        summary.nodes_created += 1;
                    }
                    (
                        OperationKind::UpdateNodes,
                        PlannedRow::Node {
                            entity,
                            id: Some(id),
                            properties,
                            ..
                        },
                    ) if executed => {
                        if let Some(updated) = graph.get(*entity) {
                            context.register_node(*id, &updated.type_name, properties);
                        }
                        summary.nodes_updated += 1;
                    }
                    (
                        OperationKind::CreateRelationships,
                        PlannedRow::Relationship { relationship, .. },
                    ) => {
                        if executed {
                            created.push(relationship);
                        } else {
                            unconfirmed.push(relationship);
                        }
                    }
                    (
                        OperationKind::DeleteRelationships,
                        PlannedRow::Relationship { relationship, .. },
                    ) if executed => {
                        if let Some(fact) = relationship.to_mapped() {
                            context.deregister_relationship(&fact);
                            summary.relationships_deleted += 1;
                        }
                    }
                    (
                        OperationKind::DeleteNodes,
                        PlannedRow::Node {
                            entity,
                            id: Some(id),
                            ..
                        },
                    ) if executed => {
                        context.deregister_node(*id);
                        graph.unbind(*entity);
                        summary.nodes_deleted += 1;
                    }
                    _ => {}
                }
            }
        }

        // Endpoints are bound now, so transient keys resolve to store ids.
        for relationship in created {
            if let Some(fact) = bind_endpoints(graph, relationship) {
                context.register_relationship(fact);
                summary.relationships_created += 1;
            }
        }
        let unconfirmed: HashSet<MappedRelationship> = unconfirmed
            .into_iter()
            .filter_map(|rel| bind_endpoints(graph, rel))
            .collect();

        for &entity in &self.visited {
            let refreshed = context.remember_where(registry, graph, entity, |fact| {
                !unconfirmed.contains(fact)
            });
            if let Err(error) = refreshed {
                tracing::warn!(%entity, %error, "Could not refresh before picture");
            }
        }

        tracing::info!(
            nodes_created = summary.nodes_created,
            nodes_updated = summary.nodes_updated,
            nodes_deleted = summary.nodes_deleted,
            relationships_created = summary.relationships_created,
            relationships_deleted = summary.relationships_deleted,
            skipped_batches = summary.skipped_batches,
            "Reconciled save plan"
        );
        summary
    }
}

/// The stored form of a live relationship, resolving transient endpoints
/// through the ids bound into the graph.
fn bind_endpoints(
    graph: &ObjectGraph,
    relationship: &LiveRelationship,
) -> Option<MappedRelationship> {
    let resolve = |key: NodeKey| match key {
        NodeKey::Persisted(id) => Some(id),
        NodeKey::Transient(entity) => graph.get(entity).and_then(|e| e.id),
    };
    Some(MappedRelationship::new(
        resolve(relationship.start)?,
        relationship.rel_type.clone(),
        resolve(relationship.end)?,
        relationship.start_type.clone(),
        relationship.end_type.clone(),
    ))
}
