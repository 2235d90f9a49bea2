//! Compiler: change-set → batched save plan → rendered statements.

use std::collections::HashMap;
use std::ops::Range;

use graphsync_core::{
    BatchDescriptor, BatchKey, Change, ChangeSet, EntityRef, NodeKey, OperationKind, Statement,
    StatementFactory,
};

use crate::plan::{Batch, Endpoint, PlannedRow, Resolution, SavePlan};

/// A rendered statement and the slice of the plan it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub kind: OperationKind,
    pub batch: usize,
    pub rows: Range<usize>,
    pub statement: Statement,
}

/// Groups changes into batches and renders them through a statement factory.
pub struct Compiler {
    factory: Box<dyn StatementFactory>,
    include_stats: bool,
}

impl Compiler {
    pub fn new(factory: impl StatementFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            include_stats: false,
        }
    }

    /// Swap the statement factory used for rendering.
    pub fn use_statement_factory(&mut self, factory: impl StatementFactory + 'static) {
        self.factory = Box::new(factory);
    }

    pub fn with_stats(mut self, include_stats: bool) -> Self {
        self.include_stats = include_stats;
        self
    }

    /// Group a change-set into batches.
    ///
    /// Node rows group by exact label set, relationship rows by type and
    /// endpoint type bounds. Groups keep first-appearance order within each
    /// operation kind. New nodes and new relationships get negative
    /// correlation ids, unique within the plan.
    pub fn compile(&self, changes: &ChangeSet) -> SavePlan {
        let mut batches: Vec<Batch> = Vec::new();
        let mut index: HashMap<(OperationKind, BatchKey), usize> = HashMap::new();
        let mut push = |kind: OperationKind, key: BatchKey, row: PlannedRow| {
            let slot = *index.entry((kind, key.clone())).or_insert_with(|| {
                batches.push(Batch {
                    kind,
                    key,
                    rows: Vec::new(),
                });
                batches.len() - 1
            });
            batches[slot].rows.push(row);
        };

        let mut next_reference = -1i64;
        let mut mint = || {
            let reference = next_reference;
            next_reference -= 1;
            reference
        };

        // Node creates first, so relationship rows can correlate with them.
        let mut created: HashMap<EntityRef, i64> = HashMap::new();
        for change in &changes.changes {
            if let Change::CreateNode {
                entity,
                labels,
                properties,
            } = change
            {
                let reference = mint();
                created.insert(*entity, reference);
                push(
                    OperationKind::CreateNodes,
                    BatchKey::Labels(labels.clone()),
                    PlannedRow::Node {
                        reference,
                        entity: *entity,
                        id: None,
                        properties: properties.clone(),
                    },
                );
            }
        }

        let endpoint = |key: NodeKey| match key {
            NodeKey::Persisted(id) => Some(Endpoint::Persisted(id)),
            NodeKey::Transient(entity) => created.get(&entity).copied().map(Endpoint::Correlated),
        };

        for change in &changes.changes {
            match change {
                Change::CreateNode { .. } => {}
                Change::UpdateNode {
                    entity,
                    id,
                    labels,
                    properties,
                } => push(
                    OperationKind::UpdateNodes,
                    BatchKey::Labels(labels.clone()),
                    PlannedRow::Node {
                        reference: id.0,
                        entity: *entity,
                        id: Some(*id),
                        properties: properties.clone(),
                    },
                ),
                Change::CreateRelationship(relationship) => {
                    let (Some(start), Some(end)) =
                        (endpoint(relationship.start), endpoint(relationship.end))
                    else {
                        tracing::warn!(
                            %relationship,
                            "Relationship endpoint is never created, skipping"
                        );
                        continue;
                    };
                    push(
                        OperationKind::CreateRelationships,
                        BatchKey::Relationship {
                            rel_type: relationship.rel_type.clone(),
                            start_type: relationship.start_type.clone(),
                            end_type: relationship.end_type.clone(),
                        },
                        PlannedRow::Relationship {
                            reference: mint(),
                            relationship: relationship.clone(),
                            start,
                            end,
                        },
                    );
                }
                Change::DeleteRelationship(fact) => push(
                    OperationKind::DeleteRelationships,
                    BatchKey::Relationship {
                        rel_type: fact.rel_type.clone(),
                        start_type: fact.start_type.clone(),
                        end_type: fact.end_type.clone(),
                    },
                    PlannedRow::Relationship {
                        reference: mint(),
                        relationship: fact.into(),
                        start: Endpoint::Persisted(fact.start),
                        end: Endpoint::Persisted(fact.end),
                    },
                ),
                Change::DeleteNode { entity, id, labels } => push(
                    OperationKind::DeleteNodes,
                    BatchKey::Labels(labels.clone()),
                    PlannedRow::Node {
                        reference: id.0,
                        entity: *entity,
                        id: Some(*id),
                        properties: Default::default(),
                    },
                ),
            }
        }

        // Stable: first-appearance order survives within each kind.
        batches.sort_by_key(|b| b.kind);

        let plan = SavePlan::new(batches, changes.visited.clone());
        tracing::debug!(
            batches = plan.batches().len(),
            rows = plan.row_count(),
            "Compiled save plan"
        );
        plan
    }

    /// Render the batches of one operation kind.
    ///
    /// Relationship endpoints are substituted with whatever ids `resolution`
    /// holds, so render creates only after the node creates they depend on
    /// have been accepted.
    pub fn statements(
        &self,
        plan: &SavePlan,
        kind: OperationKind,
        resolution: &Resolution,
    ) -> Vec<CompiledStatement> {
        let mut statements = Vec::new();
        for index in plan.batches_of(kind) {
            let Some(batch) = plan.batch(index) else {
                continue;
            };
            let chunk = self
                .factory
                .max_rows()
                .unwrap_or(batch.rows.len())
                .max(1);

            let mut start = 0;
            while start < batch.rows.len() {
                let rows = start..(start + chunk).min(batch.rows.len());
                let descriptor = BatchDescriptor {
                    kind,
                    key: batch.key.clone(),
                    rows: batch.rows[rows.clone()]
                        .iter()
                        .map(|row| row.to_batch_row(resolution))
                        .collect(),
                };
                let statement = self
                    .factory
                    .render(kind, &descriptor)
                    .with_stats(self.include_stats);
                start = rows.end;
                statements.push(CompiledStatement {
                    kind,
                    batch: index,
                    rows,
                    statement,
                });
            }
        }
        statements
    }
}
