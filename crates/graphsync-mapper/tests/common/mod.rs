#![allow(dead_code)]

use std::collections::HashSet;

use graphsync_core::{
    BatchDescriptor, BatchKey, BatchRow, ChangeSet, EntityDescriptor, EntityRef, ObjectGraph,
    OperationKind, SchemaRegistry, Statement, StatementFactory,
};
use graphsync_mapper::{
    CompiledStatement, Compiler, GraphMapper, MappingContext, ReconcileSummary, Resolution,
    SavePlan,
};

/// Folders hold documents (CONTAINS) and archive them (ARCHIVED); documents
/// point back at their folder.
pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with(
            EntityDescriptor::new("Folder")
                .property("name")
                .outgoing("documents", "CONTAINS", "Document")
                .outgoing("archived", "ARCHIVED", "Document"),
        )
        .with(
            EntityDescriptor::new("Document")
                .property("name")
                .incoming("folder", "CONTAINS", "Folder"),
        )
}

/// Renders a readable description instead of a query.
pub struct Describe;

impl StatementFactory for Describe {
    fn render(&self, kind: OperationKind, batch: &BatchDescriptor) -> Statement {
        let mut params = serde_json::Map::new();
        params.insert(
            "rows".to_string(),
            batch.rows.iter().map(BatchRow::to_json).collect(),
        );
        Statement::new(format!("{kind:?} {:?}", batch.key), params)
    }
}

/// Executes statements against nothing, handing out sequential ids.
#[derive(Default)]
pub struct FakeStore {
    next_id: i64,
    /// Return bogus correlation ids for node batches carrying this label.
    pub corrupt_label: Option<String>,
    /// Node ids an update `MATCH` no longer finds.
    pub missing: HashSet<i64>,
    pub executed: Vec<CompiledStatement>,
}

impl FakeStore {
    fn mint(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn execute(&mut self, compiler: &Compiler, plan: &SavePlan) -> Resolution {
        let mut resolution = Resolution::new();
        for kind in OperationKind::ORDER {
            for compiled in compiler.statements(plan, kind, &resolution) {
                let rows = compiled.statement.rows().cloned().unwrap_or_default();
                let mut returned = Vec::new();
                match kind {
                    OperationKind::CreateNodes => {
                        for row in &rows {
                            let reference = row["nodeRef"].as_i64().unwrap();
                            returned.push((reference, self.mint()));
                        }
                    }
                    OperationKind::CreateRelationships => {
                        for row in &rows {
                            // MATCH on an unresolved endpoint finds nothing.
                            let start = row["startNodeId"].as_i64().unwrap();
                            let end = row["endNodeId"].as_i64().unwrap();
                            if start < 0 || end < 0 {
                                continue;
                            }
                            returned.push((row["relRef"].as_i64().unwrap(), self.mint()));
                        }
                    }
                    OperationKind::UpdateNodes => {
                        for row in &rows {
                            let id = row["nodeId"].as_i64().unwrap();
                            if !self.missing.contains(&id) {
                                returned.push((row["nodeRef"].as_i64().unwrap(), id));
                            }
                        }
                    }
                    _ => {}
                }

                let corrupt = match (&self.corrupt_label, plan.batch(compiled.batch)) {
                    (Some(label), Some(batch)) => {
                        matches!(&batch.key, BatchKey::Labels(labels) if labels.contains(label))
                    }
                    _ => false,
                };
                if corrupt {
                    for pair in &mut returned {
                        pair.0 -= 1000;
                    }
                }

                let _ = plan.accept(&mut resolution, &compiled, &returned);
                self.executed.push(compiled);
            }
        }
        resolution
    }
}

/// A registry, a session context and a fake store wired together.
pub struct Harness {
    pub registry: SchemaRegistry,
    pub context: MappingContext,
    pub compiler: Compiler,
    pub store: FakeStore,
    pub max_depth: Option<usize>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            registry: registry(),
            context: MappingContext::new(),
            compiler: Compiler::new(Describe),
            store: FakeStore::default(),
            max_depth: None,
        }
    }

    pub fn diff(&self, graph: &ObjectGraph, roots: &[EntityRef]) -> ChangeSet {
        GraphMapper::new(&self.registry, &self.context)
            .with_max_depth(self.max_depth)
            .map_all(graph, roots)
    }

    pub fn plan(&self, graph: &ObjectGraph, roots: &[EntityRef]) -> SavePlan {
        self.compiler.compile(&self.diff(graph, roots))
    }

    pub fn save(
        &mut self,
        graph: &mut ObjectGraph,
        roots: &[EntityRef],
    ) -> (SavePlan, ReconcileSummary) {
        let changes = self.diff(graph, roots);
        self.apply(graph, &changes)
    }

    pub fn delete(
        &mut self,
        graph: &mut ObjectGraph,
        entity: EntityRef,
    ) -> (SavePlan, ReconcileSummary) {
        let changes = GraphMapper::new(&self.registry, &self.context).map_delete(graph, entity);
        self.apply(graph, &changes)
    }

    pub fn apply(
        &mut self,
        graph: &mut ObjectGraph,
        changes: &ChangeSet,
    ) -> (SavePlan, ReconcileSummary) {
        let plan = self.compiler.compile(changes);
        let resolution = self.store.execute(&self.compiler, &plan);
        let summary = plan.reconcile(graph, &mut self.context, &resolution, &self.registry);
        (plan, summary)
    }
}

/// Rows of every batch of `kind` as `(batch key, row count)`.
pub fn shape(plan: &SavePlan, kind: OperationKind) -> Vec<(BatchKey, usize)> {
    plan.batches()
        .iter()
        .filter(|b| b.kind == kind)
        .map(|b| (b.key.clone(), b.rows.len()))
        .collect()
}

pub fn labels(label: &str) -> BatchKey {
    BatchKey::Labels(vec![label.to_string()])
}

pub fn rel_key(rel_type: &str) -> BatchKey {
    BatchKey::Relationship {
        rel_type: rel_type.to_string(),
        start_type: "Folder".to_string(),
        end_type: "Document".to_string(),
    }
}
