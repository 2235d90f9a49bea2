//! Unit-of-work sessions against Neo4j.
//!
//! A session owns one mapping context. Every save diffs, compiles, executes
//! operation by operation and reconciles, so the context only ever reflects
//! writes the store confirmed.

use std::sync::Arc;

use serde::Serialize;

use graphsync_core::{
    ChangeSet, EntityRef, MapperConfig, ObjectGraph, OperationKind, SchemaRegistry, StatementForm,
};
use graphsync_mapper::{
    CompiledStatement, Compiler, GraphMapper, MappingContext, ReconcileSummary, Resolution,
    SavePlan,
};

use crate::client::{GraphClient, GraphError};
use crate::statements::{RowStatementFactory, SingleRowStatementFactory};

/// Outcome of one save or delete.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SaveReport {
    pub summary: ReconcileSummary,
    pub statements: usize,
    pub diagnostics: Vec<String>,
}

/// Build the compiler selected by configuration.
pub fn compiler_for(config: &MapperConfig) -> Compiler {
    let compiler = match config.statement_form {
        StatementForm::Row => Compiler::new(RowStatementFactory),
        StatementForm::Single => Compiler::new(SingleRowStatementFactory),
    };
    compiler.with_stats(config.include_stats)
}

pub struct GraphSession {
    client: GraphClient,
    registry: Arc<SchemaRegistry>,
    context: MappingContext,
    compiler: Compiler,
    max_depth: Option<usize>,
}

impl GraphSession {
    pub fn new(client: GraphClient, registry: Arc<SchemaRegistry>, config: &MapperConfig) -> Self {
        Self {
            client,
            registry,
            context: MappingContext::new(),
            compiler: compiler_for(config),
            max_depth: config.max_depth,
        }
    }

    pub fn context(&self) -> &MappingContext {
        &self.context
    }

    /// Mutable access, e.g. to register entities loaded by a query.
    pub fn context_mut(&mut self) -> &mut MappingContext {
        &mut self.context
    }

    /// Forget all session state.
    pub fn clear(&mut self) {
        self.context.clear();
    }

    /// Diff without writing.
    pub fn diff(&self, graph: &ObjectGraph, roots: &[EntityRef]) -> ChangeSet {
        GraphMapper::new(&self.registry, &self.context)
            .with_max_depth(self.max_depth)
            .map_all(graph, roots)
    }

    /// Diff and compile without writing.
    pub fn plan(&self, graph: &ObjectGraph, roots: &[EntityRef]) -> SavePlan {
        self.compiler.compile(&self.diff(graph, roots))
    }

    pub async fn save(
        &mut self,
        graph: &mut ObjectGraph,
        root: EntityRef,
    ) -> Result<SaveReport, GraphError> {
        self.save_all(graph, &[root]).await
    }

    pub async fn save_all(
        &mut self,
        graph: &mut ObjectGraph,
        roots: &[EntityRef],
    ) -> Result<SaveReport, GraphError> {
        let changes = self.diff(graph, roots);
        self.apply(graph, changes).await
    }

    /// Delete the node of `entity` and every relationship touching it.
    pub async fn delete(
        &mut self,
        graph: &mut ObjectGraph,
        entity: EntityRef,
    ) -> Result<SaveReport, GraphError> {
        let changes = GraphMapper::new(&self.registry, &self.context).map_delete(graph, entity);
        self.apply(graph, changes).await
    }

    async fn apply(
        &mut self,
        graph: &mut ObjectGraph,
        changes: ChangeSet,
    ) -> Result<SaveReport, GraphError> {
        let diagnostics: Vec<String> = changes.diagnostics.iter().map(|d| d.to_string()).collect();
        let plan = self.compiler.compile(&changes);

        let mut resolution = Resolution::new();
        let mut statements = 0;
        let outcome = self
            .execute(&plan, &mut resolution, &mut statements)
            .await;

        // Reconcile whatever executed, even when a statement failed.
        let summary = plan.reconcile(graph, &mut self.context, &resolution, &self.registry);
        if let Err(error) = outcome {
            tracing::error!(%error, statements, "Save aborted");
            return Err(error);
        }

        tracing::info!(
            statements,
            diagnostics = diagnostics.len(),
            "Save complete"
        );
        Ok(SaveReport {
            summary,
            statements,
            diagnostics,
        })
    }

    async fn execute(
        &self,
        plan: &SavePlan,
        resolution: &mut Resolution,
        executed: &mut usize,
    ) -> Result<(), GraphError> {
        for kind in OperationKind::ORDER {
            for compiled in self.compiler.statements(plan, kind, resolution) {
                let rows = self.client.execute(&compiled.statement).await?;
                *executed += 1;

                let returned = returned_ids(&compiled, &rows)?;
                if let Err(error) = plan.accept(resolution, &compiled, &returned) {
                    tracing::warn!(%error, batch = compiled.batch, "Batch results rejected");
                }
            }
        }
        Ok(())
    }
}

/// `(correlation id, store id)` pairs returned by a create statement.
fn returned_ids(
    compiled: &CompiledStatement,
    rows: &[neo4rs::Row],
) -> Result<Vec<(i64, i64)>, GraphError> {
    let (ref_column, id_column) = match compiled.kind {
        OperationKind::CreateNodes | OperationKind::UpdateNodes => ("nodeRef", "nodeId"),
        OperationKind::CreateRelationships => ("relRef", "relId"),
        _ => return Ok(Vec::new()),
    };

    rows.iter()
        .map(|row| {
            let reference: i64 = row.get(ref_column).map_err(|e| {
                GraphError::Serialization(format!("Failed to read {ref_column}: {e}"))
            })?;
            let id: i64 = row.get(id_column).map_err(|e| {
                GraphError::Serialization(format!("Failed to read {id_column}: {e}"))
            })?;
            Ok((reference, id))
        })
        .collect()
}
