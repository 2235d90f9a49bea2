//! Dry runs: the statements a save would execute, without a database.

use serde::Serialize;

use graphsync_core::{
    EntityRef, MapperConfig, ObjectGraph, OperationKind, SchemaRegistry, Statement,
};
use graphsync_cypher::compiler_for;
use graphsync_mapper::{GraphMapper, MappingContext, Resolution};

/// One rendered statement of a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStatement {
    pub kind: OperationKind,
    pub batch: usize,
    pub rows: usize,
    pub statement: Statement,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DryRun {
    pub statements: Vec<PlannedStatement>,
    pub diagnostics: Vec<String>,
}

/// Diff `roots` against an empty context and render every statement.
///
/// Nothing executes, so endpoints of new nodes keep their negative
/// correlation ids in relationship rows.
pub fn dry_run(
    registry: &SchemaRegistry,
    graph: &ObjectGraph,
    roots: &[EntityRef],
    config: &MapperConfig,
) -> DryRun {
    let context = MappingContext::new();
    let changes = GraphMapper::new(registry, &context)
        .with_max_depth(config.max_depth)
        .map_all(graph, roots);

    let compiler = compiler_for(config);
    let plan = compiler.compile(&changes);
    let resolution = Resolution::new();

    let statements = OperationKind::ORDER
        .into_iter()
        .flat_map(|kind| compiler.statements(&plan, kind, &resolution))
        .map(|compiled| PlannedStatement {
            kind: compiled.kind,
            batch: compiled.batch,
            rows: compiled.rows.len(),
            statement: compiled.statement,
        })
        .collect();

    DryRun {
        statements,
        diagnostics: changes.diagnostics.iter().map(|d| d.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use graphsync_core::{Entity, EntityDescriptor, StatementForm};

    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with(
                EntityDescriptor::new("Folder")
                    .property("name")
                    .outgoing("documents", "CONTAINS", "Document"),
            )
            .with(EntityDescriptor::new("Document").property("name"))
    }

    fn folder_graph() -> (ObjectGraph, EntityRef) {
        let mut graph = ObjectGraph::new();
        let folder = graph.add(Entity::new("Folder").with_property("name", "f"));
        for name in ["a", "b"] {
            let doc = graph.add(Entity::new("Document").with_property("name", name));
            graph.link(folder, "documents", doc);
        }
        (graph, folder)
    }

    #[test]
    fn test_dry_run_orders_statements() {
        let (graph, folder) = folder_graph();
        let run = dry_run(&registry(), &graph, &[folder], &MapperConfig::default());

        let kinds: Vec<OperationKind> = run.statements.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::CreateNodes,
                OperationKind::CreateNodes,
                OperationKind::CreateRelationships,
            ]
        );
        assert_eq!(run.statements[2].rows, 2);
        assert!(run.diagnostics.is_empty());
    }

    #[test]
    fn test_dry_run_single_statements() {
        let (graph, folder) = folder_graph();
        let config = MapperConfig {
            statement_form: StatementForm::Single,
            ..Default::default()
        };
        let run = dry_run(&registry(), &graph, &[folder], &config);
        assert_eq!(run.statements.len(), 5);
        assert!(run.statements.iter().all(|s| s.rows == 1));
    }

    #[test]
    fn test_dry_run_reports_diagnostics() {
        let (mut graph, folder) = folder_graph();
        let stray = graph.add(Entity::new("Unmapped"));
        graph.link(folder, "documents", stray);

        let run = dry_run(&registry(), &graph, &[folder], &MapperConfig::default());
        assert_eq!(run.diagnostics.len(), 1);
        let json = serde_json::to_value(&run).unwrap();
        assert!(json["statements"].is_array());
    }
}
