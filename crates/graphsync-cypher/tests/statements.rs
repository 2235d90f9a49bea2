//! Statements produced for folder/document graphs, without a database.

use graphsync_core::{
    Entity, EntityDescriptor, EntityRef, ObjectGraph, OperationKind, SchemaRegistry,
};
use graphsync_cypher::{RowStatementFactory, SingleRowStatementFactory};
use graphsync_mapper::{Compiler, GraphMapper, MappingContext, Resolution, SavePlan};

const CREATE_FOLDER: &str =
    "UNWIND $rows as row CREATE (n:`Folder`) SET n=row.props RETURN row.nodeRef as nodeRef, ID(n) as nodeId";
const CREATE_DOCUMENT: &str =
    "UNWIND $rows as row CREATE (n:`Document`) SET n=row.props RETURN row.nodeRef as nodeRef, ID(n) as nodeId";
const MERGE_CONTAINS: &str = "UNWIND $rows as row MATCH (startNode) WHERE ID(startNode) = row.startNodeId \
     MATCH (endNode) WHERE ID(endNode) = row.endNodeId \
     MERGE (startNode)-[rel:`CONTAINS`]->(endNode) RETURN row.relRef as relRef, ID(rel) as relId";

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

fn plan(
    compiler: &Compiler,
    registry: &SchemaRegistry,
    graph: &ObjectGraph,
    root: EntityRef,
) -> SavePlan {
    let context = MappingContext::new();
    let changes = GraphMapper::new(registry, &context).map(graph, root);
    compiler.compile(&changes)
}

fn texts(compiler: &Compiler, plan: &SavePlan, kind: OperationKind) -> Vec<String> {
    compiler
        .statements(plan, kind, &Resolution::new())
        .into_iter()
        .map(|s| s.statement.statement)
        .collect()
}

#[test]
fn new_folder_document_pair_from_either_side() {
    let registry = registry();
    let compiler = Compiler::new(RowStatementFactory);
    let mut graph = ObjectGraph::new();
    let folder = graph.add(Entity::new("Folder").with_property("name", "f"));
    let doc = graph.add(Entity::new("Document").with_property("name", "d"));
    graph.link(folder, "documents", doc);
    graph.link(doc, "folder", folder);

    for root in [folder, doc] {
        let plan = plan(&compiler, &registry, &graph, root);
        let creates = texts(&compiler, &plan, OperationKind::CreateNodes);
        assert_eq!(creates.len(), 2);
        assert!(creates.contains(&CREATE_FOLDER.to_string()));
        assert!(creates.contains(&CREATE_DOCUMENT.to_string()));

        let rels = texts(&compiler, &plan, OperationKind::CreateRelationships);
        assert_eq!(rels, vec![MERGE_CONTAINS.to_string()]);
    }
}

#[test]
fn folder_with_two_documents_batches_rows() {
    let registry = registry();
    let compiler = Compiler::new(RowStatementFactory);
    let mut graph = ObjectGraph::new();
    let folder = graph.add(Entity::new("Folder"));
    for name in ["a", "b"] {
        let doc = graph.add(Entity::new("Document").with_property("name", name));
        graph.link(folder, "documents", doc);
        graph.link(doc, "folder", folder);
    }

    let plan = plan(&compiler, &registry, &graph, folder);
    let creates = compiler.statements(&plan, OperationKind::CreateNodes, &Resolution::new());
    let row_counts: Vec<(String, usize)> = creates
        .iter()
        .map(|s| (s.statement.statement.clone(), s.statement.rows().map_or(0, Vec::len)))
        .collect();
    assert!(row_counts.contains(&(CREATE_FOLDER.to_string(), 1)));
    assert!(row_counts.contains(&(CREATE_DOCUMENT.to_string(), 2)));

    let rels = compiler.statements(&plan, OperationKind::CreateRelationships, &Resolution::new());
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].statement.rows().map_or(0, Vec::len), 2);
}

#[test]
fn duplicate_document_reference_sends_one_row() {
    let registry = registry();
    let compiler = Compiler::new(RowStatementFactory);
    let mut graph = ObjectGraph::new();
    let folder = graph.add(Entity::new("Folder"));
    let doc = graph.add(Entity::new("Document"));
    graph.link(folder, "documents", doc);
    graph.link(folder, "documents", doc);
    graph.link(doc, "folder", folder);

    let plan = plan(&compiler, &registry, &graph, folder);
    let rels = compiler.statements(&plan, OperationKind::CreateRelationships, &Resolution::new());
    assert_eq!(rels[0].statement.rows().map_or(0, Vec::len), 1);
}

#[test]
fn single_row_factory_emits_a_statement_per_row() {
    let registry = registry();
    let compiler = Compiler::new(SingleRowStatementFactory);
    let mut graph = ObjectGraph::new();
    let folder = graph.add(Entity::new("Folder"));
    for _ in 0..3 {
        let doc = graph.add(Entity::new("Document"));
        graph.link(folder, "documents", doc);
    }

    let plan = plan(&compiler, &registry, &graph, folder);
    let creates = compiler.statements(&plan, OperationKind::CreateNodes, &Resolution::new());
    assert_eq!(creates.len(), 4);
    assert!(creates.iter().all(|s| s.statement.rows().is_none()));
    assert!(creates
        .iter()
        .all(|s| s.statement.parameters["nodeRef"].as_i64().is_some_and(|r| r < 0)));

    let rels = compiler.statements(&plan, OperationKind::CreateRelationships, &Resolution::new());
    assert_eq!(rels.len(), 3);
}
