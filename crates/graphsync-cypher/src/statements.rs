//! Cypher statement factories.
//!
//! Two renderings of the same five operations:
//! - [`RowStatementFactory`] sends a whole batch as `$rows` and `UNWIND`s it
//! - [`SingleRowStatementFactory`] sends one row per statement as plain
//!   parameters
//!
//! Nodes are addressed by internal id. Relationship creates `MERGE` on
//! `(start, type, end)` and are safe to retry; node creates are not.

use serde_json::Value;

use graphsync_core::{BatchDescriptor, OperationKind, ResultShape, Statement, StatementFactory};

/// `` :`A`:`B` `` label fragment.
fn label_fragment(labels: &[String]) -> String {
    labels.iter().map(|l| format!(":`{l}`")).collect()
}

fn rel_type(batch: &BatchDescriptor) -> &str {
    batch.rel_type().unwrap_or_default()
}

/// Cypher text for one operation, reading row fields through `row` (`row.`
/// for unwound batches, `$` for plain parameters).
fn cypher(kind: OperationKind, batch: &BatchDescriptor, row: &str) -> String {
    match kind {
        OperationKind::CreateNodes => format!(
            "CREATE (n{}) SET n={row}props RETURN {row}nodeRef as nodeRef, ID(n) as nodeId",
            label_fragment(batch.labels())
        ),
        OperationKind::CreateRelationships => format!(
            "MATCH (startNode) WHERE ID(startNode) = {row}startNodeId \
             MATCH (endNode) WHERE ID(endNode) = {row}endNodeId \
             MERGE (startNode)-[rel:`{}`]->(endNode) \
             RETURN {row}relRef as relRef, ID(rel) as relId",
            rel_type(batch)
        ),
        OperationKind::UpdateNodes => format!(
            "MATCH (n) WHERE ID(n)={row}nodeId SET n{} SET n += {row}props \
             RETURN {row}nodeRef as nodeRef, ID(n) as nodeId",
            label_fragment(batch.labels())
        ),
        OperationKind::DeleteRelationships => format!(
            "MATCH (startNode) WHERE ID(startNode) = {row}startNodeId \
             MATCH (endNode) WHERE ID(endNode) = {row}endNodeId \
             MATCH (startNode)-[rel:`{}`]->(endNode) DELETE rel",
            rel_type(batch)
        ),
        OperationKind::DeleteNodes => {
            format!("MATCH (n) WHERE ID(n) = {row}nodeId DETACH DELETE n")
        }
    }
}

/// Renders each batch as one `UNWIND $rows` statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowStatementFactory;

impl StatementFactory for RowStatementFactory {
    fn render(&self, kind: OperationKind, batch: &BatchDescriptor) -> Statement {
        let rows: Vec<Value> = batch.rows.iter().map(|r| r.to_json()).collect();
        let mut parameters = serde_json::Map::new();
        parameters.insert("rows".to_string(), Value::Array(rows));

        Statement::new(
            format!("UNWIND $rows as row {}", cypher(kind, batch, "row.")),
            parameters,
        )
        .with_result_shape(ResultShape::Row)
    }
}

/// Renders one statement per row, with the row's fields as parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRowStatementFactory;

impl StatementFactory for SingleRowStatementFactory {
    fn render(&self, kind: OperationKind, batch: &BatchDescriptor) -> Statement {
        // The compiler never hands this factory more than one row.
        let parameters = match batch.rows.first().map(|r| r.to_json()) {
            Some(Value::Object(fields)) => fields,
            _ => serde_json::Map::new(),
        };

        Statement::new(cypher(kind, batch, "$"), parameters).with_result_shape(ResultShape::Row)
    }

    fn max_rows(&self) -> Option<usize> {
        Some(1)
    }
}
