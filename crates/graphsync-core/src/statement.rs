//! Statement model and the pluggable statement factory seam.
//!
//! The compiler knows batches and rows; a [`StatementFactory`] knows the query
//! language. A [`Statement`] serializes to the shape accepted by the Neo4j
//! HTTP transactional endpoint.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::{NodeId, PropertyMap};

/// The five write operations, in mandatory execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateNodes,
    CreateRelationships,
    UpdateNodes,
    DeleteRelationships,
    DeleteNodes,
}

impl OperationKind {
    /// Nodes before the relationships that reference them; relationship
    /// deletes before node deletes.
    pub const ORDER: [OperationKind; 5] = [
        Self::CreateNodes,
        Self::CreateRelationships,
        Self::UpdateNodes,
        Self::DeleteRelationships,
        Self::DeleteNodes,
    ];

    /// Whether executing this operation returns (reference, store id) rows.
    ///
    /// Updates return one row per node their `MATCH` found.
    pub fn returns_ids(&self) -> bool {
        matches!(
            self,
            Self::CreateNodes | Self::CreateRelationships | Self::UpdateNodes
        )
    }
}

/// Structural key rows are grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BatchKey {
    /// Exact, normalized label set of a node batch.
    Labels(Vec<String>),
    /// Relationship type plus endpoint type bounds.
    Relationship {
        rel_type: String,
        start_type: String,
        end_type: String,
    },
}

/// A row of a batch.
///
/// Correlation ids are negative; store ids are non-negative. Endpoints of a
/// relationship row hold the store id once known, else the correlation id of
/// the node row that will create the node.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchRow {
    Node {
        node_ref: i64,
        node_id: Option<NodeId>,
        properties: PropertyMap,
    },
    Relationship {
        rel_ref: i64,
        start: i64,
        end: i64,
    },
}

impl BatchRow {
    /// Row parameters as sent to the store.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Node {
                node_ref,
                node_id,
                properties,
            } => json!({
                "nodeRef": node_ref,
                "nodeId": node_id.map(|id| id.0),
                "props": serde_json::to_value(properties).unwrap_or_default(),
            }),
            Self::Relationship {
                rel_ref,
                start,
                end,
            } => json!({
                "relRef": rel_ref,
                "startNodeId": start,
                "endNodeId": end,
            }),
        }
    }
}

/// Everything a factory needs to render one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDescriptor {
    pub kind: OperationKind,
    pub key: BatchKey,
    pub rows: Vec<BatchRow>,
}

impl BatchDescriptor {
    /// Labels of a node batch (empty for relationship batches).
    pub fn labels(&self) -> &[String] {
        match &self.key {
            BatchKey::Labels(labels) => labels,
            BatchKey::Relationship { .. } => &[],
        }
    }

    /// Relationship type of a relationship batch.
    pub fn rel_type(&self) -> Option<&str> {
        match &self.key {
            BatchKey::Relationship { rel_type, .. } => Some(rel_type),
            BatchKey::Labels(_) => None,
        }
    }
}

/// Result formats requested from the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    Row,
    Graph,
}

/// An executable statement: query text plus parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub statement: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "resultDataContents", default)]
    pub result_data_contents: BTreeSet<ResultShape>,
    #[serde(rename = "includeStats", default)]
    pub include_stats: bool,
}

impl Statement {
    pub fn new(
        statement: impl Into<String>,
        parameters: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            statement: statement.into(),
            parameters,
            result_data_contents: BTreeSet::new(),
            include_stats: false,
        }
    }

    pub fn with_result_shape(mut self, shape: ResultShape) -> Self {
        self.result_data_contents.insert(shape);
        self
    }

    pub fn with_stats(mut self, include_stats: bool) -> Self {
        self.include_stats = include_stats;
        self
    }

    /// The `rows` parameter of a bulk statement.
    pub fn rows(&self) -> Option<&Vec<serde_json::Value>> {
        self.parameters.get("rows").and_then(|v| v.as_array())
    }
}

/// Renders batches into statements of a concrete query language.
pub trait StatementFactory: Send + Sync {
    fn render(&self, kind: OperationKind, batch: &BatchDescriptor) -> Statement;

    /// Upper bound on rows per statement; `None` sends a batch whole.
    fn max_rows(&self) -> Option<usize> {
        None
    }
}
