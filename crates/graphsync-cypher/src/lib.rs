//! graphsync-cypher: Cypher rendering and Neo4j execution for graphsync.
//!
//! This crate is the only place graphsync talks to a store. It provides the
//! Cypher statement factories plugged into the compiler, read-query shaping,
//! a pooled Neo4j client, and sessions that run the full
//! diff → compile → execute → reconcile cycle.

pub mod client;
pub mod params;
pub mod queries;
pub mod session;
pub mod statements;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use queries::{CypherQuery, Pagination, SortDirection, SortOrder};
pub use session::{compiler_for, GraphSession, SaveReport};
pub use statements::{RowStatementFactory, SingleRowStatementFactory};
