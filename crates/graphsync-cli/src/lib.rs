//! graphsync-cli: dry runs and saves of JSON object graphs.
//!
//! Reads a schema (a JSON array of entity descriptors) and an object graph,
//! diffs the graph against a fresh mapping context and either prints the
//! statements it would run or executes them against Neo4j.

pub mod config;
pub mod error;
pub mod input;
pub mod report;
