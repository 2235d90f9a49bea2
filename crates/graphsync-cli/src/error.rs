//! Error types for the graphsync-cli crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Root entity {index} is out of range (graph has {len} entities)")]
    UnknownRoot { index: usize, len: usize },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Mapping error: {0}")]
    Mapping(#[from] graphsync_core::MappingError),

    #[error("Graph error: {0}")]
    Graph(#[from] graphsync_cypher::GraphError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
