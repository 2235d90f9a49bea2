//! Schema and object-graph files.

use std::path::Path;

use graphsync_core::{EntityRef, MappingError, ObjectGraph, SchemaRegistry};
use graphsync_cypher::GraphError;

use crate::error::{CliError, Result};

fn read(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

fn parse_error(path: &Path) -> impl FnOnce(serde_json::Error) -> CliError + '_ {
    move |source| CliError::Parse {
        path: path.display().to_string(),
        source,
    }
}

/// Load a JSON array of entity descriptors.
pub fn load_schema(path: &Path) -> Result<SchemaRegistry> {
    let registry = SchemaRegistry::from_json(&read(path)?).map_err(|e| match e {
        MappingError::Serialization(source) => parse_error(path)(source),
        other => other.into(),
    })?;
    tracing::debug!(path = %path.display(), types = registry.len(), "Schema loaded");
    Ok(registry)
}

pub fn load_graph(path: &Path) -> Result<ObjectGraph> {
    let graph: ObjectGraph = serde_json::from_str(&read(path)?).map_err(parse_error(path))?;
    tracing::debug!(path = %path.display(), entities = graph.len(), "Graph loaded");
    Ok(graph)
}

/// Write the graph back, including any store ids bound by a save.
pub fn write_graph(path: &Path, graph: &ObjectGraph) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(graph)?)?;
    Ok(())
}

/// Write the graph back after a save attempt, then return its outcome.
///
/// Ids bound before a failure are written too. A save error takes precedence
/// over a failed write.
pub fn write_outcome<T>(
    path: &Path,
    graph: &ObjectGraph,
    outcome: std::result::Result<T, GraphError>,
) -> Result<T> {
    let written = write_graph(path, graph);
    match outcome {
        Ok(value) => written.map(|()| value),
        Err(error) => {
            if let Err(write_error) = written {
                tracing::error!(
                    path = %path.display(),
                    error = %write_error,
                    "Could not write graph"
                );
            }
            Err(error.into())
        }
    }
}

/// Requested root indices, or every entity when none were given.
pub fn roots(graph: &ObjectGraph, requested: &[usize]) -> Result<Vec<EntityRef>> {
    if requested.is_empty() {
        return Ok(graph.iter().map(|(entity, _)| entity).collect());
    }
    requested
        .iter()
        .map(|&index| {
            graph
                .get(EntityRef(index))
                .map(|_| EntityRef(index))
                .ok_or(CliError::UnknownRoot {
                    index,
                    len: graph.len(),
                })
        })
        .collect()
}
