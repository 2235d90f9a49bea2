//! Configuration for the graphsync command line.

use serde::Deserialize;

use graphsync_core::MapperConfig;
use graphsync_cypher::GraphConfig;

use crate::error::{CliError, Result};

/// Top-level configuration.
///
/// Loaded from the `[neo4j]` and `[mapper]` sections of `graphsync.toml`,
/// overlaid with `GRAPHSYNC__` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub neo4j: GraphConfig,

    #[serde(default)]
    pub mapper: MapperConfig,
}

impl CliConfig {
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("GRAPHSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        cfg.try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))
    }
}
