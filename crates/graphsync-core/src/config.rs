//! Configuration for mapping and statement rendering.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`GRAPHSYNC_MAPPER__MAX_DEPTH`, ...)
//! 2. Config file (`graphsync.toml`, `[mapper]` section)
//! 3. Defaults

use serde::Deserialize;

use crate::error::{MappingError, Result};

/// Which statement factory renders batches.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatementForm {
    /// One `UNWIND $rows` statement per batch.
    #[default]
    Row,
    /// One plainly parameterised statement per row.
    Single,
}

/// Mapper and compiler settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MapperConfig {
    /// Depth beyond which clean subgraphs are not walked; unbounded when unset.
    #[serde(default)]
    pub max_depth: Option<usize>,

    #[serde(default)]
    pub statement_form: StatementForm,

    /// Ask the store to return update statistics with every statement.
    #[serde(default)]
    pub include_stats: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            statement_form: StatementForm::default(),
            include_stats: false,
        }
    }
}

impl MapperConfig {
    /// Load the `[mapper]` section of `<file_prefix>.toml`, overlaid with
    /// `GRAPHSYNC_MAPPER__*` variables. A missing section yields defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("GRAPHSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| MappingError::Config(e.to_string()))?;

        match cfg.get::<MapperConfig>("mapper") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(MapperConfig::default()),
            Err(e) => Err(MappingError::Config(e.to_string())),
        }
    }
}
