//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod discover;
pub mod query;
pub mod sync;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::schema::SchemaRegistry;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inputs shared by `query` and `sync`
pub(crate) struct RunInputs {
    pub config: Config,
    pub catalog: Catalog,
    pub registry: SchemaRegistry,
}

impl RunInputs {
    pub fn load(
        config_path: &Path,
        catalog_path: &Path,
        schemas_dir: Option<&PathBuf>,
    ) -> crate::Result<Self> {
        let config = Config::load(config_path)?;
        let catalog = Catalog::load(catalog_path)?;
        debug!(
            config = %config_path.display(),
            catalog = %catalog_path.display(),
            streams = catalog.streams.len(),
            "Loaded inputs"
        );

        Ok(Self {
            config,
            catalog,
            registry: registry(schemas_dir),
        })
    }
}

pub(crate) fn registry(schemas_dir: Option<&PathBuf>) -> SchemaRegistry {
    match schemas_dir {
        Some(dir) => SchemaRegistry::from_dir(dir),
        None => SchemaRegistry::embedded(),
    }
}
