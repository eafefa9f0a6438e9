//! Discover command implementation
//!
//! Prints the catalog of every stream the tap can sync.

use super::registry;
use crate::catalog::Catalog;
use crate::error::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Write the catalog as pretty JSON to `out`
pub fn run(schemas_dir: Option<&PathBuf>, out: &mut impl Write) -> Result<()> {
    let catalog = Catalog::discover(&registry(schemas_dir))?;
    info!(streams = catalog.streams.len(), "Discovered streams");

    writeln!(out, "{}", catalog.to_json_pretty()?)?;
    out.flush()?;
    Ok(())
}
