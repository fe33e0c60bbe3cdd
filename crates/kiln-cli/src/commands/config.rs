//! `kiln config` command implementation.

use kiln_core::{BuildConfig, Mode};
use miette::{IntoDiagnostic, Result};
use std::path::Path;

/// Print the resolved configuration as JSON.
pub fn run(cwd: &Path, config: Option<&Path>, mode: Option<Mode>) -> Result<()> {
    let resolved = BuildConfig::load(cwd, config, mode).into_diagnostic()?;
    let json = serde_json::to_string_pretty(&resolved).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
