/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version of the `--json` build summary and the stats file.
/// Bump this when changing their shape.
pub const STATS_SCHEMA_VERSION: u32 = 1;

/// Returns a formatted version string.
#[must_use]
pub fn version_string() -> String {
    format!("kiln {VERSION}")
}
