//! Built-in plugins.

mod html;
mod stats;

pub use html::HtmlPlugin;
pub use stats::{AssetStats, BuildStats, ChunkStats, ModuleStats, StatsPlugin};
