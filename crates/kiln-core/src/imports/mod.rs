//! Import discovery for JavaScript modules.
//!
//! A single scanner feeds both the graph builder (which specifiers to
//! resolve) and the linker (which byte ranges to rewrite).

mod scan;

pub use scan::{references, scan, ExportKind, ExportSite, ImportClause, ImportKind, ImportSite, Reference, ScanResult};
