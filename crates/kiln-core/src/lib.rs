#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! kiln: a module-bundling build engine.
//!
//! Resolves a dependency graph from entry modules, runs each module through a
//! rule-selected transform chain, partitions the graph into content-hashed
//! chunks and emits them all-or-nothing. The [`dev`] module drives
//! incremental rebuilds for watch mode.

pub mod bundler;
pub mod compiler;
pub mod config;
pub mod css;
pub mod dev;
pub mod error;
pub mod imports;
pub mod version;

pub use bundler::{BuildError, Bundler};
pub use config::{BuildConfig, Mode, RawConfig};
pub use error::Error;
pub use version::VERSION;
