#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for kiln.
//!
//! Pure helpers with no logging/tracing dependencies. Logging is owned by the
//! CLI crate and the engine keeps its own spans.

pub mod fs;
pub mod hash;
