//! Plugin system for the bundler.
//!
//! A plugin implements any subset of three capabilities:
//!
//! - `on_start`: before the graph is built
//! - `on_emit`: after rendering, with mutable access to the artifacts
//! - `on_done`: after the pass finished, successfully or not
//!
//! Unimplemented capabilities default to no-ops. Plugins run in
//! registration order.
//!
//! ## Example
//!
//! ```ignore
//! use kiln_core::bundler::{Compilation, HookResult, Plugin, PluginContext};
//!
//! struct Robots;
//!
//! impl Plugin for Robots {
//!     fn name(&self) -> &str { "robots" }
//!
//!     fn on_emit(&self, _ctx: &PluginContext, compilation: &mut Compilation) -> HookResult<()> {
//!         compilation.artifacts.push(Artifact::new("robots.txt", ArtifactKind::Asset, "User-agent: *\n"));
//!         Ok(())
//!     }
//! }
//! ```

use super::emit::ArtifactKind;
use super::graph::DependencyGraph;
use super::plugins::{HtmlPlugin, StatsPlugin};
use super::render::Compilation;
use super::{BuildError, BuildOutcome};
use crate::config::{BuildConfig, PluginSpec};
use thiserror::Error;

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, PluginError>;

/// Error from a plugin.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[{plugin}] {hook}: {message}")]
pub struct PluginError {
    /// Plugin name that caused the error.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    pub message: String,
}

impl PluginError {
    #[must_use]
    pub fn new(plugin: &str, hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.to_string(),
            hook,
            message: message.into(),
        }
    }
}

/// Context passed to plugin hooks.
pub struct PluginContext<'a> {
    pub config: &'a BuildConfig,
    /// Whether this pass belongs to a watch session.
    pub watch: bool,
    /// The module graph, once built (`on_emit` and later).
    pub graph: Option<&'a DependencyGraph>,
}

/// A bundler plugin.
pub trait Plugin: Send + Sync {
    /// Plugin name for error messages.
    fn name(&self) -> &str;

    /// Called before the graph is built.
    fn on_start(&self, _ctx: &PluginContext<'_>) -> HookResult<()> {
        Ok(())
    }

    /// Called after rendering, before anything is written.
    fn on_emit(&self, _ctx: &PluginContext<'_>, _compilation: &mut Compilation) -> HookResult<()> {
        Ok(())
    }

    /// Called when the pass is over.
    fn on_done(&self, _ctx: &PluginContext<'_>, _result: Result<&BuildOutcome, &BuildError>) {}
}

/// Ordered plugin list.
#[derive(Default)]
pub struct PluginContainer {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginContainer {
    /// Instantiate the built-in plugins declared in the config.
    #[must_use]
    pub fn from_config(config: &BuildConfig) -> Self {
        let mut container = Self::default();
        for spec in &config.plugins {
            container.add(builtin(spec));
        }
        container
    }

    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn on_start(&self, ctx: &PluginContext<'_>) -> HookResult<()> {
        for plugin in &self.plugins {
            plugin.on_start(ctx)?;
        }
        Ok(())
    }

    pub fn on_emit(&self, ctx: &PluginContext<'_>, compilation: &mut Compilation) -> HookResult<()> {
        for plugin in &self.plugins {
            plugin.on_emit(ctx, compilation)?;
        }
        Ok(())
    }

    pub fn on_done(&self, ctx: &PluginContext<'_>, result: Result<&BuildOutcome, &BuildError>) {
        for plugin in &self.plugins {
            plugin.on_done(ctx, result);
        }
    }
}

fn builtin(spec: &PluginSpec) -> Box<dyn Plugin> {
    match spec {
        PluginSpec::Html(options) => Box::new(HtmlPlugin::new(options.clone())),
        PluginSpec::Stats { filename } => Box::new(StatsPlugin::new(filename.clone())),
        PluginSpec::Banner { text } => Box::new(BannerPlugin::new(text.clone())),
    }
}

/// Plugin that prepends a comment to every script and stylesheet.
///
/// The comment is placed on the first line so source maps stay aligned.
pub struct BannerPlugin {
    text: String,
}

impl BannerPlugin {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Plugin for BannerPlugin {
    fn name(&self) -> &str {
        "banner"
    }

    fn on_emit(&self, _ctx: &PluginContext<'_>, compilation: &mut Compilation) -> HookResult<()> {
        let text = self.text.replace("*/", "* /").replace('\n', " ");
        let banner = format!("/*! {text} */ ");
        for artifact in &mut compilation.artifacts {
            if matches!(artifact.kind, ArtifactKind::Script | ArtifactKind::Style) {
                let mut bytes = banner.clone().into_bytes();
                bytes.extend_from_slice(&artifact.bytes);
                artifact.bytes = bytes;
            }
        }
        Ok(())
    }
}
