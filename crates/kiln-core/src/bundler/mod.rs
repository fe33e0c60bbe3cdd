//! The build engine.
//!
//! ## Usage
//!
//! ```ignore
//! use kiln_core::{BuildConfig, Bundler};
//!
//! let config = BuildConfig::load(Path::new("."), None, None)?;
//! let outcome = Bundler::new(config)?.build()?;
//! println!("{} chunks", outcome.compilation.chunks.len());
//! ```
//!
//! ## Architecture
//!
//! 1. **Resolution** - Resolve import specifiers to files or externals
//! 2. **Transform** - Run each module through its rule's stage chain
//! 3. **Graph** - Grow the module graph in parallel breadth-first waves
//! 4. **Plan** - Partition the graph into entry, common and async chunks
//! 5. **Render** - Link modules, concatenate and hash chunks
//! 6. **Emit** - Write every artifact, or none of them

pub mod build;
pub mod chunks;
pub mod emit;
pub mod graph;
pub mod link;
pub mod plugin;
pub mod plugins;
pub mod render;
pub mod resolve;
pub mod rules;
pub mod runtime;
pub mod sourcemap;
pub mod transform;

pub use build::{BuildReport, CancelToken};
pub use chunks::{plan, Chunk, ChunkKind, ChunkPlan};
pub use emit::{emit, Artifact, ArtifactKind, EmitError, EmitResult};
pub use graph::{DependencyGraph, GraphError, ModuleId, ModuleKind, ModuleRecord};
pub use plugin::{BannerPlugin, HookResult, Plugin, PluginContainer, PluginContext, PluginError};
pub use plugins::{BuildStats, HtmlPlugin, StatsPlugin};
pub use render::{render, Compilation, RenderOptions, RenderedChunk, MANIFEST_FILE};
pub use resolve::{ResolveError, Resolved, Resolver};
pub use rules::{Rule, RuleSet, Stage};
pub use transform::TransformError;

use crate::config::BuildConfig;
use build::GraphBuilder;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A failed build pass.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("build cancelled")]
    Cancelled,
}

impl BuildError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resolution(e) => e.code(),
            Self::Transform(_) => "TRANSFORM_ERROR",
            Self::Graph(e) => e.code(),
            Self::Emit(e) => e.code(),
            Self::Plugin(_) => "PLUGIN_ERROR",
            Self::Cancelled => "BUILD_CANCELLED",
        }
    }

    /// The module (or output file) the failure is attributed to.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Resolution(e) => Some(e.from()),
            Self::Transform(e) => Some(&e.path),
            Self::Emit(e) => e.path(),
            Self::Graph(_) | Self::Plugin(_) | Self::Cancelled => None,
        }
    }

    /// Pipeline stage that failed.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Resolution(_) => Some("resolve"),
            Self::Transform(e) => Some(&e.stage),
            Self::Emit(_) => Some("emit"),
            Self::Plugin(e) => Some(e.hook),
            Self::Graph(_) | Self::Cancelled => None,
        }
    }
}

/// A successful build pass.
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: DependencyGraph,
    pub compilation: Compilation,
    pub emitted: EmitResult,
    pub report: BuildReport,
    pub duration: Duration,
}

/// Runs build passes for one configuration.
pub struct Bundler {
    config: BuildConfig,
    resolver: Resolver,
    plugins: PluginContainer,
    pool: rayon::ThreadPool,
    render_options: RenderOptions,
    watch: bool,
}

impl Bundler {
    /// Create a bundler with the plugins declared in `config`.
    pub fn new(config: BuildConfig) -> Result<Self, crate::Error> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallelism)
            .thread_name(|i| format!("kiln-worker-{i}"))
            .build()
            .map_err(|e| crate::Error::other(format!("cannot start worker pool: {e}")))?;
        Ok(Self {
            resolver: Resolver::new(config.root.clone(), config.resolve.clone()),
            plugins: PluginContainer::from_config(&config),
            pool,
            render_options: RenderOptions::default(),
            watch: false,
            config,
        })
    }

    /// Register an additional plugin after the configured ones.
    #[must_use]
    pub fn with_plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.plugins.add(plugin);
        self
    }

    /// Mark passes as part of a watch session, optionally embedding the
    /// hot-reload client.
    #[must_use]
    pub fn watching(mut self, hmr_client: bool) -> Self {
        self.watch = true;
        self.render_options.hmr_client = hmr_client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Full build.
    pub fn build(&self) -> Result<BuildOutcome, BuildError> {
        self.build_cancellable(&CancelToken::new())
    }

    /// Full build that can be marked stale while it runs.
    pub fn build_cancellable(&self, cancel: &CancelToken) -> Result<BuildOutcome, BuildError> {
        self.run(None, &BTreeSet::new(), cancel)
    }

    /// Incremental build: modules of `previous` outside `invalidated` are
    /// reused. A cancelled pass returns [`BuildError::Cancelled`] without
    /// writing anything.
    pub fn rebuild(
        &self,
        previous: &DependencyGraph,
        invalidated: &BTreeSet<ModuleId>,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, BuildError> {
        self.run(Some(previous), invalidated, cancel)
    }

    fn run(
        &self,
        previous: Option<&DependencyGraph>,
        invalidated: &BTreeSet<ModuleId>,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, BuildError> {
        let span = tracing::info_span!("build", mode = %self.config.mode, incremental = previous.is_some());
        let _enter = span.enter();
        let started = Instant::now();
        // Files may have appeared or moved since the last pass.
        self.resolver.clear_cache();

        let result = self.pass(previous, invalidated, cancel, started);

        let ctx = PluginContext {
            config: &self.config,
            watch: self.watch,
            graph: result.as_ref().ok().map(|o| &o.graph),
        };
        self.plugins.on_done(&ctx, result.as_ref());

        match &result {
            Ok(outcome) => tracing::info!(
                modules = outcome.graph.len(),
                chunks = outcome.compilation.chunks.len(),
                files = outcome.emitted.written.len(),
                ms = outcome.duration.as_millis() as u64,
                "build complete"
            ),
            Err(BuildError::Cancelled) => tracing::debug!("build cancelled"),
            Err(e) => tracing::warn!(code = e.code(), error = %e, "build failed"),
        }
        result
    }

    fn pass(
        &self,
        previous: Option<&DependencyGraph>,
        invalidated: &BTreeSet<ModuleId>,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<BuildOutcome, BuildError> {
        let config = &self.config;
        self.plugins.on_start(&PluginContext {
            config,
            watch: self.watch,
            graph: None,
        })?;

        let (graph, report) = GraphBuilder {
            config,
            resolver: &self.resolver,
            pool: &self.pool,
            cancel,
        }
        .build(previous, invalidated)?;
        graph.validate()?;

        let chunk_plan = plan(&graph, &config.output.common_chunk);
        cancel.check()?;
        let mut compilation = render(&graph, &chunk_plan, config, self.render_options)?;

        self.plugins.on_emit(
            &PluginContext {
                config,
                watch: self.watch,
                graph: Some(&graph),
            },
            &mut compilation,
        )?;

        // A stale pass must not publish anything.
        cancel.check()?;
        let emitted = emit(&compilation.artifacts, &config.output.dir, config.output.clean)?;

        Ok(BuildOutcome {
            graph,
            compilation,
            emitted,
            report,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn project(files: &[(&str, &str)], config: &str) -> (tempfile::TempDir, BuildConfig) {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        for (name, content) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let raw = RawConfig::from_json(config).unwrap();
        let config = BuildConfig::resolve(raw, &root, None, None).unwrap().with_parallelism(2);
        (dir, config)
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_start(&self, _ctx: &PluginContext<'_>) -> HookResult<()> {
            self.0.lock().unwrap().push("start".to_string());
            Ok(())
        }

        fn on_done(&self, _ctx: &PluginContext<'_>, result: Result<&BuildOutcome, &BuildError>) {
            let entry = match result {
                Ok(_) => "done:ok".to_string(),
                Err(e) => format!("done:{}", e.code()),
            };
            self.0.lock().unwrap().push(entry);
        }
    }

    #[test]
    fn test_build_writes_output() {
        let (_dir, config) = project(
            &[
                ("src/index.js", "import { msg } from './msg';\nconsole.log(msg);\n"),
                ("src/msg.js", "export const msg = 'hi';\n"),
            ],
            r#"{"entry": {"index": "./src/index.js"}, "html": {"title": "t"}}"#,
        );
        let out_dir = config.output.dir.clone();
        let outcome = Bundler::new(config).unwrap().build().unwrap();

        let chunk = outcome.compilation.chunk("index").unwrap();
        assert!(out_dir.join(&chunk.file).exists());
        assert!(out_dir.join(MANIFEST_FILE).exists());
        assert!(out_dir.join("index.html").exists());
        assert_eq!(outcome.report.rebuilt.len(), 2);
    }

    #[test]
    fn test_plugin_hooks_around_failure() {
        let (_dir, config) = project(&[("a.js", "import './missing';\n")], r#"{"entry": {"main": "./a.js"}}"#);
        let log = Arc::new(Mutex::new(Vec::new()));
        let bundler = Bundler::new(config)
            .unwrap()
            .with_plugin(Box::new(Recorder(log.clone())));

        let err = bundler.build().unwrap_err();
        assert_eq!(err.code(), "RESOLVE_NOT_FOUND");
        assert_eq!(err.stage(), Some("resolve"));
        assert_eq!(*log.lock().unwrap(), vec!["start", "done:RESOLVE_NOT_FOUND"]);
    }

    #[test]
    fn test_failed_build_writes_nothing() {
        let (_dir, config) = project(&[("a.js", "import './missing';\n")], r#"{"entry": {"main": "./a.js"}}"#);
        let out_dir = config.output.dir.clone();
        assert!(Bundler::new(config).unwrap().build().is_err());
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_cancelled_rebuild_publishes_nothing() {
        let (_dir, config) = project(&[("a.js", "export const a = 1;\n")], r#"{"entry": {"main": "./a.js"}}"#);
        let out_dir = config.output.dir.clone();
        let bundler = Bundler::new(config).unwrap();
        let first = bundler.build().unwrap();
        let before = kiln_util::fs::list_files(&out_dir).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let invalidated: BTreeSet<ModuleId> = [ModuleId::new("a.js")].into_iter().collect();
        let err = bundler.rebuild(&first.graph, &invalidated, &cancel).unwrap_err();
        assert!(matches!(err, BuildError::Cancelled));
        assert_eq!(kiln_util::fs::list_files(&out_dir).unwrap(), before);
    }

    #[test]
    fn test_error_accessors() {
        let err = BuildError::from(TransformError::new(Path::new("/p/a.scss"), "sass", "bad"));
        assert_eq!(err.code(), "TRANSFORM_ERROR");
        assert_eq!(err.path(), Some(Path::new("/p/a.scss")));
        assert_eq!(err.stage(), Some("sass"));
        assert_eq!(err.to_string(), "sass: bad");
    }
}
