//! Dependency graph construction.
//!
//! The graph grows in breadth-first waves from the entries. Each wave's
//! modules are loaded, transformed, scanned and resolved in parallel on the
//! builder's worker pool; the graph itself is only touched between waves, in
//! stable-key order, so the result never depends on which worker finished
//! first.

use super::graph::{Dependency, DependencyGraph, DependencyTarget, GraphError, ModuleId, ModuleKind, ModuleRecord};
use super::resolve::{Resolved, Resolver};
use super::transform::{transform, TransformError};
use super::BuildError;
use crate::config::{BuildConfig, CONFIG_FILE};
use crate::imports::{scan, ImportKind, ScanResult};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag marking a build as stale.
///
/// Checked once per module; a cancelled build stops with
/// [`BuildError::Cancelled`] and publishes nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), BuildError> {
        if self.is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Which modules a pass processed and which it took from the previous graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub rebuilt: BTreeSet<ModuleId>,
    pub reused: usize,
}

/// A module and the synthetic module its transform produced, if any.
struct Processed {
    record: ModuleRecord,
    extracted: Option<ModuleRecord>,
}

pub(crate) struct GraphBuilder<'a> {
    pub config: &'a BuildConfig,
    pub resolver: &'a Resolver,
    pub pool: &'a rayon::ThreadPool,
    pub cancel: &'a CancelToken,
}

impl GraphBuilder<'_> {
    /// Build the graph, reusing every module of `previous` that is not in
    /// `invalidated`.
    pub fn build(
        &self,
        previous: Option<&DependencyGraph>,
        invalidated: &BTreeSet<ModuleId>,
    ) -> Result<(DependencyGraph, BuildReport), BuildError> {
        let mut graph = DependencyGraph::new();
        let mut report = BuildReport::default();
        let mut visited: BTreeSet<ModuleId> = BTreeSet::new();
        let mut frontier: BTreeMap<ModuleId, PathBuf> = BTreeMap::new();

        let entries = self.resolve_entries()?;
        for (_, id, path) in &entries {
            if visited.insert(id.clone()) {
                frontier.insert(id.clone(), path.clone());
            }
        }
        graph.set_entries(entries.into_iter().map(|(name, id, _)| (name, id)).collect());

        let mut wave = 0usize;
        while !frontier.is_empty() {
            self.cancel.check()?;
            let _span = tracing::debug_span!("wave", wave, modules = frontier.len()).entered();

            let mut fresh: Vec<(ModuleId, PathBuf)> = Vec::new();
            let mut added: Vec<ModuleId> = Vec::new();
            for (id, path) in std::mem::take(&mut frontier) {
                let reusable = previous
                    .filter(|_| !invalidated.contains(&id))
                    .and_then(|prev| prev.get(&id).map(|record| (prev, record)));
                match reusable {
                    Some((prev, record)) => {
                        // Extracted styles travel with their origin.
                        for dep in &record.dependencies {
                            if let Some(target) = dep.module_id().filter(|t| t.is_synthetic()) {
                                if let Some(synthetic) = prev.get(target) {
                                    if visited.insert(target.clone()) {
                                        graph.insert(synthetic.clone());
                                        report.reused += 1;
                                    }
                                }
                            }
                        }
                        graph.insert(record.clone());
                        report.reused += 1;
                        added.push(id);
                    }
                    None if id.is_synthetic() => {
                        tracing::debug!(module = %id, "synthetic module without origin");
                    }
                    None => fresh.push((id, path)),
                }
            }

            let results: Vec<Result<Processed, BuildError>> = self
                .pool
                .install(|| fresh.par_iter().map(|(id, path)| self.process(id, path)).collect());

            for result in results {
                let processed = result?;
                if let Some(synthetic) = processed.extracted {
                    visited.insert(synthetic.id.clone());
                    report.rebuilt.insert(synthetic.id.clone());
                    graph.insert(synthetic);
                }
                let id = processed.record.id.clone();
                report.rebuilt.insert(id.clone());
                graph.insert(processed.record);
                added.push(id);
            }

            for id in added {
                let Some(record) = graph.get(&id) else { continue };
                for dep in &record.dependencies {
                    if let DependencyTarget::Module { id: target, path } = &dep.target {
                        if visited.insert(target.clone()) {
                            frontier.insert(target.clone(), path.clone());
                        }
                    }
                }
            }
            wave += 1;
        }

        graph.rebuild_dependents();
        tracing::debug!(
            modules = graph.len(),
            rebuilt = report.rebuilt.len(),
            reused = report.reused,
            waves = wave,
            "graph built"
        );
        Ok((graph, report))
    }

    fn resolve_entries(&self) -> Result<Vec<(String, ModuleId, PathBuf)>, BuildError> {
        // Entry specifiers are relative to the project root.
        let from = self.config.root.join(CONFIG_FILE);
        let mut entries = Vec::with_capacity(self.config.entries.len());
        for (name, specifier) in &self.config.entries {
            match self.resolver.resolve(specifier, &from) {
                Ok(Resolved::Module(path)) => {
                    entries.push((name.clone(), self.module_id(&path), path));
                }
                Ok(Resolved::External(global)) => {
                    return Err(GraphError::ExternalEntry {
                        name: name.clone(),
                        global,
                    }
                    .into());
                }
                Err(e) => {
                    return Err(GraphError::UnreachableEntry {
                        name: name.clone(),
                        specifier: specifier.clone(),
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(entries)
    }

    fn module_id(&self, path: &Path) -> ModuleId {
        ModuleId::new(self.config.relative_key(path))
    }

    /// Load, transform, scan and resolve one module.
    fn process(&self, id: &ModuleId, path: &Path) -> Result<Processed, BuildError> {
        self.cancel.check()?;
        let _span = tracing::trace_span!("module", id = %id).entered();

        let bytes = std::fs::read(path).map_err(|e| TransformError::new(path, "load", e.to_string()))?;
        let kind = ModuleKind::detect(path);
        let source_hash = kiln_util::hash::blake3_bytes(&bytes);
        let source_size = bytes.len();
        let source = match kind {
            ModuleKind::Asset => String::new(),
            ModuleKind::Script | ModuleKind::Style => String::from_utf8_lossy(&bytes).into_owned(),
        };

        let rule = self.config.rules.find(id.as_str());
        let output = transform(path, bytes, rule, self.config)?;
        let scan = scan(&output.code);

        let mut dependencies = Vec::new();
        for (specifier, import_kind) in scan.specifiers() {
            let target = match self.resolver.resolve(specifier, path)? {
                Resolved::Module(target) => DependencyTarget::Module {
                    id: self.module_id(&target),
                    path: target,
                },
                Resolved::External(global) => DependencyTarget::External(global),
            };
            dependencies.push(Dependency {
                specifier: specifier.to_string(),
                kind: import_kind,
                target,
            });
        }

        let extracted = output.extracted.map(|css| {
            let synthetic_id = id.extracted();
            dependencies.push(Dependency {
                specifier: synthetic_id.to_string(),
                kind: ImportKind::Static,
                target: DependencyTarget::Module {
                    id: synthetic_id.clone(),
                    path: path.to_path_buf(),
                },
            });
            ModuleRecord {
                id: synthetic_id,
                path: path.to_path_buf(),
                kind: ModuleKind::Style,
                source_hash: kiln_util::hash::blake3_bytes(css.as_bytes()),
                source_size: css.len(),
                source: String::new(),
                code: String::new(),
                scan: ScanResult::default(),
                style: Some(css),
                dependencies: Vec::new(),
                assets: Vec::new(),
            }
        });

        tracing::trace!(module = %id, deps = dependencies.len(), "processed");
        Ok(Processed {
            record: ModuleRecord {
                id: id.clone(),
                path: path.to_path_buf(),
                kind,
                source_hash,
                source_size,
                source,
                code: output.code,
                scan,
                style: None,
                dependencies,
                assets: output.assets,
            },
            extracted,
        })
    }
}
