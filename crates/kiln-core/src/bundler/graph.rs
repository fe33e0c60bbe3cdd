//! Module dependency graph.
//!
//! Owns every module record of a build, keyed by stable id so iteration
//! order never depends on the order workers finished in.

use crate::imports::{ImportKind, ScanResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Module identity: the root-relative path of the source file with forward
/// slashes. Synthetic modules append a `?query` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The extracted-style module generated from this one.
    #[must_use]
    pub fn extracted(&self) -> Self {
        Self(format!("{}?extract", self.0))
    }

    /// Whether the module was generated by the pipeline rather than read from disk.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.0.contains('?')
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a module, detected from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Script,
    Style,
    Asset,
}

impl ModuleKind {
    #[must_use]
    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" | "mts" | "cts" | "json" => Self::Script,
            "css" | "scss" | "sass" => Self::Style,
            _ => Self::Asset,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Style => "style",
            Self::Asset => "asset",
        }
    }
}

/// Where a dependency edge points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyTarget {
    Module { id: ModuleId, path: PathBuf },
    External(String),
}

/// One outgoing edge, in import order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub specifier: String,
    pub kind: ImportKind,
    pub target: DependencyTarget,
}

impl Dependency {
    #[must_use]
    pub fn module_id(&self) -> Option<&ModuleId> {
        match &self.target {
            DependencyTarget::Module { id, .. } => Some(id),
            DependencyTarget::External(_) => None,
        }
    }
}

/// A binary file produced by a module's transform chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    /// Output-relative file name.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A module in the graph.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: ModuleId,
    /// Absolute source path. For synthetic modules, the originating file.
    pub path: PathBuf,
    pub kind: ModuleKind,
    /// Digest of the raw source bytes.
    pub source_hash: String,
    /// Raw source size in bytes.
    pub source_size: usize,
    /// Raw source text, kept for source maps. Empty for binary assets.
    pub source: String,
    /// Transformed JavaScript.
    pub code: String,
    /// Syntax sites of `code`.
    pub scan: ScanResult,
    /// Extracted stylesheet text (synthetic style modules only).
    pub style: Option<String>,
    pub dependencies: Vec<Dependency>,
    pub assets: Vec<EmittedAsset>,
}

impl ModuleRecord {
    /// Dependency for a specifier, matching static-ness of the import site.
    #[must_use]
    pub fn dependency(&self, specifier: &str, kind: ImportKind) -> Option<&Dependency> {
        self.dependencies
            .iter()
            .find(|d| d.specifier == specifier && d.kind.is_static() == kind.is_static())
    }
}

/// Graph consistency failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("entry '{name}' ({specifier}) cannot be reached: {reason}")]
    UnreachableEntry {
        name: String,
        specifier: String,
        reason: String,
    },

    #[error("entry '{name}' resolves to external '{global}'")]
    ExternalEntry { name: String, global: String },

    #[error("{from} depends on {to}, which is not in the graph")]
    DanglingEdge { from: ModuleId, to: ModuleId },
}

impl GraphError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnreachableEntry { .. } => "GRAPH_UNREACHABLE_ENTRY",
            Self::ExternalEntry { .. } => "GRAPH_EXTERNAL_ENTRY",
            Self::DanglingEdge { .. } => "GRAPH_DANGLING_EDGE",
        }
    }
}

/// The module dependency graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    modules: BTreeMap<ModuleId, ModuleRecord>,
    /// Entry name → module, sorted by name.
    entries: Vec<(String, ModuleId)>,
    /// Reverse edges.
    dependents: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a module.
    pub fn insert(&mut self, record: ModuleRecord) {
        self.modules.insert(record.id.clone(), record);
    }

    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Modules in stable-key order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, ModuleId)] {
        &self.entries
    }

    pub fn set_entries(&mut self, entries: Vec<(String, ModuleId)>) {
        self.entries = entries;
    }

    /// Module id for a source path, if present.
    #[must_use]
    pub fn find_by_path(&self, path: &Path) -> Option<&ModuleId> {
        self.modules
            .values()
            .find(|m| !m.id.is_synthetic() && m.path == path)
            .map(|m| &m.id)
    }

    /// Recompute reverse edges from the forward edges.
    pub fn rebuild_dependents(&mut self) {
        let mut dependents: BTreeMap<ModuleId, BTreeSet<ModuleId>> = BTreeMap::new();
        for module in self.modules.values() {
            for dep in &module.dependencies {
                if let Some(target) = dep.module_id() {
                    dependents
                        .entry(target.clone())
                        .or_default()
                        .insert(module.id.clone());
                }
            }
        }
        self.dependents = dependents;
    }

    /// Direct importers of a module.
    #[must_use]
    pub fn dependents(&self, id: &ModuleId) -> Option<&BTreeSet<ModuleId>> {
        self.dependents.get(id)
    }

    /// The given modules plus everything that transitively imports them.
    #[must_use]
    pub fn transitive_dependents<'a>(&self, ids: impl IntoIterator<Item = &'a ModuleId>) -> BTreeSet<ModuleId> {
        let mut out = BTreeSet::new();
        let mut stack: Vec<ModuleId> = ids.into_iter().cloned().collect();
        while let Some(id) = stack.pop() {
            if !out.insert(id.clone()) {
                continue;
            }
            if let Some(parents) = self.dependents.get(&id) {
                stack.extend(parents.iter().filter(|p| !out.contains(*p)).cloned());
            }
        }
        out
    }

    /// Modules reachable from `start` through static edges (including `start`).
    #[must_use]
    pub fn static_reach(&self, start: &ModuleId) -> BTreeSet<ModuleId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start.clone()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(module) = self.modules.get(&id) {
                for dep in &module.dependencies {
                    if !dep.kind.is_static() {
                        continue;
                    }
                    if let Some(target) = dep.module_id() {
                        if !seen.contains(target) {
                            stack.push(target.clone());
                        }
                    }
                }
            }
        }
        seen
    }

    /// Targets of dynamic imports, in stable-key order.
    #[must_use]
    pub fn dynamic_targets(&self) -> BTreeSet<ModuleId> {
        self.modules
            .values()
            .flat_map(|m| m.dependencies.iter())
            .filter(|d| !d.kind.is_static())
            .filter_map(Dependency::module_id)
            .cloned()
            .collect()
    }

    /// Check that every edge points at a present module.
    pub fn validate(&self) -> Result<(), GraphError> {
        for module in self.modules.values() {
            for dep in &module.dependencies {
                if let Some(target) = dep.module_id() {
                    if !self.modules.contains_key(target) {
                        return Err(GraphError::DanglingEdge {
                            from: module.id.clone(),
                            to: target.clone(),
                        });
                    }
                }
            }
        }
        for (_, entry) in &self.entries {
            if !self.modules.contains_key(entry) {
                return Err(GraphError::DanglingEdge {
                    from: entry.clone(),
                    to: entry.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(id: &str, deps: &[(&str, ImportKind)]) -> ModuleRecord {
        ModuleRecord {
            id: ModuleId::new(id),
            path: PathBuf::from("/project").join(id),
            kind: ModuleKind::Script,
            source_hash: String::new(),
            source_size: 0,
            source: String::new(),
            code: String::new(),
            scan: ScanResult::default(),
            style: None,
            dependencies: deps
                .iter()
                .map(|(to, kind)| Dependency {
                    specifier: format!("./{to}"),
                    kind: *kind,
                    target: DependencyTarget::Module {
                        id: ModuleId::new(*to),
                        path: PathBuf::from("/project").join(to),
                    },
                })
                .collect(),
            assets: Vec::new(),
        }
    }

    pub(crate) fn graph(records: Vec<ModuleRecord>, entries: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for r in records {
            graph.insert(r);
        }
        graph.set_entries(
            entries
                .iter()
                .map(|(name, id)| ((*name).to_string(), ModuleId::new(*id)))
                .collect(),
        );
        graph.rebuild_dependents();
        graph
    }

    #[test]
    fn test_module_kind_detect() {
        assert_eq!(ModuleKind::detect(Path::new("a.tsx")), ModuleKind::Script);
        assert_eq!(ModuleKind::detect(Path::new("a.SCSS")), ModuleKind::Style);
        assert_eq!(ModuleKind::detect(Path::new("logo.png")), ModuleKind::Asset);
        assert_eq!(ModuleKind::detect(Path::new("LICENSE")), ModuleKind::Asset);
    }

    #[test]
    fn test_extracted_id() {
        let id = ModuleId::new("src/app.scss");
        assert_eq!(id.extracted().as_str(), "src/app.scss?extract");
        assert!(id.extracted().is_synthetic());
        assert!(!id.is_synthetic());
    }

    #[test]
    fn test_transitive_dependents_with_cycle() {
        let g = graph(
            vec![
                record("a.js", &[("b.js", ImportKind::Static)]),
                record("b.js", &[("c.js", ImportKind::Static), ("a.js", ImportKind::Static)]),
                record("c.js", &[]),
                record("d.js", &[]),
            ],
            &[("main", "a.js")],
        );

        let hit = g.transitive_dependents([&ModuleId::new("c.js")]);
        let names: Vec<&str> = hit.iter().map(ModuleId::as_str).collect();
        assert_eq!(names, vec!["a.js", "b.js", "c.js"]);
    }

    #[test]
    fn test_static_reach_skips_dynamic() {
        let g = graph(
            vec![
                record("a.js", &[("b.js", ImportKind::Static), ("lazy.js", ImportKind::Dynamic)]),
                record("b.js", &[]),
                record("lazy.js", &[("b.js", ImportKind::Static)]),
            ],
            &[("main", "a.js")],
        );

        let reach = g.static_reach(&ModuleId::new("a.js"));
        assert!(reach.contains(&ModuleId::new("b.js")));
        assert!(!reach.contains(&ModuleId::new("lazy.js")));
        assert_eq!(
            g.dynamic_targets().into_iter().collect::<Vec<_>>(),
            vec![ModuleId::new("lazy.js")]
        );
    }

    #[test]
    fn test_validate_dangling_edge() {
        let g = graph(vec![record("a.js", &[("missing.js", ImportKind::Static)])], &[("main", "a.js")]);
        let err = g.validate().unwrap_err();
        assert_eq!(err.code(), "GRAPH_DANGLING_EDGE");
    }

    #[test]
    fn test_external_edges_are_valid() {
        let mut a = record("a.js", &[]);
        a.dependencies.push(Dependency {
            specifier: "react".to_string(),
            kind: ImportKind::Static,
            target: DependencyTarget::External("React".to_string()),
        });
        let g = graph(vec![a], &[("main", "a.js")]);
        assert!(g.validate().is_ok());
    }
}
