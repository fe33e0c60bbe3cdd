//! Chunk planning.
//!
//! Splits the module graph into entry chunks, one common chunk for modules
//! shared between roots, and async chunks for dynamic imports.

use super::graph::{DependencyGraph, ModuleId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Role of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Loaded by a page; runs its root module.
    Entry,
    /// Modules reachable from more than one root.
    Common,
    /// Loaded on demand by `import()`.
    Async,
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Common => "common",
            Self::Async => "async",
        }
    }
}

/// A group of modules emitted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Root module (`None` for the common chunk).
    pub root: Option<ModuleId>,
    /// Member modules in stable-key order.
    pub modules: Vec<ModuleId>,
}

/// All chunks of a build.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlan {
    /// Entries (sorted by name), then common, then async chunks.
    pub chunks: Vec<Chunk>,
    module_chunk: BTreeMap<ModuleId, usize>,
}

impl ChunkPlan {
    /// Index of the chunk that holds a module.
    #[must_use]
    pub fn chunk_of(&self, id: &ModuleId) -> Option<usize> {
        self.module_chunk.get(id).copied()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.name == name)
    }
}

/// Partition the graph.
///
/// Roots are the entries plus every dynamic-import target that no entry
/// reaches statically. A module reached from exactly one root joins that
/// root's chunk; reached from several, the common chunk.
#[must_use]
pub fn plan(graph: &DependencyGraph, common_name: &str) -> ChunkPlan {
    let mut roots: Vec<(String, ChunkKind, ModuleId)> = Vec::new();
    let mut eager = BTreeSet::new();
    for (name, id) in graph.entries() {
        eager.extend(graph.static_reach(id));
        roots.push((name.clone(), ChunkKind::Entry, id.clone()));
    }

    let mut taken: BTreeSet<String> = roots.iter().map(|(n, _, _)| n.clone()).collect();
    taken.insert(common_name.to_string());
    for target in graph.dynamic_targets() {
        if eager.contains(&target) {
            continue;
        }
        let name = unique_name(&async_name(&target), &mut taken);
        roots.push((name, ChunkKind::Async, target));
    }

    let mut owners: BTreeMap<ModuleId, Vec<usize>> = BTreeMap::new();
    for (index, (_, _, root)) in roots.iter().enumerate() {
        for id in graph.static_reach(root) {
            if graph.contains(&id) {
                owners.entry(id).or_default().push(index);
            }
        }
    }

    let mut chunks: Vec<Chunk> = roots
        .iter()
        .map(|(name, kind, root)| Chunk {
            name: name.clone(),
            kind: *kind,
            root: Some(root.clone()),
            modules: Vec::new(),
        })
        .collect();
    let mut common = Vec::new();

    // `owners` iterates in stable-key order, so member lists come out sorted.
    for (id, owner) in owners {
        if let [single] = owner.as_slice() {
            chunks[*single].modules.push(id);
        } else {
            common.push(id);
        }
    }

    if !common.is_empty() {
        let at = chunks
            .iter()
            .position(|c| c.kind == ChunkKind::Async)
            .unwrap_or(chunks.len());
        chunks.insert(
            at,
            Chunk {
                name: common_name.to_string(),
                kind: ChunkKind::Common,
                root: None,
                modules: common,
            },
        );
    }

    let mut module_chunk = BTreeMap::new();
    for (index, chunk) in chunks.iter().enumerate() {
        for id in &chunk.modules {
            module_chunk.insert(id.clone(), index);
        }
    }

    ChunkPlan {
        chunks,
        module_chunk,
    }
}

/// Name for an async chunk: the root module's file stem.
fn async_name(id: &ModuleId) -> String {
    let path = id.as_str();
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.split('.').next().unwrap_or(file);
    if stem.is_empty() {
        "chunk".to_string()
    } else {
        stem.to_string()
    }
}

fn unique_name(base: &str, taken: &mut BTreeSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 2;
    while taken.contains(&name) {
        name = format!("{base}-{n}");
        n += 1;
    }
    taken.insert(name.clone());
    name
}

/// Expand `[name]`, `[hash]` and `[ext]` in an output file name template.
#[must_use]
pub fn fill_template(template: &str, name: &str, hash: &str, ext: Option<&str>) -> String {
    let mut out = template.replace("[name]", name).replace("[hash]", hash);
    if let Some(ext) = ext {
        out = out.replace("[ext]", ext);
    }
    out
}
