//! Chunk rendering and content hashing.
//!
//! Non-entry chunks are rendered and hashed first; entry chunks embed the
//! resulting async chunk map and are hashed last. Production chunks are
//! minified before hashing, so comment-only edits keep their file names.

use super::chunks::{fill_template, ChunkKind, ChunkPlan};
use super::emit::{Artifact, ArtifactKind};
use super::graph::{DependencyGraph, ModuleId};
use super::link::{link, OutputIds};
use super::runtime::{HMR_CLIENT, REGISTRY, RUNTIME};
use super::sourcemap::SourceMapBuilder;
use super::transform::{js_string, TransformError};
use crate::compiler;
use crate::config::BuildConfig;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Name of the build manifest in the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A chunk after rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedChunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Script file name (output-relative).
    pub file: String,
    pub hash: String,
    pub style_file: Option<String>,
    pub map_file: Option<String>,
    pub modules: Vec<ModuleId>,
    /// Script size in bytes.
    pub size: usize,
}

/// Everything a build produces before it is written.
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub chunks: Vec<RenderedChunk>,
    pub artifacts: Vec<Artifact>,
}

impl Compilation {
    #[must_use]
    pub fn chunk(&self, name: &str) -> Option<&RenderedChunk> {
        self.chunks.iter().find(|c| c.name == name)
    }

    /// Output file name → content hash, for every hashed chunk file.
    #[must_use]
    pub fn file_hashes(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for artifact in &self.artifacts {
            if matches!(artifact.kind, ArtifactKind::Script | ArtifactKind::Style) {
                out.insert(artifact.name.clone(), kiln_util::hash::short_hash(&artifact.bytes));
            }
        }
        out
    }

    /// Scripts and stylesheets for an entry page: common chunk first.
    #[must_use]
    pub fn page_files(&self, entry: &str) -> (Vec<&str>, Vec<&str>) {
        let mut scripts = Vec::new();
        let mut styles = Vec::new();
        let ordered = self
            .chunks
            .iter()
            .filter(|c| c.kind == ChunkKind::Common)
            .chain(self.chunks.iter().filter(|c| c.kind == ChunkKind::Entry && c.name == entry));
        for chunk in ordered {
            scripts.push(chunk.file.as_str());
            if let Some(style) = &chunk.style_file {
                styles.push(style.as_str());
            }
        }
        (scripts, styles)
    }
}

/// Rendering switches that do not come from the build config.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Embed the hot-reload client in entry chunks.
    pub hmr_client: bool,
}

/// Text being assembled, with its line count and optional line map.
struct ChunkWriter {
    text: String,
    line: u32,
    map: Option<SourceMapBuilder>,
}

impl ChunkWriter {
    fn push(&mut self, s: &str) {
        self.text.push_str(s);
        self.line += s.matches('\n').count() as u32;
    }
}

/// Render every chunk of the plan into output artifacts.
pub fn render(
    graph: &DependencyGraph,
    plan: &ChunkPlan,
    config: &BuildConfig,
    options: RenderOptions,
) -> Result<Compilation, TransformError> {
    let opt = &config.optimization;
    let ids = OutputIds::new(graph, opt.named_modules);

    let modules: Vec<_> = graph.modules().filter(|m| !m.id.is_synthetic()).collect();
    let linked: BTreeMap<&ModuleId, String> = modules.par_iter().map(|m| (&m.id, link(m, &ids))).collect();

    let mut order: Vec<usize> = (0..plan.chunks.len())
        .filter(|&i| plan.chunks[i].kind != ChunkKind::Entry)
        .collect();
    order.extend((0..plan.chunks.len()).filter(|&i| plan.chunks[i].kind == ChunkKind::Entry));

    let mut rendered: Vec<Option<RenderedChunk>> = vec![None; plan.chunks.len()];
    let mut artifacts = Vec::new();
    let mut async_map: BTreeMap<String, String> = BTreeMap::new();
    let dynamic_targets = graph.dynamic_targets();

    for index in order {
        let chunk = &plan.chunks[index];
        let is_entry = chunk.kind == ChunkKind::Entry;

        let mut writer = ChunkWriter {
            text: String::new(),
            line: 0,
            map: opt.source_maps.then(SourceMapBuilder::new),
        };

        if is_entry {
            writer.push(RUNTIME);
            if options.hmr_client {
                writer.push(HMR_CLIENT);
            }
            if !async_map.is_empty() {
                let entries: Vec<String> = async_map
                    .iter()
                    .map(|(id, url)| format!("{}: {}", js_string(id), js_string(url)))
                    .collect();
                writer.push(&format!("__kiln.chunks({{{}}});\n", entries.join(", ")));
            }
        }

        writer.push("(function (modules) {\n");
        for id in &chunk.modules {
            let (Some(module), Some(body)) = (graph.get(id), linked.get(id)) else {
                continue;
            };
            let out_id = ids.get(id).unwrap_or(id.as_str());
            writer.push(&format!("// {id}\nmodules[{}] = function (module, exports, __kiln_require) {{\n", js_string(out_id)));

            if let Some(map) = writer.map.as_mut() {
                if !module.source.is_empty() {
                    let source = map.add_source(id.as_str(), &module.source);
                    let source_lines = module.source.lines().count().max(1) as u32;
                    let body_lines = body.lines().count() as u32;
                    for k in 0..body_lines {
                        map.add_line_mapping(writer.line + k, source, k.min(source_lines - 1));
                    }
                }
            }

            writer.push(body);
            if !body.ends_with('\n') {
                writer.push("\n");
            }
            writer.push("};\n");
        }
        writer.push(&format!("}})({REGISTRY});\n"));

        if is_entry {
            if let Some(root) = &chunk.root {
                let out_id = ids.get(root).unwrap_or(root.as_str());
                writer.push(&format!("__kiln({});\n", js_string(out_id)));
            }
        }

        let mut text = writer.text;
        if opt.minify {
            text = compiler::minify(&text)
                .map_err(|e| TransformError::new(Path::new(&chunk.name), "minify", e.message))?;
        }

        let hash = kiln_util::hash::short_hash(text.as_bytes());
        let template = match chunk.kind {
            ChunkKind::Async => &config.output.chunk_filename,
            ChunkKind::Entry | ChunkKind::Common => &config.output.filename,
        };
        let file = fill_template(template, &chunk.name, &hash, Some("js"));

        let mut map_file = None;
        if let Some(map) = writer.map {
            let name = format!("{file}.map");
            let base = name.rsplit('/').next().unwrap_or(&name).to_string();
            artifacts.push(Artifact::new(&name, ArtifactKind::SourceMap, map.generate(&file)));
            text.push_str(&format!("//# sourceMappingURL={base}\n"));
            map_file = Some(name);
        }

        let styles: Vec<&str> = chunk
            .modules
            .iter()
            .filter_map(|id| graph.get(id).and_then(|m| m.style.as_deref()))
            .filter(|css| !css.trim().is_empty())
            .collect();
        let style_file = if styles.is_empty() {
            None
        } else {
            let css = styles.join("\n");
            let css_hash = kiln_util::hash::short_hash(css.as_bytes());
            let name = fill_template(&config.output.style_filename, &chunk.name, &css_hash, Some("css"));
            artifacts.push(Artifact::new(&name, ArtifactKind::Style, css));
            Some(name)
        };

        if !is_entry {
            for id in chunk.modules.iter().filter(|id| dynamic_targets.contains(*id)) {
                let out_id = ids.get(id).unwrap_or(id.as_str()).to_string();
                async_map.insert(out_id, format!("{}{}", config.output.public_path, file));
            }
        }

        tracing::debug!(chunk = %chunk.name, file = %file, modules = chunk.modules.len(), "rendered chunk");
        rendered[index] = Some(RenderedChunk {
            name: chunk.name.clone(),
            kind: chunk.kind,
            file: file.clone(),
            hash,
            style_file,
            map_file,
            modules: chunk.modules.clone(),
            size: text.len(),
        });
        artifacts.push(Artifact::new(file, ArtifactKind::Script, text));
    }

    let mut seen_assets = BTreeSet::new();
    // Module keys map to one file, or to a list when the module emits several.
    let mut manifest: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    for module in graph.modules() {
        let files: Vec<String> = module.assets.iter().map(|a| a.name.clone()).collect();
        match files.as_slice() {
            [] => {}
            [one] => {
                manifest.insert(module.id.to_string(), one.clone().into());
            }
            _ => {
                manifest.insert(module.id.to_string(), files.clone().into());
            }
        }
        for asset in &module.assets {
            if seen_assets.insert(asset.name.clone()) {
                artifacts.push(Artifact::new(&asset.name, ArtifactKind::Asset, asset.bytes.clone()));
            }
        }
    }

    let chunks: Vec<RenderedChunk> = rendered.into_iter().flatten().collect();
    for chunk in &chunks {
        manifest.insert(format!("{}.js", chunk.name), chunk.file.clone().into());
        if let Some(style) = &chunk.style_file {
            manifest.insert(format!("{}.css", chunk.name), style.clone().into());
        }
    }
    let manifest_json = serde_json::to_string_pretty(&manifest).unwrap_or_default();
    artifacts.push(Artifact::new(MANIFEST_FILE, ArtifactKind::Manifest, manifest_json));

    Ok(Compilation { chunks, artifacts })
}
