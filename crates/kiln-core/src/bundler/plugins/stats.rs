//! Build statistics: chunks, their modules and sizes.

use crate::bundler::chunks::ChunkKind;
use crate::bundler::emit::{Artifact, ArtifactKind};
use crate::bundler::graph::DependencyGraph;
use crate::bundler::plugin::{HookResult, Plugin, PluginContext, PluginError};
use crate::bundler::render::Compilation;
use crate::config::{BuildConfig, Mode};
use crate::version::{STATS_SCHEMA_VERSION, VERSION};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStats {
    pub id: String,
    pub kind: &'static str,
    /// Source size in bytes.
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStats {
    pub name: String,
    pub kind: ChunkKind,
    pub file: String,
    pub style_file: Option<String>,
    pub size: usize,
    pub modules: Vec<ModuleStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStats {
    pub name: String,
    pub kind: ArtifactKind,
    pub size: usize,
}

/// Summary of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub schema_version: u32,
    pub version: &'static str,
    pub mode: Mode,
    pub chunks: Vec<ChunkStats>,
    pub assets: Vec<AssetStats>,
}

impl BuildStats {
    #[must_use]
    pub fn collect(config: &BuildConfig, graph: &DependencyGraph, compilation: &Compilation) -> Self {
        let chunks = compilation
            .chunks
            .iter()
            .map(|chunk| ChunkStats {
                name: chunk.name.clone(),
                kind: chunk.kind,
                file: chunk.file.clone(),
                style_file: chunk.style_file.clone(),
                size: chunk.size,
                modules: chunk
                    .modules
                    .iter()
                    .filter_map(|id| graph.get(id))
                    .map(|m| ModuleStats {
                        id: m.id.to_string(),
                        kind: m.kind.as_str(),
                        size: m.source_size,
                    })
                    .collect(),
            })
            .collect();

        let mut assets: Vec<AssetStats> = compilation
            .artifacts
            .iter()
            .map(|a| AssetStats {
                name: a.name.clone(),
                kind: a.kind,
                size: a.bytes.len(),
            })
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            schema_version: STATS_SCHEMA_VERSION,
            version: VERSION,
            mode: config.mode,
            chunks,
            assets,
        }
    }
}

/// Writes [`BuildStats`] as JSON next to the other artifacts.
pub struct StatsPlugin {
    filename: String,
}

impl StatsPlugin {
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

impl Plugin for StatsPlugin {
    fn name(&self) -> &str {
        "stats"
    }

    fn on_emit(&self, ctx: &PluginContext<'_>, compilation: &mut Compilation) -> HookResult<()> {
        let Some(graph) = ctx.graph else {
            return Err(PluginError::new(self.name(), "on_emit", "module graph unavailable"));
        };
        let stats = BuildStats::collect(ctx.config, graph, compilation);
        let json = serde_json::to_string_pretty(&stats)
            .map_err(|e| PluginError::new(self.name(), "on_emit", e.to_string()))?;
        compilation
            .artifacts
            .push(Artifact::new(&self.filename, ArtifactKind::Stats, json));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::chunks::plan;
    use crate::bundler::graph::tests::{graph, record};
    use crate::bundler::render::{render, RenderOptions};
    use crate::config::RawConfig;
    use crate::imports::ImportKind;
    use std::path::Path;

    #[test]
    fn test_stats_file() {
        let raw = RawConfig::from_json(r#"{"entry": {"main": "./a.js"}, "stats": "report.json"}"#).unwrap();
        let cfg = BuildConfig::resolve(raw, Path::new("/project"), None, None).unwrap();
        let mut a = record("a.js", &[("b.js", ImportKind::Static)]);
        a.source_size = 10;
        let mut b = record("b.js", &[]);
        b.source_size = 4;
        let g = graph(vec![a, b], &[("main", "a.js")]);
        let mut compilation = render(&g, &plan(&g, "common"), &cfg, RenderOptions::default()).unwrap();

        let ctx = PluginContext {
            config: &cfg,
            watch: false,
            graph: Some(&g),
        };
        StatsPlugin::new("report.json").on_emit(&ctx, &mut compilation).unwrap();

        let artifact = compilation.artifacts.iter().find(|a| a.name == "report.json").unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Stats);
        let json: serde_json::Value = serde_json::from_slice(&artifact.bytes).unwrap();
        assert_eq!(json["schemaVersion"], STATS_SCHEMA_VERSION);
        assert_eq!(json["mode"], "development");
        assert_eq!(json["chunks"][0]["name"], "main");
        assert_eq!(json["chunks"][0]["kind"], "entry");
        assert_eq!(json["chunks"][0]["modules"][0]["id"], "a.js");
        assert_eq!(json["chunks"][0]["modules"][1]["size"], 4);
        assert!(json["assets"]
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["name"] == "manifest.json" && a["kind"] == "manifest"));
    }

    #[test]
    fn test_requires_graph() {
        let raw = RawConfig::from_json(r#"{"entry": {"main": "./a.js"}}"#).unwrap();
        let cfg = BuildConfig::resolve(raw, Path::new("/project"), None, None).unwrap();
        let ctx = PluginContext {
            config: &cfg,
            watch: false,
            graph: None,
        };
        let err = StatsPlugin::new("s.json")
            .on_emit(&ctx, &mut Compilation::default())
            .unwrap_err();
        assert_eq!(err.hook, "on_emit");
    }
}
