//! Build configuration.
//!
//! `kiln.config.json` is parsed into a [`RawConfig`] and resolved exactly once
//! into an immutable [`BuildConfig`]. Everything mode-dependent (minification,
//! source maps, style extraction, module ids, defines) is derived here so no
//! other component branches on the mode.

use crate::bundler::rules::{Rule, RuleSet, Stage};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the project root.
pub const CONFIG_FILE: &str = "kiln.config.json";

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Parse a mode name (`development`/`dev`, `production`/`prod`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Raw (on-disk) configuration
// ============================================================================

/// A string or a list of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl OneOrMany {
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// A transform stage as written in config: a bare name or an object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawStage {
    Name(String),
    Full(Stage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    pub test: OneOrMany,
    #[serde(default)]
    pub exclude: OneOrMany,
    #[serde(rename = "use", default)]
    pub stages: Vec<RawStage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOutput {
    pub path: Option<String>,
    pub filename: Option<String>,
    pub chunk_filename: Option<String>,
    pub style_filename: Option<String>,
    pub asset_filename: Option<String>,
    pub public_path: Option<String>,
    pub clean: Option<bool>,
    pub common_chunk: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawResolve {
    pub modules: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDevServer {
    pub hot: Option<bool>,
    pub content_base: Option<String>,
    pub compress: Option<bool>,
    pub port: Option<u16>,
    pub host: Option<String>,
}

/// Externals: a list of specifiers (global name = specifier) or a map
/// specifier → global name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawExternals {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Default for RawExternals {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// HTML generation options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HtmlOptions {
    pub title: Option<String>,
    pub template: Option<String>,
    pub filename: Option<String>,
}

/// A built-in plugin declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum PluginSpec {
    /// Generate an HTML page referencing the entry artifacts.
    Html(HtmlOptions),
    /// Write a JSON statistics file.
    Stats {
        #[serde(default = "default_stats_filename")]
        filename: String,
    },
    /// Prepend a comment banner to every script chunk.
    Banner { text: String },
}

fn default_stats_filename() -> String {
    "stats.json".to_string()
}

/// `kiln.config.json` as written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
    pub mode: Option<Mode>,
    pub entry: BTreeMap<String, String>,
    pub output: RawOutput,
    pub rules: Option<Vec<RawRule>>,
    pub resolve: RawResolve,
    pub dev_server: RawDevServer,
    pub plugins: Vec<PluginSpec>,
    pub define: BTreeMap<String, String>,
    pub externals: RawExternals,
    pub parallelism: Option<usize>,
    pub html: Option<HtmlOptions>,
    pub stats: Option<String>,
}

impl RawConfig {
    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Output locations and file name templates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Entry and common chunks.
    pub filename: String,
    /// Async chunks.
    pub chunk_filename: String,
    /// Extracted stylesheets.
    pub style_filename: String,
    /// Emitted binary assets.
    pub asset_filename: String,
    pub public_path: String,
    pub clean: bool,
    pub common_chunk: String,
}

/// A module search root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ModuleRoot {
    /// An absolute directory, searched directly.
    Absolute(PathBuf),
    /// A directory name searched upward from the importer (`node_modules`).
    Hierarchical(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveConfig {
    pub modules: Vec<ModuleRoot>,
    pub extensions: Vec<String>,
    /// Fail when a bare specifier matches in more than one root.
    pub strict: bool,
    /// Specifier → global name.
    pub externals: BTreeMap<String, String>,
}

/// Flags derived from the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    pub minify: bool,
    pub source_maps: bool,
    /// Readable module ids (root-relative paths) instead of short hashes.
    pub named_modules: bool,
    /// Extract styles into stylesheets instead of injecting them at runtime.
    pub extract_styles: bool,
}

impl Optimization {
    #[must_use]
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Development => Self {
                minify: false,
                source_maps: true,
                named_modules: true,
                extract_styles: false,
            },
            Mode::Production => Self {
                minify: true,
                source_maps: false,
                named_modules: false,
                extract_styles: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerConfig {
    pub hot: bool,
    pub content_base: PathBuf,
    pub compress: bool,
    pub port: u16,
    pub host: String,
}

/// Immutable, fully resolved build options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub root: PathBuf,
    pub mode: Mode,
    /// Chunk name → entry specifier, sorted by name.
    pub entries: Vec<(String, String)>,
    pub output: OutputConfig,
    pub rules: RuleSet,
    pub resolve: ResolveConfig,
    pub optimization: Optimization,
    /// Constant replacements, sorted by key.
    pub define: BTreeMap<String, String>,
    pub dev_server: DevServerConfig,
    pub plugins: Vec<PluginSpec>,
    pub parallelism: usize,
}

impl BuildConfig {
    /// Load the config for a project.
    ///
    /// `config_path` defaults to `<root>/kiln.config.json`; a missing default
    /// file is an error only because a build needs at least one entry.
    /// Mode precedence: `mode_override` > `NODE_ENV` > file > development.
    pub fn load(root: &Path, config_path: Option<&Path>, mode_override: Option<Mode>) -> Result<Self, Error> {
        let root = dunce::canonicalize(root).map_err(|source| Error::ConfigRead {
            path: root.to_path_buf(),
            source,
        })?;

        let raw = match config_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root.join(path)
                };
                RawConfig::from_file(&path)?
            }
            None => {
                let path = root.join(CONFIG_FILE);
                if path.exists() {
                    RawConfig::from_file(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    RawConfig::default()
                }
            }
        };

        let env_mode = std::env::var("NODE_ENV").ok().and_then(|v| {
            let mode = Mode::from_name(&v);
            if mode.is_none() {
                tracing::debug!(value = %v, "ignoring unrecognised NODE_ENV");
            }
            mode
        });

        Self::resolve(raw, &root, mode_override, env_mode)
    }

    /// Resolve a raw config against a project root.
    pub fn resolve(
        raw: RawConfig,
        root: &Path,
        mode_override: Option<Mode>,
        env_mode: Option<Mode>,
    ) -> Result<Self, Error> {
        let mode = mode_override.or(env_mode).or(raw.mode).unwrap_or_default();
        let optimization = Optimization::for_mode(mode);

        if raw.entry.is_empty() {
            return Err(Error::invalid("at least one entry is required"));
        }
        let entries: Vec<(String, String)> = raw.entry.into_iter().collect();

        let output = resolve_output(raw.output, root, &entries)?;
        let rules = match raw.rules {
            Some(rules) => resolve_rules(rules)?,
            None => RuleSet::defaults(),
        };
        let resolve = resolve_resolve(raw.resolve, raw.externals, root)?;

        let mut define = raw.define;
        if mode == Mode::Production {
            define
                .entry("process.env.NODE_ENV".to_string())
                .or_insert_with(|| format!("\"{}\"", mode.as_str()));
        }

        let dev_server = DevServerConfig {
            hot: raw.dev_server.hot.unwrap_or(true),
            content_base: raw
                .dev_server
                .content_base
                .map_or_else(|| output.dir.clone(), |p| absolutize(root, &p)),
            compress: raw.dev_server.compress.unwrap_or(true),
            port: raw.dev_server.port.unwrap_or(8000),
            host: raw
                .dev_server
                .host
                .unwrap_or_else(|| "127.0.0.1".to_string()),
        };

        let mut plugins = raw.plugins;
        if let Some(html) = raw.html {
            if !plugins.iter().any(|p| matches!(p, PluginSpec::Html(_))) {
                plugins.push(PluginSpec::Html(html));
            }
        }
        if let Some(filename) = raw.stats {
            if !plugins.iter().any(|p| matches!(p, PluginSpec::Stats { .. })) {
                plugins.push(PluginSpec::Stats { filename });
            }
        }

        let parallelism = match raw.parallelism {
            Some(0) => return Err(Error::invalid("parallelism must be at least 1")),
            Some(n) => n,
            None => std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
        };

        Ok(Self {
            root: root.to_path_buf(),
            mode,
            entries,
            output,
            rules,
            resolve,
            optimization,
            define,
            dev_server,
            plugins,
            parallelism,
        })
    }

    /// Override the worker bound.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Override the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output.dir = dir;
        self
    }

    /// Stable root-relative key for a path (forward slashes).
    #[must_use]
    pub fn relative_key(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => kiln_util::fs::to_slash(rel),
            Err(_) => kiln_util::fs::to_slash(path),
        }
    }
}

fn absolutize(root: &Path, p: &str) -> PathBuf {
    let path = Path::new(p);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn resolve_output(raw: RawOutput, root: &Path, entries: &[(String, String)]) -> Result<OutputConfig, Error> {
    let output = OutputConfig {
        dir: absolutize(root, raw.path.as_deref().unwrap_or("dist")),
        filename: raw.filename.unwrap_or_else(|| "[name].[hash].js".to_string()),
        chunk_filename: raw
            .chunk_filename
            .unwrap_or_else(|| "[name].bundle.js".to_string()),
        style_filename: raw
            .style_filename
            .unwrap_or_else(|| "[name].[hash].css".to_string()),
        asset_filename: raw
            .asset_filename
            .unwrap_or_else(|| "[name].[hash].[ext]".to_string()),
        public_path: raw.public_path.unwrap_or_else(|| "/".to_string()),
        clean: raw.clean.unwrap_or(false),
        common_chunk: raw.common_chunk.unwrap_or_else(|| "common".to_string()),
    };

    if output.dir == root {
        return Err(Error::invalid("output.path must not be the project root"));
    }
    if !output.filename.contains("[name]") {
        return Err(Error::invalid(format!(
            "output.filename '{}' must contain [name]",
            output.filename
        )));
    }
    for (field, template) in [
        ("chunkFilename", &output.chunk_filename),
        ("styleFilename", &output.style_filename),
        ("assetFilename", &output.asset_filename),
    ] {
        if !template.contains("[name]") && !template.contains("[hash]") {
            return Err(Error::invalid(format!(
                "output.{field} '{template}' must contain [name] or [hash]"
            )));
        }
    }
    if entries.iter().any(|(name, _)| *name == output.common_chunk) {
        return Err(Error::invalid(format!(
            "entry name '{}' collides with the common chunk name",
            output.common_chunk
        )));
    }
    Ok(output)
}

fn resolve_rules(raw: Vec<RawRule>) -> Result<RuleSet, Error> {
    let mut rules = Vec::with_capacity(raw.len());
    for (i, rule) in raw.into_iter().enumerate() {
        let stages = rule
            .stages
            .into_iter()
            .map(|s| match s {
                RawStage::Name(name) => Stage::from_name(&name),
                RawStage::Full(stage) => Ok(stage),
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::invalid(format!("rules[{i}]: {e}")))?;
        let rule = Rule::new(&rule.test.into_vec(), &rule.exclude.into_vec(), stages)
            .map_err(|e| Error::invalid(format!("rules[{i}]: {e}")))?;
        rules.push(rule);
    }
    Ok(RuleSet::new(rules))
}

fn resolve_resolve(raw: RawResolve, externals: RawExternals, root: &Path) -> Result<ResolveConfig, Error> {
    let modules = raw
        .modules
        .unwrap_or_else(|| vec!["src".to_string(), "node_modules".to_string()])
        .into_iter()
        .map(|m| {
            if Path::new(&m).is_absolute() || m.starts_with("./") || m.starts_with("../") {
                ModuleRoot::Absolute(absolutize(root, &m))
            } else {
                ModuleRoot::Hierarchical(m)
            }
        })
        .collect();

    let extensions = raw.extensions.unwrap_or_else(|| {
        [".js", ".jsx", ".ts", ".tsx", ".scss", ".css"]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    });
    if let Some(bad) = extensions.iter().find(|e| !e.starts_with('.')) {
        return Err(Error::invalid(format!(
            "resolve.extensions entry '{bad}' must start with '.'"
        )));
    }

    let externals = match externals {
        RawExternals::List(list) => list.into_iter().map(|s| (s.clone(), s)).collect(),
        RawExternals::Map(map) => map,
    };

    Ok(ResolveConfig {
        modules,
        extensions,
        strict: raw.strict.unwrap_or(false),
        externals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawConfig {
        RawConfig::from_json(json).unwrap()
    }

    fn resolve(json: &str) -> BuildConfig {
        BuildConfig::resolve(raw(json), Path::new("/project"), None, None).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = resolve(r#"{"entry": {"index": "./src/index.ts"}}"#);
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(config.output.dir, PathBuf::from("/project/dist"));
        assert_eq!(config.output.filename, "[name].[hash].js");
        assert_eq!(config.output.chunk_filename, "[name].bundle.js");
        assert!(!config.output.clean);
        assert_eq!(config.dev_server.port, 8000);
        assert!(config.optimization.source_maps);
        assert!(!config.optimization.minify);
        assert_eq!(
            config.resolve.modules,
            vec![
                ModuleRoot::Hierarchical("src".to_string()),
                ModuleRoot::Hierarchical("node_modules".to_string())
            ]
        );
        // Only production builds pin NODE_ENV.
        assert!(config.define.is_empty());
    }

    #[test]
    fn test_mode_precedence() {
        let json = r#"{"mode": "production", "entry": {"a": "./a.js"}}"#;
        let root = Path::new("/project");

        let file = BuildConfig::resolve(raw(json), root, None, None).unwrap();
        assert_eq!(file.mode, Mode::Production);

        let env = BuildConfig::resolve(raw(json), root, None, Some(Mode::Development)).unwrap();
        assert_eq!(env.mode, Mode::Development);

        let cli = BuildConfig::resolve(
            raw(json),
            root,
            Some(Mode::Production),
            Some(Mode::Development),
        )
        .unwrap();
        assert_eq!(cli.mode, Mode::Production);
    }

    #[test]
    fn test_production_flags() {
        let config = resolve(r#"{"mode": "production", "entry": {"a": "./a.js"}}"#);
        assert_eq!(config.optimization, Optimization::for_mode(Mode::Production));
        assert!(config.optimization.extract_styles);
        assert!(!config.optimization.source_maps);
        assert_eq!(
            config.define.get("process.env.NODE_ENV").map(String::as_str),
            Some("\"production\"")
        );
    }

    #[test]
    fn test_user_define_wins() {
        let config = resolve(
            r#"{"entry": {"a": "./a.js"}, "define": {"process.env.NODE_ENV": "\"test\"", "__DEV__": "true"}}"#,
        );
        assert_eq!(config.define["process.env.NODE_ENV"], "\"test\"");
        assert_eq!(config.define["__DEV__"], "true");
    }

    #[test]
    fn test_entries_sorted() {
        let config = resolve(r#"{"entry": {"vendor": "./v.js", "app": "./a.js"}}"#);
        let names: Vec<_> = config.entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["app", "vendor"]);
    }

    #[test]
    fn test_missing_entry_is_invalid() {
        let err = BuildConfig::resolve(raw("{}"), Path::new("/project"), None, None).unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
    }

    #[test]
    fn test_entry_common_collision() {
        let err = BuildConfig::resolve(
            raw(r#"{"entry": {"common": "./c.js"}}"#),
            Path::new("/project"),
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("common"));
    }

    #[test]
    fn test_custom_rules() {
        let config = resolve(
            r#"{
                "entry": {"a": "./a.ts"},
                "rules": [
                    {"test": "/\\.tsx?$/", "exclude": "node_modules", "use": ["type-strip"]},
                    {"test": [".png", ".svg"], "use": [{"name": "url", "limit": 2048}]}
                ]
            }"#,
        );
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules.find("src/a.tsx").unwrap().stages, vec![Stage::TypeStrip]);
        assert_eq!(
            config.rules.find("img/a.svg").unwrap().stages,
            vec![Stage::Url { limit: 2048 }]
        );
        assert!(config.rules.find("src/a.css").is_none());
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let err = BuildConfig::resolve(
            raw(r#"{"entry": {"a": "./a.ts"}, "rules": [{"test": ".ts", "use": ["babel"]}]}"#),
            Path::new("/project"),
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("babel"));
    }

    #[test]
    fn test_externals_list_and_map() {
        let list = resolve(r#"{"entry": {"a": "./a.js"}, "externals": ["react"]}"#);
        assert_eq!(list.resolve.externals["react"], "react");

        let map = resolve(r#"{"entry": {"a": "./a.js"}, "externals": {"react": "React"}}"#);
        assert_eq!(map.resolve.externals["react"], "React");
    }

    #[test]
    fn test_absolute_module_root() {
        let config = resolve(r#"{"entry": {"a": "./a.js"}, "resolve": {"modules": ["./src", "node_modules"]}}"#);
        assert_eq!(
            config.resolve.modules[0],
            ModuleRoot::Absolute(PathBuf::from("/project/./src"))
        );
    }

    #[test]
    fn test_html_and_stats_shorthands() {
        let config = resolve(
            r#"{"entry": {"a": "./a.js"}, "html": {"title": "App"}, "stats": "report.json"}"#,
        );
        assert_eq!(
            config.plugins,
            vec![
                PluginSpec::Html(HtmlOptions {
                    title: Some("App".to_string()),
                    ..Default::default()
                }),
                PluginSpec::Stats {
                    filename: "report.json".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_plugin_declarations() {
        let config = resolve(
            r#"{"entry": {"a": "./a.js"}, "plugins": [{"name": "banner", "text": "hi"}, {"name": "stats"}]}"#,
        );
        assert_eq!(
            config.plugins,
            vec![
                PluginSpec::Banner {
                    text: "hi".to_string()
                },
                PluginSpec::Stats {
                    filename: "stats.json".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let err = BuildConfig::resolve(
            raw(r#"{"entry": {"a": "./a.js"}, "parallelism": 0}"#),
            Path::new("/project"),
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_INVALID");
    }

    #[test]
    fn test_filename_requires_name() {
        let err = BuildConfig::resolve(
            raw(r#"{"entry": {"a": "./a.js"}, "output": {"filename": "bundle.js"}}"#),
            Path::new("/project"),
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("[name]"));
    }

    #[test]
    fn test_mode_from_name() {
        assert_eq!(Mode::from_name("PRODUCTION"), Some(Mode::Production));
        assert_eq!(Mode::from_name("dev"), Some(Mode::Development));
        assert_eq!(Mode::from_name("staging"), None);
    }

    #[test]
    fn test_relative_key() {
        let config = resolve(r#"{"entry": {"a": "./a.js"}}"#);
        assert_eq!(config.relative_key(Path::new("/project/src/a.ts")), "src/a.ts");
    }

    #[test]
    fn test_config_serializes() {
        let config = resolve(r#"{"entry": {"a": "./a.ts"}}"#);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["mode"], "development");
        assert_eq!(json["rules"][0]["test"][0], ".ts");
        assert_eq!(json["rules"][0]["use"][0]["name"], "type-strip");
    }
}
