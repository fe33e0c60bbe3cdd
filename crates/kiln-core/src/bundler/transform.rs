//! Per-module transform pipeline.
//!
//! A module's raw content flows through the stages of its matching rule in
//! order. Every chain must end in JavaScript; style and asset stages are what
//! turn other content into a module.

use super::chunks::fill_template;
use super::graph::{EmittedAsset, ModuleKind};
use super::rules::{Rule, Stage};
use crate::compiler;
use crate::config::BuildConfig;
use crate::css::sass::{compile_sass, SassOptions};
use crate::css::{process_css, CssOptions};
use base64::Engine as _;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A stage failed for a module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage}: {message}")]
pub struct TransformError {
    pub path: PathBuf,
    /// Stage name (`load`, `match`, `define` or a rule stage).
    pub stage: String,
    pub message: String,
}

impl TransformError {
    #[must_use]
    pub fn new(path: &Path, stage: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

/// Result of transforming one module.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    /// JavaScript module body.
    pub code: String,
    /// Stylesheet text to place in a synthetic extracted module.
    pub extracted: Option<String>,
    /// Binary files to emit.
    pub assets: Vec<EmittedAsset>,
}

/// Content between stages.
enum Content {
    Script(String),
    Style(String),
    Binary(Vec<u8>),
}

impl Content {
    fn label(&self) -> &'static str {
        match self {
            Self::Script(_) => "script",
            Self::Style(_) => "stylesheet",
            Self::Binary(_) => "binary",
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Script(s) | Self::Style(s) => s.into_bytes(),
            Self::Binary(b) => b,
        }
    }

    fn into_text(self) -> String {
        match self {
            Self::Script(s) | Self::Style(s) => s,
            Self::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
        }
    }
}

/// Run a module through its rule's chain and the mode-derived finishing stages.
pub fn transform(
    path: &Path,
    bytes: Vec<u8>,
    rule: Option<&Rule>,
    config: &BuildConfig,
) -> Result<TransformOutput, TransformError> {
    let kind = ModuleKind::detect(path);
    let mut output = TransformOutput::default();

    let mut content = match kind {
        ModuleKind::Script => Content::Script(String::from_utf8_lossy(&bytes).into_owned()),
        ModuleKind::Style => Content::Style(String::from_utf8_lossy(&bytes).into_owned()),
        ModuleKind::Asset => Content::Binary(bytes),
    };

    match rule {
        Some(rule) => {
            for stage in &rule.stages {
                content = apply_stage(stage, content, path, config, &mut output)?;
            }
        }
        None if kind == ModuleKind::Script => {
            if is_json(path) {
                content = json_module(content.into_text(), path)?;
            }
        }
        None => {
            return Err(TransformError::new(
                path,
                "match",
                format!("no rule matches this {} module", kind.as_str()),
            ));
        }
    }

    let code = match content {
        Content::Script(code) => code,
        other => {
            let last = rule
                .and_then(|r| r.stages.last())
                .map_or("match", Stage::name);
            return Err(TransformError::new(
                path,
                last,
                format!("chain ends with {} output; a script is required", other.label()),
            ));
        }
    };

    output.code = replace_defines(&code, &config.define);
    Ok(output)
}

fn apply_stage(
    stage: &Stage,
    content: Content,
    path: &Path,
    config: &BuildConfig,
    output: &mut TransformOutput,
) -> Result<Content, TransformError> {
    let name = stage.name();
    let fail = |message: String| TransformError::new(path, name, message);
    let filename = path.display().to_string();

    match stage {
        Stage::TypeStrip => match content {
            Content::Script(code) => compiler::strip_types(&code, path)
                .map(Content::Script)
                .map_err(|e| fail(e.message)),
            other => Err(fail(format!("expects a script, got {}", other.label()))),
        },
        Stage::Sass => match content {
            Content::Style(text) => compile_sass(
                &text,
                &SassOptions {
                    load_paths: Vec::new(),
                    minify: false,
                    filename: Some(filename),
                },
            )
            .map(Content::Style)
            .map_err(|e| fail(e.to_string())),
            other => Err(fail(format!("expects a stylesheet, got {}", other.label()))),
        },
        Stage::Css => match content {
            Content::Style(text) => process_css(
                &text,
                &CssOptions {
                    minify: config.optimization.minify,
                    filename: Some(filename),
                    targets: None,
                },
            )
            .map(Content::Style)
            .map_err(|e| fail(e.to_string())),
            other => Err(fail(format!("expects a stylesheet, got {}", other.label()))),
        },
        Stage::Style => match content {
            Content::Style(css) => {
                if config.optimization.extract_styles {
                    output.extracted = Some(css);
                    Ok(Content::Script(String::new()))
                } else {
                    Ok(Content::Script(format!(
                        "module.exports = __kiln_require.style(module.id, {});\n",
                        js_string(&css)
                    )))
                }
            }
            other => Err(fail(format!("expects a stylesheet, got {}", other.label()))),
        },
        Stage::Url { limit } => {
            let bytes = content.into_bytes();
            if bytes.len() < *limit {
                let uri = format!(
                    "data:{};base64,{}",
                    mime_type(path),
                    base64::engine::general_purpose::STANDARD.encode(&bytes)
                );
                Ok(Content::Script(format!("module.exports = {};\n", js_string(&uri))))
            } else {
                Ok(Content::Script(emit_file(path, bytes, config, output)))
            }
        }
        Stage::File => Ok(Content::Script(emit_file(path, content.into_bytes(), config, output))),
        Stage::Raw => Ok(Content::Script(format!(
            "module.exports = {};\n",
            js_string(&content.into_text())
        ))),
    }
}

/// Queue the file for emission and export its public URL.
fn emit_file(path: &Path, bytes: Vec<u8>, config: &BuildConfig, output: &mut TransformOutput) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("asset");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("bin");
    let hash = kiln_util::hash::short_hash(&bytes);
    let name = fill_template(&config.output.asset_filename, stem, &hash, Some(ext));
    let url = format!("{}{}", config.output.public_path, name);
    output.assets.push(EmittedAsset { name, bytes });
    format!("module.exports = {};\n", js_string(&url))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn json_module(text: String, path: &Path) -> Result<Content, TransformError> {
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| TransformError::new(path, "json", e.to_string()))?;
    Ok(Content::Script(format!("module.exports = {value};\n")))
}

/// Quote a string as a JavaScript literal.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Replace defined constants outside of strings and comments.
///
/// A key only matches as a whole member expression: `process.env.NODE_ENV`
/// does not match inside `xprocess.env.NODE_ENV` or `a.process.env.NODE_ENV`.
pub fn replace_defines(code: &str, defines: &BTreeMap<String, String>) -> String {
    if defines.is_empty() || !defines.keys().any(|k| code.contains(k.as_str())) {
        return code.to_string();
    }

    // Longest key first so `a.b.c` wins over `a.b`.
    let mut keys: Vec<(&str, &str)> = defines.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));

    let src = code.as_bytes();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;
    let mut copied = 0;

    while i < src.len() {
        match src[i] {
            b'/' if src.get(i + 1) == Some(&b'/') => {
                while i < src.len() && src[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if src.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < src.len() && !(src[i] == b'*' && src.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(src.len());
            }
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < src.len() && src[i] != quote {
                    if src[i] == b'\\' {
                        i += 1;
                    } else if src[i] == b'\n' && quote != b'`' {
                        break;
                    }
                    i += 1;
                }
                i = (i + 1).min(src.len());
            }
            b if is_ident_byte(b) => {
                let boundary_before = i == 0 || (!is_ident_byte(src[i - 1]) && src[i - 1] != b'.');
                let hit = boundary_before
                    .then(|| {
                        keys.iter().find(|(key, _)| {
                            let end = i + key.len();
                            code[i..].starts_with(key)
                                && src.get(end).map_or(true, |&c| !is_ident_byte(c))
                        })
                    })
                    .flatten();
                if let Some((key, value)) = hit {
                    out.push_str(&code[copied..i]);
                    out.push_str(value);
                    i += key.len();
                    copied = i;
                } else {
                    while i < src.len() && is_ident_byte(src[i]) {
                        i += 1;
                    }
                }
            }
            _ => i += 1,
        }
    }

    out.push_str(&code[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, RawConfig};

    fn config(mode: Mode) -> BuildConfig {
        let raw = RawConfig::from_json(r#"{"entry": {"index": "./src/index.js"}}"#).unwrap();
        BuildConfig::resolve(raw, Path::new("/project"), Some(mode), None).unwrap()
    }

    fn rule(stages: Vec<Stage>) -> Rule {
        Rule::new(&[".x".to_string()], &[], stages).unwrap()
    }

    #[test]
    fn test_script_without_rule_passes_through() {
        let cfg = config(Mode::Development);
        let out = transform(Path::new("/project/a.js"), b"export const a = 1;\n".to_vec(), None, &cfg).unwrap();
        assert_eq!(out.code, "export const a = 1;\n");
    }

    #[test]
    fn test_style_without_rule_fails_at_match() {
        let cfg = config(Mode::Development);
        let err = transform(Path::new("/project/a.css"), b".a{}".to_vec(), None, &cfg).unwrap_err();
        assert_eq!(err.stage, "match");
        assert_eq!(err.path, PathBuf::from("/project/a.css"));
    }

    #[test]
    fn test_json_module() {
        let cfg = config(Mode::Development);
        let out = transform(Path::new("/project/data.json"), br#"{"a": [1, 2]}"#.to_vec(), None, &cfg).unwrap();
        assert_eq!(out.code, "module.exports = {\"a\":[1,2]};\n");
    }

    #[test]
    fn test_type_strip_stage() {
        let cfg = config(Mode::Development);
        let out = transform(
            Path::new("/project/a.ts"),
            b"export const n: number = 1;\n".to_vec(),
            Some(&rule(vec![Stage::TypeStrip])),
            &cfg,
        )
        .unwrap();
        assert!(!out.code.contains(": number"));
        assert!(out.code.contains("export const n"));
    }

    #[test]
    fn test_style_injected_in_development() {
        let cfg = config(Mode::Development);
        let out = transform(
            Path::new("/project/a.css"),
            b".a { color: red; }".to_vec(),
            Some(&rule(vec![Stage::Css, Stage::Style])),
            &cfg,
        )
        .unwrap();
        assert!(out.code.starts_with("module.exports = __kiln_require.style(module.id, "));
        assert!(out.code.contains("color: red"));
        assert!(out.extracted.is_none());
    }

    #[test]
    fn test_style_extracted_in_production() {
        let cfg = config(Mode::Production);
        let out = transform(
            Path::new("/project/a.scss"),
            b"$c: red;\n.a { .b { color: $c; } }".to_vec(),
            Some(&rule(vec![Stage::Sass, Stage::Css, Stage::Style])),
            &cfg,
        )
        .unwrap();
        assert_eq!(out.code, "");
        let css = out.extracted.unwrap();
        assert!(css.contains(".a .b"));
        assert!(css.contains("red"));
    }

    #[test]
    fn test_chain_must_end_in_script() {
        let cfg = config(Mode::Development);
        let err = transform(
            Path::new("/project/a.css"),
            b".a{}".to_vec(),
            Some(&rule(vec![Stage::Css])),
            &cfg,
        )
        .unwrap_err();
        assert_eq!(err.stage, "css");
        assert!(err.message.contains("stylesheet"));
    }

    #[test]
    fn test_stage_input_mismatch() {
        let cfg = config(Mode::Development);
        let err = transform(
            Path::new("/project/a.js"),
            b"1".to_vec(),
            Some(&rule(vec![Stage::Sass])),
            &cfg,
        )
        .unwrap_err();
        assert_eq!(err.stage, "sass");
    }

    #[test]
    fn test_url_inlines_small_files() {
        let cfg = config(Mode::Production);
        let out = transform(
            Path::new("/project/dot.png"),
            vec![1, 2, 3],
            Some(&rule(vec![Stage::Url { limit: 1000 }])),
            &cfg,
        )
        .unwrap();
        assert_eq!(out.code, "module.exports = \"data:image/png;base64,AQID\";\n");
        assert!(out.assets.is_empty());
    }

    #[test]
    fn test_url_emits_large_files() {
        let cfg = config(Mode::Production);
        let bytes = vec![7u8; 2000];
        let out = transform(
            Path::new("/project/img/photo.jpg"),
            bytes.clone(),
            Some(&rule(vec![Stage::Url { limit: 1000 }])),
            &cfg,
        )
        .unwrap();
        let hash = kiln_util::hash::short_hash(&bytes);
        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.assets[0].name, format!("photo.{hash}.jpg"));
        assert_eq!(out.code, format!("module.exports = \"/photo.{hash}.jpg\";\n"));
    }

    #[test]
    fn test_raw_stage() {
        let cfg = config(Mode::Development);
        let out = transform(
            Path::new("/project/notes.txt"),
            b"line \"one\"\n".to_vec(),
            Some(&rule(vec![Stage::Raw])),
            &cfg,
        )
        .unwrap();
        assert_eq!(out.code, "module.exports = \"line \\\"one\\\"\\n\";\n");
    }

    #[test]
    fn test_node_env_defined() {
        let cfg = config(Mode::Production);
        let out = transform(
            Path::new("/project/a.js"),
            b"if (process.env.NODE_ENV !== 'production') debug();\n".to_vec(),
            None,
            &cfg,
        )
        .unwrap();
        assert_eq!(out.code, "if (\"production\" !== 'production') debug();\n");
    }

    #[test]
    fn test_replace_defines_boundaries() {
        let mut defines = BTreeMap::new();
        defines.insert("DEBUG".to_string(), "false".to_string());
        defines.insert("process.env.NODE_ENV".to_string(), "\"development\"".to_string());

        let code = "DEBUG; DEBUG_MODE; x.DEBUG; \"DEBUG\"; // DEBUG\nprocess.env.NODE_ENV;";
        assert_eq!(
            replace_defines(code, &defines),
            "false; DEBUG_MODE; x.DEBUG; \"DEBUG\"; // DEBUG\n\"development\";"
        );
    }
}
