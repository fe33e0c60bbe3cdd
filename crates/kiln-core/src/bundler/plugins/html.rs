//! HTML page generation.

use crate::bundler::emit::{Artifact, ArtifactKind};
use crate::bundler::plugin::{HookResult, Plugin, PluginContext, PluginError};
use crate::bundler::render::Compilation;
use crate::config::HtmlOptions;
use regex_lite::Regex;

const DEFAULT_FILENAME: &str = "index.html";
const DEFAULT_TITLE: &str = "kiln app";

const DEFAULT_TEMPLATE: &str = "<!DOCTYPE html>
<html>
  <head>
    <meta charset=\"utf-8\">
    <title><%= title %></title>
  </head>
  <body>
  </body>
</html>
";

const TITLE_PLACEHOLDER: &str = r"<%=\s*(?:htmlWebpackPlugin\.options\.)?title\s*%>";

/// Writes an HTML page referencing every entry's scripts and stylesheets.
pub struct HtmlPlugin {
    options: HtmlOptions,
}

impl HtmlPlugin {
    #[must_use]
    pub fn new(options: HtmlOptions) -> Self {
        Self { options }
    }

    fn template(&self, ctx: &PluginContext<'_>) -> HookResult<String> {
        let Some(template) = &self.options.template else {
            return Ok(DEFAULT_TEMPLATE.to_string());
        };
        let path = ctx.config.root.join(template);
        std::fs::read_to_string(&path).map_err(|e| {
            PluginError::new(
                self.name(),
                "on_emit",
                format!("cannot read template {}: {e}", path.display()),
            )
        })
    }
}

impl Plugin for HtmlPlugin {
    fn name(&self) -> &str {
        "html"
    }

    fn on_emit(&self, ctx: &PluginContext<'_>, compilation: &mut Compilation) -> HookResult<()> {
        let public = &ctx.config.output.public_path;
        let mut scripts: Vec<String> = Vec::new();
        let mut styles: Vec<String> = Vec::new();
        for (entry, _) in &ctx.config.entries {
            let (entry_scripts, entry_styles) = compilation.page_files(entry);
            for file in entry_scripts {
                let url = format!("{public}{file}");
                if !scripts.contains(&url) {
                    scripts.push(url);
                }
            }
            for file in entry_styles {
                let url = format!("{public}{file}");
                if !styles.contains(&url) {
                    styles.push(url);
                }
            }
        }

        let title = escape(self.options.title.as_deref().unwrap_or(DEFAULT_TITLE));
        let template = self.template(ctx)?;
        let placeholder = Regex::new(TITLE_PLACEHOLDER)
            .map_err(|e| PluginError::new(self.name(), "on_emit", e.to_string()))?;
        let page = placeholder.replace_all(&template, regex_lite::NoExpand(&title));

        let links: String = styles
            .iter()
            .map(|href| format!("<link href=\"{}\" rel=\"stylesheet\">", escape(href)))
            .collect();
        let tags: String = scripts
            .iter()
            .map(|src| format!("<script src=\"{}\"></script>", escape(src)))
            .collect();

        let page = insert_before(&page, "</head>", &links, false);
        let page = insert_before(&page, "</body>", &tags, true);

        let filename = self.options.filename.as_deref().unwrap_or(DEFAULT_FILENAME);
        tracing::debug!(file = filename, scripts = scripts.len(), styles = styles.len(), "generated html");
        compilation
            .artifacts
            .push(Artifact::new(filename, ArtifactKind::Html, page));
        Ok(())
    }
}

/// Insert `text` before the last `marker`; without one, prepend or append.
fn insert_before(page: &str, marker: &str, text: &str, append: bool) -> String {
    if text.is_empty() {
        return page.to_string();
    }
    match page.rfind(marker) {
        Some(at) => format!("{}{text}{}", &page[..at], &page[at..]),
        None if append => format!("{page}{text}"),
        None => format!("{text}{page}"),
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::chunks::ChunkKind;
    use crate::bundler::render::RenderedChunk;
    use crate::config::{BuildConfig, RawConfig};
    use std::path::Path;
    use tempfile::tempdir;

    fn chunk(name: &str, kind: ChunkKind, style: bool) -> RenderedChunk {
        RenderedChunk {
            name: name.to_string(),
            kind,
            file: format!("{name}.abc.js"),
            hash: "abc".to_string(),
            style_file: style.then(|| format!("{name}.def.css")),
            map_file: None,
            modules: Vec::new(),
            size: 0,
        }
    }

    fn compilation() -> Compilation {
        Compilation {
            chunks: vec![
                chunk("admin", ChunkKind::Entry, false),
                chunk("index", ChunkKind::Entry, true),
                chunk("common", ChunkKind::Common, true),
                chunk("page", ChunkKind::Async, false),
            ],
            artifacts: Vec::new(),
        }
    }

    fn config(root: &Path) -> BuildConfig {
        let raw = RawConfig::from_json(r#"{"entry": {"index": "./a.js", "admin": "./b.js"}}"#).unwrap();
        BuildConfig::resolve(raw, root, None, None).unwrap()
    }

    fn html(compilation: &Compilation, name: &str) -> String {
        let artifact = compilation.artifacts.iter().find(|a| a.name == name).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Html);
        String::from_utf8(artifact.bytes.clone()).unwrap()
    }

    #[test]
    fn test_default_page() {
        let cfg = config(Path::new("/project"));
        let ctx = PluginContext {
            config: &cfg,
            watch: false,
            graph: None,
        };
        let mut out = compilation();
        HtmlPlugin::new(HtmlOptions {
            title: Some("R&D".to_string()),
            ..Default::default()
        })
        .on_emit(&ctx, &mut out)
        .unwrap();

        let page = html(&out, "index.html");
        assert!(page.contains("<title>R&amp;D</title>"));
        assert!(page.contains(
            "<link href=\"/common.def.css\" rel=\"stylesheet\"><link href=\"/index.def.css\" rel=\"stylesheet\"></head>"
        ));
        // Common chunk first, each file once, async chunks never.
        assert!(page.contains(
            "<script src=\"/common.abc.js\"></script><script src=\"/admin.abc.js\"></script>\
             <script src=\"/index.abc.js\"></script></body>"
        ));
        assert!(!page.contains("page.abc.js"));
    }

    #[test]
    fn test_template_and_filename() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/index.html"),
            "<html><head><title><%= htmlWebpackPlugin.options.title %></title></head><body><div id=\"app\"></div></body></html>",
        )
        .unwrap();
        let cfg = config(dir.path());
        let ctx = PluginContext {
            config: &cfg,
            watch: false,
            graph: None,
        };
        let mut out = compilation();
        HtmlPlugin::new(HtmlOptions {
            title: Some("test".to_string()),
            template: Some("src/index.html".to_string()),
            filename: Some("app.html".to_string()),
        })
        .on_emit(&ctx, &mut out)
        .unwrap();

        let page = html(&out, "app.html");
        assert!(page.starts_with("<html><head><title>test</title>"));
        assert!(page.contains("<div id=\"app\"></div><script src=\"/common.abc.js\"></script>"));
        assert!(page.ends_with("</body></html>"));
    }

    #[test]
    fn test_missing_template() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let ctx = PluginContext {
            config: &cfg,
            watch: false,
            graph: None,
        };
        let err = HtmlPlugin::new(HtmlOptions {
            template: Some("missing.html".to_string()),
            ..Default::default()
        })
        .on_emit(&ctx, &mut compilation())
        .unwrap_err();
        assert_eq!(err.plugin, "html");
        assert!(err.message.contains("missing.html"));
    }

    #[test]
    fn test_insert_without_markers() {
        assert_eq!(insert_before("<p></p>", "</body>", "<script></script>", true), "<p></p><script></script>");
        assert_eq!(insert_before("<p></p>", "</head>", "<link>", false), "<link><p></p>");
    }
}
