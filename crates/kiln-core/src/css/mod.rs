//! Stylesheet processing.
//!
//! - `process_css`: lightningcss parse, nesting lowering and vendor prefixing,
//!   minified output in production
//! - [`sass::compile_sass`]: Sass/SCSS to CSS via grass

pub mod sass;

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

/// CSS processing options.
#[derive(Debug, Clone, Default)]
pub struct CssOptions {
    /// Minify the printed output.
    pub minify: bool,
    /// Source file path (for error messages).
    pub filename: Option<String>,
    /// Browser targets for prefixing (defaults to reasonable coverage).
    pub targets: Option<Browsers>,
}

/// Normalise a stylesheet: lower nesting, add vendor prefixes for the
/// targets, optionally minify.
pub fn process_css(source: &str, options: &CssOptions) -> Result<String, CssError> {
    let filename = options.filename.as_deref().unwrap_or("input.css");

    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| CssError::Parse(format!("{filename}: {e}")))?;

    let browsers = options.targets.unwrap_or_else(default_browser_targets);

    stylesheet
        .minify(MinifyOptions {
            targets: Targets::from(browsers),
            ..Default::default()
        })
        .map_err(|e| CssError::Transform(format!("{filename}: {e}")))?;

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: options.minify,
            targets: Targets::from(browsers),
            ..Default::default()
        })
        .map_err(|e| CssError::Print(format!("{filename}: {e}")))?;

    Ok(output.code)
}

/// Chrome 80+, Firefox 75+, Safari 13+, Edge 80+.
fn default_browser_targets() -> Browsers {
    Browsers {
        chrome: Some(80 << 16),
        firefox: Some(75 << 16),
        safari: Some(13 << 16),
        edge: Some(80 << 16),
        ..Default::default()
    }
}

/// CSS processing error.
#[derive(Debug)]
pub enum CssError {
    Parse(String),
    Transform(String),
    Print(String),
}

impl std::fmt::Display for CssError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CssError::Parse(msg) => write!(f, "CSS parse error: {msg}"),
            CssError::Transform(msg) => write!(f, "CSS transform error: {msg}"),
            CssError::Print(msg) => write!(f, "CSS print error: {msg}"),
        }
    }
}

impl std::error::Error for CssError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_css_processing() {
        let css = process_css(".foo { color: red; }", &CssOptions::default()).unwrap();
        assert!(css.contains("color"));
    }

    #[test]
    fn test_minification() {
        let options = CssOptions {
            minify: true,
            ..Default::default()
        };
        let css = process_css(".foo {\n  color: red;\n  margin: 10px;\n}", &options).unwrap();
        assert!(!css.contains('\n'));
    }

    #[test]
    fn test_comment_only_change_is_stable_when_minified() {
        let options = CssOptions {
            minify: true,
            ..Default::default()
        };
        let a = process_css("/* a */ .foo { color: red; }", &options).unwrap();
        let b = process_css("/* b */ .foo { color: red; }", &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nesting_flattened() {
        let css = process_css(".parent { .child { color: red; } }", &CssOptions::default()).unwrap();
        assert!(css.contains(".parent"));
        assert!(css.contains(".child"));
    }
}
