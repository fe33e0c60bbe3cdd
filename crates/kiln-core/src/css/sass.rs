//! Sass/SCSS compilation using grass.

use std::path::Path;

/// Sass compilation options.
#[derive(Debug, Clone, Default)]
pub struct SassOptions {
    /// Extra load paths for `@import`/`@use`.
    pub load_paths: Vec<String>,
    /// Compressed output.
    pub minify: bool,
    /// Source file path; its directory is added as a load path and its
    /// extension selects the syntax.
    pub filename: Option<String>,
}

/// Compile Sass/SCSS to CSS.
///
/// `.sass` files use the indented syntax, everything else SCSS.
pub fn compile_sass(source: &str, options: &SassOptions) -> Result<String, SassError> {
    let filename = options.filename.as_deref().unwrap_or("input.scss");
    let syntax = if Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sass"))
    {
        grass::InputSyntax::Sass
    } else {
        grass::InputSyntax::Scss
    };

    let style = if options.minify {
        grass::OutputStyle::Compressed
    } else {
        grass::OutputStyle::Expanded
    };
    let mut grass_options = grass::Options::default().style(style).input_syntax(syntax);

    for path in &options.load_paths {
        grass_options = grass_options.load_path(path);
    }
    if let Some(parent) = Path::new(filename).parent() {
        grass_options = grass_options.load_path(parent);
    }

    grass::from_string(source.to_string(), &grass_options).map_err(|e| SassError::Compile(format!("{e}")))
}

/// Sass compilation error.
#[derive(Debug)]
pub enum SassError {
    Compile(String),
}

impl std::fmt::Display for SassError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SassError::Compile(msg) => write!(f, "Sass compile error: {msg}"),
        }
    }
}

impl std::error::Error for SassError {}
