//! Script compilation: TypeScript type stripping and minification.
//!
//! With the `swc` feature both operations go through SWC's parser and code
//! generator. Without it a lightweight fallback is used: a pattern-based type
//! stripper that understands common annotation forms, and a token-aware
//! minifier that drops comments and collapses whitespace.

mod swc;

#[cfg(not(feature = "swc"))]
mod minify;

use std::fmt;
use std::path::Path;

/// Error during compilation.
#[derive(Debug, Clone)]
pub struct CompilerError {
    /// Error code.
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
}

impl CompilerError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_PARSE_ERROR", message)
    }

    #[must_use]
    pub fn transform_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_TRANSFORM_ERROR", message)
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CompilerError {}

/// Name of the active backend.
#[must_use]
pub fn backend_name() -> &'static str {
    if cfg!(feature = "swc") {
        "swc"
    } else {
        "fallback"
    }
}

/// Whether a path names a TypeScript source.
#[must_use]
pub fn is_typescript(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ts" | "tsx" | "mts" | "cts"))
}

/// Remove TypeScript type syntax, producing JavaScript.
///
/// JSX in `.tsx` files is parsed but left as-is.
pub fn strip_types(source: &str, path: &Path) -> Result<String, CompilerError> {
    if source.trim().is_empty() {
        return Ok(String::new());
    }
    swc::strip_types(source, path)
}

/// Minify a script: drop comments and collapse whitespace.
pub fn minify(source: &str) -> Result<String, CompilerError> {
    if source.trim().is_empty() {
        return Ok(String::new());
    }

    #[cfg(feature = "swc")]
    {
        swc::minify(source)
    }

    #[cfg(not(feature = "swc"))]
    {
        Ok(minify::minify(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_is_typescript() {
        assert!(is_typescript(&PathBuf::from("app.ts")));
        assert!(is_typescript(&PathBuf::from("app.TSX")));
        assert!(is_typescript(&PathBuf::from("app.mts")));
        assert!(!is_typescript(&PathBuf::from("app.js")));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(strip_types("", Path::new("a.ts")).unwrap(), "");
        assert_eq!(minify("  \n").unwrap(), "");
    }

    #[test]
    fn test_strip_removes_annotations() {
        let out = strip_types(
            "const greeting: string = \"hi\";\nfunction add(a: number, b: number): number { return a + b; }\n",
            Path::new("a.ts"),
        )
        .unwrap();
        assert!(!out.contains(": string"));
        assert!(!out.contains(": number"));
        assert!(out.contains("greeting"));
        assert!(out.contains("return a + b"));
    }

    #[test]
    fn test_strip_removes_interfaces() {
        let out = strip_types(
            "interface User { name: string }\nexport const u = { name: \"x\" };\n",
            Path::new("a.ts"),
        )
        .unwrap();
        assert!(!out.contains("interface"));
        assert!(out.contains("name"));
    }

    #[test]
    fn test_minify_drops_comments() {
        let a = minify("// one\nvar a = 1; /* two */\nvar b = \"// kept\";\n").unwrap();
        let b = minify("// other\nvar a = 1; /* changed */\nvar b = \"// kept\";\n").unwrap();
        assert_eq!(a, b);
        assert!(a.contains("// kept"));
        assert!(!a.contains("one"));
    }

    #[test]
    fn test_minify_keeps_executable_changes() {
        let a = minify("var a = \"x\";").unwrap();
        let b = minify("var a = \"y\";").unwrap();
        assert_ne!(a, b);
    }
}
