//! Module rules.
//!
//! A rule pairs a path predicate (plus exclusions) with an ordered transform
//! chain. Rules are checked in declaration order and the first match wins.
//!
//! ## Predicate syntax
//!
//! - `.ts`: file extension (case-insensitive)
//! - `/\.tsx?$/`, `/\.png$/i`: regular expression over the root-relative
//!   path, with optional `i`, `m` and `s` flags (`g`, `u`, `y`, `d` are accepted
//!   and ignored)
//! - `**/*.svg`: glob over the root-relative path
//! - `node_modules`: any path segment equal to the name

use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use thiserror::Error;

/// Default size limit (bytes) below which the `url` stage inlines a file.
pub const DEFAULT_URL_LIMIT: usize = 1000;

/// Errors building a rule set.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid rule pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("unknown transform stage '{0}'")]
    UnknownStage(String),

    #[error("rule has an empty test")]
    EmptyTest,
}

/// A single transform stage, selected by name in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum Stage {
    /// TypeScript type removal.
    TypeStrip,
    /// Sass/SCSS compilation.
    Sass,
    /// CSS normalisation (and minification in production).
    Css,
    /// Style delivery: runtime injection or extraction depending on mode.
    Style,
    /// Inline as a data URI below `limit` bytes, otherwise emit as a file.
    Url {
        #[serde(default = "default_url_limit")]
        limit: usize,
    },
    /// Always emit as a file.
    File,
    /// Export the content as a string.
    Raw,
}

fn default_url_limit() -> usize {
    DEFAULT_URL_LIMIT
}

impl Stage {
    /// Parse a stage from its bare name.
    pub fn from_name(name: &str) -> Result<Self, RuleError> {
        match name {
            "type-strip" => Ok(Self::TypeStrip),
            "sass" => Ok(Self::Sass),
            "css" => Ok(Self::Css),
            "style" => Ok(Self::Style),
            "url" => Ok(Self::Url {
                limit: DEFAULT_URL_LIMIT,
            }),
            "file" => Ok(Self::File),
            "raw" => Ok(Self::Raw),
            other => Err(RuleError::UnknownStage(other.to_string())),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TypeStrip => "type-strip",
            Self::Sass => "sass",
            Self::Css => "css",
            Self::Style => "style",
            Self::Url { .. } => "url",
            Self::File => "file",
            Self::Raw => "raw",
        }
    }
}

/// A path predicate.
#[derive(Debug, Clone)]
pub enum Predicate {
    Extension(String),
    Regex {
        re: regex_lite::Regex,
        /// The `/…/flags` form it was written in.
        source: String,
    },
    Glob(glob::Pattern),
    Segment(String),
}

impl Predicate {
    /// Parse a predicate from its configuration string.
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        let invalid = |message: String| RuleError::InvalidPattern {
            pattern: source.to_string(),
            message,
        };

        if let Some((inner, flags)) = split_regex_literal(source) {
            let mut inline = String::new();
            for flag in flags.chars() {
                match flag {
                    'i' | 'm' | 's' => inline.push(flag),
                    'g' | 'u' | 'y' | 'd' => {}
                    other => return Err(invalid(format!("unsupported regex flag '{other}'"))),
                }
            }
            let pattern = if inline.is_empty() {
                inner.to_string()
            } else {
                format!("(?{inline}){inner}")
            };
            return regex_lite::Regex::new(&pattern)
                .map(|re| Self::Regex {
                    re,
                    source: source.to_string(),
                })
                .map_err(|e| invalid(e.to_string()));
        }

        if source.contains(['*', '?', '[']) {
            return glob::Pattern::new(source)
                .map(Self::Glob)
                .map_err(|e| invalid(e.to_string()));
        }

        if source.starts_with('.') && !source.contains('/') && source.len() > 1 {
            return Ok(Self::Extension(source[1..].to_ascii_lowercase()));
        }

        if source.is_empty() {
            return Err(invalid("empty pattern".to_string()));
        }
        Ok(Self::Segment(source.to_string()))
    }

    /// Test a root-relative, forward-slash path.
    #[must_use]
    pub fn matches(&self, rel_path: &str) -> bool {
        match self {
            Self::Extension(ext) => Path::new(rel_path)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext)),
            Self::Regex { re, .. } => re.is_match(rel_path),
            Self::Glob(pattern) => pattern.matches(rel_path),
            Self::Segment(name) => rel_path.split('/').any(|s| s == name),
        }
    }

    /// The configuration string this predicate was parsed from.
    #[must_use]
    pub fn source(&self) -> String {
        match self {
            Self::Extension(ext) => format!(".{ext}"),
            Self::Regex { source, .. } => source.clone(),
            Self::Glob(pattern) => pattern.as_str().to_string(),
            Self::Segment(name) => name.clone(),
        }
    }
}

/// Split `/body/flags` into body and flags. The flags must be letters.
fn split_regex_literal(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let flags = &rest[end + 1..];
    flags
        .chars()
        .all(|c| c.is_ascii_alphabetic())
        .then(|| (&rest[..end], flags))
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source())
    }
}

/// A rule: predicates plus an ordered transform chain.
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    /// Matches when any predicate matches.
    pub test: Vec<Predicate>,
    /// Excluded when any predicate matches.
    pub exclude: Vec<Predicate>,
    #[serde(rename = "use")]
    pub stages: Vec<Stage>,
}

impl Rule {
    pub fn new(test: &[String], exclude: &[String], stages: Vec<Stage>) -> Result<Self, RuleError> {
        if test.is_empty() {
            return Err(RuleError::EmptyTest);
        }
        Ok(Self {
            test: test
                .iter()
                .map(|s| Predicate::parse(s))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|s| Predicate::parse(s))
                .collect::<Result<_, _>>()?,
            stages,
        })
    }

    #[must_use]
    pub fn matches(&self, rel_path: &str) -> bool {
        self.test.iter().any(|p| p.matches(rel_path))
            && !self.exclude.iter().any(|p| p.matches(rel_path))
    }
}

/// Ordered rules. Static for the duration of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The built-in rules used when a config declares none.
    #[must_use]
    pub fn defaults() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        let rule = |test: &[&str], exclude: &[&str], stages: Vec<Stage>| Rule {
            test: list(test)
                .iter()
                .filter_map(|s| Predicate::parse(s).ok())
                .collect(),
            exclude: list(exclude)
                .iter()
                .filter_map(|s| Predicate::parse(s).ok())
                .collect(),
            stages,
        };

        Self::new(vec![
            rule(&[".ts", ".tsx"], &["node_modules"], vec![Stage::TypeStrip]),
            rule(
                &[".scss", ".sass"],
                &[],
                vec![Stage::Sass, Stage::Css, Stage::Style],
            ),
            rule(&[".css"], &[], vec![Stage::Css, Stage::Style]),
            rule(
                &[
                    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".woff", ".woff2",
                    ".ttf", ".eot",
                ],
                &[],
                vec![Stage::Url {
                    limit: DEFAULT_URL_LIMIT,
                }],
            ),
        ])
    }

    /// First rule matching `rel_path`.
    #[must_use]
    pub fn find(&self, rel_path: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches(rel_path))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_predicate_kinds() {
        assert!(matches!(Predicate::parse(".ts").unwrap(), Predicate::Extension(_)));
        assert!(matches!(Predicate::parse("/\\.tsx?$/").unwrap(), Predicate::Regex { .. }));
        assert!(matches!(Predicate::parse("**/*.svg").unwrap(), Predicate::Glob(_)));
        assert!(matches!(Predicate::parse("vendor").unwrap(), Predicate::Segment(_)));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let p = Predicate::parse(".PNG").unwrap();
        assert!(p.matches("img/logo.png"));
        assert!(p.matches("img/logo.PNG"));
        assert!(!p.matches("img/logo.png.js"));
    }

    #[test]
    fn test_regex_predicate() {
        let p = Predicate::parse("/\\.tsx?$/").unwrap();
        assert!(p.matches("src/a.ts"));
        assert!(p.matches("src/a.tsx"));
        assert!(!p.matches("src/a.js"));
        assert_eq!(p.source(), "/\\.tsx?$/");
    }

    #[test]
    fn test_regex_predicate_with_flags() {
        let p = Predicate::parse("/\\.(jpe?g|png|gif|svg)$/i").unwrap();
        assert!(matches!(p, Predicate::Regex { .. }));
        assert!(p.matches("src/img/logo.png"));
        assert!(p.matches("src/img/PHOTO.JPG"));
        assert!(!p.matches("src/img/logo.png.js"));
        assert_eq!(p.source(), "/\\.(jpe?g|png|gif|svg)$/i");

        let err = Predicate::parse("/\\.png$/q").unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { .. }));
    }

    #[test]
    fn test_invalid_regex() {
        let err = Predicate::parse("/(/").unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { .. }));
    }

    #[test]
    fn test_segment_matches_whole_component() {
        let p = Predicate::parse("node_modules").unwrap();
        assert!(p.matches("node_modules/lodash/index.js"));
        assert!(!p.matches("src/my_node_modules/x.js"));
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::new(vec![
            Rule::new(&strings(&[".ts"]), &[], vec![Stage::TypeStrip]).unwrap(),
            Rule::new(&strings(&["**/*.ts"]), &[], vec![Stage::Raw]).unwrap(),
        ]);
        let rule = rules.find("src/index.ts").unwrap();
        assert_eq!(rule.stages, vec![Stage::TypeStrip]);
    }

    #[test]
    fn test_exclusion_falls_through() {
        let rules = RuleSet::new(vec![
            Rule::new(&strings(&[".ts"]), &strings(&["vendor"]), vec![Stage::TypeStrip]).unwrap(),
            Rule::new(&strings(&[".ts"]), &[], vec![Stage::Raw]).unwrap(),
        ]);
        assert_eq!(rules.find("vendor/x.ts").unwrap().stages, vec![Stage::Raw]);
        assert_eq!(rules.find("src/x.ts").unwrap().stages, vec![Stage::TypeStrip]);
    }

    #[test]
    fn test_no_match() {
        let rules = RuleSet::defaults();
        assert!(rules.find("src/data.json").is_none());
    }

    #[test]
    fn test_default_rules() {
        let rules = RuleSet::defaults();
        assert_eq!(rules.find("src/a.ts").unwrap().stages, vec![Stage::TypeStrip]);
        assert!(rules.find("node_modules/pkg/a.ts").is_none());
        assert_eq!(
            rules.find("src/a.scss").unwrap().stages,
            vec![Stage::Sass, Stage::Css, Stage::Style]
        );
        assert_eq!(
            rules.find("src/logo.png").unwrap().stages,
            vec![Stage::Url { limit: 1000 }]
        );
    }

    #[test]
    fn test_empty_test_rejected() {
        assert!(matches!(
            Rule::new(&[], &[], vec![]).unwrap_err(),
            RuleError::EmptyTest
        ));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::from_name("url").unwrap(), Stage::Url { limit: 1000 });
        assert!(Stage::from_name("babel").is_err());
        let stage: Stage = serde_json::from_str(r#"{"name":"url","limit":42}"#).unwrap();
        assert_eq!(stage, Stage::Url { limit: 42 });
        assert_eq!(stage.name(), "url");
    }
}
