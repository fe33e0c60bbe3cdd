//! Import specifier resolution.
//!
//! Resolves import specifiers to absolute module paths.
//!
//! ## Specifier Types
//!
//! - Relative: `./utils`, `../lib/foo`
//! - Absolute: `/abs/path/to/module`
//! - Bare: `lodash`, `@scope/pkg/sub`, `components/button`
//!
//! Bare specifiers are looked up in the configured module roots, in order.
//! A root given as a path is searched directly; a root given as a plain name
//! (`node_modules`) is searched in every ancestor of the importer up to the
//! project root. The first root with a match wins, unless strict mode is on,
//! in which case a second distinct match in another root is an error.

use crate::config::{ModuleRoot, ResolveConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Result of resolving an import specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolved {
    /// A module on disk (canonical absolute path).
    Module(PathBuf),
    /// A declared external, left unbundled. Carries the global name.
    External(String),
}

/// Resolution failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("cannot resolve '{specifier}' from {}", .from.display())]
    NotFound { specifier: String, from: PathBuf },

    #[error(
        "'{specifier}' from {} matches in more than one module root: {}",
        .from.display(),
        display_paths(.candidates)
    )]
    Ambiguous {
        specifier: String,
        from: PathBuf,
        candidates: Vec<PathBuf>,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ResolveError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "RESOLVE_NOT_FOUND",
            Self::Ambiguous { .. } => "RESOLVE_AMBIGUOUS",
        }
    }

    /// The importing module.
    #[must_use]
    pub fn from(&self) -> &Path {
        match self {
            Self::NotFound { from, .. } | Self::Ambiguous { from, .. } => from,
        }
    }
}

/// Import resolver. Results are memoized per (specifier, importer directory).
#[derive(Debug)]
pub struct Resolver {
    root: PathBuf,
    config: ResolveConfig,
    cache: RwLock<HashMap<(String, PathBuf), Resolved>>,
}

impl Resolver {
    #[must_use]
    pub fn new(root: PathBuf, config: ResolveConfig) -> Self {
        Self {
            root,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drop memoized results (the file system changed).
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Resolve `specifier` as imported from the file `from`.
    pub fn resolve(&self, specifier: &str, from: &Path) -> Result<Resolved, ResolveError> {
        if let Some(global) = self.config.externals.get(specifier) {
            return Ok(Resolved::External(global.clone()));
        }

        let from_dir = from.parent().unwrap_or(&self.root).to_path_buf();
        let key = (specifier.to_string(), from_dir);
        if let Some(hit) = self.cache.read().ok().and_then(|c| c.get(&key).cloned()) {
            return Ok(hit);
        }

        let resolved = self.resolve_uncached(specifier, &key.1, from)?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, resolved.clone());
        }
        Ok(resolved)
    }

    fn resolve_uncached(&self, specifier: &str, from_dir: &Path, from: &Path) -> Result<Resolved, ResolveError> {
        let not_found = || ResolveError::NotFound {
            specifier: specifier.to_string(),
            from: from.to_path_buf(),
        };

        if is_relative(specifier) {
            return self
                .file_or_dir(&from_dir.join(specifier))
                .map(Resolved::Module)
                .ok_or_else(not_found);
        }

        if Path::new(specifier).is_absolute() {
            return self
                .file_or_dir(Path::new(specifier))
                .map(Resolved::Module)
                .ok_or_else(not_found);
        }

        let mut first: Option<PathBuf> = None;
        for root in &self.config.modules {
            let Some(found) = self.search_root(root, specifier, from_dir) else {
                continue;
            };
            match &first {
                None if !self.config.strict => return Ok(Resolved::Module(found)),
                None => first = Some(found),
                Some(existing) if *existing == found => {}
                Some(existing) => {
                    return Err(ResolveError::Ambiguous {
                        specifier: specifier.to_string(),
                        from: from.to_path_buf(),
                        candidates: vec![existing.clone(), found],
                    });
                }
            }
        }

        first.map(Resolved::Module).ok_or_else(not_found)
    }

    fn search_root(&self, root: &ModuleRoot, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
        match root {
            ModuleRoot::Absolute(dir) => self.bare_in(dir, specifier),
            ModuleRoot::Hierarchical(name) => {
                for dir in from_dir.ancestors() {
                    let candidate_root = dir.join(name);
                    if candidate_root.is_dir() {
                        if let Some(found) = self.bare_in(&candidate_root, specifier) {
                            return Some(found);
                        }
                    }
                    if dir == self.root {
                        break;
                    }
                }
                None
            }
        }
    }

    /// Resolve a bare specifier inside one module directory.
    fn bare_in(&self, dir: &Path, specifier: &str) -> Option<PathBuf> {
        let (package, subpath) = parse_bare_specifier(specifier);
        let package_dir = dir.join(&package);

        if let Some(sub) = subpath.as_deref() {
            if let Some(entry) = read_package_json(&package_dir)
                .and_then(|json| json.get("exports").and_then(|e| resolve_exports(e, &format!("./{sub}"))))
            {
                let target = package_dir.join(entry);
                if target.is_file() {
                    return Some(canonical(&target));
                }
            }
        }

        self.file_or_dir(&dir.join(specifier))
    }

    /// Try `target` verbatim, then with each extension, then as a directory.
    fn file_or_dir(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return Some(canonical(target));
        }

        for ext in &self.config.extensions {
            let with_ext = PathBuf::from(format!("{}{}", target.display(), ext));
            if with_ext.is_file() {
                return Some(canonical(&with_ext));
            }
        }

        if target.is_dir() {
            if let Some(json) = read_package_json(target) {
                let entry = json
                    .get("exports")
                    .and_then(|e| resolve_exports(e, "."))
                    .or_else(|| json.get("module").and_then(|v| v.as_str()).map(str::to_string))
                    .or_else(|| json.get("main").and_then(|v| v.as_str()).map(str::to_string));
                if let Some(entry) = entry {
                    let entry_path = target.join(entry);
                    if entry_path != target {
                        if let Some(found) = self.file_only(&entry_path) {
                            return Some(found);
                        }
                    }
                }
            }

            return self.file_only(&target.join("index"));
        }

        None
    }

    /// `target` verbatim or with an extension, or `target/index` + extension.
    fn file_only(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return Some(canonical(target));
        }
        for ext in &self.config.extensions {
            let with_ext = PathBuf::from(format!("{}{}", target.display(), ext));
            if with_ext.is_file() {
                return Some(canonical(&with_ext));
            }
        }
        if target.is_dir() {
            for ext in &self.config.extensions {
                let index = target.join(format!("index{ext}"));
                if index.is_file() {
                    return Some(canonical(&index));
                }
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn read_package_json(dir: &Path) -> Option<serde_json::Value> {
    let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
    serde_json::from_str(&content).ok()
}

/// Split a bare specifier into package name and subpath.
fn parse_bare_specifier(specifier: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = if specifier.starts_with('@') {
        specifier.splitn(3, '/').collect()
    } else {
        specifier.splitn(2, '/').collect()
    };
    if specifier.starts_with('@') && parts.len() >= 2 {
        let subpath = parts.get(2).map(|s| (*s).to_string());
        (format!("{}/{}", parts[0], parts[1]), subpath)
    } else {
        (parts[0].to_string(), parts.get(1).map(|s| (*s).to_string()).filter(|_| !specifier.starts_with('@')))
    }
}

/// Resolve a package.json `exports` field (simplified: string, subpath map,
/// `import` > `default` > `require` conditions).
fn resolve_exports(exports: &serde_json::Value, subpath: &str) -> Option<String> {
    match exports {
        serde_json::Value::String(s) if subpath == "." => Some(s.clone()),
        serde_json::Value::Object(map) => {
            if let Some(value) = map.get(subpath) {
                return resolve_export_value(value);
            }
            let is_conditions = map.keys().all(|k| !k.starts_with('.'));
            if subpath == "." && is_conditions {
                return resolve_export_value(exports);
            }
            None
        }
        _ => None,
    }
}

fn resolve_export_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("import")
            .or_else(|| map.get("browser"))
            .or_else(|| map.get("default"))
            .or_else(|| map.get("require"))
            .and_then(resolve_export_value),
        _ => None,
    }
}
