//! Module linking: rewrite ES module syntax into registry calls.
//!
//! Every module becomes the body of a `function (module, exports,
//! __kiln_require)` factory. An import statement binds the target's exports
//! object to a temporary, and every read of an imported name becomes a
//! member access on it, so bindings stay live and a module caught in an
//! import cycle sees the other side's values once they are initialised.
//! Exports become getters installed before the body executes, dynamic
//! imports become `__kiln_require.load`. Replacements keep the original line
//! count so line-level source maps stay aligned.

use super::graph::{Dependency, DependencyGraph, DependencyTarget, ModuleId, ModuleRecord};
use super::transform::js_string;
use crate::imports::{references, ExportKind, ImportClause, ImportKind};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::ops::Range;

/// Name under which a module is registered in the output.
#[derive(Debug, Clone, Default)]
pub struct OutputIds {
    ids: BTreeMap<ModuleId, String>,
}

impl OutputIds {
    /// Readable ids are the stable keys; short ids are key hashes, widened on
    /// collision.
    #[must_use]
    pub fn new(graph: &DependencyGraph, named: bool) -> Self {
        let mut ids = BTreeMap::new();
        let mut used: BTreeMap<String, ModuleId> = BTreeMap::new();
        for module in graph.modules() {
            let key = module.id.as_str();
            let out = if named {
                key.to_string()
            } else {
                let full = kiln_util::hash::blake3_bytes(key.as_bytes());
                let mut len = 6;
                loop {
                    let candidate = full[..len].to_string();
                    if !used.contains_key(&candidate) || len == full.len() {
                        break candidate;
                    }
                    len += 2;
                }
            };
            used.insert(out.clone(), module.id.clone());
            ids.insert(module.id.clone(), out);
        }
        Self { ids }
    }

    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<&str> {
        self.ids.get(id).map(String::as_str)
    }

    /// The output id as a JavaScript string literal.
    fn literal(&self, id: &ModuleId) -> String {
        js_string(self.get(id).unwrap_or(id.as_str()))
    }
}

struct Edit {
    range: Range<usize>,
    text: String,
}

/// Produce the factory body for a module.
#[must_use]
pub fn link(module: &ModuleRecord, ids: &OutputIds) -> String {
    let code = &module.code;
    let mut edits: Vec<Edit> = Vec::new();
    let mut getters: Vec<(String, String)> = Vec::new();
    // Imported local name → live expression.
    let mut bindings: BTreeMap<String, String> = BTreeMap::new();
    let mut counter = 0usize;

    for site in &module.scan.imports {
        let Some(dep) = module.dependency(&site.specifier, site.kind) else {
            continue;
        };
        let text = match (&site.clause, site.kind) {
            (_, ImportKind::Dynamic) => dynamic_expr(dep, ids),
            (_, ImportKind::Require) => require_expr(dep, ids),
            (ImportClause::SideEffect, _) => format!("{};", require_expr(dep, ids)),
            (ImportClause::Bindings { default, namespace, named }, _) => {
                if default.is_none() && named.is_empty() {
                    match namespace {
                        Some(ns) => format!("var {ns} = {};", namespace_expr(dep, ids)),
                        None => format!("{};", require_expr(dep, ids)),
                    }
                } else {
                    let var = temp(&mut counter);
                    let mut out = format!("var {var} = {};", namespace_expr(dep, ids));
                    if let Some(local) = default {
                        bindings.insert(local.clone(), format!("{var}.default"));
                    }
                    if let Some(ns) = namespace {
                        let _ = write!(out, " var {ns} = {var};");
                    }
                    for (imported, local) in named {
                        bindings.insert(local.clone(), format!("{var}{}", member(imported)));
                    }
                    out
                }
            }
            (ImportClause::ExportNamed(pairs), _) => {
                let var = temp(&mut counter);
                let entries: Vec<String> = pairs
                    .iter()
                    .map(|(imported, exported)| getter(exported, &format!("{var}{}", member(imported))))
                    .collect();
                format!(
                    "var {var} = {}; __kiln_require.d(exports, {{{}}});",
                    namespace_expr(dep, ids),
                    entries.join(", ")
                )
            }
            (ImportClause::ExportAll, _) => {
                format!("__kiln_require.star(exports, {});", namespace_expr(dep, ids))
            }
            (ImportClause::ExportAllAs(name), _) => {
                let var = temp(&mut counter);
                format!(
                    "var {var} = {}; __kiln_require.d(exports, {{{}}});",
                    namespace_expr(dep, ids),
                    getter(name, &var)
                )
            }
            (ImportClause::Dynamic | ImportClause::Require, _) => require_expr(dep, ids),
        };
        edits.push(Edit {
            range: site.range.clone(),
            text,
        });
    }

    for site in &module.scan.exports {
        let text = match &site.kind {
            ExportKind::Decl { names } => {
                getters.extend(names.iter().map(|n| (n.clone(), n.clone())));
                String::new()
            }
            ExportKind::DefaultDecl { name } => {
                getters.push(("default".to_string(), name.clone()));
                String::new()
            }
            ExportKind::DefaultExpr => {
                getters.push(("default".to_string(), "__kiln_default".to_string()));
                "var __kiln_default =".to_string()
            }
            ExportKind::List(pairs) => {
                getters.extend(pairs.iter().map(|(local, exported)| (exported.clone(), local.clone())));
                String::new()
            }
        };
        edits.push(Edit {
            range: site.range.clone(),
            text,
        });
    }

    let names: BTreeSet<String> = bindings.keys().cloned().collect();
    for reference in references(code, &names) {
        let Some(expr) = bindings.get(&reference.name) else {
            continue;
        };
        let text = if reference.shorthand {
            format!("{}: {expr}", reference.name)
        } else if reference.call {
            // Plain call: `this` must not become the exports object.
            format!("(0, {expr})")
        } else {
            expr.clone()
        };
        edits.push(Edit {
            range: reference.range,
            text,
        });
    }

    let mut out = String::with_capacity(code.len() + 64);
    if !getters.is_empty() || module.scan.is_esm {
        let entries: Vec<String> = getters
            .iter()
            .map(|(name, local)| getter(name, bindings.get(local).map_or(local.as_str(), String::as_str)))
            .collect();
        // Same line as the first statement: line numbers stay aligned.
        let _ = write!(out, "__kiln_require.d(exports, {{{}}}); ", entries.join(", "));
    }
    out.push_str(&apply_edits(code, edits));
    out
}

fn temp(counter: &mut usize) -> String {
    let name = format!("__kiln_m{counter}");
    *counter += 1;
    name
}

fn getter(name: &str, expr: &str) -> String {
    format!("{}: function () {{ return {expr}; }}", js_string(name))
}

fn member(name: &str) -> String {
    let is_ident = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_ident {
        format!(".{name}")
    } else {
        format!("[{}]", js_string(name))
    }
}

fn require_expr(dep: &Dependency, ids: &OutputIds) -> String {
    match &dep.target {
        DependencyTarget::Module { id, .. } => format!("__kiln_require({})", ids.literal(id)),
        DependencyTarget::External(global) => format!("__kiln_require.external({})", js_string(global)),
    }
}

fn namespace_expr(dep: &Dependency, ids: &OutputIds) -> String {
    match &dep.target {
        DependencyTarget::Module { id, .. } => format!("__kiln_require.i({})", ids.literal(id)),
        DependencyTarget::External(_) => format!("__kiln_require.n({})", require_expr(dep, ids)),
    }
}

fn dynamic_expr(dep: &Dependency, ids: &OutputIds) -> String {
    match &dep.target {
        DependencyTarget::Module { id, .. } => format!("__kiln_require.load({})", ids.literal(id)),
        DependencyTarget::External(_) => format!("Promise.resolve({})", namespace_expr(dep, ids)),
    }
}

/// Apply non-overlapping edits, padding each replacement with the newlines
/// its original text contained.
fn apply_edits(code: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.range.start);
    let mut out = String::with_capacity(code.len());
    let mut pos = 0;
    for edit in edits {
        if edit.range.start < pos || edit.range.end > code.len() {
            continue;
        }
        out.push_str(&code[pos..edit.range.start]);
        out.push_str(&edit.text);
        let newlines = code[edit.range.clone()].matches('\n').count();
        out.extend(std::iter::repeat('\n').take(newlines));
        pos = edit.range.end;
    }
    out.push_str(&code[pos..]);
    out
}
