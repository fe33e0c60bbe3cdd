//! Module syntax scanner.
//!
//! Finds import/export statements, dynamic `import()` and `require()` calls in
//! JavaScript source without full parsing. Strings, comments, template
//! literals and regular expression literals are skipped, so specifiers that
//! only appear inside them are never reported.
//!
//! Every site carries the byte range it occupies so the linker can rewrite it
//! in place.

use std::collections::BTreeSet;
use std::ops::Range;

/// How a dependency is pulled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportKind {
    /// `import ... from "x"` / `import "x"`.
    Static,
    /// `export ... from "x"`.
    ReExport,
    /// `import("x")`.
    Dynamic,
    /// `require("x")`.
    Require,
}

impl ImportKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::ReExport => "re-export",
            Self::Dynamic => "dynamic",
            Self::Require => "require",
        }
    }

    /// Whether the dependency is loaded together with the importer.
    #[must_use]
    pub fn is_static(&self) -> bool {
        !matches!(self, Self::Dynamic)
    }
}

/// Bindings brought in by an import or re-export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportClause {
    /// `import "x"`.
    SideEffect,
    /// `import a, * as ns, { b as c } from "x"`.
    Bindings {
        default: Option<String>,
        namespace: Option<String>,
        /// `(imported, local)`.
        named: Vec<(String, String)>,
    },
    /// `export { a as b } from "x"`, as `(imported, exported)`.
    ExportNamed(Vec<(String, String)>),
    /// `export * from "x"`.
    ExportAll,
    /// `export * as ns from "x"`.
    ExportAllAs(String),
    /// `import("x")`.
    Dynamic,
    /// `require("x")`.
    Require,
}

/// One import site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    pub specifier: String,
    pub kind: ImportKind,
    pub clause: ImportClause,
    /// Bytes occupied by the statement or call expression.
    pub range: Range<usize>,
    /// 1-indexed line of the site.
    pub line: u32,
}

/// Local export forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// `export const a = 1, b = 2;`, `export function f() {}`.
    /// The range covers the `export` keyword only.
    Decl { names: Vec<String> },
    /// `export default function f() {}`. The range covers `export default`.
    DefaultDecl { name: String },
    /// `export default <expr>`. The range covers `export default`.
    DefaultExpr,
    /// `export { a, b as c };` as `(local, exported)`. The range covers the
    /// whole statement.
    List(Vec<(String, String)>),
}

/// One local export site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSite {
    pub kind: ExportKind,
    pub range: Range<usize>,
}

/// Result of scanning one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Import sites in source order.
    pub imports: Vec<ImportSite>,
    /// Local export sites in source order.
    pub exports: Vec<ExportSite>,
    /// Whether the module uses ES module syntax.
    pub is_esm: bool,
}

impl ScanResult {
    /// Distinct specifiers in first-appearance order.
    #[must_use]
    pub fn specifiers(&self) -> Vec<(&str, ImportKind)> {
        let mut seen = std::collections::HashSet::new();
        self.imports
            .iter()
            .filter(|site| seen.insert((site.specifier.as_str(), site.kind.is_static())))
            .map(|site| (site.specifier.as_str(), site.kind))
            .collect()
    }
}

/// A use of an imported binding outside import and export statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub range: Range<usize>,
    /// Written as `{ name }` in an object literal; a rewrite must keep the
    /// property key.
    pub shorthand: bool,
    /// Callee of a call (`name(...)`).
    pub call: bool,
}

/// Find the places where `names` are read in a module.
///
/// Property names (`x.name`, `{ name: v }`), declarations introduced with a
/// declaration keyword and single arrow parameters are not reported. Other
/// shadowing forms (function parameters, destructuring) are not tracked.
#[must_use]
pub fn references(source: &str, names: &BTreeSet<String>) -> Vec<Reference> {
    if names.is_empty() {
        return Vec::new();
    }
    let mut scanner = Scanner::new(source);
    scanner.watch = names.clone();
    scanner.run();
    scanner.refs
}

/// Scan a module's source.
#[must_use]
pub fn scan(source: &str) -> ScanResult {
    let mut scanner = Scanner::new(source);
    scanner.run();

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| match line_starts.binary_search(&offset) {
        Ok(i) => i as u32 + 1,
        Err(i) => i as u32,
    };
    for site in &mut scanner.result.imports {
        site.line = line_of(site.range.start);
    }

    scanner.result
}

/// Previous significant token, used to tell a regex from a division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    Start,
    Punct,
    Value,
    Keyword,
    Dot,
}

const DECL_KEYWORDS: &[&str] = &["var", "let", "const", "function", "class"];

const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

struct Scanner<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
    depth: usize,
    /// Brace depths at which a template literal's `${` was opened.
    templates: Vec<usize>,
    /// Open brackets, innermost last; `$` marks a template substitution.
    open: Vec<u8>,
    prev: Prev,
    result: ScanResult,
    watch: BTreeSet<String>,
    refs: Vec<Reference>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            src: text.as_bytes(),
            text,
            pos: 0,
            depth: 0,
            templates: Vec::new(),
            open: Vec::new(),
            prev: Prev::Start,
            result: ScanResult::default(),
            watch: BTreeSet::new(),
            refs: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, pos: usize) -> Option<u8> {
        self.src.get(pos).copied()
    }

    fn run(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'\'' | b'"' => {
                    self.skip_string(b);
                    self.prev = Prev::Value;
                }
                b'`' => {
                    self.pos += 1;
                    self.skip_template_chunk();
                }
                b'/' => match self.peek_at(self.pos + 1) {
                    Some(b'/') => self.skip_line_comment(),
                    Some(b'*') => self.skip_block_comment(),
                    _ if self.regex_allowed() => {
                        self.skip_regex();
                        self.prev = Prev::Value;
                    }
                    _ => {
                        self.pos += 1;
                        self.prev = Prev::Punct;
                    }
                },
                b'{' | b'(' | b'[' => {
                    self.depth += 1;
                    self.open.push(b);
                    self.pos += 1;
                    self.prev = Prev::Punct;
                }
                b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.open.pop();
                    self.pos += 1;
                    if self.templates.last() == Some(&self.depth) {
                        self.templates.pop();
                        self.skip_template_chunk();
                    } else {
                        self.prev = Prev::Punct;
                    }
                }
                b')' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.open.pop();
                    self.pos += 1;
                    self.prev = Prev::Value;
                }
                b'.' => {
                    self.pos += 1;
                    self.prev = if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.skip_number();
                        Prev::Value
                    } else {
                        Prev::Dot
                    };
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                b if b.is_ascii_digit() => {
                    self.skip_number();
                    self.prev = Prev::Value;
                }
                b if is_ident_start(b) => self.word(),
                _ => {
                    self.pos += 1;
                    self.prev = Prev::Punct;
                }
            }
        }
    }

    fn word(&mut self) {
        let start = self.pos;
        let word = self.read_ident().unwrap_or_default();
        let after_dot = self.prev == Prev::Dot;

        if !after_dot {
            match word {
                "import" => {
                    if self.try_import(start) {
                        return;
                    }
                }
                "export" if self.depth == 0 => {
                    if self.try_export(start) {
                        return;
                    }
                }
                "require" => {
                    if self.try_require(start) {
                        return;
                    }
                }
                _ => {}
            }
        }

        if (!after_dot || self.text[..start].ends_with("...")) && self.watch.contains(word) {
            self.record_reference(word, start);
        }

        self.pos = start + word.len();
        self.prev = if REGEX_KEYWORDS.contains(&word) && !after_dot {
            Prev::Keyword
        } else {
            Prev::Value
        };
    }

    fn record_reference(&mut self, name: &str, start: usize) {
        let end = start + name.len();
        let before = self.text[..start].trim_end();
        let after = self.text[end..].trim_start();

        let keyword_start = before
            .char_indices()
            .rev()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$'))
            .map_or(0, |(i, c)| i + c.len_utf8());
        if DECL_KEYWORDS.contains(&&before[keyword_start..]) || after.starts_with("=>") {
            return;
        }

        let mut shorthand = false;
        if self.open.last() == Some(&b'{') && matches!(before.bytes().last(), Some(b'{' | b',')) {
            match after.bytes().next() {
                Some(b':') => return,
                Some(b',' | b'}') => shorthand = true,
                _ => {}
            }
        }
        self.refs.push(Reference {
            name: name.to_string(),
            range: start..end,
            shorthand,
            call: after.starts_with('('),
        });
    }

    fn regex_allowed(&self) -> bool {
        matches!(self.prev, Prev::Start | Prev::Punct | Prev::Keyword)
    }

    // ------------------------------------------------------------------
    // Token skipping
    // ------------------------------------------------------------------

    fn skip_string(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => self.pos += 1,
                b'\n' => return,
                _ if b == quote => return,
                _ => {}
            }
        }
    }

    /// Skip template text up to the closing backtick or a `${`.
    fn skip_template_chunk(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    self.prev = Prev::Value;
                    return;
                }
                b'$' if self.peek_at(self.pos + 1) == Some(b'{') => {
                    self.pos += 2;
                    self.templates.push(self.depth);
                    self.open.push(b'$');
                    self.depth += 1;
                    self.prev = Prev::Punct;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.src.len() {
            if self.src[self.pos] == b'*' && self.peek_at(self.pos + 1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_regex(&mut self) {
        self.pos += 1;
        let mut in_class = false;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => self.pos += 1,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => break,
                b'\n' => return,
                _ => {}
            }
        }
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
    }

    fn skip_number(&mut self) {
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_')
        {
            self.pos += 1;
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'/') if self.peek_at(self.pos + 1) == Some(b'/') => self.skip_line_comment(),
                Some(b'/') if self.peek_at(self.pos + 1) == Some(b'*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    fn read_ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        let text = self.text;
        Some(&text[start..self.pos])
    }

    /// Read a quoted string literal, returning its unescaped-enough value.
    fn read_string(&mut self) -> Option<String> {
        let quote = self.peek().filter(|b| *b == b'\'' || *b == b'"')?;
        let start = self.pos + 1;
        let mut i = start;
        while i < self.src.len() {
            match self.src[i] {
                b'\\' => i += 2,
                b'\n' => return None,
                b if b == quote => {
                    let value = self.text[start..i].replace('\\', "");
                    self.pos = i + 1;
                    return Some(value);
                }
                _ => i += 1,
            }
        }
        None
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        let save = self.pos;
        if self.read_ident() == Some(word) {
            true
        } else {
            self.pos = save;
            false
        }
    }

    /// Consume an optional trailing `;` on the same statement.
    fn eat_semicolon(&mut self) {
        let save = self.pos;
        while self.peek().is_some_and(|b| b == b' ' || b == b'\t') {
            self.pos += 1;
        }
        if !self.eat(b';') {
            self.pos = save;
        }
    }

    /// Skip `with { ... }` / `assert { ... }` import attributes.
    fn skip_import_attributes(&mut self) {
        let save = self.pos;
        self.skip_trivia();
        if self.eat_word("with") || self.eat_word("assert") {
            self.skip_trivia();
            if self.peek() == Some(b'{') {
                while let Some(b) = self.peek() {
                    self.pos += 1;
                    if b == b'}' {
                        return;
                    }
                }
            }
        }
        self.pos = save;
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn try_import(&mut self, start: usize) -> bool {
        self.skip_trivia();
        match self.peek() {
            Some(b'(') => return self.try_dynamic_import(start),
            Some(b'.') => return false,
            _ => {}
        }
        if self.depth != 0 {
            return false;
        }

        if let Some(specifier) = self.read_string() {
            self.skip_import_attributes();
            self.eat_semicolon();
            self.push_import(specifier, ImportKind::Static, ImportClause::SideEffect, start);
            return true;
        }

        let save = self.pos;
        if self.eat_word("type") {
            self.skip_trivia();
            let type_only = match self.peek() {
                Some(b'{' | b'*') => true,
                Some(b) if is_ident_start(b) => {
                    let probe = self.pos;
                    let next = self.read_ident();
                    self.pos = probe;
                    next != Some("from")
                }
                _ => false,
            };
            if type_only {
                // Type-only imports have no runtime dependency.
                self.skip_to_from_string();
                self.eat_semicolon();
                self.prev = Prev::Punct;
                return true;
            }
            self.pos = save;
        }

        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();

        if let Some(ident) = self.read_ident() {
            if ident == "from" {
                return false;
            }
            default = Some(ident.to_string());
            self.skip_trivia();
            if self.eat(b',') {
                self.skip_trivia();
            }
        }
        if self.eat(b'*') {
            self.skip_trivia();
            if !self.eat_word("as") {
                return false;
            }
            self.skip_trivia();
            namespace = self.read_ident().map(str::to_string);
            if namespace.is_none() {
                return false;
            }
            self.skip_trivia();
        } else if self.peek() == Some(b'{') {
            match self.read_named_list() {
                Some(list) => named = list,
                None => return false,
            }
            self.skip_trivia();
        }

        if !self.eat_word("from") {
            return false;
        }
        self.skip_trivia();
        let Some(specifier) = self.read_string() else {
            return false;
        };
        self.skip_import_attributes();
        self.eat_semicolon();

        self.push_import(
            specifier,
            ImportKind::Static,
            ImportClause::Bindings {
                default,
                namespace,
                named,
            },
            start,
        );
        true
    }

    fn try_dynamic_import(&mut self, start: usize) -> bool {
        // At '('
        self.pos += 1;
        self.skip_trivia();
        let Some(specifier) = self.read_string() else {
            return false;
        };
        self.skip_trivia();
        if !self.eat(b')') {
            return false;
        }
        self.push_import(specifier, ImportKind::Dynamic, ImportClause::Dynamic, start);
        true
    }

    fn try_require(&mut self, start: usize) -> bool {
        self.skip_trivia();
        if !self.eat(b'(') {
            return false;
        }
        self.skip_trivia();
        let Some(specifier) = self.read_string() else {
            return false;
        };
        self.skip_trivia();
        if !self.eat(b')') {
            return false;
        }
        self.push_import(specifier, ImportKind::Require, ImportClause::Require, start);
        true
    }

    fn try_export(&mut self, start: usize) -> bool {
        self.skip_trivia();

        if self.eat(b'*') {
            self.skip_trivia();
            let clause = if self.eat_word("as") {
                self.skip_trivia();
                let Some(name) = self.read_ident().map(str::to_string) else {
                    return false;
                };
                self.skip_trivia();
                ImportClause::ExportAllAs(name)
            } else {
                ImportClause::ExportAll
            };
            if !self.eat_word("from") {
                return false;
            }
            self.skip_trivia();
            let Some(specifier) = self.read_string() else {
                return false;
            };
            self.eat_semicolon();
            self.push_import(specifier, ImportKind::ReExport, clause, start);
            self.result.is_esm = true;
            return true;
        }

        if self.peek() == Some(b'{') {
            let Some(list) = self.read_named_list() else {
                return false;
            };
            let save = self.pos;
            self.skip_trivia();
            if self.eat_word("from") {
                self.skip_trivia();
                let Some(specifier) = self.read_string() else {
                    return false;
                };
                self.skip_import_attributes();
                self.eat_semicolon();
                self.push_import(
                    specifier,
                    ImportKind::ReExport,
                    ImportClause::ExportNamed(list),
                    start,
                );
            } else {
                self.pos = save;
                self.eat_semicolon();
                self.push_export(ExportKind::List(list), start..self.pos);
            }
            self.prev = Prev::Punct;
            return true;
        }

        let keyword_end = self.pos;
        let Some(word) = self.read_ident() else {
            return false;
        };
        match word {
            "default" => {
                let prefix_end = self.pos;
                self.skip_trivia();
                let probe = self.pos;
                let mut decl_name = None;
                if self.eat_word("async") {
                    self.skip_trivia();
                }
                if self.eat_word("function") {
                    self.skip_trivia();
                    self.eat(b'*');
                    self.skip_trivia();
                    decl_name = self.read_ident().map(str::to_string);
                } else if self.eat_word("class") {
                    self.skip_trivia();
                    decl_name = self
                        .read_ident()
                        .filter(|name| *name != "extends")
                        .map(str::to_string);
                }
                let kind = match decl_name {
                    Some(name) => ExportKind::DefaultDecl { name },
                    None => ExportKind::DefaultExpr,
                };
                self.push_export(kind, start..prefix_end);
                self.pos = probe;
                self.prev = Prev::Punct;
                true
            }
            "const" | "let" | "var" => {
                let decl_start = self.pos - word.len();
                let names = self.declarator_names();
                if names.is_empty() {
                    return false;
                }
                self.push_export(ExportKind::Decl { names }, start..decl_start);
                self.pos = decl_start;
                self.prev = Prev::Punct;
                true
            }
            "function" | "async" | "class" => {
                let decl_start = self.pos - word.len();
                if word == "async" {
                    self.skip_trivia();
                    if !self.eat_word("function") {
                        return false;
                    }
                }
                self.skip_trivia();
                if word != "class" {
                    self.eat(b'*');
                    self.skip_trivia();
                }
                let Some(name) = self.read_ident().map(str::to_string) else {
                    return false;
                };
                self.push_export(ExportKind::Decl { names: vec![name] }, start..decl_start);
                self.pos = decl_start;
                self.prev = Prev::Punct;
                true
            }
            _ => {
                self.pos = keyword_end;
                false
            }
        }
    }

    /// `{ a, b as c, "d" as e, type T }` → `[(a, a), (b, c), (d, e)]`.
    fn read_named_list(&mut self) -> Option<Vec<(String, String)>> {
        if !self.eat(b'{') {
            return None;
        }
        let mut list = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(b'}') {
                return Some(list);
            }
            let first = match self.peek() {
                Some(b'\'' | b'"') => self.read_string()?,
                _ => self.read_ident()?.to_string(),
            };
            self.skip_trivia();

            let mut is_type = false;
            let mut name = first;
            if name == "type" && self.peek().is_some_and(is_ident_start) {
                let probe = self.pos;
                let next = self.read_ident()?;
                if next == "as" {
                    self.pos = probe;
                } else {
                    is_type = true;
                    name = next.to_string();
                    self.skip_trivia();
                }
            }

            let alias = if self.eat_word("as") {
                self.skip_trivia();
                let alias = match self.peek() {
                    Some(b'\'' | b'"') => self.read_string()?,
                    _ => self.read_ident()?.to_string(),
                };
                self.skip_trivia();
                alias
            } else {
                name.clone()
            };

            if !is_type {
                list.push((name, alias));
            }
            if !self.eat(b',') {
                self.skip_trivia();
                return self.eat(b'}').then_some(list);
            }
        }
    }

    /// Names bound by `a = 1, { b, c: d } = o, [e] = l`. Leaves `pos`
    /// somewhere inside the declaration.
    fn declarator_names(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b'{' | b'[') => self.pattern_names(&mut names),
                Some(b) if is_ident_start(b) => {
                    if let Some(name) = self.read_ident() {
                        names.push(name.to_string());
                    }
                }
                _ => return names,
            }
            self.skip_trivia();
            if self.eat(b'=') {
                if !self.skip_initializer() {
                    return names;
                }
            }
            self.skip_trivia();
            if !self.eat(b',') {
                return names;
            }
        }
    }

    /// Collect binding names from a destructuring pattern at `pos`.
    fn pattern_names(&mut self, names: &mut Vec<String>) {
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'{' | b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' | b']' => {
                    self.pos += 1;
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                b'=' => {
                    // Default value: skip to the next element.
                    self.pos += 1;
                    self.skip_balanced(|b| matches!(b, b',' | b'}' | b']'));
                }
                b'\'' | b'"' => self.skip_string(b),
                b if is_ident_start(b) => {
                    let Some(ident) = self.read_ident() else { return };
                    let ident = ident.to_string();
                    self.skip_trivia();
                    if matches!(self.peek(), Some(b',' | b'}' | b']' | b'=')) {
                        names.push(ident);
                    }
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Skip an initializer expression. Returns false at the end of the
    /// statement.
    fn skip_initializer(&mut self) -> bool {
        let stop = self.skip_balanced(|b| matches!(b, b',' | b';' | b'\n'));
        stop == Some(b',')
    }

    /// Skip until `stop` matches a byte at nesting depth 0 (not consumed).
    /// A newline only stops when the line does not end in an operator.
    fn skip_balanced(&mut self, stop: impl Fn(u8) -> bool) -> Option<u8> {
        let mut depth = 0usize;
        let mut last = b'=';
        while let Some(b) = self.peek() {
            if depth == 0 && stop(b) {
                let continues = b == b'\n' && b"=+-*/%&|^!?:,.(<>".contains(&last);
                if !continues {
                    return Some(b);
                }
            }
            match b {
                b'\'' | b'"' => self.skip_string(b),
                b'`' => self.skip_template_literal(),
                b'/' if self.peek_at(self.pos + 1) == Some(b'/') => {
                    self.skip_line_comment();
                    continue;
                }
                b'/' if self.peek_at(self.pos + 1) == Some(b'*') => {
                    self.skip_block_comment();
                    continue;
                }
                b'/' if b"=(,:[!&|?{};".contains(&last) => self.skip_regex(),
                b'{' | b'(' | b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' | b')' | b']' => {
                    if depth == 0 {
                        return Some(b);
                    }
                    depth -= 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
            if !b.is_ascii_whitespace() {
                last = b;
            }
        }
        None
    }

    /// Skip a whole template literal, including nested `${}` expressions.
    fn skip_template_literal(&mut self) {
        self.pos += 1;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    return;
                }
                b'$' if self.peek_at(self.pos + 1) == Some(b'{') => {
                    self.pos += 2;
                    self.skip_balanced(|b| b == b'}');
                    self.eat(b'}');
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_to_from_string(&mut self) {
        while self.pos < self.src.len() {
            self.skip_trivia();
            if self.eat_word("from") {
                self.skip_trivia();
                self.read_string();
                return;
            }
            match self.peek() {
                Some(b'\n' | b';') | None => return,
                Some(b) if is_ident_start(b) => {
                    self.read_ident();
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn push_import(&mut self, specifier: String, kind: ImportKind, clause: ImportClause, start: usize) {
        if kind == ImportKind::Static {
            self.result.is_esm = true;
        }
        self.result.imports.push(ImportSite {
            specifier,
            kind,
            clause,
            range: start..self.pos,
            line: 0,
        });
        self.prev = if kind == ImportKind::Static || kind == ImportKind::ReExport {
            Prev::Punct
        } else {
            Prev::Value
        };
    }

    fn push_export(&mut self, kind: ExportKind, range: Range<usize>) {
        self.result.is_esm = true;
        self.result.exports.push(ExportSite { kind, range });
    }
}
