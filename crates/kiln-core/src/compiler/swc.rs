//! SWC-backed type stripping and minification.
//!
//! Without the `swc` feature, [`strip_types`] falls back to a pattern-based
//! stripper that covers the annotation forms found in ordinary application
//! code (variable, parameter and return annotations, interfaces, type
//! aliases, `as` casts, generic arguments). It is not a TypeScript parser.

#![allow(clippy::default_trait_access)]

use super::CompilerError;
use std::path::Path;

// ============================================================
// SWC implementation (requires `swc` feature)
// ============================================================

#[cfg(feature = "swc")]
pub(super) fn strip_types(source: &str, path: &Path) -> Result<String, CompilerError> {
    use swc_common::{
        comments::SingleThreadedComments, errors::Handler, sync::Lrc, FileName, Globals, Mark,
        SourceMap, GLOBALS,
    };
    use swc_ecma_ast::{EsVersion, Program};
    use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
    use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax, TsSyntax};
    use swc_ecma_transforms_base::{fixer::fixer, hygiene::hygiene, resolver};
    use swc_ecma_transforms_typescript::strip;
    use swc_ecma_visit::FoldWith;

    let cm: Lrc<SourceMap> = Default::default();
    let handler = Handler::with_emitter_writer(Box::new(std::io::sink()), Some(cm.clone()));

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input.ts");
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let is_tsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsx"));
    let syntax = Syntax::Typescript(TsSyntax {
        tsx: is_tsx,
        decorators: true,
        ..Default::default()
    });

    let comments = SingleThreadedComments::default();
    let lexer = Lexer::new(
        syntax,
        EsVersion::Es2020,
        StringInput::from(&*fm),
        Some(&comments),
    );
    let mut parser = Parser::new_from(lexer);

    let module = parser.parse_module().map_err(|e| {
        let kind = format!("{:?}", e.kind());
        e.into_diagnostic(&handler).emit();
        CompilerError::parse_error(format!("Failed to parse: {kind}"))
    })?;

    let errors: Vec<String> = parser
        .take_errors()
        .into_iter()
        .map(|e| format!("{:?}", e.kind()))
        .collect();
    if !errors.is_empty() {
        return Err(CompilerError::parse_error(errors.join(", ")));
    }

    let output = GLOBALS.set(&Globals::default(), || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();

        let mut program = Program::Module(module);
        program = program.fold_with(&mut resolver(unresolved_mark, top_level_mark, true));
        program = program.fold_with(&mut strip(unresolved_mark, top_level_mark));

        let mut module = match program {
            Program::Module(m) => m,
            Program::Script(s) => swc_ecma_ast::Module {
                span: s.span,
                body: s
                    .body
                    .into_iter()
                    .map(swc_ecma_ast::ModuleItem::Stmt)
                    .collect(),
                shebang: s.shebang,
            },
        };
        module = module.fold_with(&mut hygiene());
        module = module.fold_with(&mut fixer(Some(&comments)));
        module
    });

    let mut buf = Vec::new();
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default().with_target(EsVersion::Es2020),
            cm: cm.clone(),
            comments: Some(&comments),
            wr: writer,
        };
        emitter
            .emit_module(&output)
            .map_err(|e| CompilerError::transform_error(format!("Failed to emit: {e}")))?;
    }

    String::from_utf8(buf)
        .map_err(|e| CompilerError::transform_error(format!("Invalid UTF-8 output: {e}")))
}

#[cfg(feature = "swc")]
pub(super) fn minify(source: &str) -> Result<String, CompilerError> {
    use swc_common::{errors::Handler, sync::Lrc, FileName, SourceMap};
    use swc_ecma_ast::EsVersion;
    use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
    use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

    let cm: Lrc<SourceMap> = Default::default();
    let handler = Handler::with_emitter_writer(Box::new(std::io::sink()), Some(cm.clone()));
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom("chunk.js".to_string())),
        source.to_string(),
    );

    // Comments are not collected, so the output carries none.
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::Es2020,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let script = parser.parse_script().map_err(|e| {
        let kind = format!("{:?}", e.kind());
        e.into_diagnostic(&handler).emit();
        CompilerError::parse_error(format!("Failed to parse: {kind}"))
    })?;

    let mut buf = Vec::new();
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default()
                .with_minify(true)
                .with_target(EsVersion::Es2020),
            cm: cm.clone(),
            comments: None,
            wr: writer,
        };
        emitter
            .emit_script(&script)
            .map_err(|e| CompilerError::transform_error(format!("Failed to emit: {e}")))?;
    }

    String::from_utf8(buf)
        .map_err(|e| CompilerError::transform_error(format!("Invalid UTF-8 output: {e}")))
}

// ============================================================
// Fallback implementation
// ============================================================

#[cfg(not(feature = "swc"))]
const TYPE: &str = r"[\w.$]+(?:<[^<>;{}()]*>)?(?:\[\])*";

#[cfg(not(feature = "swc"))]
pub(super) fn strip_types(source: &str, _path: &Path) -> Result<String, CompilerError> {
    let mut result = source.to_string();

    let replace = |result: &mut String, pattern: &str, with: &str| {
        if let Ok(re) = regex_lite::Regex::new(pattern) {
            *result = re.replace_all(result, with).to_string();
        }
    };

    // Type-only imports and exports
    replace(
        &mut result,
        r#"(?m)^[ \t]*(?:import|export)\s+type\s+\{[^}]*\}(?:\s*from\s*['"][^'"]*['"])?\s*;?[ \t]*\n?"#,
        "",
    );
    replace(
        &mut result,
        r#"(?m)^[ \t]*import\s+type\s+[\w$*\s]+from\s*['"][^'"]*['"]\s*;?[ \t]*\n?"#,
        "",
    );

    // interface Foo { ... } (one level of nesting)
    replace(
        &mut result,
        r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?interface\s+[\w$]+[^{]*\{(?:[^{}]|\{[^{}]*\})*\}[ \t]*\n?",
        "",
    );

    // type Foo = ...;
    replace(
        &mut result,
        r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?type\s+[\w$]+(?:<[^>]*>)?\s*=[^;]+;[ \t]*\n?",
        "",
    );

    // Return annotations: ): T { and ): T =>
    replace(&mut result, &format!(r"\)\s*:\s*{TYPE}\s*\{{"), ") {");
    replace(&mut result, &format!(r"\)\s*:\s*{TYPE}\s*=>"), ") =>");

    // Variable annotations: const x: T = ...
    replace(
        &mut result,
        &format!(r"\b(const|let|var)\s+([\w$]+)\s*:\s*{TYPE}\s*="),
        "$1 $2 =",
    );

    // Parameter annotations, only inside function-like parameter lists
    if let Ok(params_re) = regex_lite::Regex::new(
        r"(\bfunction\b\s*\*?\s*[\w$]*\s*|\b[\w$]+\s*|)\(([^()]*)\)(\s*(?:\{|=>))",
    ) {
        let annotation = regex_lite::Regex::new(&format!(
            r"^(\s*(?:\.\.\.)?[\w$]+)\??\s*:\s*{TYPE}(\s*(?:=.*)?)$"
        ))
        .ok();
        result = params_re
            .replace_all(&result, |caps: &regex_lite::Captures| {
                let head = &caps[1];
                let keyword = head.trim();
                if matches!(keyword, "if" | "for" | "while" | "switch" | "catch" | "with") {
                    return caps[0].to_string();
                }
                let params = caps[2]
                    .split(',')
                    .map(|param| match &annotation {
                        Some(re) => re.replace(param, "$1$2").to_string(),
                        None => param.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{head}({params}){}", &caps[3])
            })
            .to_string();
    }

    // `x as T` casts, skipping import/export lines where `as` renames
    if let Ok(cast) = regex_lite::Regex::new(&format!(r"\s+as\s+(?:const\b|{TYPE})")) {
        result = result
            .split_inclusive('\n')
            .map(|line| {
                let trimmed = line.trim_start();
                if trimmed.starts_with("import") || trimmed.starts_with("export {") || trimmed.starts_with('*') {
                    line.to_string()
                } else {
                    cast.replace_all(line, "").to_string()
                }
            })
            .collect();
    }

    // Generic call arguments: foo<T>(
    replace(&mut result, r"([\w$])<[\w$\s,.\[\]|]+>\(", "$1(");

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(feature = "swc"))]
    fn test_fallback_keeps_object_literals() {
        let out = strip_types("const o = { a: b, c: d };\n", Path::new("a.ts")).unwrap();
        assert_eq!(out, "const o = { a: b, c: d };\n");
    }

    #[test]
    #[cfg(not(feature = "swc"))]
    fn test_fallback_strips_params_and_defaults() {
        let out = strip_types(
            "export function greet(name: string, times: number = 1): string {\n  return name;\n}\n",
            Path::new("a.ts"),
        )
        .unwrap();
        assert_eq!(
            out,
            "export function greet(name, times = 1) {\n  return name;\n}\n"
        );
    }

    #[test]
    #[cfg(not(feature = "swc"))]
    fn test_fallback_leaves_control_flow() {
        let src = "if (a ? b : c) {\n  run();\n}\n";
        assert_eq!(strip_types(src, Path::new("a.ts")).unwrap(), src);
    }

    #[test]
    #[cfg(not(feature = "swc"))]
    fn test_fallback_type_imports_and_aliases() {
        let out = strip_types(
            "import type { A } from './a';\nexport type Id = string;\nimport { b as c } from './b';\nconst x = y as Id;\n",
            Path::new("a.ts"),
        )
        .unwrap();
        assert_eq!(out, "import { b as c } from './b';\nconst x = y;\n");
    }

    #[test]
    #[cfg(not(feature = "swc"))]
    fn test_fallback_arrow_params() {
        let out = strip_types("const f = (a: number): number => a * 2;\n", Path::new("a.ts")).unwrap();
        assert_eq!(out, "const f = (a) => a * 2;\n");
    }

    #[test]
    #[cfg(feature = "swc")]
    fn test_swc_strip_typescript() {
        let out = strip_types(
            "enum Color { Red }\nexport const c: Color = Color.Red;\nexport type T = number;\n",
            Path::new("a.ts"),
        )
        .unwrap();
        assert!(out.contains("Color"));
        assert!(!out.contains("type T"));
    }

    #[test]
    #[cfg(feature = "swc")]
    fn test_swc_parse_error() {
        let err = strip_types("const = ;", Path::new("a.ts")).unwrap_err();
        assert_eq!(err.code, "COMPILER_PARSE_ERROR");
    }

    #[test]
    #[cfg(feature = "swc")]
    fn test_swc_minify() {
        let out = minify("/* c */ var a = 1;\n\nfunction f() {\n  return a;\n}\n").unwrap();
        assert!(!out.contains("/*"));
        assert!(!out.contains("\n\n"));
    }
}
