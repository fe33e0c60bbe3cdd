//! Token-aware minifier used when SWC is not compiled in.
//!
//! Drops comments, strips indentation and blank lines and collapses runs of
//! spaces. Line breaks are kept so automatic semicolon insertion behaves the
//! same. String, template and regular expression literals are copied as-is.

const REGEX_AFTER: &[u8] = b"(,=:[!&|?{};+-*%<>~^";
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

pub(super) fn minify(source: &str) -> String {
    let src = source.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(src.len());
    let mut i = 0;
    // Pending whitespace: None, Some(false) = space, Some(true) = newline.
    let mut pending: Option<bool> = None;
    let mut last_sig: Option<u8> = None;
    let mut last_word_start = 0usize;

    while i < src.len() {
        let b = src[i];

        if b.is_ascii_whitespace() {
            let newline = b == b'\n';
            pending = Some(pending.unwrap_or(false) || newline);
            i += 1;
            continue;
        }

        if b == b'/' && src.get(i + 1) == Some(&b'/') {
            while i < src.len() && src[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if b == b'/' && src.get(i + 1) == Some(&b'*') {
            let start = i;
            i += 2;
            while i < src.len() && !(src[i] == b'*' && src.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            i = (i + 2).min(src.len());
            let newline = src[start..i].contains(&b'\n');
            pending = Some(pending.unwrap_or(false) || newline);
            continue;
        }

        // Flush pending whitespace before the next token.
        if let Some(newline) = pending.take() {
            match out.last() {
                None | Some(b'\n') => {}
                Some(_) if newline => out.push(b'\n'),
                Some(_) => out.push(b' '),
            }
        }

        let start = i;
        i = match b {
            b'\'' | b'"' => string_end(src, i),
            b'`' => template_end(src, i),
            b'/' if regex_allowed(&out, last_sig, last_word_start) => regex_end(src, i),
            _ if is_ident(b) => {
                let mut j = i;
                while j < src.len() && is_ident(src[j]) {
                    j += 1;
                }
                last_word_start = out.len();
                j
            }
            _ => i + 1,
        }
        .min(src.len());
        out.extend_from_slice(&src[start..i]);
        last_sig = out.last().copied();
    }

    while out.last().is_some_and(u8::is_ascii_whitespace) {
        out.pop();
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn regex_allowed(out: &[u8], last_sig: Option<u8>, last_word_start: usize) -> bool {
    match last_sig {
        None => true,
        Some(b) if REGEX_AFTER.contains(&b) => true,
        Some(b) if is_ident(b) => {
            let mut word = &out[last_word_start.min(out.len())..];
            while let Some((last, rest)) = word.split_last() {
                if !last.is_ascii_whitespace() {
                    break;
                }
                word = rest;
            }
            REGEX_KEYWORDS.iter().any(|k| k.as_bytes() == word)
        }
        Some(_) => false,
    }
}

fn string_end(src: &[u8], start: usize) -> usize {
    let quote = src[start];
    let mut i = start + 1;
    while i < src.len() {
        match src[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    src.len()
}

fn template_end(src: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < src.len() {
        match src[i] {
            b'\\' => i += 2,
            b'`' => return i + 1,
            b'$' if src.get(i + 1) == Some(&b'{') => i = expression_end(src, i + 2),
            _ => i += 1,
        }
    }
    src.len()
}

/// End of a `${ ... }` expression (index after the closing brace).
fn expression_end(src: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < src.len() {
        match src[i] {
            b'\'' | b'"' => i = string_end(src, i),
            b'`' => i = template_end(src, i),
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                if depth == 0 {
                    return i + 1;
                }
                depth -= 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    src.len()
}

fn regex_end(src: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    let mut in_class = false;
    while i < src.len() {
        match src[i] {
            b'\\' => i += 2,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < src.len() && is_ident(src[i]) {
                    i += 1;
                }
                return i;
            }
            b'\n' => return i,
            _ => i += 1,
        }
    }
    src.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_comments_and_indentation() {
        let src = "// header\nfunction f() {\n    /* body */\n    return 1;\n}\n\n\nf();\n";
        assert_eq!(minify(src), "function f() {\nreturn 1;\n}\nf();");
    }

    #[test]
    fn test_keeps_string_contents() {
        let src = "var s = \"a   /* not a comment */  b\";";
        assert_eq!(minify(src), src);
    }

    #[test]
    fn test_keeps_template_with_expression() {
        let src = "var t = `x  ${ a /* c */ + `y` }  z`;";
        assert_eq!(minify(src), src);
    }

    #[test]
    fn test_keeps_regex() {
        let src = "var r = /\\/\\/ not comment/g;\nvar d = a / b / c;";
        assert_eq!(minify(src), src);
    }

    #[test]
    fn test_regex_after_return() {
        let src = "function f() { return /a\\/*b/; }";
        assert_eq!(minify(src), src);
    }

    #[test]
    fn test_block_comment_between_tokens_keeps_separation() {
        assert_eq!(minify("var/**/a = 1;"), "var a = 1;");
    }
}
