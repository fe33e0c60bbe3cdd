//! Line-level V3 source maps for development chunks.

use serde::Serialize;

/// VLQ-encode a signed integer and append to output string.
fn vlq_encode(value: i64, out: &mut String) {
    const B64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    #[allow(clippy::cast_sign_loss)]
    let mut v = (if value < 0 { ((-value) << 1) | 1 } else { value << 1 }) as u64;
    loop {
        let mut digit = (v & 0x1f) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0x20;
        }
        out.push(B64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceMapJson<'a> {
    version: u32,
    file: &'a str,
    sources: &'a [String],
    sources_content: &'a [String],
    mappings: String,
}

/// Collects one mapping per generated line.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<String>,
    sources_content: Vec<String>,
    /// `(generated_line, source_index, source_line)`, zero-based.
    lines: Vec<(u32, u32, u32)>,
}

impl SourceMapBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file and return its index.
    pub fn add_source(&mut self, name: &str, content: &str) -> u32 {
        let idx = self.sources.len() as u32;
        self.sources.push(name.to_string());
        self.sources_content.push(content.to_string());
        idx
    }

    pub fn add_line_mapping(&mut self, generated_line: u32, source: u32, source_line: u32) {
        self.lines.push((generated_line, source, source_line));
    }

    /// Serialize as V3 JSON.
    #[must_use]
    pub fn generate(&self, file: &str) -> String {
        let mut sorted = self.lines.clone();
        sorted.sort_unstable();
        sorted.dedup_by_key(|m| m.0);

        let mut mappings = String::new();
        let mut line = 0u32;
        let mut prev_source = 0i64;
        let mut prev_source_line = 0i64;
        for (generated, source, source_line) in sorted {
            while line < generated {
                mappings.push(';');
                line += 1;
            }
            vlq_encode(0, &mut mappings);
            vlq_encode(i64::from(source) - prev_source, &mut mappings);
            vlq_encode(i64::from(source_line) - prev_source_line, &mut mappings);
            vlq_encode(0, &mut mappings);
            prev_source = i64::from(source);
            prev_source_line = i64::from(source_line);
        }

        serde_json::to_string(&SourceMapJson {
            version: 3,
            file,
            sources: &self.sources,
            sources_content: &self.sources_content,
            mappings,
        })
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlq_encode() {
        let mut s = String::new();
        vlq_encode(0, &mut s);
        vlq_encode(1, &mut s);
        vlq_encode(-1, &mut s);
        vlq_encode(16, &mut s);
        assert_eq!(s, "ACDgB");
    }

    #[test]
    fn test_generate_line_mappings() {
        let mut builder = SourceMapBuilder::new();
        let a = builder.add_source("src/a.js", "x\ny\n");
        builder.add_line_mapping(1, a, 0);
        builder.add_line_mapping(2, a, 1);

        let json: serde_json::Value = serde_json::from_str(&builder.generate("index.js")).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["file"], "index.js");
        assert_eq!(json["sources"][0], "src/a.js");
        assert_eq!(json["sourcesContent"][0], "x\ny\n");
        assert_eq!(json["mappings"], ";AAAA;AACA");
    }
}
