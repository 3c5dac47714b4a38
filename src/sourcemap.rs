// ABOUTME: Source-map mapping records, VLQ encoding, and the V3 JSON document

use serde::Serialize;

/// One generated-to-original position record, accumulated in emission
/// order. Lines are 1-based internally (matching `Position`); the V3
/// encoder exports them 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapping {
    /// (line, column) in the generated output.
    pub generated: (u32, u32),
    /// (line, column) in the original source.
    pub original: Option<(u32, u32)>,
    pub source: Option<String>,
    pub name: Option<String>,
}

/// The V3 document shape serialized to JSON.
#[derive(Debug, Serialize)]
struct SourceMapV3 {
    version: u32,
    sources: Vec<String>,
    names: Vec<String>,
    mappings: String,
    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    sources_content: Option<Vec<String>>,
}

const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Encode one signed value as base64 VLQ.
fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Build the V3 JSON source map from an ordered mapping list.
///
/// `source_file` names the original file; `source_content` embeds it when
/// the caller provided it.
pub fn encode_source_map(
    mappings: &[SourceMapping],
    source_file: &str,
    source_content: Option<&str>,
) -> String {
    let mut names: Vec<String> = Vec::new();
    for mapping in mappings {
        if let Some(name) = &mapping.name {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }

    let mut encoded = String::new();
    let mut current_line = 1u32; // generated, 1-based
    let mut prev_gen_col = 0i64;
    let mut prev_src_line = 0i64;
    let mut prev_src_col = 0i64;
    let mut prev_name = 0i64;
    let mut segment_on_line = false;

    for mapping in mappings {
        let (gen_line, gen_col) = mapping.generated;
        while current_line < gen_line {
            encoded.push(';');
            current_line += 1;
            prev_gen_col = 0;
            segment_on_line = false;
        }
        if segment_on_line {
            encoded.push(',');
        }
        segment_on_line = true;

        encode_vlq(&mut encoded, gen_col as i64 - prev_gen_col);
        prev_gen_col = gen_col as i64;

        if let Some((src_line, src_col)) = mapping.original {
            // Single-source compiler: source index delta is always zero
            encode_vlq(&mut encoded, 0);
            let line0 = src_line.saturating_sub(1) as i64;
            encode_vlq(&mut encoded, line0 - prev_src_line);
            prev_src_line = line0;
            encode_vlq(&mut encoded, src_col as i64 - prev_src_col);
            prev_src_col = src_col as i64;

            if let Some(name) = &mapping.name {
                let idx = names.iter().position(|n| n == name).unwrap_or(0) as i64;
                encode_vlq(&mut encoded, idx - prev_name);
                prev_name = idx;
            }
        }
    }

    let doc = SourceMapV3 {
        version: 3,
        sources: vec![source_file.to_string()],
        names,
        mappings: encoded,
        sources_content: source_content.map(|c| vec![c.to_string()]),
    };
    // Serialization of this plain struct cannot fail
    serde_json::to_string(&doc).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut out = String::new();
        encode_vlq(&mut out, value);
        out
    }

    #[test]
    fn test_vlq_known_values() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(16), "gB");
    }

    #[test]
    fn test_empty_mappings() {
        let json = encode_source_map(&[], "a.hql", None);
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["version"], 3);
        assert_eq!(doc["sources"][0], "a.hql");
        assert_eq!(doc["mappings"], "");
    }

    #[test]
    fn test_lines_become_semicolons() {
        let mappings = vec![
            SourceMapping {
                generated: (1, 0),
                original: Some((1, 0)),
                source: Some("a.hql".into()),
                name: None,
            },
            SourceMapping {
                generated: (2, 0),
                original: Some((1, 4)),
                source: Some("a.hql".into()),
                name: None,
            },
        ];
        let json = encode_source_map(&mappings, "a.hql", None);
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        let encoded = doc["mappings"].as_str().unwrap();
        assert!(encoded.contains(';'));
    }

    #[test]
    fn test_names_collected_once() {
        let mk = |name: &str| SourceMapping {
            generated: (1, 0),
            original: Some((1, 0)),
            source: None,
            name: Some(name.to_string()),
        };
        let json = encode_source_map(&[mk("foo"), mk("foo"), mk("bar")], "a.hql", None);
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["names"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_sources_content_embedded() {
        let json = encode_source_map(&[], "a.hql", Some("(+ 1 2)"));
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["sourcesContent"][0], "(+ 1 2)");
    }

    #[test]
    fn test_first_segment_column_is_absolute() {
        let mappings = vec![SourceMapping {
            generated: (1, 4),
            original: Some((2, 6)),
            source: None,
            name: None,
        }];
        let json = encode_source_map(&mappings, "a.hql", None);
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        // column 4, source 0, line delta 1 (0-based line 1), col 6
        assert_eq!(doc["mappings"], "IACM");
    }
}
