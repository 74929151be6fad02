//! ES module syntax detection.
//!
//! Decides whether source text is written as an ES module (top-level
//! `import`/`export` statements) rather than CommonJS. This is a textual
//! check, not a parse: comments are blanked out first, then the code is
//! matched against statement-shaped patterns.

use regex_lite::Regex;
use std::sync::OnceLock;

const IMPORT_EXPORT_PATTERN: &str = concat!(
    r#"(?:^\s*|[}{\(\);,\n]\s*)"#,
    r#"(import\s+['"]"#,
    r#"|(import|module)\s+[^"'\(\)\n;]+\s+from\s+['"]"#,
    r#"|export\s+(\*|\{|default|function|var|const|let|[_$a-zA-Z\x{A0}-\x{FFFF}][_$a-zA-Z0-9\x{A0}-\x{FFFF}]*))"#,
);

const EXPORT_ALL_PATTERN: &str =
    r#"(?:^\s*|[}{\(\);,\n]\s*)(export\s*\*\s*from\s*(?:'([^']+)'|"([^"]+)"))"#;

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [IMPORT_EXPORT_PATTERN, EXPORT_ALL_PATTERN]
            .iter()
            .map(|pattern| Regex::new(pattern).expect("module syntax pattern must compile"))
            .collect()
    })
}

/// Whether `source` uses ES module syntax.
#[must_use]
pub fn is_module(source: &str) -> bool {
    let code = strip_comments(source);
    patterns().iter().any(|re| re.is_match(&code))
}

/// Replace comments with whitespace, leaving string literals untouched.
///
/// Line breaks inside block comments are kept so statement boundaries
/// survive.
fn strip_comments(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < len {
        let c = chars[i];

        // String literal: copy through, honoring escapes
        if c == '"' || c == '\'' || c == '`' {
            out.push(c);
            i += 1;
            while i < len && chars[i] != c {
                if chars[i] == '\\' && i + 1 < len {
                    out.push(chars[i]);
                    i += 1;
                }
                out.push(chars[i]);
                i += 1;
            }
            if i < len {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }

        // Line comment
        if c == '/' && i + 1 < len && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            out.push(' ');
            continue;
        }

        // Block comment
        if c == '/' && i + 1 < len && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                if chars[i] == '\n' {
                    out.push('\n');
                }
                i += 1;
            }
            i = (i + 2).min(len);
            out.push(' ');
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}
