//! Inline suppression of violations via comment directives.
//!
//! Supported forms:
//! - `// crosslint:ignore <rule> - <reason>` (same line, or next line when
//!   the directive stands alone)
//! - `// crosslint:ignore-next-line <rule> - <reason>`
//! - `// crosslint:ignore-file <rule> - <reason>`
//!
//! `<rule>` is a rule name or `*` for all rules. Block-comment variants are
//! accepted for languages without line comments.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a suppression applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressKind {
    /// Applies to the same line.
    Line,
    /// Applies to the next line.
    NextLine,
    /// Applies to the entire file.
    File,
}

/// An inline suppression directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suppression {
    /// Rule name, or `*` for all rules.
    pub rule: String,
    /// Human-readable reason, possibly empty.
    pub reason: String,
    /// Line number the directive appears on (0 for file-level).
    pub line: usize,
    pub kind: SuppressKind,
}

lazy_static::lazy_static! {
    /// Patterns for matching suppression comments.
    static ref SUPPRESSION_PATTERNS: Vec<Regex> = vec![
        // Line comment style: // crosslint:...
        Regex::new(r"//\s*crosslint:(ignore(?:-file|-next-line)?)\s+(\S+)\s*(?:-\s*(.*))?").unwrap(),
        // Block comment style: /* crosslint:... */
        Regex::new(r"/\*\s*crosslint:(ignore(?:-file|-next-line)?)\s+(\S+)\s*(?:-\s*(.*?))?\s*\*/").unwrap(),
    ];
}

/// Parse suppression directives from source text.
pub fn parse_suppressions(source: &str) -> Vec<Suppression> {
    let mut suppressions = Vec::new();

    for (line_idx, line) in source.lines().enumerate() {
        let line_number = line_idx + 1;

        for pattern in SUPPRESSION_PATTERNS.iter() {
            let Some(caps) = pattern.captures(line) else {
                continue;
            };
            let directive = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let rule = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let reason = caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();

            let kind = match directive {
                "ignore-file" => SuppressKind::File,
                "ignore-next-line" => SuppressKind::NextLine,
                "ignore" => {
                    // A directive alone on its line covers the next line; a
                    // trailing directive covers its own line.
                    let standalone = caps
                        .get(0)
                        .map(|m| line[..m.start()].trim().is_empty())
                        .unwrap_or(false);
                    if standalone {
                        SuppressKind::NextLine
                    } else {
                        SuppressKind::Line
                    }
                }
                _ => continue,
            };

            suppressions.push(Suppression {
                rule: rule.to_string(),
                reason,
                line: if kind == SuppressKind::File {
                    0
                } else {
                    line_number
                },
                kind,
            });
            break; // Only one suppression per line.
        }
    }

    suppressions
}

/// Whether a suppression covers a violation of `rule` at `line`.
pub fn matches(suppression: &Suppression, rule: &str, line: usize) -> bool {
    if suppression.rule != "*" && suppression.rule != rule {
        return false;
    }
    match suppression.kind {
        SuppressKind::File => true,
        SuppressKind::Line => line == suppression.line,
        SuppressKind::NextLine => line == suppression.line + 1,
    }
}

/// First suppression covering a violation of `rule` at `line`.
pub fn find_suppression(
    suppressions: &[Suppression],
    rule: &str,
    line: usize,
) -> Option<Suppression> {
    suppressions
        .iter()
        .find(|s| matches(s, rule, line))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trailing_and_standalone() {
        let source = "\
int size; // crosslint:ignore forbidden-type - legacy field
// crosslint:ignore high-complexity - ported as-is
void run() {}
";
        let suppressions = parse_suppressions(source);
        assert_eq!(suppressions.len(), 2);

        assert_eq!(suppressions[0].kind, SuppressKind::Line);
        assert_eq!(suppressions[0].rule, "forbidden-type");
        assert_eq!(suppressions[0].reason, "legacy field");
        assert_eq!(suppressions[0].line, 1);

        assert_eq!(suppressions[1].kind, SuppressKind::NextLine);
        assert_eq!(suppressions[1].line, 2);
    }

    #[test]
    fn test_parse_file_level() {
        let source = "// crosslint:ignore-file * - generated code\npackage p;\n";
        let suppressions = parse_suppressions(source);
        assert_eq!(suppressions.len(), 1);
        assert_eq!(suppressions[0].kind, SuppressKind::File);
        assert_eq!(suppressions[0].line, 0);
        assert!(matches(&suppressions[0], "anything", 40));
    }

    #[test]
    fn test_matches_rule_and_line() {
        let s = Suppression {
            rule: "high-complexity".into(),
            reason: String::new(),
            line: 4,
            kind: SuppressKind::NextLine,
        };
        assert!(matches(&s, "high-complexity", 5));
        assert!(!matches(&s, "high-complexity", 4));
        assert!(!matches(&s, "other-rule", 5));

        let wildcard = Suppression {
            rule: "*".into(),
            reason: String::new(),
            line: 0,
            kind: SuppressKind::File,
        };
        assert!(matches(&wildcard, "anything", 123));
    }

    #[test]
    fn test_block_comment_style() {
        let source = "x = 1 /* crosslint:ignore use-before-definition - checked */\n";
        let suppressions = parse_suppressions(source);
        assert_eq!(suppressions.len(), 1);
        assert_eq!(suppressions[0].rule, "use-before-definition");
        assert_eq!(suppressions[0].kind, SuppressKind::Line);
    }
}
