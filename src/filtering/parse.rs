//! Filter list content inspection.

use sha2::{Digest, Sha256};

/// What the manager needs to know about downloaded filter content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilter {
    /// Number of rule lines
    pub rules_count: usize,
    /// Title from a `! Title:` header, if present
    pub title: Option<String>,
    /// SHA-256 of the content, hex encoded
    pub checksum: String,
}

fn is_comment(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('#')
}

fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix('!').or_else(|| line.strip_prefix('#'))?;
    let rest = rest.trim_start().strip_prefix(key)?;
    rest.strip_prefix(':').map(str::trim)
}

/// Counts rules and extracts the list title.
///
/// Blank lines and comment lines (starting with `!` or `#`) are not rules.
pub fn parse_filter(content: &str) -> ParsedFilter {
    let mut rules_count = 0;
    let mut title = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_comment(line) {
            if title.is_none() {
                title = header_value(line, "Title")
                    .filter(|t| !t.is_empty())
                    .map(str::to_string);
            }
            continue;
        }
        rules_count += 1;
    }

    ParsedFilter {
        rules_count,
        title,
        checksum: checksum(content),
    }
}

/// Hex-encoded SHA-256 of `content`.
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Returns `true` when the content is an HTML page rather than a list of rules.
///
/// Only the first non-blank line is inspected.
pub fn looks_like_html(content: &str) -> bool {
    let Some(first) = content.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return false;
    };
    let first = first.to_ascii_lowercase();
    first.starts_with("<!doctype html") || first.starts_with("<html")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "! Title: Example Blocklist\n\
                        ! Homepage: https://example.test\n\
                        \n\
                        ||ads.example.test^\n\
                        # hosts style comment\n\
                        0.0.0.0 tracker.example.test\n\
                        @@||good.example.test^\n";

    #[test]
    fn test_parse_counts_rules_and_title() {
        let parsed = parse_filter(LIST);
        assert_eq!(parsed.rules_count, 3);
        assert_eq!(parsed.title.as_deref(), Some("Example Blocklist"));
        assert_eq!(parsed.checksum.len(), 64);
    }

    #[test]
    fn test_parse_without_title() {
        let parsed = parse_filter("||a.test^\n||b.test^");
        assert_eq!(parsed.rules_count, 2);
        assert!(parsed.title.is_none());
    }

    #[test]
    fn test_parse_comments_only() {
        let parsed = parse_filter("! Title: Empty\n# nothing here\n\n");
        assert_eq!(parsed.rules_count, 0);
        assert_eq!(parsed.title.as_deref(), Some("Empty"));
    }

    #[test]
    fn test_hosts_style_title() {
        let parsed = parse_filter("# Title: Hosts\n0.0.0.0 a.test\n");
        assert_eq!(parsed.title.as_deref(), Some("Hosts"));
    }

    #[test]
    fn test_checksum_changes_with_content() {
        assert_eq!(checksum("a"), checksum("a"));
        assert_ne!(checksum("a"), checksum("b"));
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("\n  <!DOCTYPE html>\n<html></html>"));
        assert!(looks_like_html("<html lang=\"en\">"));
        assert!(!looks_like_html("||ads.example.test^"));
        assert!(!looks_like_html(""));
    }
}
