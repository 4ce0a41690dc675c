//! Post-processing: deterministic cleanup of model-generated text.
//!
//! Models wrap output in ```` ```markdown ```` or ```` ```json ```` fences even
//! when told not to, and copy invisible characters out of slide text. These
//! cheap rules fix that without touching content.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw text, and invisible characters go before blank-line collapsing
//! so a line holding only a zero-width space counts as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a model's free-text answer.
///
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Remove invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 1
/// 6. Trim leading/trailing blank lines
pub fn clean_text(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

/// Remove one pair of outer fences (any language tag). Text without fences is
/// returned trimmed.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```markdown\n# Hello\nWorld\n```"), "# Hello\nWorld");
        assert_eq!(strip_code_fences("```\n# Hello\n```"), "# Hello");
        assert_eq!(
            strip_code_fences("  ```json\n{\"questions\": []}\n```  \n"),
            "{\"questions\": []}"
        );
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_code_fences("# Hello\nWorld"), "# Hello\nWorld");
    }

    #[test]
    fn test_inner_fences_are_kept() {
        let input = "Intro\n```rust\nfn main() {}\n```\nOutro";
        assert_eq!(strip_code_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_text_full_pipeline() {
        let input = "```markdown\r\n# Slide 3   \r\n\r\n\r\n\r\n- Point\u{200B}\r\n```";
        assert_eq!(clean_text(input), "# Slide 3\n\n- Point");
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text("   \n\n"), "");
    }
}
