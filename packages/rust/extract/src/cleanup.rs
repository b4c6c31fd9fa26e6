//! Cleanup passes applied to text converted from HTML.
//!
//! Each pass is a function `&str -> String` applied in sequence. The output
//! is meant for chunking and embedding, so presentation-only Markdown
//! (images, raw tags) is reduced to its text.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on converted Markdown.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.to_string();

    result = strip_images(&result);
    result = strip_leftover_html(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Images
// ---------------------------------------------------------------------------

/// Replace `![alt](src)` with its alt text.
fn strip_images(md: &str) -> String {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

    IMAGE_RE.replace_all(md, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Leftover tags
// ---------------------------------------------------------------------------

/// Remove container tags that survived conversion, keeping their content.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|form|label|input|button|select|option|textarea)(?:\s[^>]*)?/?>",
        )
        .expect("valid regex")
    });

    HTML_TAG_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse runs of 3+ newlines into a single blank line.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

/// Collapse every whitespace run into one space.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_images_keeps_alt_text() {
        let input = "Logo: ![Shop logo](/img/logo.png) end";
        assert_eq!(strip_images(input), "Logo: Shop logo end");
    }

    #[test]
    fn strip_leftover_html_removes_form_tags() {
        let input = "<div class=\"note\">Express shipping costs $10</div>\n<input id=\"discount\"/>";
        let result = strip_leftover_html(input);
        assert!(result.contains("Express shipping costs $10"));
        assert!(!result.contains("<div"));
        assert!(!result.contains("<input"));
    }

    #[test]
    fn normalize_whitespace_trims_trailing() {
        assert_eq!(normalize_whitespace("Line 1   \nLine 2\t\nLine 3"), "Line 1\nLine 2\nLine 3");
    }

    #[test]
    fn clean_blank_lines_collapses_excess() {
        assert_eq!(clean_blank_lines("Line 1\n\n\n\n\nLine 2"), "Line 1\n\nLine 2");
        assert_eq!(clean_blank_lines("Line 1\n\nLine 2"), "Line 1\n\nLine 2");
    }

    #[test]
    fn full_pipeline_cleans_markdown() {
        let input = "# Checkout\n\n\n\n\n![banner](b.png)\n\n<span>Free shipping over $50</span>   \n\n";
        let result = run_pipeline(input);
        assert_eq!(result, "# Checkout\n\nbanner\n\nFree shipping over $50");
    }
}
