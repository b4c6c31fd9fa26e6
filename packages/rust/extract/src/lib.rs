//! Text extraction for uploaded documents.
//!
//! Turns a [`SourceDocument`] into the plain text that gets chunked and
//! embedded. Each supported format has its own extraction path:
//!
//! | Format | Extraction |
//! |---|---|
//! | `.txt`, `.md` | lossy UTF-8 decode |
//! | `.json` | parsed and re-serialized pretty-printed |
//! | `.pdf` | text layer via `pdf-extract` |
//! | `.html`, `.htm` | scripts/styles dropped, converted to Markdown via `htmd` |
//!
//! The [`html`] module separately analyses a page's interactive elements for
//! script synthesis.

mod cleanup;
pub mod html;

use scraper::Html;
use tracing::{debug, instrument};

use qagent_shared::{DocumentFormat, QaAgentError, Result, SourceDocument};

pub use html::{ElementKind, HtmlElement, HtmlStructure, LocatorStrategy, Selector};

/// Tags whose content never contributes to document text.
const SKIPPED_TAGS: [&str; 7] = ["script", "style", "noscript", "svg", "iframe", "head", "template"];

/// Extract the text content of a document.
///
/// Fails with [`QaAgentError::MalformedInputDocument`] when the bytes cannot
/// be interpreted in the document's format. Callers skip such documents.
#[instrument(skip_all, fields(name = %doc.name, format = doc.format.as_str()))]
pub fn extract_text(doc: &SourceDocument) -> Result<String> {
    let text = match doc.format {
        DocumentFormat::Text | DocumentFormat::Markdown => decode_text(&doc.bytes),
        DocumentFormat::Json => extract_json(&doc.name, &doc.bytes)?,
        DocumentFormat::Pdf => extract_pdf(&doc.name, &doc.bytes)?,
        DocumentFormat::Html => html_to_text(&decode_text(&doc.bytes)),
    };

    debug!(chars = text.chars().count(), "extracted document text");
    Ok(text)
}

/// Decode bytes as UTF-8, replacing invalid sequences.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

fn extract_json(name: &str, bytes: &[u8]) -> Result<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| QaAgentError::malformed(name, format!("invalid JSON: {e}")))?;

    serde_json::to_string_pretty(&value)
        .map_err(|e| QaAgentError::malformed(name, format!("JSON re-serialization failed: {e}")))
}

fn extract_pdf(name: &str, bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| QaAgentError::malformed(name, format!("unreadable PDF: {e}")))?;

    if text.trim().is_empty() {
        return Err(QaAgentError::malformed(name, "PDF has no extractable text layer"));
    }
    Ok(cleanup::normalize_whitespace(&text))
}

/// Convert an HTML document to readable text.
///
/// Scripts, styles and other non-content tags are removed. The remaining body
/// is converted to Markdown; if conversion fails the visible text is
/// whitespace-collapsed instead.
pub fn html_to_text(html: &str) -> String {
    let body = body_html(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    match converter.convert(&body) {
        Ok(markdown) => cleanup::run_pipeline(&markdown),
        Err(e) => {
            debug!(error = %e, "htmd conversion failed, falling back to visible text");
            visible_text(html)
        }
    }
}

/// Inner HTML of `<body>`, or the whole input when there is none.
fn body_html(html: &str) -> String {
    let doc = Html::parse_document(html);
    match scraper::Selector::parse("body") {
        Ok(sel) => doc
            .select(&sel)
            .next()
            .map(|body| body.inner_html())
            .unwrap_or_else(|| html.to_string()),
        Err(_) => html.to_string(),
    }
}

/// All text nodes outside skipped tags, joined and whitespace-collapsed.
fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts = Vec::new();

    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });
        if !hidden {
            parts.push(text.to_string());
        }
    }

    cleanup::collapse_whitespace(&parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_passes_through() {
        let doc = SourceDocument::support("product_specs.md", "# Discounts\n\nSAVE15 gives 15% off.");
        let text = extract_text(&doc).unwrap();
        assert_eq!(text, "# Discounts\n\nSAVE15 gives 15% off.");
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let doc = SourceDocument::support("notes.txt", vec![b'o', b'k', 0xff, b'!']);
        let text = extract_text(&doc).unwrap();
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
    }

    #[test]
    fn bom_is_stripped() {
        assert_eq!(decode_text("\u{feff}hello".as_bytes()), "hello");
    }

    #[test]
    fn json_is_pretty_printed() {
        let doc = SourceDocument::support("api.json", r#"{"endpoint":"/apply_coupon","codes":["SAVE15"]}"#);
        let text = extract_text(&doc).unwrap();
        assert!(text.contains("\n"));
        assert!(text.contains("\"endpoint\": \"/apply_coupon\""));
        assert!(text.contains("SAVE15"));
    }

    #[test]
    fn malformed_json_is_reported() {
        let doc = SourceDocument::support("broken.json", "{\"endpoint\": ");
        let err = extract_text(&doc).unwrap_err();
        assert!(matches!(err, QaAgentError::MalformedInputDocument { ref name, .. } if name == "broken.json"));
    }

    #[test]
    fn malformed_pdf_is_reported() {
        let doc = SourceDocument::support("guide.pdf", b"definitely not a pdf".to_vec());
        let err = extract_text(&doc).unwrap_err();
        assert!(matches!(err, QaAgentError::MalformedInputDocument { .. }));
    }

    #[test]
    fn html_drops_scripts_and_styles() {
        let html = r#"<html><head><title>Checkout</title><style>.x { color: red; }</style></head>
            <body>
              <h1>Checkout</h1>
              <p>Enter a discount code.</p>
              <script>console.log("tracking");</script>
            </body></html>"#;
        let doc = SourceDocument::support("ui_guide.html", html);
        let text = extract_text(&doc).unwrap();

        assert!(text.contains("Checkout"));
        assert!(text.contains("Enter a discount code."));
        assert!(!text.contains("console.log"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn visible_text_collapses_whitespace() {
        let html = "<html><body><p>Total:\n\n   <b>$100</b></p><script>var x;</script></body></html>";
        assert_eq!(visible_text(html), "Total: $100");
    }

    #[test]
    fn unknown_extension_is_text() {
        let doc = SourceDocument::support("CHANGELOG", "v1: added SAVE15");
        assert_eq!(extract_text(&doc).unwrap(), "v1: added SAVE15");
    }
}
