//! Core domain types for the QA agent.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a chunk identifier in hex characters.
const CHUNK_ID_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Source documents
// ---------------------------------------------------------------------------

/// Input format of an uploaded document, detected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Json,
    Pdf,
    Html,
}

impl DocumentFormat {
    /// Detect the format from a file name. Unknown extensions are plain text.
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "md" | "markdown" => Self::Markdown,
            "json" => Self::Json,
            "pdf" => Self::Pdf,
            "html" | "htm" => Self::Html,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text/plain",
            Self::Markdown => "text/markdown",
            Self::Json => "application/json",
            Self::Pdf => "application/pdf",
            Self::Html => "text/html",
        }
    }
}

/// Role of a document in the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Product specs, UI/UX guides, API docs.
    SupportDoc,
    /// The page under test.
    Html,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SupportDoc => "support_doc",
            Self::Html => "html",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "support_doc" => Some(Self::SupportDoc),
            "html" => Some(Self::Html),
            _ => None,
        }
    }
}

/// A raw uploaded document awaiting extraction.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Source identifier (usually the file name).
    pub name: String,
    pub format: DocumentFormat,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Build a support document, detecting the format from `name`.
    pub fn support(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        Self {
            format: DocumentFormat::from_name(&name),
            kind: DocumentKind::SupportDoc,
            name,
            bytes: bytes.into(),
        }
    }

    /// Build the page-under-test document.
    pub fn html_page(name: impl Into<String>, html: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            format: DocumentFormat::Html,
            kind: DocumentKind::Html,
            bytes: html.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

/// A bounded span of extracted text stored with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic identifier, see [`chunk_id`].
    pub id: String,
    pub text: String,
    /// Name of the document this chunk was cut from.
    pub source_document: String,
    /// Character offset of the first character in the extracted text.
    pub offset: usize,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    pub document_kind: DocumentKind,
    pub embedding: Vec<f32>,
}

/// A chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query vector.
    pub score: f64,
}

/// Compute the stable identifier of chunk `index` of `source`.
///
/// Resubmitting the same document produces the same ids, which makes
/// store inserts idempotent.
pub fn chunk_id(source: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(index.to_string().as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..CHUNK_ID_LEN].to_string()
}

/// SHA-256 hex digest of document content.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Test cases and scripts
// ---------------------------------------------------------------------------

/// Whether a test case exercises the happy path or a failure path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    #[default]
    Positive,
    Negative,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    /// Lenient parse of LLM-provided labels (`"negative"`, `"Negative test"`, ...).
    pub fn parse_lenient(value: &str) -> Self {
        if value.to_ascii_lowercase().contains("neg") {
            Self::Negative
        } else {
            Self::Positive
        }
    }
}

/// A structured, documentation-grounded test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Identifier such as `TC-001`.
    pub id: String,
    /// Feature under test.
    pub title: String,
    /// One-line description of the scenario.
    pub scenario: String,
    #[serde(default)]
    pub test_type: TestType,
    pub steps: Vec<String>,
    pub expected_result: String,
    /// Source documents this case is traceable to. Never empty.
    pub grounding_references: BTreeSet<String>,
}

/// Which generation path produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Llm,
    Template,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Template => "template",
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An executable automation script for one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub test_case_id: String,
    /// Download file name, e.g. `TC-001.py`.
    pub file_name: String,
    /// Source language of `source`.
    pub language: String,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection() {
        assert_eq!(DocumentFormat::from_name("product_specs.md"), DocumentFormat::Markdown);
        assert_eq!(DocumentFormat::from_name("api.JSON"), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_name("guide.pdf"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_name("checkout.htm"), DocumentFormat::Html);
        assert_eq!(DocumentFormat::from_name("notes.txt"), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_name("README"), DocumentFormat::Text);
    }

    #[test]
    fn chunk_id_is_stable_and_distinct() {
        let a = chunk_id("specs.md", 0);
        assert_eq!(a, chunk_id("specs.md", 0));
        assert_eq!(a.len(), 32);
        assert_ne!(a, chunk_id("specs.md", 1));
        assert_ne!(a, chunk_id("guide.md", 0));
    }

    #[test]
    fn lenient_test_type() {
        assert_eq!(TestType::parse_lenient("negative"), TestType::Negative);
        assert_eq!(TestType::parse_lenient("Negative test"), TestType::Negative);
        assert_eq!(TestType::parse_lenient("positive|negative"), TestType::Negative);
        assert_eq!(TestType::parse_lenient("positive"), TestType::Positive);
        assert_eq!(TestType::parse_lenient(""), TestType::Positive);
    }

    #[test]
    fn test_case_serialization() {
        let case = TestCase {
            id: "TC-001".into(),
            title: "Discount Code".into(),
            scenario: "Apply valid discount code SAVE15".into(),
            test_type: TestType::Positive,
            steps: vec!["Enter SAVE15".into(), "Click Apply".into()],
            expected_result: "Total is reduced by 15%".into(),
            grounding_references: BTreeSet::from(["product_specs.md".to_string()]),
        };

        let json = serde_json::to_string(&case).expect("serialize");
        assert!(json.contains(r#""test_type":"positive""#));
        let parsed: TestCase = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, case);
    }

    #[test]
    fn document_kind_parse() {
        assert_eq!(DocumentKind::parse("html"), Some(DocumentKind::Html));
        assert_eq!(DocumentKind::parse(DocumentKind::SupportDoc.as_str()), Some(DocumentKind::SupportDoc));
        assert_eq!(DocumentKind::parse("other"), None);
    }
}
