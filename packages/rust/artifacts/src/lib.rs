//! Output artifacts: generated test-case sets, Markdown reports and
//! Selenium script files.
//!
//! Every file is written atomically (temp file, then rename) so a crash
//! never leaves a half-written artifact behind.

mod report;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use qagent_shared::{GenerationMode, QaAgentError, Result, Script, TestCase};

pub use report::render_markdown_report;

/// Default file name of a saved test-case set.
pub const TEST_CASES_FILE: &str = "test_cases.json";

/// Default file name of the Markdown report.
pub const REPORT_FILE: &str = "test_cases.md";

/// Test cases generated for one query, as saved to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseSet {
    pub query: String,
    pub mode: GenerationMode,
    pub generated_at: DateTime<Utc>,
    pub test_cases: Vec<TestCase>,
}

impl TestCaseSet {
    pub fn new(query: impl Into<String>, mode: GenerationMode, test_cases: Vec<TestCase>) -> Self {
        Self {
            query: query.into(),
            mode,
            generated_at: Utc::now(),
            test_cases,
        }
    }

    /// Look up a case by id, ignoring ASCII case.
    pub fn find(&self, id: &str) -> Option<&TestCase> {
        self.test_cases
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(id.trim()))
    }
}

/// Metadata of a written artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub file_name: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Write `content` to `dir/file_name` atomically, creating `dir` if needed.
#[instrument(skip_all, fields(dir = %dir.display(), file = %file_name))]
pub fn write_artifact(dir: &Path, file_name: &str, content: &str) -> Result<ArtifactMeta> {
    if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
        return Err(QaAgentError::validation(format!(
            "invalid artifact file name: {file_name:?}"
        )));
    }
    std::fs::create_dir_all(dir).map_err(|e| QaAgentError::io(dir, e))?;

    let target = dir.join(file_name);
    let temp = dir.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| QaAgentError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| QaAgentError::io(&target, e))?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());

    debug!(size = content.len(), "wrote artifact");
    Ok(ArtifactMeta {
        file_name: file_name.to_string(),
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes: content.len(),
    })
}

/// Save a script under its own file name.
pub fn write_script(dir: &Path, script: &Script) -> Result<ArtifactMeta> {
    write_artifact(dir, &script.file_name, &script.source)
}

/// Save a test-case set as pretty-printed JSON.
pub fn write_test_cases(dir: &Path, file_name: &str, set: &TestCaseSet) -> Result<ArtifactMeta> {
    let json = serde_json::to_string_pretty(set)
        .map_err(|e| QaAgentError::validation(format!("JSON serialization failed: {e}")))?;
    write_artifact(dir, file_name, &json)
}

/// Load a test-case set. A bare JSON array of test cases is accepted too.
pub fn read_test_cases(path: &Path) -> Result<TestCaseSet> {
    let content = std::fs::read_to_string(path).map_err(|e| QaAgentError::io(path, e))?;

    if let Ok(set) = serde_json::from_str::<TestCaseSet>(&content) {
        return Ok(set);
    }
    let test_cases: Vec<TestCase> = serde_json::from_str(&content).map_err(|e| {
        QaAgentError::parse(format!("invalid test case file {}: {e}", path.display()))
    })?;
    Ok(TestCaseSet::new("", GenerationMode::Template, test_cases))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qagent_shared::TestType;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("qagent-artifacts-test-{}", uuid::Uuid::now_v7()))
    }

    fn case(id: &str) -> TestCase {
        TestCase {
            id: id.into(),
            title: "Discount Code".into(),
            scenario: "Apply valid discount code SAVE15".into(),
            test_type: TestType::Positive,
            steps: vec!["Enter SAVE15".into(), "Click Apply".into()],
            expected_result: "Total is reduced by 15%".into(),
            grounding_references: BTreeSet::from(["product_specs.md".to_string()]),
        }
    }

    #[test]
    fn script_written_without_temp_files() {
        let dir = temp_dir();
        let script = Script {
            test_case_id: "TC-001".into(),
            file_name: "TC-001.py".into(),
            language: "python".into(),
            source: "from selenium import webdriver\n".into(),
        };

        let meta = write_script(&dir, &script).unwrap();
        assert_eq!(meta.file_name, "TC-001.py");
        assert_eq!(meta.size_bytes, script.source.len());
        assert_eq!(meta.sha256.len(), 64);
        assert_eq!(std::fs::read_to_string(dir.join("TC-001.py")).unwrap(), script.source);

        for entry in std::fs::read_dir(&dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = temp_dir();
        assert!(write_artifact(&dir, "../escape.py", "x").is_err());
        assert!(write_artifact(&dir, "", "x").is_err());
        assert!(write_artifact(&dir, ".hidden", "x").is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_case_set_roundtrip_and_lookup() {
        let dir = temp_dir();
        let set = TestCaseSet::new("discount code", GenerationMode::Llm, vec![case("TC-001"), case("TC-002")]);
        write_test_cases(&dir, TEST_CASES_FILE, &set).unwrap();

        let loaded = read_test_cases(&dir.join(TEST_CASES_FILE)).unwrap();
        assert_eq!(loaded, set);
        assert_eq!(loaded.find("tc-002").map(|c| c.id.as_str()), Some("TC-002"));
        assert!(loaded.find("TC-404").is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bare_array_is_accepted() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cases.json");
        std::fs::write(&path, serde_json::to_string(&vec![case("TC-007")]).unwrap()).unwrap();

        let loaded = read_test_cases(&path).unwrap();
        assert_eq!(loaded.test_cases.len(), 1);
        assert!(loaded.find("TC-007").is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cases.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(read_test_cases(&path), Err(QaAgentError::Parse { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
