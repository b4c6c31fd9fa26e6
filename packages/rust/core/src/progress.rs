//! Progress reporting for long-running knowledge-base operations.

use crate::ingest::IngestReport;

/// Progress callback for reporting ingestion status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a document's chunks are stored.
    fn document_ingested(&self, name: &str, chunks: usize, current: usize, total: usize);
    /// Called when a document is skipped.
    fn document_skipped(&self, name: &str, reason: &str);
    /// Called when ingestion completes.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_ingested(&self, _name: &str, _chunks: usize, _current: usize, _total: usize) {}
    fn document_skipped(&self, _name: &str, _reason: &str) {}
    fn done(&self, _report: &IngestReport) {}
}
