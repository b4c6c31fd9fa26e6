//! Core pipeline and domain logic for the QA agent.
//!
//! This crate ties together extraction, chunking, embedding and the
//! knowledge store into the three user-facing workflows: building the
//! knowledge base, generating grounded test cases, and synthesizing
//! Selenium scripts. [`QaAgent`] is the entry point.

pub mod agent;
pub mod backend;
pub mod chunker;
pub mod grounding;
pub mod ingest;
pub mod parse;
pub mod progress;
pub mod prompt;
pub mod retriever;
pub mod script_template;
pub mod scripts;
pub mod template;
pub mod testcases;

mod terms;

pub use agent::{KnowledgeBaseStatus, QaAgent};
pub use ingest::{IngestReport, SkippedDocument};
pub use progress::{ProgressReporter, SilentProgress};
pub use scripts::SynthesisOutcome;
pub use testcases::GenerationOutcome;
