//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use qagent_artifacts::{
    REPORT_FILE, TEST_CASES_FILE, TestCaseSet, render_markdown_report, read_test_cases,
    write_artifact, write_script, write_test_cases,
};
use qagent_core::{IngestReport, ProgressReporter, QaAgent};
use qagent_shared::{AppConfig, SourceDocument, expand_home, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// qagent: generate grounded test cases and Selenium scripts from documentation.
#[derive(Parser)]
#[command(
    name = "qagent",
    version,
    about = "Generate documentation-grounded test cases and Selenium scripts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Never contact the LLM runtime; always use template mode.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Knowledge base directory (overrides `defaults.data_dir`).
    #[arg(long, global = true, env = "QAGENT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Rebuild the knowledge base from support documents and the page under test.
    Build {
        /// Support document (.md, .txt, .json, .pdf, .html). Repeatable.
        #[arg(short, long = "doc", required = true)]
        docs: Vec<PathBuf>,

        /// HTML of the page under test.
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Add documents to the existing knowledge base.
    Ingest {
        /// Support document. Repeatable.
        #[arg(short, long = "doc", required = true)]
        docs: Vec<PathBuf>,
    },

    /// Generate test cases for a feature query.
    Generate {
        /// What to test, e.g. "discount code feature".
        query: String,

        /// Where to save the test cases as JSON. A Markdown report is
        /// written next to it.
        #[arg(short, long, default_value = TEST_CASES_FILE)]
        out: PathBuf,

        /// Print the outcome as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Synthesize a Selenium script for one saved test case.
    Script {
        /// Test case file produced by `generate`.
        #[arg(long, default_value = TEST_CASES_FILE)]
        cases: PathBuf,

        /// Test case id, e.g. TC-001.
        #[arg(long)]
        id: String,

        /// HTML of the page under test.
        #[arg(long)]
        html: PathBuf,

        /// Output directory for the script.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// URL the script opens (overrides `generation.page_url`).
        #[arg(long)]
        page_url: Option<String>,
    },

    /// Show the knowledge base contents.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete every chunk from the knowledge base.
    Reset,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "qagent=info",
        1 => "qagent=debug",
        _ => "qagent=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let Cli {
        offline,
        data_dir,
        command,
        ..
    } = cli;

    match command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
        command => {
            let mut config = load_config()?;
            if let Command::Script {
                page_url: Some(url),
                ..
            } = &command
            {
                config.generation.page_url = url.clone();
            }
            let data_dir = match data_dir {
                Some(dir) => dir,
                None => expand_home(&config.defaults.data_dir)?,
            };
            let agent = QaAgent::open(config, &data_dir, offline).await?;
            let result = dispatch(&agent, command).await;
            agent.close().await?;
            result
        }
    }
}

async fn dispatch(agent: &QaAgent, command: Command) -> Result<()> {
    match command {
        Command::Build { docs, html } => cmd_build(agent, &docs, html.as_deref()).await,
        Command::Ingest { docs } => cmd_ingest(agent, &docs).await,
        Command::Generate { query, out, json } => cmd_generate(agent, &query, &out, json).await,
        Command::Script {
            cases, id, html, out, ..
        } => cmd_script(agent, &cases, &id, &html, &out).await,
        Command::Status { json } => cmd_status(agent, json).await,
        Command::Reset => cmd_reset(agent).await,
        Command::Config { .. } => Err(eyre!("config commands do not open the knowledge base")),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(agent: &QaAgent, docs: &[PathBuf], html: Option<&Path>) -> Result<()> {
    let documents = read_documents(docs)?;
    let page = match html {
        Some(path) => Some(SourceDocument::html_page(file_name(path), read_file(path)?)),
        None => None,
    };

    info!(documents = documents.len(), page = page.is_some(), "building knowledge base");
    let reporter = CliProgress::new();
    let report = agent
        .build_knowledge_base(&documents, page, &reporter)
        .await?;

    print_report("Knowledge base built", &report);
    Ok(())
}

async fn cmd_ingest(agent: &QaAgent, docs: &[PathBuf]) -> Result<()> {
    let documents = read_documents(docs)?;
    let reporter = CliProgress::new();
    let report = agent.ingest(&documents, &reporter).await?;
    print_report("Documents ingested", &report);
    Ok(())
}

async fn cmd_generate(agent: &QaAgent, query: &str, out: &Path, json: bool) -> Result<()> {
    let outcome = agent
        .generate_test_cases(query)
        .await
        .wrap_err("test case generation failed")?;

    let set = TestCaseSet::new(query, outcome.mode, outcome.test_cases.clone());
    let (dir, name) = split_output(out)?;
    write_test_cases(&dir, &name, &set)?;
    write_artifact(&dir, &report_name(&name), &render_markdown_report(&set))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!();
    println!("  Generated {} test case(s) in {} mode", set.test_cases.len(), outcome.mode);
    if outcome.discarded > 0 {
        println!("  Discarded {} ungrounded or malformed candidate(s)", outcome.discarded);
    }
    println!();
    for case in &set.test_cases {
        let refs: Vec<&str> = case.grounding_references.iter().map(String::as_str).collect();
        println!("  {}  [{}]  {}", case.id, case.test_type.as_str(), case.scenario);
        println!("      grounded in: {}", refs.join(", "));
    }
    println!();
    println!("  Saved: {}", dir.join(&name).display());
    println!();
    Ok(())
}

async fn cmd_script(
    agent: &QaAgent,
    cases: &Path,
    id: &str,
    html: &Path,
    out: &Path,
) -> Result<()> {
    let set = read_test_cases(cases)?;
    let case = set
        .find(id)
        .ok_or_else(|| eyre!("no test case '{id}' in {}", cases.display()))?;
    let page = String::from_utf8_lossy(&read_file(html)?).into_owned();

    let outcome = agent.synthesize_script(case, &page).await?;

    let meta = write_script(out, &outcome.script)?;
    println!();
    println!("  Script for {} ({} mode)", case.id, outcome.mode);
    println!("  Saved: {}", out.join(&meta.file_name).display());
    println!();
    Ok(())
}

async fn cmd_status(agent: &QaAgent, json: bool) -> Result<()> {
    let status = agent.status().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  Chunks:   {}", status.chunk_count);
    println!(
        "  Embedder: {} ({} dimensions)",
        status.embedder.name, status.embedder.dimension
    );
    if status.documents.is_empty() {
        println!("  No documents ingested.");
    }
    for doc in &status.documents {
        println!(
            "  {:<32} {:<12} {:>4} chunks  {}",
            doc.name,
            doc.kind.as_str(),
            doc.chunk_count,
            doc.ingested_at.as_deref().unwrap_or("-")
        );
    }
    println!();
    Ok(())
}

async fn cmd_reset(agent: &QaAgent) -> Result<()> {
    let removed = agent.reset().await?;
    println!("Knowledge base reset: {removed} chunk(s) removed");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).wrap_err_with(|| format!("cannot read {}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_documents(paths: &[PathBuf]) -> Result<Vec<SourceDocument>> {
    paths
        .iter()
        .map(|path| Ok(SourceDocument::support(file_name(path), read_file(path)?)))
        .collect()
}

/// Split an output file path into its directory and file name.
fn split_output(out: &Path) -> Result<(PathBuf, String)> {
    let name = out
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| eyre!("output path '{}' has no file name", out.display()))?;
    let dir = match out.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name))
}

/// `cases.json` -> `cases.md`; the default name maps to the default report.
fn report_name(json_name: &str) -> String {
    if json_name == TEST_CASES_FILE {
        return REPORT_FILE.to_string();
    }
    match json_name.strip_suffix(".json") {
        Some(stem) => format!("{stem}.md"),
        None => format!("{json_name}.md"),
    }
}

fn print_report(title: &str, report: &IngestReport) {
    println!();
    println!("  {title}");
    println!("  Documents: {}", report.documents_ingested);
    println!("  Chunks:    {}", report.chunks_inserted);
    for skipped in &report.skipped {
        println!("  Skipped:   {} ({})", skipped.name, skipped.reason);
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_ingested(&self, name: &str, chunks: usize, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Ingested [{current}/{total}] {name} ({chunks} chunks)"));
    }

    fn document_skipped(&self, name: &str, reason: &str) {
        self.spinner.println(format!("  skipped {name}: {reason}"));
    }

    fn done(&self, _report: &IngestReport) {
        self.spinner.finish_and_clear();
    }
}
