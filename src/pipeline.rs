use crate::checker::{CheckOutcome, Checker};
use crate::config::CheckConfig;
use crate::diagnostic::{translate, Diagnostic};
use crate::materializer::{MappingEntry, Materializer};
use crate::reporting::{log_check_statistics, Aggregator, RunResult};
use crate::scanner::{BlockScanner, DocumentSource};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::Path;
use std::time::Instant;

/// Verifies the example blocks of a documentation tree against an external checker.
///
/// # Overview
///
/// A run scans every document for fenced blocks tagged with a configured
/// marker, writes each checked block to its own artifact in a scratch
/// directory, runs the checker on the artifacts in parallel and translates the
/// checker's diagnostics back to document lines.
///
/// # Errors
///
/// Configuration and resource problems (missing checker, unreadable document,
/// unwritable scratch area) abort the run with an error. Blocks that fail
/// verification do not: they are counted and reported in the [`RunResult`].
///
/// # Example
///
/// ```no_run
/// use doccheck::{CheckConfig, CheckPipeline, DocumentSource};
///
/// let config = CheckConfig {
///     fence_markers: vec!["fe".to_string()],
///     checker: "fe".to_string(),
///     flags: vec!["check".to_string()],
///     ..CheckConfig::default()
/// };
///
/// let pipeline = CheckPipeline::new(config)?;
/// let result = pipeline.run(&DocumentSource::tree("docs", vec!["md".to_string()]))?;
/// std::process::exit(result.exit_code());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct CheckPipeline {
    config: CheckConfig,
    verbose: bool,
}

impl CheckPipeline {
    /// Expands and validates `config`; fails on an invalid configuration.
    pub fn new(config: CheckConfig) -> Result<Self> {
        Ok(Self {
            config: config.finalize()?,
            verbose: false,
        })
    }

    /// Print per-block progress to stderr.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run on a current-thread runtime; checking is process-bound, not CPU-bound.
    pub fn run(&self, source: &DocumentSource) -> Result<RunResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        runtime.block_on(self.run_async(source))
    }

    pub async fn run_async(&self, source: &DocumentSource) -> Result<RunResult> {
        let checker = Checker::from_config(&self.config)?;
        let scanner = BlockScanner::from_config(&self.config);
        let mut materializer = Materializer::new(
            self.config.scratch_dir.as_deref(),
            self.config.artifact_extension(),
        )?;

        log::info!("Scanning documents");
        for document in source.documents() {
            let document = document?;
            let scan = scanner.scan(&document);

            if let Some(line) = scan.unterminated {
                log::warn!(
                    "{}:{}: unterminated code block dropped",
                    document.path().display(),
                    line
                );
            }

            let checked = materializer.materialize_document(document.path(), scan.checked())?;
            let ignored = scan.ignored_count();
            if checked + ignored > 0 {
                log::debug!(
                    "{}: {} checked, {} ignored",
                    document.path().display(),
                    checked,
                    ignored
                );
                if self.verbose {
                    eprintln!(
                        "Scanned {}: {} checked, {} ignored",
                        document.path().display(),
                        checked,
                        ignored
                    );
                }
            }
        }

        // The scratch guard stays alive until every check has finished
        let (_scratch, artifacts, ledger) = materializer.finish();
        log::info!(
            "Checking {} block(s) with up to {} job(s)",
            artifacts.len(),
            self.config.jobs()
        );

        let mut aggregator = Aggregator::new();
        let started = Instant::now();
        let outcomes = checker.check_all(&artifacts, self.config.jobs());
        futures::pin_mut!(outcomes);

        while let Some(outcome) = outcomes.next().await {
            let outcome = outcome?;
            let artifact = &artifacts[outcome.artifact().index()];
            let entry = ledger
                .get(outcome.artifact())
                .with_context(|| format!("No mapping entry for {}", outcome.artifact()))?;

            let diagnostics = diagnostics_for(&checker, &outcome, entry, &artifact.path);

            if self.verbose {
                eprintln!(
                    "  {}:{} ... {}",
                    entry.document.display(),
                    entry.start_line,
                    if outcome.passed() { "ok" } else { "FAILED" }
                );
            }

            aggregator.record(&outcome, diagnostics);
        }

        log_check_statistics(&aggregator, started.elapsed());
        Ok(aggregator.finish())
    }
}

/// Diagnostics reported for one artifact.
///
/// Passing artifacts report nothing. A failure with no output of its own
/// (timeout, or a failing exit status under an exit-status criterion) gets a
/// synthetic diagnostic at the block's opening fence.
fn diagnostics_for(
    checker: &Checker,
    outcome: &CheckOutcome,
    entry: &MappingEntry,
    artifact: &Path,
) -> Vec<Diagnostic> {
    if outcome.passed() {
        return Vec::new();
    }

    let mut diagnostics = translate(entry, artifact, outcome.output());

    if outcome.timed_out() {
        let message = match checker.timeout() {
            Some(limit) => format!("checker timed out after {:?}", limit),
            None => "checker timed out".to_string(),
        };
        diagnostics.push(Diagnostic::at_block(entry, message));
    } else if diagnostics.is_empty() {
        if let Some(status) = outcome.status() {
            diagnostics.push(Diagnostic::at_block(
                entry,
                format!("checker failed with {}", status),
            ));
        }
    }

    diagnostics
}
