use crate::checker::CheckOutcome;
use crate::diagnostic::Diagnostic;
use std::io::{self, Write};
use std::time::Duration;

/// The single output value of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Diagnostics in artifact-processing order
    pub diagnostics: Vec<Diagnostic>,
}

impl RunResult {
    /// True when no checked block failed, including when there were none.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// True when the run found nothing to check.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Process exit code for this result: `0` on success, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// One-line summary distinguishing "nothing to check" from "all passed".
    pub fn summary(&self) -> String {
        if self.is_empty() {
            "No checked code blocks found (0 total)".to_string()
        } else {
            format!(
                "Checked {} code block(s): {} passed, {} failed",
                self.total, self.passed, self.failed
            )
        }
    }

    /// Write the summary followed by every diagnostic.
    pub fn write_report(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "{}", self.summary())?;
        for diagnostic in &self.diagnostics {
            writeln!(out, "{}", diagnostic)?;
        }
        Ok(())
    }
}

/// Sole owner of the run's counters and diagnostic list.
///
/// Outcomes must be recorded in artifact order; the aggregator keeps whatever
/// order it is fed.
#[derive(Debug, Default)]
pub struct Aggregator {
    result: RunResult,
    durations: Vec<Duration>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one artifact's verdict and its translated diagnostics.
    pub fn record(&mut self, outcome: &CheckOutcome, diagnostics: Vec<Diagnostic>) {
        self.record_verdict(outcome.passed(), diagnostics);
        self.durations.push(outcome.duration());
    }

    fn record_verdict(&mut self, passed: bool, diagnostics: Vec<Diagnostic>) {
        self.result.total += 1;
        if passed {
            self.result.passed += 1;
        } else {
            self.result.failed += 1;
        }
        self.result.diagnostics.extend(diagnostics);
    }

    /// Sum of per-artifact check durations.
    pub fn busy_time(&self) -> Duration {
        self.durations.iter().sum()
    }

    pub fn finish(self) -> RunResult {
        self.result
    }
}

/// Logs timing statistics after checking.
///
/// Shows the wall-clock time and average per block at info level; the
/// per-block breakdown is only emitted at debug level (RUST_LOG=debug).
pub fn log_check_statistics(aggregator: &Aggregator, wall_time: Duration) {
    let count = aggregator.durations.len();
    if count == 0 {
        return;
    }

    let avg_ms = aggregator.busy_time().as_millis() / count as u128;
    log::info!(
        "Checked {} block(s) in {}ms (avg {}ms per block)",
        count,
        wall_time.as_millis(),
        avg_ms
    );

    for (index, duration) in aggregator.durations.iter().enumerate() {
        log::debug!("[CHECK_TIME] block #{}: {}ms", index, duration.as_millis());
    }
}
