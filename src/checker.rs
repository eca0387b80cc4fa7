use crate::config::{CheckConfig, PassCriterion};
use crate::materializer::{Artifact, ArtifactId};
use anyhow::{Context, Result};
use futures::stream::{self, Stream, StreamExt};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// The external checker, resolved and ready to run.
///
/// Each artifact is checked with `<program> <flags...> <artifact path>`.
/// Stdout and stderr are merged line by line in arrival order.
#[derive(Debug, Clone)]
pub struct Checker {
    program: PathBuf,
    flags: Vec<String>,
    timeout: Option<Duration>,
    criterion: PassCriterion,
}

impl Checker {
    pub fn new(program: impl Into<PathBuf>, flags: Vec<String>) -> Self {
        Self {
            program: program.into(),
            flags,
            timeout: None,
            criterion: PassCriterion::default(),
        }
    }

    /// Build from configuration, failing if the checker cannot be found.
    pub fn from_config(config: &CheckConfig) -> Result<Self> {
        let program = resolve_program(&config.checker)?;
        log::debug!("Resolved checker '{}' to {}", config.checker, program.display());

        Ok(Self::new(program, config.flags.clone())
            .with_timeout(config.timeout())
            .with_criterion(config.pass_criterion))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_criterion(mut self, criterion: PassCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Check one artifact.
    ///
    /// Verification failures and timeouts are part of the outcome. An error is
    /// returned only when the checker could not be run at all.
    pub async fn check(&self, artifact: &Artifact) -> Result<CheckOutcome> {
        log::debug!("Checking {} ({})", artifact.id, artifact.path.display());

        let start = Instant::now();
        let run = self.run(&artifact.path);
        let finished = match self.timeout {
            // Dropping `run` on expiry kills the checker
            Some(limit) => tokio::time::timeout(limit, run).await.ok(),
            None => Some(run.await),
        };
        let duration = start.elapsed();

        let outcome = match finished.transpose()? {
            Some((output, status)) => CheckOutcome {
                artifact: artifact.id,
                passed: self.criterion.passed(!output.is_empty(), status.success()),
                output,
                status: Some(status),
                duration,
            },
            None => {
                log::warn!("Checker timed out on {}", artifact.path.display());
                CheckOutcome {
                    artifact: artifact.id,
                    passed: false,
                    output: Vec::new(),
                    status: None,
                    duration,
                }
            }
        };

        Ok(outcome)
    }

    /// Check artifacts with at most `jobs` checkers in flight.
    ///
    /// Outcomes are yielded in artifact order regardless of completion order.
    pub fn check_all<'a>(
        &'a self,
        artifacts: &'a [Artifact],
        jobs: usize,
    ) -> impl Stream<Item = Result<CheckOutcome>> + 'a {
        stream::iter(artifacts)
            .map(move |artifact| self.check(artifact))
            .buffered(jobs.max(1))
    }

    async fn run(&self, artifact: &Path) -> Result<(Vec<String>, ExitStatus)> {
        let mut child = Command::new(&self.program)
            .args(&self.flags)
            .arg(artifact)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to execute checker '{}'\nFlags: {:?}\nFile: {}",
                    self.program.display(),
                    self.flags,
                    artifact.display()
                )
            })?;

        let stdout = child
            .stdout
            .take()
            .context("Checker stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("Checker stderr was not captured")?;

        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut out_open = true;
        let mut err_open = true;
        let mut lines = Vec::new();

        // read_until keeps partial data in the buffer when the other branch wins
        while out_open || err_open {
            tokio::select! {
                read = stdout.read_until(b'\n', &mut out_buf), if out_open => {
                    if read.context("Failed to read checker stdout")? == 0 {
                        out_open = false;
                    }
                    take_line(&mut out_buf, &mut lines);
                }
                read = stderr.read_until(b'\n', &mut err_buf), if err_open => {
                    if read.context("Failed to read checker stderr")? == 0 {
                        err_open = false;
                    }
                    take_line(&mut err_buf, &mut lines);
                }
            }
        }

        let status = child
            .wait()
            .await
            .context("Failed to wait for checker")?;

        Ok((lines, status))
    }
}

/// Move one buffered line into `lines`, dropping blank output.
fn take_line(buf: &mut Vec<u8>, lines: &mut Vec<String>) {
    let line = String::from_utf8_lossy(&buf[..]);
    let line = line.trim_end_matches(['\n', '\r']);
    if !line.trim().is_empty() {
        lines.push(line.to_string());
    }
    buf.clear();
}

/// Locate the checker executable.
///
/// Values with a directory component must point at an executable file;
/// bare names are looked up on `PATH`.
pub fn resolve_program(program: &str) -> Result<PathBuf> {
    let path = Path::new(program);
    if path.is_absolute() || path.components().count() > 1 {
        if is_executable(path) {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("Checker '{}' does not exist or is not executable", program);
    }

    let search = env::var_os("PATH").unwrap_or_default();
    for dir in env::split_paths(&search) {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
        #[cfg(windows)]
        {
            let candidate = candidate.with_extension("exe");
            if is_executable(&candidate) {
                return Ok(candidate);
            }
        }
    }

    anyhow::bail!("Checker '{}' not found on PATH", program)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Result of checking a single artifact.
#[derive(Debug)]
pub struct CheckOutcome {
    artifact: ArtifactId,
    passed: bool,
    output: Vec<String>,
    status: Option<ExitStatus>,
    duration: Duration,
}

impl CheckOutcome {
    pub fn artifact(&self) -> ArtifactId {
        self.artifact
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Non-blank checker output, stdout and stderr interleaved.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Exit status, or `None` when the checker was killed on timeout.
    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
