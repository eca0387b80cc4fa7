//! Checker diagnostics and their translation into document coordinates.

use crate::materializer::MappingEntry;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A diagnostic as printed by the checker, in artifact coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDiagnostic {
    pub path: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// A diagnostic in document coordinates.
///
/// `column` is `None` when the checker line could not be parsed and the
/// diagnostic is attributed to the block's opening fence instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub document: PathBuf,
    pub line: usize,
    pub column: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    /// A diagnostic pinned to the block's opening fence.
    pub fn at_block(entry: &MappingEntry, message: impl Into<String>) -> Self {
        Self {
            document: entry.document.clone(),
            line: entry.start_line,
            column: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:", self.document.display(), self.line)?;
        if let Some(column) = self.column {
            write!(f, "{}:", column)?;
        }
        write!(f, " {}", self.message)
    }
}

fn diagnostic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<path>.+?):(?P<line>\d+):(?P<column>\d+):\s?(?P<message>.*)$")
            .expect("diagnostic pattern is valid")
    })
}

/// Parse a `<path>:<line>:<column>:<message>` line.
///
/// Returns `None` for anything else: free-form text, continuation lines,
/// crash output, or numbers too large to represent.
pub fn parse_diagnostic_line(line: &str) -> Option<RawDiagnostic> {
    let caps = diagnostic_pattern().captures(line.trim_end())?;
    Some(RawDiagnostic {
        path: caps["path"].to_string(),
        line: caps["line"].parse().ok()?,
        column: caps["column"].parse().ok()?,
        message: caps["message"].to_string(),
    })
}

/// Whether a path printed by the checker names the artifact.
///
/// Checkers print the path as given, canonicalized, or relative to their own
/// working directory; artifact file names are unique within a run, so the
/// file name is enough.
fn refers_to_artifact(printed: &str, artifact: &Path) -> bool {
    let printed = Path::new(printed);
    printed == artifact
        || (printed.file_name().is_some() && printed.file_name() == artifact.file_name())
}

/// Translate one checker output line into document coordinates.
///
/// A parsed line naming the artifact maps to `start_line + line`. Anything
/// else, including a line number past `usize::MAX` once offset, is kept
/// verbatim and attributed to the block's opening fence.
pub fn translate_line(entry: &MappingEntry, artifact: &Path, line: &str) -> Diagnostic {
    let mapped = parse_diagnostic_line(line)
        .filter(|raw| refers_to_artifact(&raw.path, artifact))
        .and_then(|raw| {
            let document_line = entry.start_line.checked_add(raw.line)?;
            Some(Diagnostic {
                document: entry.document.clone(),
                line: document_line,
                column: Some(raw.column),
                message: raw.message,
            })
        });
    mapped.unwrap_or_else(|| Diagnostic::at_block(entry, line.trim_end()))
}

/// Translate every output line of one checker invocation, in order.
pub fn translate(entry: &MappingEntry, artifact: &Path, output: &[String]) -> Vec<Diagnostic> {
    output
        .iter()
        .map(|line| translate_line(entry, artifact, line))
        .collect()
}
