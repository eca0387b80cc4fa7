use crate::scanner::CodeBlock;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Maximum size of a single code block in bytes (1MB)
pub const MAX_CODE_BLOCK_SIZE: usize = 1_000_000;

/// Maximum number of checked blocks per document
pub const MAX_BLOCKS_PER_DOCUMENT: usize = 1000;

/// Identity of an artifact, unique within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(usize);

impl ArtifactId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block-{:05}", self.0)
    }
}

/// A checked block written out for the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub path: PathBuf,
}

/// Links an artifact back to the block it was written from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub artifact: ArtifactId,
    pub document: PathBuf,
    /// Opening-fence line of the block; artifact line `n` is document line `start_line + n`
    pub start_line: usize,
}

/// Append-only record of every artifact written in a run.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<MappingEntry>,
}

impl Ledger {
    fn push(&mut self, entry: MappingEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn get(&self, id: ArtifactId) -> Option<&MappingEntry> {
        self.entries.get(id.index()).filter(|e| e.artifact == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes checked blocks into an exclusively owned scratch directory.
///
/// The scratch directory and every artifact in it are removed when the
/// materializer is dropped, whichever way the run ends.
pub struct Materializer {
    scratch: TempDir,
    extension: String,
    artifacts: Vec<Artifact>,
    ledger: Ledger,
}

impl Materializer {
    /// Create the scratch area under `parent`, or the system temp dir.
    pub fn new(parent: Option<&Path>, extension: impl Into<String>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("doccheck-");

        let scratch = match parent {
            Some(dir) => builder.tempdir_in(dir).with_context(|| {
                format!("Failed to create scratch directory in {}", dir.display())
            })?,
            None => builder
                .tempdir()
                .context("Failed to create scratch directory")?,
        };
        log::info!("Using scratch directory: {:?}", scratch.path());

        Ok(Self {
            scratch,
            extension: extension.into(),
            artifacts: Vec::new(),
            ledger: Ledger::default(),
        })
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Write one checked block and record its mapping entry.
    ///
    /// The artifact holds exactly [`CodeBlock::source`]. Any I/O failure is
    /// returned as-is; the caller treats it as fatal.
    pub fn materialize(&mut self, block: &CodeBlock) -> Result<&Artifact> {
        let id = ArtifactId(self.artifacts.len());
        let source = block.source();

        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        let path = self
            .scratch
            .path()
            .join(format!("{}-{}{}", id, &digest[..12], self.extension));

        fs::write(&path, source.as_bytes())
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;

        log::debug!(
            "Materialized {}:{} as {}",
            block.document.display(),
            block.start_line,
            path.display()
        );

        self.ledger.push(MappingEntry {
            artifact: id,
            document: block.document.clone(),
            start_line: block.start_line,
        });
        self.artifacts.push(Artifact { id, path });

        Ok(&self.artifacts[id.index()])
    }

    /// Write every checked block of one document, enforcing size limits.
    ///
    /// Limit violations are collected and logged, then reported as one error.
    pub fn materialize_document<'a>(
        &mut self,
        document: &Path,
        blocks: impl IntoIterator<Item = &'a CodeBlock>,
    ) -> Result<usize> {
        let blocks: Vec<&CodeBlock> = blocks.into_iter().collect();

        if blocks.len() > MAX_BLOCKS_PER_DOCUMENT {
            anyhow::bail!(
                "Document {} has {} code blocks, exceeding limit of {}",
                document.display(),
                blocks.len(),
                MAX_BLOCKS_PER_DOCUMENT
            );
        }

        let mut collection_errors = Vec::new();
        for block in &blocks {
            let size = block.source().len();
            if size > MAX_CODE_BLOCK_SIZE {
                collection_errors.push(format!(
                    "Code block at {}:{} exceeds size limit of {} bytes ({} bytes)",
                    document.display(),
                    block.start_line,
                    MAX_CODE_BLOCK_SIZE,
                    size
                ));
            }
        }

        if !collection_errors.is_empty() {
            for error in &collection_errors {
                log::error!("{}", error);
            }
            anyhow::bail!(
                "Failed to collect code blocks from {} due to {} error(s)",
                document.display(),
                collection_errors.len()
            );
        }

        for block in &blocks {
            self.materialize(block)?;
        }

        Ok(blocks.len())
    }

    /// Hand over the artifacts and the frozen ledger, keeping the scratch guard.
    pub fn finish(self) -> (TempDir, Vec<Artifact>, Ledger) {
        (self.scratch, self.artifacts, self.ledger)
    }
}
