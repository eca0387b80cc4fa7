//! Common test utilities for integration tests
//!
//! Fixtures build a throwaway documentation tree plus a checker written as a
//! shell script. The script is run as `sh <script> <artifact>`, so it behaves
//! like any checker that takes the artifact path as its last argument.

#![allow(dead_code)]

use anyhow::Result;
use doccheck::{CheckConfig, CheckPipeline, DocumentSource, RunResult};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Flags every artifact line containing `BAD` as `<artifact>:<line>:1: unknown identifier`.
pub const BAD_LINE_CHECKER: &str = r#"grep -n BAD "$1" | while IFS=: read -r n rest; do
  echo "$1:$n:1: unknown identifier"
done
"#;

/// Isolated documentation tree with automatic cleanup
pub struct TestFixture {
    dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir(dir.path().join("docs"))?;
        Ok(Self { dir })
    }

    /// Directory holding the documents
    pub fn docs(&self) -> PathBuf {
        self.dir.path().join("docs")
    }

    /// Write a document relative to the docs directory
    pub fn write_doc(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let path = self.docs().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Configuration targeting ```fe blocks and running `script` as the checker
    pub fn config(&self, script: &str) -> Result<CheckConfig> {
        let script_path = self.dir.path().join("checker.sh");
        fs::write(&script_path, script)?;

        Ok(CheckConfig {
            fence_markers: vec!["fe".to_string()],
            checker: "sh".to_string(),
            flags: vec![script_path.display().to_string()],
            jobs: Some(4),
            ..CheckConfig::default()
        })
    }

    /// Source walking the whole docs tree
    pub fn tree(&self) -> DocumentSource {
        DocumentSource::tree(self.docs(), vec!["md".to_string()])
    }

    /// A fresh directory inside the fixture
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

/// Run the full pipeline over the fixture's docs tree
pub async fn run_tree(fixture: &TestFixture, config: CheckConfig) -> Result<RunResult> {
    let pipeline = CheckPipeline::new(config)?;
    pipeline.run_async(&fixture.tree()).await
}

/// A fenced `fe` block
pub fn fe_block(lines: &[&str]) -> String {
    format!("```fe\n{}\n```\n", lines.join("\n"))
}
