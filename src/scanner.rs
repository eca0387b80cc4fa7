use crate::config::CheckConfig;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/// A documentation page: its reporting path and its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    lines: Vec<String>,
}

impl Document {
    /// Lines are split on `\n` only; a `\r` before it stays part of the line.
    pub fn new(path: impl Into<PathBuf>, content: &str) -> Self {
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        if content.is_empty() || content.ends_with('\n') {
            lines.pop();
        }

        Self {
            path: path.into(),
            lines,
        }
    }

    /// Read `source` from disk, reporting it as `path`.
    pub fn load(source: &Path, path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(source)
            .with_context(|| format!("Failed to read document {}", source.display()))?;
        Ok(Self::new(path, &content))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Where documents come from.
///
/// [`DocumentSource::documents`] returns a fresh lazy iterator on every call, so
/// a source can be scanned any number of times.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Every file under `root` whose extension is listed, honoring `.gitignore`
    Tree {
        root: PathBuf,
        extensions: Vec<String>,
    },
    /// An explicit list of documents, reported as given
    Files(Vec<PathBuf>),
}

impl DocumentSource {
    pub fn tree(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        DocumentSource::Tree {
            root: root.into(),
            extensions,
        }
    }

    pub fn files(paths: Vec<PathBuf>) -> Self {
        DocumentSource::Files(paths)
    }

    /// Lazily yields documents in a stable order.
    ///
    /// Tree walks are sorted by file name so repeated runs see the same order.
    /// Paths are reported relative to the walked root.
    pub fn documents(&self) -> Box<dyn Iterator<Item = Result<Document>> + '_> {
        match self {
            DocumentSource::Files(paths) => Box::new(
                paths
                    .iter()
                    .map(|path| Document::load(path, path.clone())),
            ),
            DocumentSource::Tree { root, extensions } => {
                let walker = WalkBuilder::new(root)
                    .follow_links(true)
                    .git_ignore(true)
                    .sort_by_file_name(|a, b| a.cmp(b))
                    .build();

                Box::new(walker.filter_map(move |entry| {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            return Some(Err(anyhow::Error::new(e).context(format!(
                                "Failed to walk documentation tree {}",
                                root.display()
                            ))))
                        }
                    };

                    if !entry.file_type().is_some_and(|t| t.is_file()) {
                        return None;
                    }

                    let path = entry.path();
                    let wanted = path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| extensions.iter().any(|e| e == ext));
                    if !wanted {
                        return None;
                    }

                    let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
                    Some(Document::load(path, relative))
                }))
            }
        }
    }
}

/// Whether a block is handed to the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    Checked,
    Ignored,
}

/// A fenced example block in the target language.
///
/// Ignored blocks carry no content; only their position is kept.
///
/// # Example
///
/// ````markdown
/// ```fe
/// contract Foo {}
/// ```
///
/// ```fe,ignore
/// this is not checked
/// ```
/// ````
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Reporting path of the document the block came from
    pub document: PathBuf,
    /// 1-indexed line of the opening fence
    pub start_line: usize,
    /// Lines between the fences, verbatim
    pub content: Vec<String>,
    pub mode: BlockMode,
}

impl CodeBlock {
    /// The block's source text: content lines joined with `\n`, newline-terminated.
    ///
    /// Content lines from a CRLF document end in `\r`, so the text keeps its
    /// original line endings.
    pub fn source(&self) -> String {
        let mut source = self.content.join("\n");
        source.push('\n');
        source
    }
}

/// Blocks found in one document.
#[derive(Debug, Default)]
pub struct Scan {
    pub blocks: Vec<CodeBlock>,
    /// Opening line of a target block still open at end of document
    pub unterminated: Option<usize>,
}

impl Scan {
    pub fn checked(&self) -> impl Iterator<Item = &CodeBlock> {
        self.blocks.iter().filter(|b| b.mode == BlockMode::Checked)
    }

    pub fn ignored_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.mode == BlockMode::Ignored)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    ch: char,
    len: usize,
}

impl Fence {
    /// Parse an opening or closing fence, returning it with its info string.
    fn parse(line: &str) -> Option<(Fence, &str)> {
        let trimmed = line.trim_start();
        let ch = trimmed.chars().next()?;
        if ch != '`' && ch != '~' {
            return None;
        }

        // Fence characters are ASCII so the count doubles as a byte offset
        let len = trimmed.chars().take_while(|c| *c == ch).count();
        if len < 3 {
            return None;
        }

        Some((Fence { ch, len }, trimmed[len..].trim()))
    }

    fn is_closed_by(&self, line: &str) -> bool {
        matches!(
            Fence::parse(line),
            Some((fence, info)) if fence.ch == self.ch && fence.len >= self.len && info.is_empty()
        )
    }
}

enum ScanState {
    Outside,
    InCheckedBlock {
        start_line: usize,
        fence: Fence,
        buffer: Vec<String>,
    },
    InIgnoredBlock {
        start_line: usize,
        fence: Fence,
    },
}

/// Recognizes target-language blocks in documents.
#[derive(Debug, Clone)]
pub struct BlockScanner {
    markers: Vec<String>,
    ignore_marker: String,
}

impl BlockScanner {
    pub fn new(markers: Vec<String>, ignore_marker: impl Into<String>) -> Self {
        Self {
            markers,
            ignore_marker: ignore_marker.into(),
        }
    }

    pub fn from_config(config: &CheckConfig) -> Self {
        Self::new(config.fence_markers.clone(), config.ignore_marker.clone())
    }

    /// Scan one document.
    ///
    /// Fences in other languages are inert. Checked blocks with no content lines
    /// are dropped. A target block left open at end of document is discarded and
    /// its opening line reported in [`Scan::unterminated`].
    pub fn scan(&self, document: &Document) -> Scan {
        let mut scan = Scan::default();
        let mut state = ScanState::Outside;

        for (index, line) in document.lines().iter().enumerate() {
            let line_number = index + 1;

            state = match state {
                ScanState::Outside => match Fence::parse(line) {
                    Some((fence, info)) => match self.classify(info) {
                        Some(BlockMode::Checked) => ScanState::InCheckedBlock {
                            start_line: line_number,
                            fence,
                            buffer: Vec::new(),
                        },
                        Some(BlockMode::Ignored) => ScanState::InIgnoredBlock {
                            start_line: line_number,
                            fence,
                        },
                        None => ScanState::Outside,
                    },
                    None => ScanState::Outside,
                },
                ScanState::InCheckedBlock {
                    start_line,
                    fence,
                    mut buffer,
                } => {
                    if fence.is_closed_by(line) {
                        if !buffer.is_empty() {
                            scan.blocks.push(CodeBlock {
                                document: document.path().to_path_buf(),
                                start_line,
                                content: buffer,
                                mode: BlockMode::Checked,
                            });
                        }
                        ScanState::Outside
                    } else {
                        buffer.push(line.clone());
                        ScanState::InCheckedBlock {
                            start_line,
                            fence,
                            buffer,
                        }
                    }
                }
                ScanState::InIgnoredBlock { start_line, fence } => {
                    if fence.is_closed_by(line) {
                        scan.blocks.push(CodeBlock {
                            document: document.path().to_path_buf(),
                            start_line,
                            content: Vec::new(),
                            mode: BlockMode::Ignored,
                        });
                        ScanState::Outside
                    } else {
                        ScanState::InIgnoredBlock { start_line, fence }
                    }
                }
            };
        }

        match state {
            ScanState::Outside => {}
            ScanState::InCheckedBlock { start_line, .. }
            | ScanState::InIgnoredBlock { start_line, .. } => {
                scan.unterminated = Some(start_line);
            }
        }

        scan
    }

    /// Decide what a fence info string opens, if anything.
    fn classify(&self, info: &str) -> Option<BlockMode> {
        let (language, attributes) = parse_fence_info(info);
        if !self.markers.iter().any(|m| m == language) {
            return None;
        }

        if attributes.contains(&self.ignore_marker.as_str()) {
            Some(BlockMode::Ignored)
        } else {
            Some(BlockMode::Checked)
        }
    }
}

/// Parse fence info string into language and attributes
/// Examples:
/// - "fe" -> ("fe", [])
/// - "fe,ignore" -> ("fe", ["ignore"])
/// - "fe ignore" -> ("fe", ["ignore"])
fn parse_fence_info(info: &str) -> (&str, Vec<&str>) {
    let mut parts = info
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty());

    let language = parts.next().unwrap_or("");
    (language, parts.collect())
}
