use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-project configuration file looked up under the root.
pub const CONFIG_FILE_NAME: &str = "doccheck.toml";

/// Configuration for a documentation check run.
///
/// Deserialized from `doccheck.toml`. Every field has a default except the
/// checker and fence markers, which must come from the file or the command line.
///
/// # Example
///
/// ```toml
/// fence_markers = ["fe"]
/// checker = "${FE_BIN}"
/// flags = ["check"]
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    /// Fence info languages that mark a block as target-language code
    pub fence_markers: Vec<String>,

    /// Attribute on the opening fence that excludes a block from checking
    pub ignore_marker: String,

    /// Checker executable (supports ${VAR} environment variable expansion)
    pub checker: String,

    /// Arguments passed before the artifact path
    pub flags: Vec<String>,

    /// Artifact file extension; derived from the first fence marker when unset
    pub extension: Option<String>,

    /// File extensions picked up when walking the documentation tree
    pub document_extensions: Vec<String>,

    /// Maximum number of checker processes in flight
    pub jobs: Option<usize>,

    /// Per-invocation timeout in seconds
    pub timeout_secs: Option<u64>,

    /// How a checker invocation is judged
    pub pass_criterion: PassCriterion,

    /// Parent directory for the scratch area (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            fence_markers: Vec::new(),
            ignore_marker: "ignore".to_string(),
            checker: String::new(),
            flags: Vec::new(),
            extension: None,
            document_extensions: vec!["md".to_string()],
            jobs: None,
            timeout_secs: None,
            pass_criterion: PassCriterion::default(),
            scratch_dir: None,
        }
    }
}

/// The oracle deciding whether a checker invocation passed.
///
/// The checker contract is "empty output means success"; exit status is
/// ignored unless one of the other criteria is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassCriterion {
    /// Pass iff the checker printed nothing
    #[default]
    EmptyOutput,
    /// Pass iff the checker exited successfully
    ExitStatus,
    /// Pass iff the checker printed nothing and exited successfully
    Both,
}

impl PassCriterion {
    /// Applies the oracle to one invocation.
    pub fn passed(self, has_output: bool, exit_success: bool) -> bool {
        match self {
            PassCriterion::EmptyOutput => !has_output,
            PassCriterion::ExitStatus => exit_success,
            PassCriterion::Both => !has_output && exit_success,
        }
    }
}

impl CheckConfig {
    /// Parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Locate and load the configuration for a run.
    ///
    /// An explicit path must exist. Otherwise `<root>/doccheck.toml` is tried,
    /// then the user config file, and finally the built-in defaults.
    pub fn discover(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let project_file = root.join(CONFIG_FILE_NAME);
        if project_file.is_file() {
            log::info!("Using configuration {}", project_file.display());
            return Self::from_file(&project_file);
        }

        if let Some(user_file) = user_config_file() {
            if user_file.is_file() {
                log::info!("Using configuration {}", user_file.display());
                return Self::from_file(&user_file);
            }
        }

        log::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Expand environment variables and validate the merged configuration.
    pub fn finalize(mut self) -> Result<Self> {
        self.checker = expand_env_vars(&self.checker);
        for flag in self.flags.iter_mut() {
            *flag = expand_env_vars(flag);
        }
        self.validate().context("Invalid configuration")?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.checker.is_empty() {
            anyhow::bail!(
                "No checker configured; set `checker` in {} or pass --checker",
                CONFIG_FILE_NAME
            );
        }

        if self.fence_markers.iter().all(|m| m.trim().is_empty()) {
            anyhow::bail!("At least one fence marker must be configured");
        }

        if self.ignore_marker.trim().is_empty() {
            anyhow::bail!("Ignore marker cannot be empty");
        }

        if self.jobs == Some(0) {
            anyhow::bail!("jobs must be at least 1");
        }

        if self.timeout_secs == Some(0) {
            anyhow::bail!("timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Worker limit for checker invocations.
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Extension (with leading dot) given to every artifact.
    pub fn artifact_extension(&self) -> String {
        match &self.extension {
            Some(ext) if ext.starts_with('.') || ext.is_empty() => ext.clone(),
            Some(ext) => format!(".{}", ext),
            None => {
                let marker = self.fence_markers.first().map(String::as_str).unwrap_or("");
                crate::language::artifact_extension(marker).into_owned()
            }
        }
    }
}

/// Path of the per-user configuration file.
fn user_config_file() -> Option<PathBuf> {
    // XDG_CONFIG_HOME wins on every platform
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("doccheck")
                .join("config.toml"),
        );
    }

    ProjectDirs::from("", "", "doccheck").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Expand environment variables in a string
/// Supports ${VAR_NAME} syntax
/// This function processes the string in a single pass to avoid re-processing expanded values
fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_name = String::new();
            let mut found_close = false;

            for ch in chars.by_ref() {
                if ch == '}' {
                    found_close = true;
                    break;
                }
                var_name.push(ch);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_name);
                continue;
            }

            match env::var(&var_name) {
                Ok(value) => result.push_str(&value),
                Err(_) => {
                    log::warn!(
                        "Environment variable '{}' not found, leaving unexpanded",
                        var_name
                    );
                    result.push_str("${");
                    result.push_str(&var_name);
                    result.push('}');
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}
