use anyhow::Result;
use clap::Parser;
use doccheck::{CheckConfig, CheckPipeline, DocumentSource};
use std::io;
use std::path::PathBuf;
use std::process::exit;

/// Exit code for configuration and resource errors
const EXIT_FATAL: i32 = 2;

/// Check the code examples embedded in documentation with an external checker.
///
/// Exits 0 when every checked block passes (or there are none), 1 when any
/// block fails, and 2 on a configuration error.
#[derive(Parser)]
#[command(name = "doccheck", version, about, long_about = None)]
struct Cli {
    /// Documents to check (default: every document under --root)
    paths: Vec<PathBuf>,

    /// Print per-block progress
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: <root>/doccheck.toml, then the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project root to walk for documents
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Checker executable
    #[arg(long)]
    checker: Option<String>,

    /// Fence marker of the target language (repeatable)
    #[arg(short, long = "marker")]
    markers: Vec<String>,

    /// Maximum number of concurrent checker processes
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    /// Load the configuration file and apply command-line overrides.
    fn load_config(&self) -> Result<CheckConfig> {
        let mut config = CheckConfig::discover(self.config.as_deref(), &self.root)?;

        if let Some(checker) = &self.checker {
            config.checker = checker.clone();
        }
        if !self.markers.is_empty() {
            config.fence_markers = self.markers.clone();
        }
        if self.jobs.is_some() {
            config.jobs = self.jobs;
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }

        Ok(config)
    }

    fn source(&self, config: &CheckConfig) -> DocumentSource {
        if self.paths.is_empty() {
            DocumentSource::tree(&self.root, config.document_extensions.clone())
        } else {
            DocumentSource::files(self.paths.clone())
        }
    }
}

pub fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&cli) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit(EXIT_FATAL);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let config = cli.load_config()?;
    let source = cli.source(&config);

    let pipeline = CheckPipeline::new(config)?.verbose(cli.verbose);
    let result = pipeline.run(&source)?;

    result.write_report(&mut io::stdout().lock())?;

    Ok(result.exit_code())
}
