//! doccheck library
//!
//! Verifies the code examples embedded in documentation. Fenced blocks tagged
//! with the target language are extracted, each is checked by an external
//! checker program, and the checker's diagnostics are mapped back to lines in
//! the original documents.
//!
//! The primary interface is the `doccheck` binary, but the library can be used
//! programmatically for testing or custom integrations.
//!
//! ## Public API
//!
//! The main entry point is [`CheckPipeline`], which runs the whole pipeline over
//! a [`DocumentSource`] and returns a [`RunResult`].
//!
//! The stages are also exposed on their own:
//! - [`BlockScanner`] - finds checked and ignored blocks in a [`Document`]
//! - [`Materializer`] - writes blocks to artifacts and keeps the mapping [`Ledger`]
//! - [`Checker`] - runs the external checker on artifacts
//! - [`parse_diagnostic_line`] and [`translate`] - map checker output to document lines
//! - [`Aggregator`] - tallies outcomes into a [`RunResult`]

mod checker;
mod config;
mod diagnostic;
mod language;
mod materializer;
mod pipeline;
mod reporting;
mod scanner;

pub use checker::{resolve_program, CheckOutcome, Checker};
pub use config::{CheckConfig, PassCriterion, CONFIG_FILE_NAME};
pub use diagnostic::{parse_diagnostic_line, translate, translate_line, Diagnostic, RawDiagnostic};
pub use language::artifact_extension;
pub use materializer::{
    Artifact, ArtifactId, Ledger, MappingEntry, Materializer, MAX_BLOCKS_PER_DOCUMENT,
    MAX_CODE_BLOCK_SIZE,
};
pub use pipeline::CheckPipeline;
pub use reporting::{Aggregator, RunResult};
pub use scanner::{BlockMode, BlockScanner, CodeBlock, Document, DocumentSource, Scan};
