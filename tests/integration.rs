//! Integration tests for doccheck
//!
//! These tests run the whole pipeline (scan, materialize, check, translate,
//! aggregate) against documentation trees built in temporary directories.
//!
//! ## Test Architecture
//!
//! Each test uses `TestFixture` to create an isolated tree that is removed on
//! drop. Checkers are small shell scripts, so the tests need a unix `sh`.
//!
//! ## Adding New Tests
//!
//! 1. Write documents with `fixture.write_doc`
//! 2. Build a config with `fixture.config(script)`
//! 3. Use `#[tokio::test]` and `run_tree`, then assert on the `RunResult`

#![cfg(unix)]

mod common;

use anyhow::Result;
use common::{fe_block, run_tree, TestFixture, BAD_LINE_CHECKER};
use doccheck::{CheckPipeline, DocumentSource, PassCriterion};
use std::fs;
use std::path::PathBuf;

#[tokio::test]
async fn integration_diagnostic_mapped_to_document_line() -> Result<()> {
    let fixture = TestFixture::new()?;

    let mut doc = String::new();
    for i in 1..=9 {
        doc.push_str(&format!("prose line {}\n", i));
    }
    // Opening fence on line 10, `BAD` on artifact line 2
    doc.push_str("```fe\nlet ok = 1\nBAD\n```\n");
    fixture.write_doc("doc.md", &doc)?;

    let result = run_tree(&fixture, fixture.config(BAD_LINE_CHECKER)?).await?;

    assert_eq!((result.total, result.passed, result.failed), (1, 0, 1));
    let rendered: Vec<String> = result.diagnostics.iter().map(|d| d.to_string()).collect();
    assert_eq!(rendered, vec!["doc.md:12:1: unknown identifier"]);
    assert_eq!(result.exit_code(), 1);
    Ok(())
}

#[tokio::test]
async fn integration_failing_block_is_isolated() -> Result<()> {
    let fixture = TestFixture::new()?;

    let mut doc = String::new();
    for i in 0..10 {
        doc.push_str(&format!("Example {}\n", i));
        let content = if i == 6 { "BAD" } else { "let fine = 1" };
        doc.push_str(&fe_block(&[content]));
    }
    fixture.write_doc("examples.md", &doc)?;

    let result = run_tree(&fixture, fixture.config(BAD_LINE_CHECKER)?).await?;

    assert_eq!((result.total, result.passed, result.failed), (10, 9, 1));
    assert_eq!(result.diagnostics.len(), 1);
    // Block 6 opens on line 4 * 6 + 2
    assert_eq!(result.diagnostics[0].line, 27);
    assert_eq!(result.diagnostics[0].document, PathBuf::from("examples.md"));
    Ok(())
}

#[tokio::test]
async fn integration_no_blocks_is_success() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("readme.md", "# Nothing here\n\n```python\nBAD\n```\n")?;

    let result = run_tree(&fixture, fixture.config(BAD_LINE_CHECKER)?).await?;

    assert!(result.is_empty());
    assert!(result.is_success());
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.summary(), "No checked code blocks found (0 total)");
    Ok(())
}

#[tokio::test]
async fn integration_ignored_and_empty_blocks_not_checked() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc(
        "guide/intro.md",
        "```fe,ignore\nBAD\n```\n\n```fe\n```\n\n```fe\nlet x = 1\n```\n",
    )?;

    let result = run_tree(&fixture, fixture.config(BAD_LINE_CHECKER)?).await?;

    assert_eq!((result.total, result.passed, result.failed), (1, 1, 0));
    assert!(result.diagnostics.is_empty());
    Ok(())
}

#[tokio::test]
async fn integration_artifacts_match_block_content() -> Result<()> {
    let fixture = TestFixture::new()?;
    let capture = fixture.subdir("capture")?;
    fixture.write_doc(
        "doc.md",
        "```fe\nfn a() {\n\n}\n```\n\n```fe,ignore\nskipped\n```\n\n```fe\n\nx\n\n```\n",
    )?;

    let script = format!("cat \"$1\" > \"{}/$(basename \"$1\")\"\n", capture.display());
    let result = run_tree(&fixture, fixture.config(&script)?).await?;
    assert_eq!((result.total, result.passed), (2, 2));

    let mut captured: Vec<PathBuf> = fs::read_dir(&capture)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    captured.sort();

    let contents: Vec<String> = captured
        .iter()
        .map(fs::read_to_string)
        .collect::<Result<_, _>>()?;
    assert_eq!(contents, vec!["fn a() {\n\n}\n", "\nx\n\n"]);
    Ok(())
}

#[tokio::test]
async fn integration_crlf_artifact_is_byte_identical() -> Result<()> {
    let fixture = TestFixture::new()?;
    let capture = fixture.subdir("capture")?;
    fixture.write_doc("win.md", "Intro\r\n```fe\r\nfn a() {\r\n}\r\n```\r\n")?;

    let script = format!("cat \"$1\" > \"{}/$(basename \"$1\")\"\n", capture.display());
    let result = run_tree(&fixture, fixture.config(&script)?).await?;
    assert_eq!((result.total, result.passed), (1, 1));

    let captured: Vec<PathBuf> = fs::read_dir(&capture)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    assert_eq!(captured.len(), 1);
    assert_eq!(fs::read(&captured[0])?, b"fn a() {\r\n}\r\n");
    Ok(())
}

#[tokio::test]
async fn integration_runs_are_idempotent() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("a.md", &fe_block(&["BAD", "ok", "BAD"]))?;
    fixture.write_doc("b/c.md", &fe_block(&["ok"]))?;
    fixture.write_doc("b/d.md", &format!("intro\n{}", fe_block(&["BAD"])))?;

    let first = run_tree(&fixture, fixture.config(BAD_LINE_CHECKER)?).await?;
    let second = run_tree(&fixture, fixture.config(BAD_LINE_CHECKER)?).await?;

    assert_eq!(first, second);
    assert_eq!((first.total, first.failed), (3, 2));
    let rendered: Vec<String> = first.diagnostics.iter().map(|d| d.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "a.md:2:1: unknown identifier",
            "a.md:4:1: unknown identifier",
            "b/d.md:3:1: unknown identifier",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn integration_unterminated_block_dropped() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("open.md", "```fe\nok\n```\n\n```fe\nBAD\n")?;

    let result = run_tree(&fixture, fixture.config(BAD_LINE_CHECKER)?).await?;

    assert_eq!((result.total, result.passed, result.failed), (1, 1, 0));
    Ok(())
}

#[tokio::test]
async fn integration_unparsed_output_attributed_to_block() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("doc.md", "text\n```fe\nlet x = 1\n```\n")?;

    let result = run_tree(
        &fixture,
        fixture.config("echo 'internal checker error' >&2\n")?,
    )
    .await?;

    assert_eq!(result.failed, 1);
    let rendered: Vec<String> = result.diagnostics.iter().map(|d| d.to_string()).collect();
    assert_eq!(rendered, vec!["doc.md:2: internal checker error"]);
    Ok(())
}

#[tokio::test]
async fn integration_exit_status_ignored_by_default() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("doc.md", &fe_block(&["let x = 1"]))?;

    let result = run_tree(&fixture, fixture.config("exit 1\n")?).await?;

    assert_eq!((result.total, result.passed), (1, 1));
    Ok(())
}

#[tokio::test]
async fn integration_exit_status_criterion_reports_status() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("doc.md", &fe_block(&["let x = 1"]))?;

    let mut config = fixture.config("exit 1\n")?;
    config.pass_criterion = PassCriterion::ExitStatus;
    let result = run_tree(&fixture, config).await?;

    assert_eq!(result.failed, 1);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].line, 1);
    assert!(result.diagnostics[0].message.contains("exit status: 1"));
    Ok(())
}

#[tokio::test]
async fn integration_timeout_fails_only_that_block() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("a.md", &fe_block(&["hang"]))?;
    fixture.write_doc("b.md", &fe_block(&["fine"]))?;

    let mut config = fixture.config("if grep -q hang \"$1\"; then exec sleep 10; fi\n")?;
    config.timeout_secs = Some(1);
    let result = run_tree(&fixture, config).await?;

    assert_eq!((result.total, result.passed, result.failed), (2, 1, 1));
    assert_eq!(result.diagnostics.len(), 1);
    let diagnostic = &result.diagnostics[0];
    assert_eq!(diagnostic.document, PathBuf::from("a.md"));
    assert_eq!(diagnostic.column, None);
    assert!(diagnostic.message.contains("timed out"));
    Ok(())
}

#[tokio::test]
async fn integration_scratch_area_released() -> Result<()> {
    let fixture = TestFixture::new()?;
    let scratch = fixture.subdir("scratch")?;
    fixture.write_doc("doc.md", &fe_block(&["let x = 1"]))?;

    // Echo the artifact path so the report shows where it lived
    let mut config = fixture.config("echo \"$1\"\n")?;
    config.scratch_dir = Some(scratch.clone());
    let result = run_tree(&fixture, config).await?;

    assert_eq!(result.failed, 1);
    assert!(result.diagnostics[0]
        .message
        .starts_with(&scratch.display().to_string()));
    assert_eq!(fs::read_dir(&scratch)?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn integration_unwritable_scratch_is_fatal() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("doc.md", &fe_block(&["let x = 1"]))?;

    let mut config = fixture.config(BAD_LINE_CHECKER)?;
    config.scratch_dir = Some(fixture.docs().join("missing/scratch"));

    assert!(run_tree(&fixture, config).await.is_err());
    Ok(())
}

#[tokio::test]
async fn integration_missing_checker_is_fatal() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("doc.md", &fe_block(&["let x = 1"]))?;

    let mut config = fixture.config(BAD_LINE_CHECKER)?;
    config.checker = "doccheck-definitely-missing-checker".to_string();

    let err = run_tree(&fixture, config).await.unwrap_err();
    assert!(format!("{:#}", err).contains("not found"));
    Ok(())
}

#[tokio::test]
async fn integration_explicit_file_list() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("a.md", &fe_block(&["BAD"]))?;
    let b = fixture.write_doc("b.md", &fe_block(&["BAD", "BAD"]))?;

    let pipeline = CheckPipeline::new(fixture.config(BAD_LINE_CHECKER)?)?;
    let result = pipeline
        .run_async(&DocumentSource::files(vec![b.clone()]))
        .await?;

    assert_eq!((result.total, result.failed), (1, 1));
    assert_eq!(result.diagnostics.len(), 2);
    assert!(result.diagnostics.iter().all(|d| d.document == b));
    Ok(())
}

#[test]
fn integration_blocking_run() -> Result<()> {
    let fixture = TestFixture::new()?;
    fixture.write_doc("doc.md", &fe_block(&["let x = 1"]))?;

    let pipeline = CheckPipeline::new(fixture.config(BAD_LINE_CHECKER)?)?.verbose(true);
    let result = pipeline.run(&fixture.tree())?;

    let mut report = Vec::new();
    result.write_report(&mut report)?;
    assert_eq!(
        String::from_utf8(report)?,
        "Checked 1 code block(s): 1 passed, 0 failed\n"
    );
    Ok(())
}
