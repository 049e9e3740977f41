//! CLI command implementations.
//!
//! Each `run_*` function drives one or more pipelines of a [`Studio`] and
//! prints the result to stdout. Progress and logs go to stderr.

use std::path::Path;

use anyhow::{Context, Result};

use studyflow_core::error::PipelineError;
use studyflow_core::models::{
    ArtifactKind, ArtifactOptions, ArtifactOutcome, JobStatus, SourceDocument, SummaryId,
    SummaryRecord,
};
use studyflow_core::selection::SummaryListing;

use crate::pipeline::Submission;
use crate::studio::{Studio, Surface};

const PREVIEW_CHARS: usize = 60;

/// Read a document from disk.
pub fn read_document(path: &Path) -> Result<SourceDocument> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceDocument::new(name, bytes))
}

/// `studyflow upload <file>`
pub async fn run_upload(studio: &Studio, path: &Path) -> Result<()> {
    let document = read_document(path)?;
    let pipeline = studio.pipeline(Surface::Summary);
    let submission = pipeline.submit_document(document).await?;
    print_submission(&submission);
    Ok(())
}

/// `studyflow summaries`
pub async fn run_summaries(studio: &Studio) -> Result<()> {
    let listing = studio.pipeline(Surface::Summary).refresh_summaries().await?;
    print_listing(&listing);
    Ok(())
}

/// `studyflow generate <kind>`
pub async fn run_generate(
    studio: &Studio,
    base_url: &str,
    kind: ArtifactKind,
    summary: Option<SummaryId>,
    options: ArtifactOptions,
) -> Result<()> {
    let pipeline = studio.pipeline(Surface::for_kind(kind));
    match summary {
        Some(id) => pipeline.select_summary(id),
        None => {
            let listing = pipeline.refresh_summaries().await?;
            if let Some(hint) = listing.empty_hint() {
                eprintln!("{}", hint);
            }
        }
    }
    let outcome = pipeline.generate(kind, options).await?;
    print_outcome(&outcome, base_url);
    Ok(())
}

/// `studyflow run <file> <kind>`: upload, summarize, and generate in one go.
pub async fn run_all(
    studio: &Studio,
    base_url: &str,
    path: &Path,
    kind: ArtifactKind,
    options: ArtifactOptions,
) -> Result<()> {
    let document = read_document(path)?;
    let pipeline = studio.pipeline(Surface::for_kind(kind));
    let submission = pipeline.submit_document(document).await?;
    print_submission(&submission);
    println!();
    let outcome = pipeline.generate(kind, options).await?;
    print_outcome(&outcome, base_url);
    Ok(())
}

/// `studyflow status <summary-id>`: a single job-status probe.
pub async fn run_status(studio: &Studio, base_url: &str, summary: SummaryId) -> Result<()> {
    let report = studio
        .backend()
        .job_status(summary)
        .await
        .map_err(PipelineError::from)?;
    println!("summary:  {}", summary);
    println!("status:   {}", report.status);
    if let Some(url) = report.result_url.as_deref() {
        println!("result:   {}", resolve_url(base_url, url));
    }
    if report.status == JobStatus::Error {
        println!(
            "detail:   {}",
            report.error_detail.as_deref().unwrap_or("(none)")
        );
    }
    Ok(())
}

// ============ Output ============

fn print_submission(submission: &Submission) {
    let receipt = &submission.receipt;
    println!("uploaded: {}", receipt.document_id);
    if let Some(message) = receipt.message.as_deref() {
        println!("message:  {}", message);
    }
    match (receipt.points_earned, receipt.total_points) {
        (Some(earned), Some(total)) => println!("points:   +{} (total {})", earned, total),
        (Some(earned), None) => println!("points:   +{}", earned),
        _ => {}
    }
    println!("summary:  {}", submission.summary.id);
    println!("--- Summary ---");
    println!("{}", submission.summary.text);
}

fn print_listing(listing: &SummaryListing) {
    if let Some(hint) = listing.empty_hint() {
        println!("{}", hint);
        return;
    }
    println!("  {:<8} {:<17} TEXT", "ID", "GENERATED");
    for record in &listing.records {
        let marker = if listing.is_selected(record) { "*" } else { " " };
        println!(
            "{} {:<8} {:<17} {}",
            marker,
            record.id.to_string(),
            record.generated_at.format("%Y-%m-%d %H:%M").to_string(),
            preview(record)
        );
    }
}

fn preview(record: &SummaryRecord) -> String {
    let line = record.text.lines().next().unwrap_or("").trim();
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}

fn print_outcome(outcome: &ArtifactOutcome, base_url: &str) {
    match outcome {
        ArtifactOutcome::Quiz { questions } => {
            for (i, q) in questions.iter().enumerate() {
                println!("{}. {}", i + 1, q.question);
                for (j, option) in q.options.iter().enumerate() {
                    let marker = if j == q.correct { "*" } else { " " };
                    println!("   {} {}) {}", marker, option_label(j), option);
                }
            }
        }
        ArtifactOutcome::Flashcards { cards } => {
            for (i, card) in cards.iter().enumerate() {
                println!("[{}] Q: {}", i + 1, card.question);
                println!("    A: {}", card.answer);
            }
        }
        ArtifactOutcome::Video { url } => {
            println!("video: {}", resolve_url(base_url, url));
        }
    }
}

fn option_label(index: usize) -> char {
    (b'a' + (index % 26) as u8) as char
}

/// Make a backend-relative result url absolute.
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), url)
    } else {
        url.to_string()
    }
}
