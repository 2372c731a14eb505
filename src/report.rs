// src/report.rs
//! Downstream of the batch: per-dealership summaries, the combined analysis,
//! and the report document.
//!
//! Text generation and document rendering are external services; they are
//! reached only through `TextGenerator` and `DocumentRenderer`. This module
//! shapes what goes in and cleans up what comes back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReportError;
use crate::record::{DealershipBatchItem, Month};

/// Prompt + document in, free text out.
pub trait TextGenerator {
    fn generate(&self, instructions: &str, document: &str) -> Result<String, ReportError>;
}

/// Markdown in, paginated file out.
pub trait DocumentRenderer {
    fn render(&self, markdown: &str, output: &Path) -> Result<PathBuf, ReportError>;
}

/// A dealership after its reviews were condensed into a summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealerSummary {
    pub title: String,
    pub review_count: u64,
    pub review_rating: f64,
    pub reviews_per_rating: BTreeMap<String, u64>,
    pub review_summary: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub client: String,
    pub location: String,
    pub description: String,
    pub report_title: String,
    pub report_date: String,
    pub analysis_of_reviews: Value,
    pub dealerships_with_reviews: Vec<DealerSummary>,
}

/// Generated text split into reasoning and answer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reasoned {
    pub thoughts: String,
    pub content: String,
}

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Pull `<think>…</think>` out of model output. `thoughts` holds the first
/// block; every block is removed from `content`.
pub fn split_reasoning(output: &str) -> Reasoned {
    let mut thoughts: Option<String> = None;
    let mut content = s!();
    let mut rest = output;

    while let Some(open) = rest.find(THINK_OPEN) {
        let after_open = &rest[open + THINK_OPEN.len()..];
        let Some(close) = after_open.find(THINK_CLOSE) else { break };
        content.push_str(&rest[..open]);
        if thoughts.is_none() {
            thoughts = Some(after_open[..close].trim().to_string());
        }
        rest = &after_open[close + THINK_CLOSE.len()..];
    }
    content.push_str(rest);

    Reasoned { thoughts: thoughts.unwrap_or_default(), content: content.trim().to_string() }
}

/// Outermost `{ … }` span of `text`: first `{` to last `}`.
pub fn extract_json_object(text: &str) -> Result<&str, ReportError> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&text[s..=e]),
        _ => Err(ReportError::NoJson(text.chars().take(120).collect())),
    }
}

/// One generator call per dealership; reviews are replaced by the summary.
pub fn summarize_dealerships(
    batch: &[DealershipBatchItem],
    generator: &dyn TextGenerator,
    instructions: &str,
) -> Result<Vec<DealerSummary>, ReportError> {
    let mut out = Vec::with_capacity(batch.len());
    for (i, item) in batch.iter().enumerate() {
        let document = serde_json::to_string(&item.reviews_extended)?;
        let text = generator.generate(instructions, &document)?;
        let summary = split_reasoning(&text).content;
        logf!("Report: Summarized {}/{} '{}'", i + 1, batch.len(), item.title);

        out.push(DealerSummary {
            title: item.title.clone(),
            review_count: item.review_count,
            review_rating: item.review_rating,
            reviews_per_rating: item.reviews_per_rating.clone(),
            review_summary: summary,
        });
    }
    Ok(out)
}

/// Cross-dealership analysis. The generator must answer with a JSON object,
/// possibly wrapped in reasoning or prose.
pub fn analyze_summaries(
    summaries: &[DealerSummary],
    generator: &dyn TextGenerator,
    instructions: &str,
) -> Result<Value, ReportError> {
    let document = serde_json::to_string(summaries)?;
    let text = generator.generate(instructions, &document)?;
    let answer = split_reasoning(&text).content;
    let json = extract_json_object(&answer)?;
    Ok(serde_json::from_str(json)?)
}

pub fn convert_to_report_data(
    client: &str,
    location: &str,
    description: &str,
    report_title: &str,
    dealers: Vec<DealerSummary>,
    analysis: Value,
    date: NaiveDate,
) -> ReportData {
    ReportData {
        client: s!(client),
        location: s!(location),
        description: s!(description),
        report_title: s!(report_title),
        report_date: date.format("%Y-%m-%d").to_string(),
        analysis_of_reviews: analysis,
        dealerships_with_reviews: dealers,
    }
}

/// Monthly report for `client`, titled after the month.
pub fn monthly_report_data(
    client: &str,
    location: &str,
    month: Month,
    dealers: Vec<DealerSummary>,
    analysis: Value,
    date: NaiveDate,
) -> ReportData {
    let description = format!("Customer reviews analysis report for the month of {}", month.name());
    let title = format!("{client} Dealerships Review {} Report", month.name());
    convert_to_report_data(client, location, &description, &title, dealers, analysis, date)
}

pub fn report_file_name(date: NaiveDate) -> String {
    format!("report-{}.pdf", date.format("%Y-%m-%d"))
}

/// Ask the generator for the markdown report and hand it to the renderer.
pub fn write_report(
    data: &ReportData,
    generator: &dyn TextGenerator,
    renderer: &dyn DocumentRenderer,
    instructions: &str,
    out_dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf, ReportError> {
    let document = serde_json::to_string(data)?;
    let markdown = split_reasoning(&generator.generate(instructions, &document)?).content;
    let path = renderer.render(&markdown, &out_dir.join(report_file_name(date)))?;
    logf!("Report: Wrote {}", path.display());
    Ok(path)
}
