//! Tolerant parsing of model output into [`AnalysisResult`].
//!
//! Model output is never trusted: it may be wrapped in markdown code fences,
//! surrounded by prose, or not JSON at all. Parsing runs in two stages
//! (strip fences, then carve the outermost JSON object) and degrades to a
//! flagged fallback instead of erroring, so one chatty completion cannot
//! fail a whole sync job.

use fanpulse_core::{defaults, AnalysisResult};
use tracing::debug;

/// Parse raw model output into an [`AnalysisResult`].
///
/// On failure the result carries the truncated raw text as its summary and
/// `parse_error = true`. A parsed prediction confidence is clamped into
/// `[0, 1]`.
pub fn parse_analysis(raw: &str) -> AnalysisResult {
    let candidate = extract_json(raw);

    match candidate.and_then(|json| serde_json::from_str::<AnalysisResult>(json).ok()) {
        Some(mut result) => {
            if let Some(prediction) = result.prediction.as_mut() {
                prediction.confidence = prediction.confidence.clamp(0.0, 1.0);
            }
            result.parse_error = false;
            result
        }
        None => {
            debug!(
                subsystem = "inference",
                component = "parse",
                raw_len = raw.len(),
                "Model output did not parse as analysis JSON, falling back"
            );
            fallback(raw)
        }
    }
}

/// Stage 1: strip markdown code fences. Stage 2: carve from the first `{`
/// to the last `}`.
fn extract_json(raw: &str) -> Option<&str> {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop an optional language tag on the fence line.
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn fallback(raw: &str) -> AnalysisResult {
    let summary: String = raw
        .trim()
        .chars()
        .take(defaults::FALLBACK_SUMMARY_LEN)
        .collect();
    AnalysisResult {
        summary,
        insights: Vec::new(),
        tactical_analysis: None,
        prediction: None,
        parse_error: true,
    }
}
