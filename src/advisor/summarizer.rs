use tracing::{info, warn};

use super::{RATE_LIMIT_SENTINEL, prompts};
use crate::gemini::{GeminiError, Prompt, TextGenerator};

pub const NO_REVIEWS: &str = "No reviews found.";
pub const SUMMARY_UNAVAILABLE: &str = "Review summary unavailable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    Summarized,
    NoReviews,
    RateLimited,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummary {
    /// 0.0 when unknown.
    pub rating: f32,
    pub summary: String,
    pub outcome: SummaryOutcome,
}

impl ReviewSummary {
    fn fallback(summary: &str, outcome: SummaryOutcome) -> Self {
        Self {
            rating: 0.0,
            summary: summary.to_string(),
            outcome,
        }
    }
}

/// Condenses review search content about one professor into a rating and a
/// short summary. Never fails: quota exhaustion yields the rate-limit
/// sentinel, other errors a fixed placeholder.
pub async fn summarize_reviews(
    model: &impl TextGenerator,
    professor: &str,
    content: &str,
) -> ReviewSummary {
    if content.trim().is_empty() {
        return ReviewSummary::fallback(NO_REVIEWS, SummaryOutcome::NoReviews);
    }

    let prompt = prompts::summary(professor, content);
    match model.generate(&Prompt::text(&prompt)).await {
        Ok(text) => {
            let (rating, summary) = parse_summary(&text);
            info!(professor, rating, "summarized reviews");
            ReviewSummary {
                rating,
                summary,
                outcome: SummaryOutcome::Summarized,
            }
        }
        Err(GeminiError::RateLimited) => {
            warn!(professor, "quota exhausted while summarizing reviews");
            ReviewSummary::fallback(RATE_LIMIT_SENTINEL, SummaryOutcome::RateLimited)
        }
        Err(e) => {
            warn!(professor, error = %e, "review summary failed");
            ReviewSummary::fallback(SUMMARY_UNAVAILABLE, SummaryOutcome::Failed)
        }
    }
}

/// Reads `Rating: x/5` and `Summary: ...` lines. Without a summary line the
/// whole trimmed text is the summary; an unreadable rating is 0.0.
pub fn parse_summary(text: &str) -> (f32, String) {
    let text = text.trim();
    let mut rating = 0.0;
    let mut summary = None;

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['*', '-', ' ']);
        if let Some(rest) = line.strip_prefix("Rating:") {
            if let Some(value) = parse_rating(rest) {
                rating = value;
            }
        } else if let Some(rest) = line.strip_prefix("Summary:") {
            summary = Some(rest.trim_start_matches('*').trim().to_string());
        }
    }

    let summary = summary
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| text.to_string());
    (rating, summary)
}

fn parse_rating(raw: &str) -> Option<f32> {
    let number = raw.trim().trim_start_matches('*').split('/').next()?.trim();
    let value: f32 = number.parse().ok()?;
    value.is_finite().then(|| value.clamp(0.0, 5.0))
}
