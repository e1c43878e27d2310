use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::extract::extract_json_object;
use super::prompts::{self, truncate_chars};
use crate::gemini::{GeminiError, Prompt, TextGenerator};
use crate::search::SearchResult;

const MAX_JUDGE_CHARS: usize = 50_000;
const SNIPPET_CHARS: usize = 300;
const NO_DATA: &str = "No data found.";

static RATING_OUT_OF_FIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d\.\d)/5").unwrap());
static LOOSE_RATING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([1-5]\.\d)\b").unwrap());

/// Professor statistics normalized out of noisy review text.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgedReview {
    pub rating: Option<f32>,
    pub difficulty: Option<f32>,
    pub would_take_again_percent: Option<f32>,
    pub summary: String,
    pub has_data: bool,
    pub review_count: Option<u32>,
}

impl JudgedReview {
    pub fn empty() -> Self {
        Self {
            rating: None,
            difficulty: None,
            would_take_again_percent: None,
            summary: NO_DATA.to_string(),
            has_data: false,
            review_count: Some(0),
        }
    }

    /// Best-effort read of the judge's JSON. Numbers may arrive as strings
    /// (`"4.1"`, `"4.1/5"`, `"85%"`); `rmp_rating` is accepted for `rating`.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let number = |key: &str| map.get(key).and_then(lenient_number);
        let rating = number("rating").or_else(|| number("rmp_rating"));
        let summary = map
            .get("summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_DATA)
            .to_string();
        let has_data = map
            .get("has_data")
            .and_then(Value::as_bool)
            .unwrap_or(rating.is_some());

        Self {
            rating: rating.map(|r| r.clamp(0.0, 5.0)),
            difficulty: number("difficulty").map(|d| d.clamp(0.0, 5.0)),
            would_take_again_percent: number("would_take_again_percent")
                .or_else(|| number("would_take_again"))
                .map(|p| p.clamp(0.0, 100.0)),
            summary,
            has_data,
            review_count: number("review_count").map(|n| n.max(0.0).round() as u32),
        }
    }
}

fn lenient_number(value: &Value) -> Option<f32> {
    let n = match value {
        Value::Number(n) => n.as_f64()? as f32,
        Value::String(s) => {
            let s = s.trim().trim_end_matches('%');
            let s = s.split('/').next()?.trim();
            s.parse().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Runs the JSON-mode extraction call over review text. Quota exhaustion is
/// returned so callers can stop early; any other failure yields
/// `JudgedReview::empty()`.
pub async fn judge_reviews(
    model: &impl TextGenerator,
    text: &str,
) -> Result<JudgedReview, GeminiError> {
    if text.trim().is_empty() {
        return Ok(JudgedReview::empty());
    }

    let prompt = prompts::judge(truncate_chars(text, MAX_JUDGE_CHARS));
    match model.generate(&Prompt::json(&prompt)).await {
        Ok(output) => match extract_json_object(&output) {
            Some(map) => {
                let judged = JudgedReview::from_map(&map);
                debug!(has_data = judged.has_data, rating = ?judged.rating, "judged reviews");
                Ok(judged)
            }
            None => {
                warn!("judge returned no JSON object");
                Ok(JudgedReview::empty())
            }
        },
        Err(GeminiError::RateLimited) => Err(GeminiError::RateLimited),
        Err(e) => {
            warn!(error = %e, "judge call failed");
            Ok(JudgedReview::empty())
        }
    }
}

/// A rating spotted directly in a Rate My Professors search snippet.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRating {
    pub rating: f32,
    pub snippet: String,
}

/// Heuristic fallback when the judge finds nothing: the first RMP result
/// containing `d.d/5`, or failing that a loose `1.0`-`5.9` number.
pub fn scan_rating(results: &[SearchResult]) -> Option<ScannedRating> {
    results
        .iter()
        .filter(|r| is_rmp_result(r))
        .find_map(|r| {
            let captures = RATING_OUT_OF_FIVE
                .captures(&r.content)
                .or_else(|| LOOSE_RATING.captures(&r.content))?;
            let rating = captures[1].parse().ok()?;
            Some(ScannedRating {
                rating,
                snippet: format!("{}...", truncate_chars(&r.content, SNIPPET_CHARS)),
            })
        })
}

pub(super) fn is_rmp_result(result: &SearchResult) -> bool {
    result.title.contains("Rate My Professors") || result.url.contains("ratemyprofessors.com")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::test_support::MockModel;
    use crate::gemini::GeminiError;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn reads_rmp_rating_alias_and_string_numbers() {
        let judged = JudgedReview::from_map(&map(json!({
            "rmp_rating": "4.1/5",
            "difficulty": 3.2,
            "would_take_again_percent": "85%",
            "summary": "Engaging lectures.",
            "has_data": true,
            "review_count": 40
        })));
        assert_eq!(judged.rating, Some(4.1));
        assert_eq!(judged.difficulty, Some(3.2));
        assert_eq!(judged.would_take_again_percent, Some(85.0));
        assert_eq!(judged.review_count, Some(40));
        assert!(judged.has_data);
    }

    #[test]
    fn nulls_and_missing_fields_stay_none() {
        let judged = JudgedReview::from_map(&map(json!({
            "rating": null,
            "summary": ""
        })));
        assert_eq!(judged.rating, None);
        assert_eq!(judged.summary, "No data found.");
        assert!(!judged.has_data);
    }

    #[tokio::test]
    async fn empty_text_skips_the_call() {
        let model = MockModel::new(vec![]);
        assert_eq!(judge_reviews(&model, "  ").await.unwrap(), JudgedReview::empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn list_response_uses_first_object() {
        let model = MockModel::new(vec![Ok(
            r#"[{"rating": 4.6, "summary": "Loved it.", "has_data": true}]"#.into(),
        )]);
        let judged = judge_reviews(&model, "Rating 4.6 on RMP").await.unwrap();
        assert_eq!(judged.rating, Some(4.6));
        assert_eq!(judged.summary, "Loved it.");
    }

    #[tokio::test]
    async fn garbage_and_errors_become_empty() {
        let model = MockModel::new(vec![
            Ok("I could not find anything".into()),
            Err(GeminiError::EmptyResponse("SAFETY".into())),
        ]);
        assert_eq!(judge_reviews(&model, "text").await.unwrap(), JudgedReview::empty());
        assert_eq!(judge_reviews(&model, "text").await.unwrap(), JudgedReview::empty());
    }

    #[tokio::test]
    async fn quota_exhaustion_is_returned() {
        let model = MockModel::new(vec![Err(GeminiError::RateLimited)]);
        assert!(matches!(
            judge_reviews(&model, "text").await,
            Err(GeminiError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn long_input_is_truncated() {
        let model = MockModel::new(vec![Ok("{}".into())]);
        let text = "x".repeat(MAX_JUDGE_CHARS + 500);
        judge_reviews(&model, &text).await.unwrap();
        let prompt = &model.prompts()[0];
        assert!(prompt.contains(&"x".repeat(MAX_JUDGE_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_JUDGE_CHARS + 1)));
    }

    fn result(url: &str, title: &str, content: &str) -> SearchResult {
        SearchResult {
            url: url.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    #[test]
    fn scan_prefers_out_of_five_pattern() {
        let results = vec![
            result("https://reddit.com/x", "thread", "I'd give it 4.9/5"),
            result(
                "https://www.ratemyprofessors.com/professor/1",
                "Ying Lu",
                "Overall quality 2.0 based on reviews, 4.3/5",
            ),
        ];
        let scanned = scan_rating(&results).unwrap();
        assert_eq!(scanned.rating, 4.3);
        assert!(scanned.snippet.ends_with("..."));
    }

    #[test]
    fn scan_falls_back_to_loose_number() {
        let results = vec![result(
            "https://example.com",
            "Ying Lu at NYU | Rate My Professors",
            "Quality 3.8 Difficulty",
        )];
        assert_eq!(scan_rating(&results).unwrap().rating, 3.8);
    }

    #[test]
    fn scan_ignores_non_rmp_results() {
        let results = vec![result("https://reddit.com/x", "thread", "4.9/5")];
        assert!(scan_rating(&results).is_none());
    }
}
