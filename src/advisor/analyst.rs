use tracing::{info, warn};

use super::RATE_LIMIT_SENTINEL;
use super::judge::{self, JudgedReview, judge_reviews, scan_rating};
use super::parser::clean_professor_name;
use super::prompts::{self, AnalysisContext};
use crate::courses::{ParsedCourse, UserProfile, is_known_instructor};
use crate::gemini::{GeminiError, Prompt, TextGenerator};
use crate::search::{ReviewSearcher, SearchClient};
use crate::store::{Embedder, QueryHit, StoreError, VectorStore};

/// One course the student asked about, with their context.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub course: &'a ParsedCourse,
    pub question: &'a str,
    pub profile: &'a UserProfile,
    pub requirements: &'a str,
}

/// Markdown analysis of one course: searches reviews, judges the RMP
/// material and asks the model for a verdict against the student's goal.
pub async fn analyze_course<S: SearchClient>(
    model: &impl TextGenerator,
    searcher: &ReviewSearcher<S>,
    request: &AnalysisRequest<'_>,
) -> String {
    let course = request.course;
    let professor = clean_professor_name(&course.professor);
    let known = is_known_instructor(&professor);
    let school = if request.profile.has_school() {
        request.profile.school.as_str()
    } else {
        ""
    };
    info!(course = %course.code, %professor, "analyzing course");

    let results = searcher
        .gather_for_analysis(&course.code, known.then_some(professor.as_str()), school)
        .await;

    let rmp_text = results
        .iter()
        .filter(|r| judge::is_rmp_result(r))
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let mut review = match judge_reviews(model, &rmp_text).await {
        Ok(review) => review,
        Err(e) => {
            warn!(course = %course.code, error = %e, "judge hit the quota, skipping analysis");
            return RATE_LIMIT_SENTINEL.to_string();
        }
    };
    if !review.has_data
        && let Some(scanned) = scan_rating(&results)
    {
        review = JudgedReview {
            rating: Some(scanned.rating),
            summary: scanned.snippet,
            has_data: true,
            ..review
        };
    }

    let ctx = AnalysisContext {
        course,
        professor: &professor,
        question: request.question,
        requirements: request.requirements,
        review: &review,
        results: &results,
    };
    let prompt = prompts::analysis(&ctx, request.profile);

    match model.generate(&Prompt::text(&prompt)).await {
        Ok(markdown) => markdown,
        Err(GeminiError::RateLimited) => RATE_LIMIT_SENTINEL.to_string(),
        Err(e) => {
            warn!(course = %course.code, error = %e, "course analysis failed");
            format!("Analysis Error: {e}")
        }
    }
}

/// A suggested combination drawn from the whole parsed list.
pub async fn recommend_schedule(
    model: &impl TextGenerator,
    courses: &[ParsedCourse],
    profile: &UserProfile,
    requirements: &str,
) -> String {
    if courses.is_empty() {
        return "No courses to recommend from. Parse a course list first.".to_string();
    }

    let prompt = prompts::recommendation(courses, profile, requirements);
    match model.generate(&Prompt::text(&prompt)).await {
        Ok(markdown) => markdown,
        Err(GeminiError::RateLimited) => RATE_LIMIT_SENTINEL.to_string(),
        Err(e) => {
            warn!(error = %e, "schedule recommendation failed");
            format!("Recommendation Error: {e}")
        }
    }
}

/// Ingested courses closest to the student's major and goal.
pub async fn recommend_from_catalog<E: Embedder>(
    store: &VectorStore<E>,
    profile: &UserProfile,
    k: usize,
) -> Result<Vec<QueryHit>, StoreError> {
    let query = prompts::catalog_query(profile);
    let hits = store.query(&query, k).await?;
    info!(%query, hits = hits.len(), "catalog search");
    Ok(hits)
}
