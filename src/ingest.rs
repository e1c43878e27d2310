use tracing::{info, warn};

use crate::advisor::{SummaryOutcome, summarize_reviews};
use crate::courses::{CourseSource, LoadError, to_documents};
use crate::gemini::TextGenerator;
use crate::search::{ReviewSearcher, SearchClient};
use crate::store::{Embedder, StoreError, VectorStore};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub loaded: usize,
    pub enriched: usize,
    pub stored: usize,
}

/// Load, enrich with professor reviews, format and upsert.
///
/// Enrichment needs both a searcher and a model; without either the courses
/// are stored as loaded. Courses taught by `Staff`/`TBD` are never enriched,
/// and a summary that hit the quota or failed is not stored as a review.
pub async fn run<S, G, E>(
    source: &impl CourseSource,
    searcher: Option<&ReviewSearcher<S>>,
    model: Option<&G>,
    store: &mut VectorStore<E>,
) -> Result<IngestReport, IngestError>
where
    S: SearchClient,
    G: TextGenerator,
    E: Embedder,
{
    let mut courses = source.load()?;
    let mut report = IngestReport {
        loaded: courses.len(),
        ..IngestReport::default()
    };
    info!(count = report.loaded, "loaded courses");

    match (searcher, model) {
        (Some(searcher), Some(model)) => {
            for course in courses.iter_mut().filter(|c| c.has_known_instructor()) {
                info!(course = %course.course_id, instructor = %course.instructor, "enriching");
                let content = searcher
                    .professor_reviews(&course.instructor, &course.school)
                    .await;
                let review = summarize_reviews(model, &course.instructor, &content).await;
                match review.outcome {
                    SummaryOutcome::Summarized => {
                        report.enriched += 1;
                        course.apply_review(review.rating, review.summary, None);
                    }
                    SummaryOutcome::NoReviews => {
                        course.apply_review(review.rating, review.summary, None);
                    }
                    SummaryOutcome::RateLimited | SummaryOutcome::Failed => {
                        warn!(course = %course.course_id, outcome = ?review.outcome, "leaving course unenriched");
                    }
                }
            }
        }
        _ => warn!("review enrichment disabled: search or model client unavailable"),
    }

    let (documents, metadatas, ids) = to_documents(&courses);
    report.stored = store.upsert(documents, metadatas, ids).await?;
    info!(
        loaded = report.loaded,
        enriched = report.enriched,
        stored = report.stored,
        "ingestion finished"
    );
    Ok(report)
}
