pub mod analyst;
pub mod extract;
pub mod judge;
pub mod parser;
mod prompts;
pub mod summarizer;

pub use analyst::{AnalysisRequest, analyze_course, recommend_from_catalog, recommend_schedule};
pub use judge::{JudgedReview, judge_reviews, scan_rating};
pub use parser::{clean_professor_name, parse_course_image, parse_course_text};
pub use summarizer::{SummaryOutcome, summarize_reviews};

/// Returned in place of model output once the quota retry budget is spent.
pub const RATE_LIMIT_SENTINEL: &str =
    "API quota exceeded. Please wait a minute and try again.";
