//! Web search for professor and course reviews.

pub mod reviews;
pub mod tavily;

pub use reviews::ReviewSearcher;
pub use tavily::{SearchClient, SearchError, SearchResult, TavilyClient};
