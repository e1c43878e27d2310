use std::collections::HashSet;

use tracing::{debug, warn};
use url::Url;

use super::tavily::{SearchClient, SearchResult};

const PROFESSOR_RESULTS: u8 = 1;
const COURSE_RESULTS: u8 = 2;
const REQUIREMENT_RESULTS: u8 = 3;
const ANALYSIS_RMP_RESULTS: u8 = 2;
const ANALYSIS_REVIEW_RESULTS: u8 = 4;

/// Fixed query templates for professor and course reviews.
///
/// Every method swallows search failures: the caller gets an empty value and
/// the error is logged.
#[derive(Debug, Clone)]
pub struct ReviewSearcher<S> {
    client: S,
}

impl<S: SearchClient> ReviewSearcher<S> {
    pub fn new(client: S) -> Self {
        Self { client }
    }

    /// Content of the top Rate My Professors hit for a professor.
    pub async fn professor_reviews(&self, professor: &str, school: &str) -> String {
        let query = join_terms(&[professor, school, "Rate My Professors"]);
        self.run(&query, PROFESSOR_RESULTS)
            .await
            .into_iter()
            .next()
            .map(|r| r.content)
            .unwrap_or_default()
    }

    /// Forum discussion of a course's workload, top hits joined by blank lines.
    pub async fn course_reviews(&self, course_code: &str, school: &str) -> String {
        let query = join_terms(&[course_code, school, "reddit workload review"]);
        self.run(&query, COURSE_RESULTS)
            .await
            .into_iter()
            .map(|r| r.content)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Degree requirement snippets, one `- content (Source: url)` line each.
    pub async fn degree_requirements(&self, school: &str, major: &str) -> String {
        let query = join_terms(&[school, major, "degree requirements core courses electives"]);
        self.run(&query, REQUIREMENT_RESULTS)
            .await
            .iter()
            .map(|r| format!("- {} (Source: {})", r.content, r.url))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// RMP hits for the professor (when known) plus general review hits for
    /// the course, deduplicated by URL.
    pub async fn gather_for_analysis(
        &self,
        course_code: &str,
        professor: Option<&str>,
        school: &str,
    ) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if let Some(professor) = professor {
            let rmp_query = join_terms(&[professor, school, "Rate My Professors"]);
            results.extend(self.run(&rmp_query, ANALYSIS_RMP_RESULTS).await);
        }

        let review_query = match professor {
            Some(professor) => join_terms(&[
                course_code,
                professor,
                school,
                "rating review difficulty workload reddit 1point3acres",
            ]),
            None => join_terms(&[
                course_code,
                school,
                "difficulty workload review reddit 1point3acres",
            ]),
        };
        results.extend(self.run(&review_query, ANALYSIS_REVIEW_RESULTS).await);

        let unique = dedup_by_url(results);
        debug!(course = course_code, results = unique.len(), "gathered review results");
        unique
    }

    async fn run(&self, query: &str, max_results: u8) -> Vec<SearchResult> {
        match self.client.search(query, max_results).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, query, "review search failed");
                Vec::new()
            }
        }
    }
}

fn join_terms(terms: &[&str]) -> String {
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps the first result per URL. Fragments and trailing slashes are ignored;
/// results without a URL are kept.
pub fn dedup_by_url(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| r.url.trim().is_empty() || seen.insert(url_key(&r.url)))
        .collect()
}

fn url_key(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut key = url.to_string();
            if key.ends_with('/') {
                key.pop();
            }
            key
        }
        Err(_) => raw.trim().trim_end_matches('/').to_string(),
    }
}
