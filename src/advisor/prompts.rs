//! Prompt text for every model call. Wording is free to change; callers only
//! rely on the output formats the prompts ask for.

use std::fmt::Write;

use crate::courses::{ParsedCourse, UserProfile};
use crate::search::SearchResult;

use super::judge::JudgedReview;

/// Longest prefix of `text` with at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn summary(professor: &str, content: &str) -> String {
    format!(
        "You are an assistant summarizing professor reviews for a student.\n\
         \n\
         Based on the following search results from Rate My Professors (or similar sites) \
         about {professor}, give a concise summary of the professor's teaching style, \
         difficulty and overall quality. Extract a numerical rating (0-5) if one is present, \
         otherwise estimate it from the sentiment.\n\
         \n\
         Search Content:\n\
         {content}\n\
         \n\
         Output Format:\n\
         Rating: [0-5]/5\n\
         Summary: [2-3 sentence summary]"
    )
}

pub fn judge(text: &str) -> String {
    format!(
        "You are a data extractor. Extract Rate My Professors statistics from the text below.\n\
         \n\
         Rules:\n\
         1. Look for \"Rating\", \"Quality\", \"Difficulty\", \"Would Take Again\".\n\
         2. Use null for anything missing.\n\
         3. \"would_take_again_percent\" is a number from 0 to 100 or null.\n\
         4. \"rating\" and \"difficulty\" are numbers from 0.0 to 5.0 or null.\n\
         5. \"summary\" is at most two sentences about what students say.\n\
         \n\
         Text to Analyze:\n\
         {text}\n\
         \n\
         Output a single JSON object:\n\
         {{\"rating\": number|null, \"difficulty\": number|null, \
         \"would_take_again_percent\": number|null, \"summary\": string, \
         \"has_data\": boolean, \"review_count\": integer|null}}"
    )
}

const PARSE_RULES: &str = "For each course output an object with:\n\
    - \"code\": the course code (e.g. \"CS-GY 6083\", \"MATH-UA 123\")\n\
    - \"name\": the full course title\n\
    - \"professor\": the first listed instructor, or \"TBD\" when missing or Staff\n\
    - \"time\": meeting time (e.g. \"Mon 2:00PM\"), or \"TBD\"\n\
    Merge multiple sections of the same course. Output only a JSON list of objects, \
    or [] when there are no courses.";

pub fn parse_text(text: &str) -> String {
    format!(
        "The text below was copied from a university course search system and is messy.\n\
         Extract every course in it.\n\
         \n\
         {PARSE_RULES}\n\
         \n\
         Text:\n\
         {text}"
    )
}

pub fn parse_image() -> String {
    format!(
        "This is a screenshot of a course registration system. Extract every visible course.\n\
         \n\
         {PARSE_RULES}"
    )
}

/// Everything the analysis prompt needs besides the profile.
#[derive(Debug)]
pub struct AnalysisContext<'a> {
    pub course: &'a ParsedCourse,
    pub professor: &'a str,
    pub question: &'a str,
    pub requirements: &'a str,
    pub review: &'a JudgedReview,
    pub results: &'a [SearchResult],
}

pub fn analysis(ctx: &AnalysisContext<'_>, profile: &UserProfile) -> String {
    let review = ctx.review;
    let stat = |value: Option<f32>, suffix: &str| {
        value
            .map(|v| format!("{v}{suffix}"))
            .unwrap_or_else(|| "N/A".to_string())
    };

    let mut sources = String::new();
    for r in ctx.results {
        let _ = writeln!(sources, "- Content: {}\n  Source: {}", r.content, r.url);
    }
    if sources.is_empty() {
        sources.push_str("No reviews found.\n");
    }

    let question = if ctx.question.trim().is_empty() {
        "Workload? Grading?"
    } else {
        ctx.question.trim()
    };

    format!(
        "You are an expert academic advisor. Analyze the course using the real data below.\n\
         \n\
         Course: {code} {name}\n\
         Professor: {professor}\n\
         \n\
         --- RATE MY PROFESSORS ---\n\
         Rating: {rating}\n\
         Difficulty: {difficulty}\n\
         Would Take Again: {again}\n\
         Student Summary: {summary}\n\
         --------------------------\n\
         \n\
         [Profile] School: {school}, Major: {major}, Year: {year}, Goal: {goal}, Avoid: {avoid}\n\
         [Requirements] {requirements}\n\
         [Student Question] {question}\n\
         [Reviews & Data]\n\
         {sources}\n\
         Answer in markdown with these sections:\n\
         ### Quick Stats (RMP rating, would take again, difficulty, core or elective, workload, grading)\n\
         ### Verdict: Recommended / Caution / Avoid (explain against the goal \"{goal}\")\n\
         ### Deep Dive (workload and grading, professor style, forum chatter; cite sources inline)\n\
         ### Heads Up (specific, actionable advice)",
        code = ctx.course.code,
        name = ctx.course.name,
        professor = ctx.professor,
        rating = stat(review.rating, "/5"),
        difficulty = stat(review.difficulty, "/5"),
        again = stat(review.would_take_again_percent, "%"),
        summary = review.summary,
        school = profile.school,
        major = profile.major,
        year = profile.year,
        goal = profile.goal,
        avoid = profile.avoid_list(),
        requirements = ctx.requirements,
    )
}

pub fn recommendation(courses: &[ParsedCourse], profile: &UserProfile, requirements: &str) -> String {
    let list = courses
        .iter()
        .map(|c| format!("- {} {} ({}, {})", c.code, c.name, c.professor, c.time))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a strategic course advisor. Recommend a course combination.\n\
         [Profile] School: {school}, Major: {major}, Year: {year}, Goal: {goal}, Avoid: {avoid}\n\
         [Past Courses] {transcript}\n\
         [Requirements] {requirements}\n\
         [Available]\n\
         {list}\n\
         \n\
         Answer in markdown:\n\
         1. **Recommended Combination**: pick 3-4 courses.\n\
         2. **Strategy**: why this combination works for the goal.\n\
         3. **Gap Analysis**: what is still missing for graduation.",
        school = profile.school,
        major = profile.major,
        year = profile.year,
        goal = profile.goal,
        avoid = profile.avoid_list(),
        transcript = if profile.transcript.trim().is_empty() {
            "not provided"
        } else {
            profile.transcript.trim()
        },
    )
}

/// Free-text query used to search the ingested catalog for a profile.
pub fn catalog_query(profile: &UserProfile) -> String {
    let mut query = String::new();
    if !profile.major.trim().is_empty() && !profile.major.eq_ignore_ascii_case("unknown") {
        let _ = write!(query, "{} courses ", profile.major.trim());
    }
    let _ = write!(query, "for a student focused on {}", profile.goal);
    if !profile.avoid.is_empty() {
        let _ = write!(query, ", avoiding {}", profile.avoid.join(", "));
    }
    query
}
