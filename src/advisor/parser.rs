use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{info, warn};

use super::extract::extract_records;
use super::prompts::{self, truncate_chars};
use crate::courses::ParsedCourse;
use crate::gemini::{InlineImage, Prompt, TextGenerator};

const MIN_INPUT_CHARS: usize = 10;
const MAX_INPUT_CHARS: usize = 100_000;

/// Courses found in text pasted from a registration system. Short input and
/// model failures both yield an empty list.
pub async fn parse_course_text(model: &impl TextGenerator, raw: &str) -> Vec<ParsedCourse> {
    if raw.chars().filter(|c| !c.is_whitespace()).count() < MIN_INPUT_CHARS {
        return Vec::new();
    }

    let prompt = prompts::parse_text(truncate_chars(raw, MAX_INPUT_CHARS));
    run(model, &Prompt::text(&prompt)).await
}

/// Courses visible in a registration screenshot.
pub async fn parse_course_image(
    model: &impl TextGenerator,
    bytes: &[u8],
    mime_type: &str,
) -> Vec<ParsedCourse> {
    if bytes.is_empty() {
        return Vec::new();
    }

    let data = STANDARD.encode(bytes);
    let prompt = prompts::parse_image();
    let image = InlineImage {
        mime_type,
        data: &data,
    };
    run(model, &Prompt::with_image(&prompt, image)).await
}

async fn run(model: &impl TextGenerator, prompt: &Prompt<'_>) -> Vec<ParsedCourse> {
    match model.generate(prompt).await {
        Ok(output) => {
            let courses: Vec<ParsedCourse> = extract_records(&output)
                .into_iter()
                .filter(|c: &ParsedCourse| !c.code.trim().is_empty())
                .map(|mut c| {
                    c.professor = clean_professor_name(&c.professor);
                    c
                })
                .collect();
            info!(count = courses.len(), "parsed courses");
            courses
        }
        Err(e) => {
            warn!(error = %e, "course parsing failed");
            Vec::new()
        }
    }
}

/// `"Last, First"` becomes `"First Last"`; anything else is returned trimmed.
pub fn clean_professor_name(name: &str) -> String {
    let mut parts = name.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(last), Some(first), None) if !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => name.trim().to_string(),
    }
}
