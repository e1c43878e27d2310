use serde_json::{Value, json};

use super::model::Course;

pub type Metadata = serde_json::Map<String, Value>;

const NOT_AVAILABLE: &str = "N/A";

/// A course rendered for embedding: searchable text, filterable metadata, key.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

pub fn to_document(course: &Course) -> CourseDocument {
    CourseDocument {
        id: course.course_id.clone(),
        text: document_text(course),
        metadata: metadata(course),
    }
}

/// Parallel `(documents, metadatas, ids)` lists, in input order.
pub fn to_documents(courses: &[Course]) -> (Vec<String>, Vec<Metadata>, Vec<String>) {
    let mut documents = Vec::with_capacity(courses.len());
    let mut metadatas = Vec::with_capacity(courses.len());
    let mut ids = Vec::with_capacity(courses.len());
    for course in courses {
        let doc = to_document(course);
        documents.push(doc.text);
        metadatas.push(doc.metadata);
        ids.push(doc.id);
    }
    (documents, metadatas, ids)
}

/// A zero rating means "not rated", same as a missing one.
fn known_rating(course: &Course) -> Option<f32> {
    course.rmp_rating.filter(|r| *r > 0.0)
}

fn known_summary(course: &Course) -> Option<&str> {
    course
        .rmp_summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn document_text(course: &Course) -> String {
    let rating = known_rating(course)
        .map(|r| r.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let summary = known_summary(course).unwrap_or(NOT_AVAILABLE);

    let optional = |label: &str, value: &Option<String>| {
        value
            .as_deref()
            .map(|v| format!("{label}: {}", v.trim()))
    };

    let lines = [
        Some(format!("Course Code: {}", course.course_id)),
        Some(format!("Course Name: {}", course.name)),
        Some(format!("Instructor: {}", course.instructor)),
        Some(format!("School: {}", course.school)),
        Some(format!("Term: {}", course.term)),
        optional("Description", &course.description),
        optional("Schedule", &course.schedule),
        optional("Instruction Mode", &course.instruction_mode),
        Some(format!("Professor Rating: {rating}")),
        Some(format!("Professor Summary: {summary}")),
    ];

    lines
        .into_iter()
        .flatten()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn metadata(course: &Course) -> Metadata {
    let mut map = Metadata::new();
    map.insert("course_id".into(), json!(course.course_id));
    map.insert("name".into(), json!(course.name));
    map.insert("instructor".into(), json!(course.instructor));
    map.insert("school".into(), json!(course.school));
    map.insert("units".into(), json!(course.units));
    map.insert("rating".into(), json!(known_rating(course).unwrap_or(0.0)));
    map.insert(
        "rmp_summary".into(),
        json!(known_summary(course).unwrap_or(NOT_AVAILABLE)),
    );
    map
}
