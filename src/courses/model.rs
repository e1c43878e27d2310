use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

const UNKNOWN_PROFESSOR: &str = "TBD";

/// One course offering from the catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Unique identifier, e.g. `CS-GY 6003`. Also the vector store key.
    pub course_id: String,
    pub name: String,
    pub instructor: String,
    pub school: String,
    pub term: String,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub instruction_mode: Option<String>,

    /// Average Rate My Professors rating, 0-5.
    #[serde(default)]
    pub rmp_rating: Option<f32>,
    #[serde(default)]
    pub rmp_num_ratings: Option<u32>,
    #[serde(default)]
    pub rmp_summary: Option<String>,
}

impl Course {
    pub fn has_known_instructor(&self) -> bool {
        is_known_instructor(&self.instructor)
    }

    pub fn apply_review(&mut self, rating: f32, summary: String, review_count: Option<u32>) {
        self.rmp_rating = Some(rating);
        self.rmp_summary = Some(summary);
        self.rmp_num_ratings = review_count;
    }
}

/// `false` for blank, `Staff` and `TBD` placeholders.
pub fn is_known_instructor(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty()
        && !name.eq_ignore_ascii_case("staff")
        && !name.eq_ignore_ascii_case(UNKNOWN_PROFESSOR)
}

/// A course pulled out of pasted registration text or a screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCourse {
    #[serde(alias = "course_id")]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "instructor", default = "unknown", deserialize_with = "or_unknown")]
    pub professor: String,
    #[serde(alias = "schedule", default = "unknown", deserialize_with = "or_unknown")]
    pub time: String,
}

impl ParsedCourse {
    pub fn label(&self) -> String {
        format!("{} | {}", self.code, self.professor)
    }

    pub fn has_known_professor(&self) -> bool {
        is_known_instructor(&self.professor)
    }
}

fn unknown() -> String {
    UNKNOWN_PROFESSOR.to_string()
}

/// Null, blank and `Staff` all collapse to `TBD`.
fn or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| is_known_instructor(v))
        .unwrap_or_else(unknown))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    #[default]
    JobSeeking,
    Research,
    EasyA,
    HardcoreTech,
}

impl Goal {
    pub const ALL: [Goal; 4] = [
        Goal::JobSeeking,
        Goal::Research,
        Goal::EasyA,
        Goal::HardcoreTech,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Goal::JobSeeking => "job_seeking",
            Goal::Research => "research",
            Goal::EasyA => "easy_a",
            Goal::HardcoreTech => "hardcore_tech",
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Goal::JobSeeking => "Job Seeking",
            Goal::Research => "PhD/Research",
            Goal::EasyA => "Easy A",
            Goal::HardcoreTech => "Hardcore Tech",
        })
    }
}

/// What the student told us about themselves. Lives in the UI session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub school: String,
    pub major: String,
    pub year: String,
    pub transcript: String,
    pub goal: Goal,
    pub avoid: Vec<String>,
}

impl UserProfile {
    /// Profile used when the student skips onboarding.
    pub fn unknown() -> Self {
        Self {
            school: "Unknown".into(),
            major: "Unknown".into(),
            year: "Unknown".into(),
            ..Self::default()
        }
    }

    pub fn has_school(&self) -> bool {
        let school = self.school.trim();
        !school.is_empty() && !school.eq_ignore_ascii_case("unknown")
    }

    pub fn avoid_list(&self) -> String {
        if self.avoid.is_empty() {
            "nothing in particular".to_string()
        } else {
            self.avoid.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_optional_fields_default_to_none() {
        let course: Course = serde_json::from_value(serde_json::json!({
            "course_id": "CS-GY 6003",
            "name": "Foundations of AI",
            "instructor": "Yann LeCun",
            "school": "Tandon",
            "term": "Spring 2026"
        }))
        .unwrap();
        assert!(course.description.is_none());
        assert!(course.rmp_rating.is_none());
        assert!(course.has_known_instructor());
    }

    #[test]
    fn apply_review_sets_all_review_fields() {
        let mut course: Course = serde_json::from_value(serde_json::json!({
            "course_id": "X", "name": "n", "instructor": "i", "school": "s", "term": "t"
        }))
        .unwrap();
        course.apply_review(4.2, "Clear lectures.".into(), Some(31));
        assert_eq!(course.rmp_rating, Some(4.2));
        assert_eq!(course.rmp_summary.as_deref(), Some("Clear lectures."));
        assert_eq!(course.rmp_num_ratings, Some(31));
    }

    #[test]
    fn placeholder_instructors_are_unknown() {
        for name in ["Staff", "staff", "TBD", "", "   "] {
            assert!(!is_known_instructor(name), "{name:?} should be unknown");
        }
        assert!(is_known_instructor("Ying Lu"));
    }

    #[test]
    fn parsed_course_accepts_both_key_styles() {
        let a: ParsedCourse = serde_json::from_value(serde_json::json!({
            "code": "CS-GY 6083", "name": "Databases", "professor": "Ying Lu", "time": "Mon 2:00PM"
        }))
        .unwrap();
        let b: ParsedCourse = serde_json::from_value(serde_json::json!({
            "course_id": "CS-GY 6083", "name": "Databases", "instructor": "Ying Lu", "schedule": "Mon 2:00PM"
        }))
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parsed_course_missing_or_null_professor_is_tbd() {
        let missing: ParsedCourse =
            serde_json::from_value(serde_json::json!({"code": "CS 101"})).unwrap();
        assert_eq!(missing.professor, "TBD");
        assert_eq!(missing.time, "TBD");

        let null: ParsedCourse = serde_json::from_value(serde_json::json!({
            "code": "CS 101", "professor": null, "time": ""
        }))
        .unwrap();
        assert_eq!(null.professor, "TBD");
        assert_eq!(null.time, "TBD");
        assert!(!null.has_known_professor());

        let staff: ParsedCourse = serde_json::from_value(serde_json::json!({
            "code": "CS 101", "professor": "Staff"
        }))
        .unwrap();
        assert_eq!(staff.professor, "TBD");
    }

    #[test]
    fn label_joins_code_and_professor() {
        let course: ParsedCourse = serde_json::from_value(serde_json::json!({
            "code": "CS 101", "professor": "Ada Lovelace"
        }))
        .unwrap();
        assert_eq!(course.label(), "CS 101 | Ada Lovelace");
    }

    #[test]
    fn goal_serializes_as_form_value() {
        for goal in Goal::ALL {
            let json = serde_json::to_value(goal).unwrap();
            assert_eq!(json, goal.as_str());
        }
    }

    #[test]
    fn skipped_profile_has_no_school() {
        assert!(!UserProfile::unknown().has_school());
        let profile = UserProfile {
            school: "NYU Tandon".into(),
            ..UserProfile::default()
        };
        assert!(profile.has_school());
        assert_eq!(profile.avoid_list(), "nothing in particular");
    }
}
