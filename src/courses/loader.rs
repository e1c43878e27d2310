use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::model::Course;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate course id: {0}")]
    DuplicateId(String),
}

/// Where ingestion gets its course records from.
pub trait CourseSource {
    fn load(&self) -> Result<Vec<Course>, LoadError>;
}

/// A JSON array of course objects on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CourseSource for JsonFileSource {
    fn load(&self) -> Result<Vec<Course>, LoadError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let courses: Vec<Course> = serde_json::from_str(&raw).map_err(|source| LoadError::Parse {
            path: self.path.clone(),
            source,
        })?;
        ensure_unique_ids(&courses)?;
        debug!(path = %self.path.display(), count = courses.len(), "loaded courses");
        Ok(courses)
    }
}

/// Two built-in courses, for trying the pipeline without a data file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleCourses;

impl CourseSource for SampleCourses {
    fn load(&self) -> Result<Vec<Course>, LoadError> {
        Ok(vec![
            Course {
                course_id: "CS-GY 6003".into(),
                name: "Foundations of Artificial Intelligence".into(),
                instructor: "Yann LeCun".into(),
                school: "Tandon School of Engineering".into(),
                term: "Spring 2026".into(),
                description: Some("Introduction to AI agents, search, and learning.".into()),
                schedule: Some("Mon 2:00PM - 4:30PM".into()),
                units: Some("3".into()),
                instruction_mode: Some("In-Person".into()),
                rmp_rating: None,
                rmp_num_ratings: None,
                rmp_summary: None,
            },
            Course {
                course_id: "CS-GY 9999".into(),
                name: "Deep Learning".into(),
                instructor: "Andrew Ng".into(),
                school: "Tandon School of Engineering".into(),
                term: "Spring 2026".into(),
                description: Some("Neural networks and backpropagation.".into()),
                schedule: Some("Wed 6:00PM - 8:30PM".into()),
                units: Some("3".into()),
                instruction_mode: Some("Online".into()),
                rmp_rating: None,
                rmp_num_ratings: None,
                rmp_summary: None,
            },
        ])
    }
}

fn ensure_unique_ids(courses: &[Course]) -> Result<(), LoadError> {
    let mut seen = HashSet::new();
    for course in courses {
        if !seen.insert(course.course_id.as_str()) {
            return Err(LoadError::DuplicateId(course.course_id.clone()));
        }
    }
    Ok(())
}
