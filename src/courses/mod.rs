pub mod document;
pub mod loader;
mod model;

pub use document::{Metadata, to_documents};
pub use loader::{CourseSource, JsonFileSource, LoadError, SampleCourses};
pub use model::{Course, Goal, ParsedCourse, UserProfile, is_known_instructor};
