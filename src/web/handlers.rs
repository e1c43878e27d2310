use axum::Json;
use axum::extract::{Form, Multipart, State};
use axum::response::{Html, Redirect};
use axum_extra::extract::Form as MultiForm;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use super::render::{self, AVOID_OPTIONS, PageFlags};
use super::session::{Report, Session, session_id};
use super::SharedState;
use crate::advisor::{
    AnalysisRequest, analyze_course, parse_course_image, parse_course_text,
    recommend_from_catalog, recommend_schedule,
};
use crate::courses::{Goal, ParsedCourse, UserProfile};

pub const MODEL_UNAVAILABLE: &str = "Gemini is not configured. Set GEMINI_API_KEY to parse and analyze courses.";
pub const SEARCH_UNAVAILABLE: &str = "Review search is not configured. Set TAVILY_API_KEY to analyze courses.";
const CATALOG_UNAVAILABLE: &str = "Catalog search needs Gemini embeddings and an index directory.";
const DEFAULT_CATALOG_RESULTS: usize = 5;
const MAX_CATALOG_RESULTS: usize = 20;

type PageResponse = (CookieJar, Html<String>);
type ActionResponse = (CookieJar, Redirect);

fn back(jar: CookieJar) -> ActionResponse {
    (jar, Redirect::to("/"))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "course-pilot"
    }))
}

/// GET / - onboarding until a profile exists, then the main page.
pub async fn index(State(state): State<SharedState>, jar: CookieJar) -> PageResponse {
    let (jar, id) = session_id(jar);
    let notice = state.sessions.take_notice(id);
    let session = state.sessions.get(id);

    let html = match &session.profile {
        None => render::onboarding(session.draft.as_ref(), notice.as_deref()),
        Some(profile) => {
            let catalog_size = match &state.catalog {
                Some(catalog) => catalog
                    .read()
                    .await
                    .len()
                    .await
                    .inspect_err(|e| warn!(error = %e, "could not count catalog"))
                    .ok(),
                None => None,
            };
            let flags = PageFlags {
                warnings: &state.warnings,
                catalog_size,
            };
            render::main_page(profile, &session, notice.as_deref(), &flags)
        }
    };
    (jar, Html(html))
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    school: String,
    #[serde(default)]
    major: String,
    #[serde(default)]
    year: String,
    #[serde(default)]
    transcript: String,
}

/// POST /profile
pub async fn save_profile(
    State(state): State<SharedState>,
    jar: CookieJar,
    Form(form): Form<ProfileForm>,
) -> ActionResponse {
    let (jar, id) = session_id(jar);
    let school = form.school.trim().to_string();
    let major = form.major.trim().to_string();

    state.sessions.update(id, |s| {
        let previous = s.draft.take().or_else(|| s.profile.clone()).unwrap_or_default();
        let profile = UserProfile {
            school,
            major,
            year: form.year.trim().to_string(),
            transcript: form.transcript,
            ..previous
        };
        if profile.school.is_empty() || profile.major.is_empty() {
            s.draft = Some(profile);
            s.notice = Some("Please fill in School and Major!".into());
        } else {
            info!(school = %profile.school, major = %profile.major, "profile saved");
            s.set_profile(profile);
        }
    });
    back(jar)
}

/// POST /profile/skip
pub async fn skip_profile(State(state): State<SharedState>, jar: CookieJar) -> ActionResponse {
    let (jar, id) = session_id(jar);
    state.sessions.update(id, |s| {
        s.draft = None;
        s.set_profile(UserProfile::unknown());
    });
    back(jar)
}

/// POST /profile/reset - back to onboarding, prefilled with the current profile.
pub async fn reset_profile(State(state): State<SharedState>, jar: CookieJar) -> ActionResponse {
    let (jar, id) = session_id(jar);
    state.sessions.update(id, |s| s.draft = s.profile.take());
    back(jar)
}

#[derive(Debug, Deserialize)]
pub struct PreferencesForm {
    #[serde(default)]
    goal: Goal,
    #[serde(default)]
    avoid: Vec<String>,
}

/// POST /preferences - goal radio plus repeated `avoid` checkboxes.
pub async fn update_preferences(
    State(state): State<SharedState>,
    jar: CookieJar,
    MultiForm(form): MultiForm<PreferencesForm>,
) -> ActionResponse {
    let (jar, id) = session_id(jar);
    let avoid: Vec<String> = form
        .avoid
        .into_iter()
        .filter(|a| AVOID_OPTIONS.iter().any(|(value, _)| value == a))
        .collect();

    state.sessions.update(id, |s| {
        if let Some(profile) = s.profile.as_mut() {
            profile.goal = form.goal;
            profile.avoid = avoid;
        }
    });
    back(jar)
}

#[derive(Debug, Deserialize)]
pub struct ParseForm {
    #[serde(default)]
    text: String,
}

/// POST /courses/parse
pub async fn parse_text(
    State(state): State<SharedState>,
    jar: CookieJar,
    Form(form): Form<ParseForm>,
) -> ActionResponse {
    let (jar, id) = session_id(jar);
    let Some(model) = &state.model else {
        state.sessions.notify(id, MODEL_UNAVAILABLE);
        return back(jar);
    };
    if form.text.trim().is_empty() {
        state.sessions.notify(id, "Paste a course list first.");
        return back(jar);
    }

    let courses = parse_course_text(model, &form.text).await;
    store_parsed(&state, id, courses);
    back(jar)
}

/// POST /courses/screenshot (multipart, field `screenshot`)
pub async fn parse_screenshot(
    State(state): State<SharedState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> ActionResponse {
    let (jar, id) = session_id(jar);
    let Some(model) = &state.model else {
        state.sessions.notify(id, MODEL_UNAVAILABLE);
        return back(jar);
    };

    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("screenshot") => {
                let mime = field.content_type().unwrap_or("image/png").to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((mime, bytes)),
                    Err(e) => {
                        warn!(error = %e, "screenshot upload failed");
                        state.sessions.notify(id, format!("Upload failed: {e}"));
                        return back(jar);
                    }
                }
                break;
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed multipart body");
                state.sessions.notify(id, format!("Upload failed: {e}"));
                return back(jar);
            }
        }
    }

    let Some((mime, bytes)) = upload.filter(|(_, bytes)| !bytes.is_empty()) else {
        state.sessions.notify(id, "Choose a screenshot to upload.");
        return back(jar);
    };
    if !mime.starts_with("image/") {
        state
            .sessions
            .notify(id, format!("Expected an image, got {mime}."));
        return back(jar);
    }

    let courses = parse_course_image(model, &bytes, &mime).await;
    store_parsed(&state, id, courses);
    back(jar)
}

fn store_parsed(state: &SharedState, id: Uuid, courses: Vec<ParsedCourse>) {
    state.sessions.update(id, |s| {
        if courses.is_empty() {
            s.notice = Some("No courses found in the input.".into());
        } else {
            s.notice = Some(format!("Found {} courses!", courses.len()));
            s.courses = courses;
            s.reports.clear();
        }
    });
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeForm {
    #[serde(default)]
    selected: Vec<usize>,
    #[serde(default)]
    question: String,
}

/// POST /courses/analyze - one report per selected course.
pub async fn analyze(
    State(state): State<SharedState>,
    jar: CookieJar,
    MultiForm(form): MultiForm<AnalyzeForm>,
) -> ActionResponse {
    let (jar, id) = session_id(jar);
    let (Some(model), Some(searcher)) = (&state.model, &state.searcher) else {
        let missing = if state.model.is_none() {
            MODEL_UNAVAILABLE
        } else {
            SEARCH_UNAVAILABLE
        };
        state.sessions.notify(id, missing);
        return back(jar);
    };

    let session = state.sessions.get(id);
    let Some(profile) = session.profile.clone() else {
        return back(jar);
    };

    let mut selected = form.selected;
    selected.sort_unstable();
    selected.dedup();
    let courses: Vec<&ParsedCourse> = selected
        .iter()
        .filter_map(|&i| session.courses.get(i))
        .collect();
    if courses.is_empty() {
        state.sessions.notify(id, "Select at least one course.");
        return back(jar);
    }

    let requirements = requirements_for(&state, id, &session, &profile).await;
    let mut reports = Vec::with_capacity(courses.len());
    for course in courses {
        let request = AnalysisRequest {
            course,
            question: &form.question,
            profile: &profile,
            requirements: &requirements,
        };
        let body = analyze_course(model, searcher, &request).await;
        reports.push(Report {
            title: course.label(),
            body,
        });
    }

    state.sessions.update(id, |s| s.reports = reports);
    back(jar)
}

/// POST /courses/recommend - a schedule drawn from every parsed course.
pub async fn recommend(State(state): State<SharedState>, jar: CookieJar) -> ActionResponse {
    let (jar, id) = session_id(jar);
    let Some(model) = &state.model else {
        state.sessions.notify(id, MODEL_UNAVAILABLE);
        return back(jar);
    };
    let session = state.sessions.get(id);
    let Some(profile) = session.profile.clone() else {
        return back(jar);
    };

    let requirements = requirements_for(&state, id, &session, &profile).await;
    let body = recommend_schedule(model, &session.courses, &profile, &requirements).await;
    state.sessions.update(id, |s| {
        s.reports = vec![Report {
            title: "Recommended schedule".into(),
            body,
        }];
    });
    back(jar)
}

#[derive(Debug, Deserialize)]
pub struct CatalogForm {
    k: Option<usize>,
}

/// POST /catalog/search - ingested courses nearest the profile.
pub async fn catalog_search(
    State(state): State<SharedState>,
    jar: CookieJar,
    Form(form): Form<CatalogForm>,
) -> ActionResponse {
    let (jar, id) = session_id(jar);
    let Some(catalog) = &state.catalog else {
        state.sessions.notify(id, CATALOG_UNAVAILABLE);
        return back(jar);
    };
    let Some(profile) = state.sessions.get(id).profile else {
        return back(jar);
    };

    let k = form
        .k
        .unwrap_or(DEFAULT_CATALOG_RESULTS)
        .clamp(1, MAX_CATALOG_RESULTS);
    let result = {
        let index = catalog.read().await;
        recommend_from_catalog(&index, &profile, k).await
    };

    match result {
        Ok(hits) if hits.is_empty() => {
            state
                .sessions
                .notify(id, "The catalog is empty. Run `course-pilot ingest` first.");
        }
        Ok(hits) => {
            let body = hits
                .iter()
                .map(|hit| {
                    let field = |key: &str| {
                        hit.metadata
                            .get(key)
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string()
                    };
                    format!(
                        "{} {} ({}) - rating {}, distance {:.3}\n  {}",
                        hit.id,
                        field("name"),
                        field("instructor"),
                        hit.metadata.get("rating").cloned().unwrap_or(Value::Null),
                        hit.distance,
                        field("rmp_summary"),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            state.sessions.update(id, |s| {
                s.reports = vec![Report {
                    title: "Catalog matches".into(),
                    body,
                }];
            });
        }
        Err(e) => {
            warn!(error = %e, "catalog search failed");
            state
                .sessions
                .notify(id, format!("Catalog search failed: {e}"));
        }
    }
    back(jar)
}

/// Degree requirements for the profile, fetched once per session profile.
async fn requirements_for(
    state: &SharedState,
    id: Uuid,
    session: &Session,
    profile: &UserProfile,
) -> String {
    if let Some(cached) = &session.requirements {
        return cached.clone();
    }

    let text = match (&state.searcher, profile.has_school()) {
        (_, false) => "No requirements fetched (School Unknown).".to_string(),
        (None, true) => "No requirements fetched (search unavailable).".to_string(),
        (Some(searcher), true) => {
            let found = searcher
                .degree_requirements(&profile.school, &profile.major)
                .await;
            if found.is_empty() {
                "Could not fetch requirements.".to_string()
            } else {
                found
            }
        }
    };
    state
        .sessions
        .update(id, |s| s.requirements = Some(text.clone()));
    text
}
