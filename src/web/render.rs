//! Server-rendered HTML. Layout is plain and not load-bearing; tests only
//! look for the text a page must show.

use std::fmt::Write;

use crate::courses::{Goal, UserProfile};

use super::session::Session;

pub const AVOID_OPTIONS: [(&str, &str); 3] = [
    ("8am classes", "No 8am"),
    ("heavy math", "No heavy math"),
    ("heavy writing", "No essays"),
];

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:960px;margin:2rem auto;padding:0 1rem;color:#2d3748}\
    .card{border:1px solid #e2e8f0;border-radius:12px;padding:1.25rem;margin-bottom:1.5rem}\
    .notice{background:#ebf8ff;border-left:4px solid #4e54c8;padding:.75rem 1rem;margin-bottom:1rem}\
    .warn{background:#fffaf0;border-left:4px solid #dd6b20;padding:.75rem 1rem;margin-bottom:1rem}\
    table{border-collapse:collapse;width:100%}td,th{border-bottom:1px solid #edf2f7;padding:.4rem;text-align:left}\
    pre.report{white-space:pre-wrap;font-family:inherit}\
    label{display:block;margin:.4rem 0}textarea,input[type=text]{width:100%}";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(body: &str, notice: Option<&str>, warnings: &[String]) -> String {
    let mut banners = String::new();
    for w in warnings {
        let _ = write!(banners, r#"<div class="warn">{}</div>"#, escape_html(w));
    }
    if let Some(n) = notice {
        let _ = write!(banners, r#"<div class="notice">{}</div>"#, escape_html(n));
    }
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Course Pilot</title><style>{STYLE}</style></head>
<body>
<h1>Course Pilot <small>v{version}</small></h1>
{banners}
{body}
</body>
</html>"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}

/// First screen: school, major, year and transcript.
pub fn onboarding(previous: Option<&UserProfile>, notice: Option<&str>) -> String {
    let p = previous.cloned().unwrap_or_default();
    let years = ["Master 1st Year", "Master 2nd Year", "PhD", "Undergrad"];
    let options: String = years
        .iter()
        .map(|y| {
            let selected = if p.year == *y { " selected" } else { "" };
            format!(r#"<option{selected}>{y}</option>"#)
        })
        .collect();

    let body = format!(
        r#"<div class="card">
<h2>First, let's set up your profile</h2>
<form method="post" action="/profile">
<label>School / University <input type="text" name="school" value="{school}" placeholder="e.g. NYU Tandon"></label>
<label>Major <input type="text" name="major" value="{major}" placeholder="e.g. Computer Science"></label>
<label>Current year <select name="year">{options}</select></label>
<label>Transcript / past courses <textarea name="transcript" rows="4">{transcript}</textarea></label>
<button type="submit">Save &amp; Continue</button>
</form>
<form method="post" action="/profile/skip"><button type="submit">Skip for now</button></form>
</div>"#,
        school = escape_html(&p.school),
        major = escape_html(&p.major),
        transcript = escape_html(&p.transcript),
    );
    layout(&body, notice, &[])
}

/// Everything the main page needs besides the session itself.
#[derive(Debug, Default)]
pub struct PageFlags<'a> {
    /// Startup notices about disabled features.
    pub warnings: &'a [String],
    pub catalog_size: Option<usize>,
}

pub fn main_page(
    profile: &UserProfile,
    session: &Session,
    notice: Option<&str>,
    flags: &PageFlags<'_>,
) -> String {
    let mut body = String::new();
    body.push_str(&profile_card(profile));
    body.push_str(&preferences_card(profile));
    body.push_str(PARSE_CARD);

    if !session.courses.is_empty() {
        body.push_str(&courses_card(session));
    }
    if let Some(size) = flags.catalog_size {
        let _ = write!(
            body,
            r#"<div class="card"><h2>Catalog</h2><p>{size} ingested courses.</p>
<form method="post" action="/catalog/search"><input type="hidden" name="k" value="5"><button type="submit">Find catalog matches for my profile</button></form></div>"#
        );
    }
    for report in &session.reports {
        let _ = write!(
            body,
            r#"<div class="card"><h3>{}</h3><pre class="report">{}</pre></div>"#,
            escape_html(&report.title),
            escape_html(&report.body),
        );
    }

    layout(&body, notice, flags.warnings)
}

fn profile_card(profile: &UserProfile) -> String {
    format!(
        r#"<div class="card"><h2>Profile</h2>
<p><strong>School:</strong> {}<br><strong>Major:</strong> {}<br><strong>Year:</strong> {}</p>
<form method="post" action="/profile/reset"><button type="submit">Edit profile</button></form></div>"#,
        escape_html(&profile.school),
        escape_html(&profile.major),
        escape_html(&profile.year),
    )
}

fn preferences_card(profile: &UserProfile) -> String {
    let goals: String = Goal::ALL
        .iter()
        .map(|g| {
            let checked = if *g == profile.goal { " checked" } else { "" };
            format!(
                r#"<label><input type="radio" name="goal" value="{}"{checked}> {g}</label>"#,
                g.as_str()
            )
        })
        .collect();
    let avoid: String = AVOID_OPTIONS
        .iter()
        .map(|(value, label)| {
            let checked = if profile.avoid.iter().any(|a| a == value) {
                " checked"
            } else {
                ""
            };
            format!(r#"<label><input type="checkbox" name="avoid" value="{value}"{checked}> {label}</label>"#)
        })
        .collect();
    format!(
        r#"<div class="card"><h2>Goal</h2><form method="post" action="/preferences">
{goals}<h3>Avoid</h3>{avoid}<button type="submit">Update</button></form></div>"#
    )
}

const PARSE_CARD: &str = r#"<div class="card"><h2>1. Add courses</h2>
<form method="post" action="/courses/parse">
<textarea name="text" rows="6" placeholder="Paste your course list here..."></textarea>
<button type="submit">Parse text</button>
</form>
<form method="post" action="/courses/screenshot" enctype="multipart/form-data">
<input type="file" name="screenshot" accept="image/*">
<button type="submit">Parse screenshot</button>
</form></div>"#;

fn courses_card(session: &Session) -> String {
    let mut rows = String::new();
    for (i, c) in session.courses.iter().enumerate() {
        let _ = write!(
            rows,
            r#"<tr><td><input type="checkbox" name="selected" value="{i}"></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
            escape_html(&c.code),
            escape_html(&c.name),
            escape_html(&c.professor),
            escape_html(&c.time),
        );
    }

    let tbd: Vec<&str> = session
        .courses
        .iter()
        .filter(|c| !c.has_known_professor())
        .map(|c| c.code.as_str())
        .collect();
    let tbd_warning = if tbd.is_empty() {
        String::new()
    } else {
        format!(
            r#"<div class="warn">TBD professors detected: {}</div>"#,
            escape_html(&tbd.join(", "))
        )
    };

    format!(
        r#"<div class="card"><h2>2. Select courses and analyze</h2>{tbd_warning}
<form method="post" action="/courses/analyze">
<table><tr><th></th><th>Code</th><th>Name</th><th>Professor</th><th>Time</th></tr>{rows}</table>
<label>Specific questions (optional) <input type="text" name="question" value="Workload? Grading?"></label>
<button type="submit">Analyze selected</button>
</form>
<form method="post" action="/courses/recommend"><button type="submit">Recommend a schedule</button></form></div>"#
    )
}
