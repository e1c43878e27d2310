use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use uuid::Uuid;

use crate::courses::{ParsedCourse, UserProfile};

pub const SESSION_COOKIE: &str = "course_pilot_session";

/// A titled block of model output shown under the course table.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: String,
    pub body: String,
}

/// Per-browser UI state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// `None` until onboarding is saved or skipped.
    pub profile: Option<UserProfile>,
    /// Values shown in the onboarding form while editing.
    pub draft: Option<UserProfile>,
    pub courses: Vec<ParsedCourse>,
    /// Degree requirement snippets, fetched once per profile.
    pub requirements: Option<String>,
    pub reports: Vec<Report>,
    /// One-shot message shown on the next page render.
    pub notice: Option<String>,
}

impl Session {
    pub fn set_profile(&mut self, profile: UserProfile) {
        self.profile = Some(profile);
        self.requirements = None;
    }
}

const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const MAX_SESSIONS: usize = 10_000;

#[derive(Debug)]
struct Entry {
    session: Session,
    last_seen: Instant,
}

/// In-memory session map. The lock is never held across an `.await`.
///
/// Sessions idle longer than the TTL are dropped on the next write; past
/// `max_sessions` the least recently seen one is dropped.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Entry>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(SESSION_TTL, MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn with_limits(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Snapshot of a session; unknown ids read as a fresh session.
    pub fn get(&self, id: Uuid) -> Session {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                entry.session.clone()
            }
            None => Session::default(),
        }
    }

    pub fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> T) -> T {
        self.update_at(Instant::now(), id, f)
    }

    fn update_at<T>(&self, now: Instant, id: Uuid, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut sessions = self.lock();
        sessions.retain(|key, entry| *key == id || now.duration_since(entry.last_seen) < self.ttl);

        if !sessions.contains_key(&id) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                debug!(session = %oldest, "evicting least recently seen session");
                sessions.remove(&oldest);
            }
        }

        let entry = sessions.entry(id).or_insert_with(|| Entry {
            session: Session::default(),
            last_seen: now,
        });
        entry.last_seen = now;
        f(&mut entry.session)
    }

    /// Reads and clears the pending notice.
    pub fn take_notice(&self, id: Uuid) -> Option<String> {
        self.lock()
            .get_mut(&id)
            .and_then(|entry| entry.session.notice.take())
    }

    pub fn notify(&self, id: Uuid, message: impl Into<String>) {
        self.update(id, |s| s.notice = Some(message.into()));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Entry>> {
        // Poisoned state is still usable UI state.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Session id from the cookie, minting one (and setting the cookie) when
/// absent or malformed.
pub fn session_id(jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        return (jar, id);
    }

    let id = Uuid::new_v4();
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_session_reads_as_default() {
        let store = SessionStore::default();
        let session = store.get(Uuid::new_v4());
        assert!(session.profile.is_none());
        assert!(session.courses.is_empty());
    }

    #[test]
    fn notice_is_shown_once() {
        let store = SessionStore::default();
        let id = Uuid::new_v4();
        store.notify(id, "Found 3 courses");
        assert_eq!(store.take_notice(id).as_deref(), Some("Found 3 courses"));
        assert!(store.take_notice(id).is_none());
    }

    #[test]
    fn new_profile_clears_cached_requirements() {
        let store = SessionStore::default();
        let id = Uuid::new_v4();
        store.update(id, |s| s.requirements = Some("- Core: algorithms".into()));
        store.update(id, |s| s.set_profile(UserProfile::unknown()));
        let session = store.get(id);
        assert!(session.requirements.is_none());
        assert!(session.profile.is_some());
    }

    #[test]
    fn idle_sessions_are_evicted_on_write() {
        let store = SessionStore::with_limits(Duration::from_secs(60), 100);
        let start = Instant::now();
        let (idle, active) = (Uuid::new_v4(), Uuid::new_v4());
        store.update_at(start, idle, |s| s.notice = Some("old".into()));
        store.update_at(start, active, |s| s.notice = Some("kept".into()));

        store.update_at(start + Duration::from_secs(30), active, |_| ());
        store.update_at(start + Duration::from_secs(75), active, |_| ());

        assert_eq!(store.len(), 1);
        assert!(store.get(idle).notice.is_none());
        assert_eq!(store.get(active).notice.as_deref(), Some("kept"));
    }

    #[test]
    fn cookieless_requests_cannot_grow_past_the_cap() {
        let store = SessionStore::with_limits(Duration::from_secs(3600), 3);
        let start = Instant::now();
        let first = Uuid::new_v4();
        store.update_at(start, first, |_| ());
        for i in 1..10 {
            store.update_at(start + Duration::from_secs(i), Uuid::new_v4(), |_| ());
        }
        assert_eq!(store.len(), 3);
        assert!(!store.lock().contains_key(&first));
    }

    #[test]
    fn cookie_is_reused_or_minted() {
        let (jar, id) = session_id(CookieJar::new());
        assert_eq!(jar.get(SESSION_COOKIE).unwrap().value(), id.to_string());

        let (_, same) = session_id(jar);
        assert_eq!(same, id);

        let bad = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-uuid"));
        let (_, fresh) = session_id(bad);
        assert_ne!(fresh.to_string(), "not-a-uuid");
    }
}
