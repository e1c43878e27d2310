use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::gemini::models::ModelSettings;
use crate::gemini::retry::RetryPolicy;

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_INDEX_DIR: &str = "./course_index";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// API credential. `Debug` never prints the value.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<Secret>,
    /// `GEMINI_MODEL` pins the generation model and skips candidate validation.
    pub pinned_model: Option<String>,
    pub models: ModelSettings,
    pub embedding_model: String,
    pub retry: RetryPolicy,
}

/// Runtime configuration read from the environment (and `.env` when present).
///
/// Missing API keys are not errors here: the feature that needs the key is
/// disabled at startup and reports why.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini: GeminiSettings,
    pub tavily_api_key: Option<Secret>,
    pub index_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = var("GEMINI_API_KEY")
            .or_else(|| var("GOOGLE_API_KEY"))
            .map(Secret::new);

        let mut models = ModelSettings::default();
        if let Some(list) = var("GEMINI_MODELS") {
            let candidates: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if !candidates.is_empty() {
                models.candidates = candidates;
            }
        }
        if let Some(fallback) = var("GEMINI_FALLBACK_MODEL") {
            models.fallback = fallback;
        }

        let mut retry = RetryPolicy::default();
        if let Some(value) = var("GEMINI_MAX_ATTEMPTS") {
            retry.max_attempts = parse_positive("GEMINI_MAX_ATTEMPTS", &value)? as u32;
        }
        if let Some(value) = var("GEMINI_RETRY_BASE_MS") {
            retry.base_delay = Duration::from_millis(parse_positive("GEMINI_RETRY_BASE_MS", &value)?);
        }

        Ok(Self {
            gemini: GeminiSettings {
                api_key,
                pinned_model: var("GEMINI_MODEL"),
                models,
                embedding_model: var("GEMINI_EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                retry,
            },
            tavily_api_key: var("TAVILY_API_KEY").map(Secret::new),
            index_dir: var("COURSE_PILOT_INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_DIR)),
        })
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let s = settings(&[]).unwrap();
        assert!(s.gemini.api_key.is_none());
        assert!(s.tavily_api_key.is_none());
        assert!(s.gemini.pinned_model.is_none());
        assert_eq!(s.gemini.models, ModelSettings::default());
        assert_eq!(s.gemini.embedding_model, "text-embedding-004");
        assert_eq!(s.index_dir, PathBuf::from("./course_index"));
    }

    #[test]
    fn google_api_key_is_accepted_as_alias() {
        let s = settings(&[("GOOGLE_API_KEY", "g-key")]).unwrap();
        assert_eq!(s.gemini.api_key.unwrap().expose(), "g-key");

        let s = settings(&[("GOOGLE_API_KEY", "g-key"), ("GEMINI_API_KEY", "primary")]).unwrap();
        assert_eq!(s.gemini.api_key.unwrap().expose(), "primary");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let s = settings(&[("TAVILY_API_KEY", "   "), ("GEMINI_MODEL", "")]).unwrap();
        assert!(s.tavily_api_key.is_none());
        assert!(s.gemini.pinned_model.is_none());
    }

    #[test]
    fn model_list_is_split_and_trimmed() {
        let s = settings(&[
            ("GEMINI_MODELS", " gemini-a , ,gemini-b"),
            ("GEMINI_FALLBACK_MODEL", "gemini-z"),
        ])
        .unwrap();
        assert_eq!(s.gemini.models.candidates, vec!["gemini-a", "gemini-b"]);
        assert_eq!(s.gemini.models.fallback, "gemini-z");
    }

    #[test]
    fn retry_settings_are_parsed() {
        let s = settings(&[("GEMINI_MAX_ATTEMPTS", "5"), ("GEMINI_RETRY_BASE_MS", "250")]).unwrap();
        assert_eq!(s.gemini.retry.max_attempts, 5);
        assert_eq!(s.gemini.retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = settings(&[("GEMINI_MAX_ATTEMPTS", "zero")]).unwrap_err();
        assert!(err.to_string().contains("GEMINI_MAX_ATTEMPTS"), "got: {err}");

        assert!(settings(&[("GEMINI_RETRY_BASE_MS", "0")]).is_err());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new("sk-very-secret");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
    }
}
