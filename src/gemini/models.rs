//! Model discovery: validating candidate model names and listing what the key can use.

use reqwest::Method;
use tracing::{debug, warn};

use super::client::{GeminiClient, GeminiError, check_status};
use super::types::{ListModelsResponse, ModelInfo};

const DEFAULT_CANDIDATES: &[&str] = &["gemini-2.0-flash-lite", "gemini-flash-latest", "gemini-1.5-flash"];
const DEFAULT_FALLBACK: &str = "gemini-2.0-flash-lite";
const LIST_PAGE_SIZE: u32 = 1000;
/// Guards against a server that keeps returning page tokens.
const MAX_LIST_PAGES: usize = 20;

/// The single source of truth for which generation models to try, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub candidates: Vec<String>,
    /// Used without validation when no candidate validates.
    pub fallback: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(|m| m.to_string()).collect(),
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }
}

/// Returns the first candidate the API confirms exists and supports
/// `generateContent`, or the fallback when none does.
pub async fn select_model(client: &GeminiClient, settings: &ModelSettings) -> String {
    for candidate in &settings.candidates {
        match client.get_model(candidate).await {
            Ok(info) if info.supported_generation_methods.is_empty() || info.supports_generation() => {
                debug!(model = %candidate, "model candidate validated");
                return candidate.clone();
            }
            Ok(_) => debug!(model = %candidate, "model candidate cannot generate content"),
            Err(e) => debug!(model = %candidate, error = %e, "model candidate unavailable"),
        }
    }
    warn!(
        fallback = %settings.fallback,
        "no candidate model validated, using fallback without validation"
    );
    settings.fallback.clone()
}

fn bare_name(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

impl GeminiClient {
    pub async fn get_model(&self, name: &str) -> Result<ModelInfo, GeminiError> {
        let path = format!("models/{}", bare_name(name));
        let response = self.request(Method::GET, &path).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// All models available to the configured key that support `generateContent`.
    pub async fn list_generation_models(&self) -> Result<Vec<ModelInfo>, GeminiError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut path = format!("models?pageSize={LIST_PAGE_SIZE}");
            if let Some(token) = &page_token {
                path.push_str("&pageToken=");
                path.push_str(&url::form_urlencoded::byte_serialize(token.as_bytes()).collect::<String>());
            }

            let response = self.request(Method::GET, &path).send().await?;
            let page: ListModelsResponse = check_status(response).await?.json().await?;
            models.extend(page.models.into_iter().filter(ModelInfo::supports_generation));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = models.len(), "listed generation models");
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(candidates: &[&str]) -> ModelSettings {
        ModelSettings {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            fallback: "gemini-fallback".into(),
        }
    }

    fn model_json(name: &str, methods: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "name": format!("models/{name}"),
            "displayName": name,
            "supportedGenerationMethods": methods
        })
    }

    #[test]
    fn bare_name_strips_prefix() {
        assert_eq!(bare_name("models/gemini-pro"), "gemini-pro");
        assert_eq!(bare_name("gemini-pro"), "gemini-pro");
    }

    #[tokio::test]
    async fn selects_first_valid_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/gemini-gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": 404, "message": "not found", "status": "NOT_FOUND"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/gemini-ok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(model_json("gemini-ok", &["generateContent"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/gemini-later"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_json("gemini-later", &[])))
            .expect(0)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let chosen = select_model(
            &client,
            &settings(&["gemini-gone", "gemini-ok", "gemini-later"]),
        )
        .await;
        assert_eq!(chosen, "gemini-ok");
    }

    #[tokio::test]
    async fn skips_candidates_that_cannot_generate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models/embed-only"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(model_json("embed-only", &["embedContent"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/gemini-ok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(model_json("gemini-ok", &["generateContent"])),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let chosen = select_model(&client, &settings(&["embed-only", "gemini-ok"])).await;
        assert_eq!(chosen, "gemini-ok");
    }

    #[tokio::test]
    async fn falls_back_when_all_candidates_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let chosen = select_model(&client, &settings(&["a", "b"])).await;
        assert_eq!(chosen, "gemini-fallback");
    }

    #[tokio::test]
    async fn empty_candidate_list_uses_fallback() {
        let client = GeminiClient::with_base_url(Client::new(), "http://127.0.0.1:9");
        let chosen = select_model(&client, &settings(&[])).await;
        assert_eq!(chosen, "gemini-fallback");
    }

    #[tokio::test]
    async fn list_follows_pages_and_filters_generation_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [model_json("gemini-b", &["generateContent"])]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [
                    model_json("gemini-a", &["generateContent"]),
                    model_json("text-embedding-004", &["embedContent"])
                ],
                "nextPageToken": "next"
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let models = client.list_generation_models().await.unwrap();
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["models/gemini-a", "models/gemini-b"]);
    }
}
