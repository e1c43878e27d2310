use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::{debug, info, warn};

use super::models;
use super::retry::{self, RetryPolicy};
use super::types::{
    ApiError, Content, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, InlineData, Part,
};
use crate::config::{GeminiSettings, Secret};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey")]
    ApiKeyNotSet,

    #[error("API quota exceeded. Please retry later.")]
    RateLimited,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("model returned no text (finish reason: {0})")]
    EmptyResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Screenshot or other binary input sent inline with a prompt.
#[derive(Debug, Clone, Copy)]
pub struct InlineImage<'a> {
    pub mime_type: &'a str,
    /// Already base64-encoded.
    pub data: &'a str,
}

/// One generation request: prompt text, optional JSON mode, optional image.
#[derive(Debug, Clone, Copy)]
pub struct Prompt<'a> {
    pub text: &'a str,
    pub json: bool,
    pub image: Option<InlineImage<'a>>,
}

impl<'a> Prompt<'a> {
    pub fn text(text: &'a str) -> Self {
        Self {
            text,
            json: false,
            image: None,
        }
    }

    pub fn json(text: &'a str) -> Self {
        Self {
            text,
            json: true,
            image: None,
        }
    }

    pub fn with_image(text: &'a str, image: InlineImage<'a>) -> Self {
        Self {
            text,
            json: false,
            image: Some(image),
        }
    }

    fn to_request(self) -> GenerateContentRequest {
        let mut parts = vec![Part::text(self.text)];
        if let Some(image) = self.image {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime_type.to_string(),
                    data: image.data.to_string(),
                }),
            });
        }
        GenerateContentRequest {
            contents: vec![Content { parts, role: None }],
            generation_config: self.json.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        }
    }
}

/// Abstraction over a hosted text-generation model.
/// Implemented by `GeminiClient` for production; mock implementations used in tests.
pub trait TextGenerator {
    async fn generate(&self, prompt: &Prompt<'_>) -> Result<String, GeminiError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Secret,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Builds a client and picks the generation model: the pinned model if
    /// configured, otherwise the first candidate that validates.
    pub async fn from_settings(http: Client, settings: &GeminiSettings) -> Result<Self, GeminiError> {
        let api_key = settings.api_key.clone().ok_or(GeminiError::ApiKeyNotSet)?;
        let mut client = Self {
            http,
            api_key,
            model: settings.models.fallback.clone(),
            base_url: API_BASE.to_string(),
            retry: settings.retry,
        };
        client.model = match &settings.pinned_model {
            Some(model) => model.clone(),
            None => models::select_model(&client, &settings.models).await,
        };
        info!(model = %client.model, "gemini client ready");
        Ok(client)
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: Secret::new("test-key"),
            model: models::ModelSettings::default().fallback,
            base_url: base_url.to_string(),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        }
    }

    #[cfg(test)]
    pub(crate) fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(super) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Authenticated request against `{base_url}/{path}`.
    pub(super) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        self.http
            .request(method, url)
            .header("x-goog-api-key", self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let path = format!("models/{}:generateContent", self.model);
        let response = self.request(Method::POST, &path).json(request).send().await?;
        let response = check_status(response).await?;

        let body: GenerateContentResponse = response.json().await?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(err);
            warn!(error = %classified, "Gemini API error in 200 response");
            return Err(classified);
        }

        debug!(model = %self.model, "gemini generation complete");
        Ok(body)
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &Prompt<'_>) -> Result<String, GeminiError> {
        let request = prompt.to_request();
        let response = retry::with_backoff(&self.retry, || self.generate_content(&request)).await?;
        response.text().ok_or_else(|| {
            let reason = response.finish_reason().unwrap_or("unknown").to_string();
            warn!(%reason, "Gemini returned empty answer");
            GeminiError::EmptyResponse(reason)
        })
    }
}

/// Passes successful responses through and classifies everything else.
pub(super) async fn check_status(response: Response) -> Result<Response, GeminiError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!("Gemini API rate limited");
        return Err(GeminiError::RateLimited);
    }
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&text)
        && let Some(err) = &envelope.error
    {
        let classified = classify_api_error(err);
        warn!(error = %classified, "Gemini API error");
        return Err(classified);
    }

    let snippet: String = text.chars().take(200).collect();
    warn!(status = %status, "Gemini API error (no structured body)");
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GeminiError::ModelNotFound(snippet));
    }
    Err(GeminiError::Api {
        code: status.as_u16(),
        message: format!("HTTP {status}: {snippet}"),
    })
}

fn classify_api_error(err: &ApiError) -> GeminiError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    if err.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
        return GeminiError::RateLimited;
    }

    match err.code {
        Some(429) => GeminiError::RateLimited,
        Some(404) => GeminiError::ModelNotFound(message),
        Some(code) => GeminiError::Api { code, message },
        None => GeminiError::Api {
            code: 0,
            message: format!("Unknown error (no status code): {message}"),
        },
    }
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_response(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": text}], "role": "model"},
                "finishReason": "STOP"
            }]
        }))
    }

    #[tokio::test]
    async fn generate_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(text_response("Rating: 4.5/5"))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let text = client.generate(&Prompt::text("summarize")).await.unwrap();
        assert_eq!(text, "Rating: 4.5/5");
    }

    #[tokio::test]
    async fn json_prompt_requests_json_mime_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(text_response("{\"has_data\": false}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let text = client.generate(&Prompt::json("extract")).await.unwrap();
        assert!(text.contains("has_data"));
    }

    #[tokio::test]
    async fn generate_429_exhausts_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri()).with_retry(
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
        );
        let result = client.generate(&Prompt::text("test")).await;
        assert!(matches!(result, Err(GeminiError::RateLimited)));
    }

    #[tokio::test]
    async fn generate_recovers_after_transient_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(text_response("recovered"))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let text = client.generate(&Prompt::text("test")).await.unwrap();
        assert_eq!(text, "recovered");
    }

    #[tokio::test]
    async fn generate_500_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"code": 500, "message": "Internal server error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        match client.generate(&Prompt::text("test")).await {
            Err(GeminiError::Api { code: 500, message }) => {
                assert!(message.contains("Internal server error"));
            }
            other => panic!("expected Api(500), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_500_with_invalid_body_keeps_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(500).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        match client.generate(&Prompt::text("test")).await {
            Err(GeminiError::Api { code: 500, message }) => {
                assert!(message.contains("not json"), "got: {message}");
            }
            other => panic!("expected Api(500), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_field_in_200_response_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let result = client.generate(&Prompt::text("test")).await;
        assert!(matches!(result, Err(GeminiError::RateLimited)));
    }

    #[tokio::test]
    async fn empty_candidate_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        match client.generate(&Prompt::text("test")).await {
            Err(GeminiError::EmptyResponse(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("expected EmptyResponse, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn from_settings_without_key_fails() {
        let settings = crate::config::Settings::from_lookup(|_| None).unwrap();
        let result = GeminiClient::from_settings(Client::new(), &settings.gemini).await;
        assert!(matches!(result, Err(GeminiError::ApiKeyNotSet)));
    }

    #[tokio::test]
    async fn from_settings_with_pinned_model_skips_validation() {
        let settings = crate::config::Settings::from_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("key".into()),
            "GEMINI_MODEL" => Some("gemini-pinned".into()),
            _ => None,
        })
        .unwrap();
        let client = GeminiClient::from_settings(Client::new(), &settings.gemini)
            .await
            .unwrap();
        assert_eq!(client.model(), "gemini-pinned");
    }
}
