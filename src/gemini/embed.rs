use reqwest::Method;
use tracing::debug;

use super::client::{GeminiClient, GeminiError, check_status};
use super::retry;
use super::types::{BatchEmbedRequest, BatchEmbedResponse, Content, EmbedContentRequest, Part};
use crate::store::{Embedder, StoreError};

/// `batchEmbedContents` accepts at most this many requests per call.
const MAX_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    Document,
    Query,
}

impl EmbedTask {
    fn as_api_str(self) -> &'static str {
        match self {
            EmbedTask::Document => "RETRIEVAL_DOCUMENT",
            EmbedTask::Query => "RETRIEVAL_QUERY",
        }
    }
}

impl GeminiClient {
    pub async fn embed_batch(
        &self,
        model: &str,
        texts: &[String],
        task: EmbedTask,
    ) -> Result<Vec<Vec<f32>>, GeminiError> {
        let model = model.strip_prefix("models/").unwrap_or(model);
        let path = format!("models/{model}:batchEmbedContents");
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_BATCH) {
            let request = BatchEmbedRequest {
                requests: chunk
                    .iter()
                    .map(|text| EmbedContentRequest {
                        model: format!("models/{model}"),
                        content: Content {
                            parts: vec![Part::text(text.as_str())],
                            role: None,
                        },
                        task_type: task.as_api_str(),
                    })
                    .collect(),
            };

            let body =
                retry::with_backoff(self.retry_policy(), || self.embed_chunk(&path, &request))
                    .await?;

            if body.embeddings.len() != chunk.len() {
                return Err(GeminiError::Api {
                    code: 200,
                    message: format!(
                        "expected {} embeddings, got {}",
                        chunk.len(),
                        body.embeddings.len()
                    ),
                });
            }
            vectors.extend(body.embeddings.into_iter().map(|e| e.values));
        }

        debug!(count = vectors.len(), %model, "embedded texts");
        Ok(vectors)
    }

    async fn embed_chunk(
        &self,
        path: &str,
        request: &BatchEmbedRequest,
    ) -> Result<BatchEmbedResponse, GeminiError> {
        let response = self.request(Method::POST, path).json(request).send().await?;
        Ok(check_status(response).await?.json().await?)
    }
}

/// Embedding backend for the course index, backed by the Gemini embedding model.
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Embedder for GeminiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(self
            .client
            .embed_batch(&self.model, texts, EmbedTask::Document)
            .await?)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let mut vectors = self
            .client
            .embed_batch(&self.model, &[text.to_string()], EmbedTask::Query)
            .await?;
        vectors.pop().ok_or(StoreError::EmbeddingCount {
            expected: 1,
            got: 0,
        })
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use reqwest::Client;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embeds_documents_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:batchEmbedContents"))
            .and(body_partial_json(serde_json::json!({
                "requests": [{"taskType": "RETRIEVAL_DOCUMENT", "model": "models/text-embedding-004"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [{"values": [1.0, 0.0]}, {"values": [0.0, 1.0]}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let embedder = GeminiEmbedder::new(client, "text-embedding-004");
        let vectors = embedder
            .embed_documents(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn query_uses_retrieval_query_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:batchEmbedContents"))
            .and(body_partial_json(serde_json::json!({
                "requests": [{"taskType": "RETRIEVAL_QUERY"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [{"values": [0.5, 0.5]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let embedder = GeminiEmbedder::new(client, "models/text-embedding-004");
        let vector = embedder.embed_query("ai courses").await.unwrap();
        assert_eq!(vector, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn count_mismatch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [{"values": [1.0]}]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(Client::new(), &server.uri());
        let result = client
            .embed_batch(
                "text-embedding-004",
                &["a".to_string(), "b".to_string()],
                EmbedTask::Document,
            )
            .await;
        assert!(matches!(result, Err(GeminiError::Api { .. })));
    }
}
