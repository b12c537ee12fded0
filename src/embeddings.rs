//! Rate-limited batch embedding client.
//!
//! The embedding provider enforces a requests-per-minute ceiling and returns
//! vectors positionally, without a correlation key. Both constraints shape
//! this client: inputs are cut into fixed-size batches with a fixed pause
//! between them, and response order is trusted but response length is not.
//! A failed batch fails the whole call; callers never see a partial result.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::types::PipelineError;

/// Component count of every vector the provider returns.
pub const EMBEDDING_DIM: usize = 1024;

/// Scheduling policy for batched embedding calls.
///
/// The pause is pre-emptive: it is applied between batches regardless of
/// what the provider reports, there is no reactive backoff.
#[derive(Clone, Copy, Debug)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub pause: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 100,
            pause: Duration::from_secs(60),
        }
    }
}

pub struct EmbeddingClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    policy: BatchPolicy,
}

impl EmbeddingClient {
    pub fn new(
        client: Client,
        endpoint: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            policy: BatchPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Embeds `texts`, returning one vector per input in input order.
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<&[String]> = texts.chunks(self.policy.batch_size.max(1)).collect();
        let last = batches.len() - 1;
        let mut vectors = Vec::with_capacity(texts.len());

        for (index, batch) in batches.iter().enumerate() {
            debug!(batch = index + 1, of = batches.len(), size = batch.len(), "embedding batch");
            vectors.extend(self.embed_batch(batch).await?);
            if index < last {
                sleep(self.policy.pause).await;
            }
        }

        Ok(vectors)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "dimensions": EMBEDDING_DIM,
            "input": texts,
        });
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::Embedding(format!("malformed response: {err}")))?;

        if payload.data.len() != texts.len() {
            return Err(PipelineError::Embedding(format!(
                "provider returned {} vectors for {} inputs",
                payload.data.len(),
                texts.len()
            )));
        }
        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer, batch_size: usize) -> EmbeddingClient {
        EmbeddingClient::new(
            Client::new(),
            Url::parse(&server.url("/embed")).unwrap(),
            "embed-key",
            "test-model",
        )
        .with_policy(BatchPolicy {
            batch_size,
            pause: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn empty_input_makes_no_requests() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(json!({"data": []}));
            })
            .await;

        let client = client_for(&server, 2);
        let vectors = client.embed_all(&[]).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn batches_preserve_input_order() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").body_contains("text-0");
                then.status(200).json_body(json!({
                    "data": [{"embedding": [0.0]}, {"embedding": [1.0]}]
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").body_contains("text-2");
                then.status(200).json_body(json!({
                    "data": [{"embedding": [2.0]}, {"embedding": [3.0]}]
                }));
            })
            .await;
        let third = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").body_contains("text-4");
                then.status(200)
                    .json_body(json!({"data": [{"embedding": [4.0]}]}));
            })
            .await;

        let texts: Vec<String> = (0..5).map(|i| format!("text-{i}")).collect();
        let client = client_for(&server, 2);
        let vectors = client.embed_all(&texts).await.unwrap();

        assert_eq!(
            vectors,
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]]
        );
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn default_batch_size_splits_hundreds_in_order() {
        let server = MockServer::start_async().await;
        let chunk_response = |start: usize, len: usize| {
            let data: Vec<_> = (start..start + len)
                .map(|i| json!({"embedding": [i as f32]}))
                .collect();
            json!({"data": data})
        };

        let first = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").body_contains("\"t-99\"");
                then.status(200).json_body(chunk_response(0, 100));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").body_contains("\"t-199\"");
                then.status(200).json_body(chunk_response(100, 100));
            })
            .await;
        let third = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").body_contains("\"t-249\"");
                then.status(200).json_body(chunk_response(200, 50));
            })
            .await;

        let texts: Vec<String> = (0..250).map(|i| format!("t-{i}")).collect();
        let client = client_for(&server, BatchPolicy::default().batch_size);
        let vectors = client.embed_all(&texts).await.unwrap();

        assert_eq!(vectors.len(), 250);
        assert_eq!(vectors[0], vec![0.0]);
        assert_eq!(vectors[99], vec![99.0]);
        assert_eq!(vectors[100], vec![100.0]);
        assert_eq!(vectors[249], vec![249.0]);
        assert_eq!(first.hits_async().await, 1);
        assert_eq!(second.hits_async().await, 1);
        assert_eq!(third.hits_async().await, 1);
    }

    #[tokio::test]
    async fn response_length_mismatch_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200)
                    .json_body(json!({"data": [{"embedding": [0.5]}]}));
            })
            .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let client = client_for(&server, 10);
        let result = client.embed_all(&texts).await;
        assert!(matches!(result, Err(PipelineError::Embedding(_))));
    }

    #[tokio::test]
    async fn mid_run_failure_aborts_the_whole_call() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").body_contains("text-0");
                then.status(200)
                    .json_body(json!({"data": [{"embedding": [0.0]}]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed").body_contains("text-1");
                then.status(429);
            })
            .await;

        let texts = vec!["text-0".to_string(), "text-1".to_string()];
        let client = client_for(&server, 1);
        let result = client.embed_all(&texts).await;
        assert!(matches!(result, Err(PipelineError::Http(_))));
    }

    #[tokio::test]
    async fn requests_carry_model_and_credential() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embed")
                    .header("authorization", "Bearer embed-key")
                    .body_contains("test-model");
                then.status(200)
                    .json_body(json!({"data": [{"embedding": [0.25]}]}));
            })
            .await;

        let client = client_for(&server, 10);
        let vectors = client.embed_all(&["hello".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![0.25]]);
        mock.assert_async().await;
    }
}
