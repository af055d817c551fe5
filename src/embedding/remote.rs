//! HTTP embedding client
//!
//! Talks to an external embedding server (the model process owns the GPU):
//! `POST {base}/embed/image` with raw bytes, `POST {base}/embed/text` with a
//! JSON body. Both return `{"embedding": [..]}`. Model errors surface as
//! `EmbeddingFailed`; a wrong-sized vector is a `DimensionMismatch` and is
//! checked here so it never reaches an index.

use super::Embedder;
use crate::error::{IrisError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Serialize)]
struct EmbedTextRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Client for a remote embedding server
pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    dims: usize,
}

impl RemoteEmbedder {
    pub fn new(base_url: impl Into<String>, dims: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dims,
        }
    }

    fn check_dims(&self, embedding: Vec<f32>) -> Result<Vec<f32>> {
        if embedding.len() != self.dims {
            error!(
                expected = self.dims,
                actual = embedding.len(),
                "Embedding server returned a wrong-sized vector"
            );
            return Err(IrisError::dimension_mismatch(self.dims, embedding.len()));
        }
        Ok(embedding)
    }

    async fn parse(&self, response: reqwest::Response) -> Result<Vec<f32>> {
        if !response.status().is_success() {
            return Err(IrisError::embedding_failed(format!(
                "embedding server returned {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| IrisError::embedding_failed(format!("bad embedding response: {e}")))?;

        self.check_dims(body.embedding)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/embed/image", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| IrisError::embedding_failed(e.to_string()))?;

        self.parse(response).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/embed/text", self.base_url))
            .json(&EmbedTextRequest { text })
            .send()
            .await
            .map_err(|e| IrisError::embedding_failed(e.to_string()))?;

        self.parse(response).await
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_embed_text_roundtrip() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embed/text")
                    .json_body(serde_json::json!({"text": "a red apple"}));
                then.status(200)
                    .json_body(serde_json::json!({"embedding": [0.6, 0.8]}));
            })
            .await;

        let embedder = RemoteEmbedder::new(server.base_url(), 2);
        let vec = embedder.embed_text("a red apple").await.unwrap();

        mock.assert_async().await;
        assert_eq!(vec, vec![0.6, 0.8]);
    }

    #[tokio::test]
    async fn test_embed_image_posts_raw_bytes() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed/image");
                then.status(200)
                    .json_body(serde_json::json!({"embedding": [1.0, 0.0]}));
            })
            .await;

        let embedder = RemoteEmbedder::new(server.base_url(), 2);
        let vec = embedder.embed_image(b"\xff\xd8jpeg").await.unwrap();

        mock.assert_async().await;
        assert_eq!(vec.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_is_embedding_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed/text");
                then.status(500);
            })
            .await;

        let embedder = RemoteEmbedder::new(server.base_url(), 2);
        let err = embedder.embed_text("q").await.unwrap_err();
        assert!(matches!(err, IrisError::EmbeddingFailed(_)));
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_mismatch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed/text");
                then.status(200)
                    .json_body(serde_json::json!({"embedding": [0.1, 0.2, 0.3]}));
            })
            .await;

        let embedder = RemoteEmbedder::new(server.base_url(), 2);
        let err = embedder.embed_text("q").await.unwrap_err();
        assert!(matches!(
            err,
            IrisError::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }
}
