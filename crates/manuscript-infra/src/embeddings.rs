//! Embeddings-backed similarity capability (`spec.md` §4.3 "Embeddings
//! method", §7 "Degraded capability"). Calls an OpenAI-compatible
//! `/embeddings` endpoint and computes cosine similarity locally; a small
//! in-process cache avoids re-embedding identical context windows within
//! the same analysis run.

use async_trait::async_trait;
use manuscript_core::scoring::EmbeddingSimilarity;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

const REQUEST_TIMEOUT_SECS: u64 = 15;

pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client should always build with default TLS backend");
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if let Some(cached) = self.cache.lock().expect("embedding cache poisoned").get(text) {
            return Some(cached.clone());
        }

        let body = json!({ "model": self.model, "input": text });
        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "embedding request failed; degrading to no embeddings vote");
                return None;
            }
        };

        let parsed: EmbeddingResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "embedding response was not well-formed");
                return None;
            }
        };

        let vector = parsed.data.into_iter().next()?.embedding;
        self.cache
            .lock()
            .expect("embedding cache poisoned")
            .insert(text.to_string(), vector.clone());
        Some(vector)
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

#[async_trait]
impl EmbeddingSimilarity for HttpEmbeddingClient {
    async fn similarity(&self, text_a: &str, text_b: &str) -> Option<f64> {
        let vec_a = self.embed(text_a).await?;
        let vec_b = self.embed(text_b).await?;
        cosine_similarity(&vec_a, &vec_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_rejects_mismatched_dimensions() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).is_none());
    }
}
