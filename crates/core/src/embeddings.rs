use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

const DEFAULT: usize = 128;
const GEMINI_BATCH_LIMIT: usize = 100;
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;

    /// One vector per input text, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

/// Deterministic hashed trigram embedder. Needs no network, used offline and in tests.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    /// Each whitespace-separated word is padded with spaces and cut into
    /// trigrams; every trigram adds a signed unit to one hashed slot.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let slots = vector.len() as u64;

        for word in text.split_whitespace() {
            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars().flat_map(char::to_lowercase))
                .chain(std::iter::once(' '))
                .collect();
            for gram in padded.windows(3) {
                let hash = fnv1a(gram);
                let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
                vector[(hash % slots) as usize] += sign;
            }
        }

        normalize(&mut vector);
        vector
    }
}

fn fnv1a(gram: &[char]) -> u64 {
    gram.iter().fold(FNV_OFFSET, |hash, &ch| {
        (hash ^ u64::from(u32::from(ch))).wrapping_mul(FNV_PRIME)
    })
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|value| *value /= norm);
    }
}

#[async_trait]
impl EmbeddingProvider for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "character-trigram"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        Ok(self.embed(text))
    }
}

/// Google Generative Language embeddings (`embedContent` / `batchEmbedContents`).
pub struct GeminiEmbedder {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self, method: &str) -> Result<Url, SearchError> {
        Ok(self
            .base_url
            .join(&format!("v1beta/{}:{}", self.model, method))?)
    }

    async fn post(&self, method: &str, body: Value) -> Result<Value, SearchError> {
        let response = self
            .client
            .post(self.endpoint(method)?)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(SearchError::BackendResponse {
                backend: "gemini-embeddings".to_string(),
                details: format!("{status}: {details}"),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());

        let bodies = batch_embed_bodies(&self.model, texts);
        for (batch, body) in texts.chunks(GEMINI_BATCH_LIMIT).zip(bodies) {
            let parsed = self.post("batchEmbedContents", body).await?;
            let embeddings = parsed
                .pointer("/embeddings")
                .and_then(Value::as_array)
                .ok_or_else(|| SearchError::BackendResponse {
                    backend: "gemini-embeddings".to_string(),
                    details: "response has no embeddings array".to_string(),
                })?;

            if embeddings.len() != batch.len() {
                return Err(SearchError::BackendResponse {
                    backend: "gemini-embeddings".to_string(),
                    details: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }

            for embedding in embeddings {
                vectors.push(parse_values(embedding.pointer("/values"))?);
            }
        }

        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let parsed = self
            .post("embedContent", embed_request(&self.model, text, QUERY_TASK))
            .await?;

        parse_values(parsed.pointer("/embedding/values"))
    }
}

const DOCUMENT_TASK: &str = "RETRIEVAL_DOCUMENT";
const QUERY_TASK: &str = "RETRIEVAL_QUERY";

fn embed_request(model: &str, text: &str, task_type: &str) -> Value {
    json!({
        "model": model,
        "content": { "parts": [{ "text": text }] },
        "taskType": task_type,
    })
}

/// One `batchEmbedContents` body per run of at most 100 texts.
fn batch_embed_bodies(model: &str, texts: &[String]) -> Vec<Value> {
    texts
        .chunks(GEMINI_BATCH_LIMIT)
        .map(|batch| {
            let requests = batch
                .iter()
                .map(|text| embed_request(model, text, DOCUMENT_TASK))
                .collect::<Vec<_>>();
            json!({ "requests": requests })
        })
        .collect()
}

fn parse_values(values: Option<&Value>) -> Result<Vec<f32>, SearchError> {
    let values = values
        .and_then(Value::as_array)
        .filter(|values| !values.is_empty())
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "gemini-embeddings".to_string(),
            details: "embedding has no values".to_string(),
        })?;

    Ok(values
        .iter()
        .map(|value| value.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Hydraulic pressure and flow");
        let second = embedder.embed("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed("abc");
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn embedder_ignores_case_and_spacing() {
        let embedder = CharacterNgramEmbedder::default();
        assert_eq!(embedder.embed("Pump  Valve"), embedder.embed("pump valve"));
        assert_ne!(embedder.embed("pump valve"), embedder.embed("invoice due"));
        assert!(embedder.embed(" \n ").iter().all(|value| *value == 0.0));

        let norm = embedder
            .embed("pump valve")
            .iter()
            .map(|value| value * value)
            .sum::<f32>();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn documents_are_sent_in_batches_of_one_hundred() {
        let texts = (0..250).map(|n| format!("chunk {n}")).collect::<Vec<_>>();
        let bodies = batch_embed_bodies("models/embedding-001", &texts);

        let sizes = bodies
            .iter()
            .map(|body| body["requests"].as_array().map(Vec::len))
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![Some(100), Some(100), Some(50)]);

        let first = &bodies[0]["requests"][0];
        assert_eq!(first["model"], "models/embedding-001");
        assert_eq!(first["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(first["content"]["parts"][0]["text"], "chunk 0");
        assert_eq!(bodies[2]["requests"][49]["content"]["parts"][0]["text"], "chunk 249");

        assert!(batch_embed_bodies("models/embedding-001", &[]).is_empty());
    }

    #[test]
    fn query_requests_use_the_query_task() {
        let body = embed_request("models/embedding-001", "what is due?", QUERY_TASK);
        assert_eq!(body["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(body["content"]["parts"][0]["text"], "what is due?");
    }

    #[tokio::test]
    async fn batch_and_query_embeddings_agree() {
        let embedder = CharacterNgramEmbedder::default();
        let texts = vec!["Hello world".to_string(), "Goodbye world".to_string()];
        let batch = embedder.embed_documents(&texts).await.unwrap();
        let query = embedder.embed_query("Goodbye world").await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], query);
    }

    #[test]
    fn gemini_endpoint_keeps_model_path() {
        let embedder = GeminiEmbedder::new(
            "https://generativelanguage.googleapis.com",
            "key",
            "models/embedding-001",
        )
        .unwrap();
        assert_eq!(
            embedder.endpoint("embedContent").unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/embedding-001:embedContent"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            GeminiEmbedder::new("not a url", "key", "models/embedding-001"),
            Err(SearchError::Url(_))
        ));
    }

    #[test]
    fn empty_values_are_a_backend_error() {
        let payload = json!({ "embedding": { "values": [] } });
        assert!(parse_values(payload.pointer("/embedding/values")).is_err());
        let payload = json!({ "embedding": { "values": [0.5, 1] } });
        assert_eq!(
            parse_values(payload.pointer("/embedding/values")).unwrap(),
            vec![0.5, 1.0]
        );
    }
}
