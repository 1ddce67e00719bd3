use crate::error::SearchError;
use crate::models::RetrievedChunk;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// Literal sentence the model is told to emit when the context lacks the answer.
pub const NOT_IN_CONTEXT: &str = "answer is not available in the context";

const PROMPT_TEMPLATE: &str = "Answer the question as detailed as possible from the provided context, make sure to provide all the details, if the answer is not in
provided context just say, \"answer is not available in the context\", don't provide the wrong answer

Context:
{context}

Question:
{question}

Answer:
";

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, SearchError>;
}

pub fn render_prompt(context: &str, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Stuffs every retrieved chunk into one prompt and returns the model text as is.
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn answer(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<String, SearchError> {
        let context = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        self.model.generate(&render_prompt(&context, question)).await
    }
}

/// Gemini `generateContent` client.
pub struct GeminiChat {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    temperature: f64,
}

impl GeminiChat {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, SearchError> {
        let endpoint = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))?;

        let response = self
            .client
            .post(endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&generate_body(prompt, self.temperature))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(SearchError::BackendResponse {
                backend: "gemini".to_string(),
                details: format!("{status}: {details}"),
            });
        }

        let parsed: Value = response.json().await?;
        candidate_text(&parsed)
    }
}

fn generate_body(prompt: &str, temperature: f64) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": { "temperature": temperature },
    })
}

fn candidate_text(parsed: &Value) -> Result<String, SearchError> {
    let parts = parsed
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "gemini".to_string(),
            details: match parsed.pointer("/promptFeedback/blockReason") {
                Some(reason) => format!("prompt blocked: {reason}"),
                None => "response has no candidates".to_string(),
            },
        })?;

    Ok(parts
        .iter()
        .filter_map(|part| part.pointer("/text").and_then(Value::as_str))
        .collect::<String>())
}
