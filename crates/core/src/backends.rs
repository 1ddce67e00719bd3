use crate::config::PipelineConfig;
use crate::embeddings::{EmbeddingProvider, GeminiEmbedder};
use crate::error::PipelineError;
use crate::generation::{GeminiChat, LanguageModel};
use std::sync::Arc;

/// The credentialed services a profile talks to.
#[derive(Clone)]
pub struct AiBackends {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub model: Arc<dyn LanguageModel>,
}

impl AiBackends {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, model: Arc<dyn LanguageModel>) -> Self {
        Self { embedder, model }
    }

    /// Gemini clients for the configured profile.
    pub fn gemini(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let api_key = config.require_api_key()?;
        let profile = config.profile;

        let embedder = GeminiEmbedder::new(
            &config.gemini_base_url,
            api_key,
            profile.embedding_model(),
        )?;
        let model = GeminiChat::new(
            &config.gemini_base_url,
            api_key,
            profile.chat_model(),
            profile.temperature(),
        )?;

        Ok(Self::new(Arc::new(embedder), Arc::new(model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelProfile;

    #[test]
    fn gemini_without_credential_is_a_configuration_error() {
        let config = PipelineConfig::new(ModelProfile::GoogleAi, "data");
        assert!(matches!(
            AiBackends::gemini(&config),
            Err(PipelineError::MissingCredential)
        ));
    }

    #[test]
    fn gemini_uses_profile_models() {
        let config = PipelineConfig::new(ModelProfile::GoogleAi, "data")
            .with_api_key(Some("secret".to_string()));
        let backends = AiBackends::gemini(&config).expect("backends build");

        assert_eq!(backends.embedder.model_name(), "models/embedding-001");
        assert_eq!(backends.model.model_name(), "gemini-1.5-flash");
    }
}
