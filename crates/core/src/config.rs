use crate::chunking::ChunkingConfig;
use crate::error::{IngestError, PipelineError};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TOP_K: usize = 4;
pub const VECTOR_INDEX_DIR: &str = "vector_index";

/// Closed set of supported model profiles. Each one pins the chunking policy,
/// the embedding model and the chat model used end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelProfile {
    GoogleAi,
}

impl ModelProfile {
    pub fn name(&self) -> &'static str {
        match self {
            ModelProfile::GoogleAi => "Google AI",
        }
    }

    pub fn chunking(&self) -> ChunkingConfig {
        match self {
            ModelProfile::GoogleAi => ChunkingConfig {
                max_chars: 10_000,
                overlap_chars: 1_000,
            },
        }
    }

    pub fn embedding_model(&self) -> &'static str {
        match self {
            ModelProfile::GoogleAi => "models/embedding-001",
        }
    }

    pub fn chat_model(&self) -> &'static str {
        match self {
            ModelProfile::GoogleAi => "gemini-1.5-flash",
        }
    }

    pub fn temperature(&self) -> f64 {
        match self {
            ModelProfile::GoogleAi => 0.3,
        }
    }
}

impl FromStr for ModelProfile {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Google AI" => Ok(ModelProfile::GoogleAi),
            other => Err(IngestError::UnknownModelProfile(other.to_string())),
        }
    }
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrBackend {
    Tesseract { languages: String, dpi: u32 },
    Http { endpoint: String, api_key: Option<String> },
    Disabled,
}

impl Default for OcrBackend {
    fn default() -> Self {
        OcrBackend::Tesseract {
            languages: "vie+eng".to_string(),
            dpi: 300,
        }
    }
}

/// Built once at startup and shared with every pipeline component.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub profile: ModelProfile,
    pub api_key: Option<String>,
    pub gemini_base_url: String,
    pub index_dir: PathBuf,
    pub top_k: usize,
    pub ocr: OcrBackend,
}

impl PipelineConfig {
    pub fn new(profile: ModelProfile, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile,
            api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            index_dir: data_dir.into().join(VECTOR_INDEX_DIR),
            top_k: DEFAULT_TOP_K,
            ocr: OcrBackend::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self
    }

    pub fn require_api_key(&self) -> Result<&str, PipelineError> {
        self.api_key
            .as_deref()
            .ok_or(PipelineError::MissingCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_profile_round_trips_through_its_name() {
        let profile: ModelProfile = "Google AI".parse().expect("known profile");
        assert_eq!(profile, ModelProfile::GoogleAi);
        assert_eq!(profile.to_string(), "Google AI");
        assert_eq!(profile.chunking().max_chars, 10_000);
        assert_eq!(profile.chunking().overlap_chars, 1_000);
    }

    #[test]
    fn unknown_profile_fails_fast() {
        let error = "OpenAI".parse::<ModelProfile>().unwrap_err();
        assert!(matches!(error, IngestError::UnknownModelProfile(name) if name == "OpenAI"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = PipelineConfig::new(ModelProfile::GoogleAi, "/tmp/data")
            .with_api_key(Some("   ".to_string()));
        assert!(matches!(
            config.require_api_key(),
            Err(PipelineError::MissingCredential)
        ));
        assert!(config.index_dir.ends_with(VECTOR_INDEX_DIR));
    }
}
