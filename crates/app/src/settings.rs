use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use pdf_chat_core::config::DEFAULT_GEMINI_BASE_URL;
use pdf_chat_core::{ModelProfile, OcrBackend, PipelineConfig, DEFAULT_TOP_K};
use std::collections::HashSet;
use std::path::PathBuf;

pub const DEFAULT_SECRET_KEY: &str = "change-me-in-production";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OcrKind {
    Tesseract,
    Http,
    Disabled,
}

/// Process settings. Every flag falls back to an environment variable.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Gemini API key used for embeddings and answers.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model profile name.
    #[arg(long, env = "MODEL_NAME", default_value = "Google AI")]
    pub model_name: String,

    /// Directory holding the database and the vector index.
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Database name; the file is `<DATA_DIR>/<DB_NAME>.sqlite3`.
    #[arg(long, env = "DB_NAME", default_value = "pdf_chatbot")]
    pub db_name: String,

    /// Secret used to sign access tokens.
    #[arg(long, env = "SECRET_KEY", default_value = DEFAULT_SECRET_KEY, hide_env_values = true)]
    pub secret_key: String,

    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value_t = 300)]
    pub access_token_expire_minutes: i64,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    pub gemini_base_url: String,

    #[arg(long, env = "OCR_BACKEND", value_enum, default_value_t = OcrKind::Tesseract)]
    pub ocr_backend: OcrKind,

    /// Tesseract language set.
    #[arg(long, env = "OCR_LANGUAGES", default_value = "vie+eng")]
    pub ocr_languages: String,

    #[arg(long, env = "LLM_OCR_ENDPOINT")]
    pub llm_ocr_endpoint: Option<String>,

    #[arg(long, env = "LLM_OCR_API_KEY", hide_env_values = true)]
    pub llm_ocr_api_key: Option<String>,

    /// Number of chunks handed to the model per question.
    #[arg(long, env = "RETRIEVAL_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Users registered under these names become admins.
    #[arg(long, env = "ADMIN_USERNAMES", value_delimiter = ',')]
    pub admin_usernames: Vec<String>,

    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 64)]
    pub max_upload_mb: usize,
}

impl Settings {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite3", self.db_name))
    }

    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let profile: ModelProfile = self
            .model_name
            .parse()
            .with_context(|| format!("MODEL_NAME {:?} is not supported", self.model_name))?;

        let ocr = match self.ocr_backend {
            OcrKind::Tesseract => OcrBackend::Tesseract {
                languages: self.ocr_languages.clone(),
                dpi: 300,
            },
            OcrKind::Http => match &self.llm_ocr_endpoint {
                Some(endpoint) if !endpoint.trim().is_empty() => OcrBackend::Http {
                    endpoint: endpoint.trim().to_string(),
                    api_key: self.llm_ocr_api_key.clone(),
                },
                _ => bail!("OCR_BACKEND=http requires LLM_OCR_ENDPOINT"),
            },
            OcrKind::Disabled => OcrBackend::Disabled,
        };

        let mut config =
            PipelineConfig::new(profile, &self.data_dir).with_api_key(self.api_key.clone());
        config.gemini_base_url = self.gemini_base_url.clone();
        config.top_k = self.top_k.max(1);
        config.ocr = ocr;
        Ok(config)
    }

    pub fn admins(&self) -> HashSet<String> {
        self.admin_usernames
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["pdf-chat"];
        argv.extend_from_slice(args);
        Harness::parse_from(argv).settings
    }

    #[test]
    fn database_lives_under_data_dir() {
        let settings = parse(&["--data-dir", "/srv/chat", "--db-name", "prod"]);
        assert_eq!(settings.database_path(), PathBuf::from("/srv/chat/prod.sqlite3"));
    }

    #[test]
    fn unknown_model_name_fails_fast() {
        let settings = parse(&["--model-name", "Llama"]);
        assert!(settings.pipeline_config().is_err());
    }

    #[test]
    fn http_ocr_needs_an_endpoint() {
        let settings = parse(&["--ocr-backend", "http"]);
        assert!(settings.pipeline_config().is_err());

        let settings = parse(&["--ocr-backend", "http", "--llm-ocr-endpoint", "http://ocr.local"]);
        let config = settings.pipeline_config().unwrap();
        assert!(matches!(config.ocr, OcrBackend::Http { .. }));
    }

    #[test]
    fn admin_list_is_trimmed() {
        let settings = parse(&["--admin-usernames", "root, alice,,"]);
        let admins = settings.admins();
        assert!(admins.contains("root"));
        assert!(admins.contains("alice"));
        assert_eq!(admins.len(), 2);
    }
}
