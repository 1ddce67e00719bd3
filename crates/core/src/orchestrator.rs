use crate::backends::AiBackends;
use crate::config::ModelProfile;
use crate::error::PipelineError;
use crate::generation::AnswerGenerator;
use crate::models::{ConversationPage, ConversationRecord, Page, RetrievedChunk};
use crate::retrieval::Retriever;
use crate::traits::{ConversationLog, DocumentCatalog, VectorIndex};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub conversation_id: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
    pub model_name: String,
    #[serde(skip)]
    pub context: Vec<RetrievedChunk>,
}

/// Answers questions against the current index generation and records
/// every successful exchange.
pub struct QueryPipeline {
    profile: ModelProfile,
    backends: Option<AiBackends>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    catalog: Arc<dyn DocumentCatalog>,
    conversations: Arc<dyn ConversationLog>,
}

impl QueryPipeline {
    pub fn new(
        profile: ModelProfile,
        backends: Option<AiBackends>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
        catalog: Arc<dyn DocumentCatalog>,
        conversations: Arc<dyn ConversationLog>,
    ) -> Self {
        Self {
            profile,
            backends,
            index,
            top_k,
            catalog,
            conversations,
        }
    }

    pub async fn ask(
        &self,
        question: &str,
        owner: Option<&str>,
    ) -> Result<ChatAnswer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let backends = self
            .backends
            .as_ref()
            .ok_or(PipelineError::MissingCredential)?;

        if self.catalog.count_entries().await? == 0 {
            return Err(PipelineError::NoDocuments);
        }

        let retriever = Retriever::new(
            Arc::clone(&backends.embedder),
            Arc::clone(&self.index),
            self.top_k,
        );
        let context = retriever.retrieve(question).await?;
        debug!(chunks = context.len(), "context retrieved");

        let answer = AnswerGenerator::new(Arc::clone(&backends.model))
            .answer(question, &context)
            .await?;

        let record = ConversationRecord {
            id: Uuid::new_v4().to_string(),
            owner: owner.map(str::to_string),
            question: question.to_string(),
            answer: answer.clone(),
            timestamp: Utc::now(),
            model_name: self.profile.name().to_string(),
        };
        self.conversations.append(&record).await?;
        info!(conversation = %record.id, owner = ?record.owner, "question answered");

        Ok(ChatAnswer {
            conversation_id: record.id,
            answer,
            timestamp: record.timestamp,
            model_name: record.model_name,
            context,
        })
    }

    pub async fn history(
        &self,
        owner: Option<&str>,
        page: Page,
    ) -> Result<ConversationPage, PipelineError> {
        Ok(self.conversations.list_conversations(owner, page).await?)
    }
}
