use std::sync::Arc;

use crate::{
    config::GenerationConfig,
    models::domain::{
        generation::{DuplicateMatch, SimilarityMethod},
        SimilarItem,
    },
    repositories::ItemRepository,
    services::model_service::EmbeddingProvider,
};

/// Result of checking one summary against the corpus. The embedding, when one could be
/// computed, is handed back so the accepted item can store it without a second call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DuplicateCheck {
    pub duplicate: Option<DuplicateMatch>,
    pub embedding: Option<Vec<f32>>,
}

pub struct DuplicateDetector {
    repository: Arc<dyn ItemRepository>,
    embeddings: Arc<dyn EmbeddingProvider>,
    lexical_threshold: f64,
    embedding_threshold: f64,
    match_limit: usize,
}

fn into_match(best: SimilarItem, method: SimilarityMethod) -> DuplicateMatch {
    DuplicateMatch {
        id: best.id,
        summary: best.summary,
        similarity_score: best.similarity_score,
        method,
    }
}

impl DuplicateDetector {
    pub fn new(
        repository: Arc<dyn ItemRepository>,
        embeddings: Arc<dyn EmbeddingProvider>,
        lexical_threshold: f64,
        embedding_threshold: f64,
    ) -> Self {
        Self {
            repository,
            embeddings,
            lexical_threshold,
            embedding_threshold,
            match_limit: 5,
        }
    }

    pub fn from_config(
        repository: Arc<dyn ItemRepository>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: &GenerationConfig,
    ) -> Self {
        let mut detector = Self::new(
            repository,
            embeddings,
            config.lexical_similarity_threshold,
            config.embedding_similarity_threshold,
        );
        detector.match_limit = config.similarity_match_limit.max(1);
        detector
    }

    /// Trigram match against stored summaries. Query failures count as no match.
    pub async fn find_lexical_match(&self, summary: &str) -> Option<DuplicateMatch> {
        match self
            .repository
            .find_similar_by_summary(summary, self.lexical_threshold, self.match_limit)
            .await
        {
            Ok(matches) => matches
                .into_iter()
                .next()
                .map(|best| into_match(best, SimilarityMethod::Lexical)),
            Err(e) => {
                log::warn!(
                    "Lexical duplicate check failed for '{}', assuming unique: {}",
                    summary,
                    e
                );
                None
            }
        }
    }

    /// Cosine match against stored embeddings. Query failures count as no match.
    pub async fn find_embedding_match(&self, embedding: &[f32]) -> Option<DuplicateMatch> {
        match self
            .repository
            .find_similar_by_embedding(embedding, self.embedding_threshold, self.match_limit)
            .await
        {
            Ok(matches) => matches
                .into_iter()
                .next()
                .map(|best| into_match(best, SimilarityMethod::Embedding)),
            Err(e) => {
                log::warn!("Embedding duplicate check failed, assuming unique: {}", e);
                None
            }
        }
    }

    /// Runs the lexical check, then embeds the summary and runs the vector check.
    pub async fn check(&self, summary: &str) -> DuplicateCheck {
        if let Some(found) = self.find_lexical_match(summary).await {
            log::info!(
                "Duplicate topic '{}' matches '{}' ({} {:.3})",
                summary,
                found.summary,
                found.method,
                found.similarity_score
            );
            return DuplicateCheck {
                duplicate: Some(found),
                embedding: None,
            };
        }

        let embedding = match self.embeddings.embed(summary).await {
            Ok(embedding) => embedding,
            Err(e) => {
                log::warn!("Failed to embed summary '{}': {}", summary, e);
                return DuplicateCheck::default();
            }
        };

        let duplicate = self.find_embedding_match(&embedding).await;
        if let Some(found) = &duplicate {
            log::info!(
                "Duplicate topic '{}' matches '{}' ({} {:.3})",
                summary,
                found.summary,
                found.method,
                found.similarity_score
            );
        }

        DuplicateCheck {
            duplicate,
            embedding: Some(embedding),
        }
    }
}
