//! Two-phase item generation.
//!
//! Phase 1 asks the provider for a short topic summary at a small token budget so an
//! already-covered topic can be rejected before paying for a full item. Phase 2 asks
//! for the complete item, seeded with the accepted topic when there is one.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::GenerationConfig,
    constants::prompts::FREE_TOPIC_INSTRUCTION,
    errors::AppError,
    models::{
        domain::{AttemptOutcome, AttemptPhase, GenerationAttempt, Item},
        dto::generated_item::GeneratedItemDto,
    },
    services::{
        duplicate_detector::DuplicateDetector,
        item_validation::{clean_summary, extract_json_object, validate_item, validate_summary},
        model_service::{EmbeddingProvider, GenerationParams, LlmProvider},
        rate_limit::RateLimitClassifier,
        similarity::normalize_summary,
        source_url_checker::SourceUrlChecker,
    },
};

/// Produces one candidate per call. The scheduler only sees the outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    async fn generate(&self, attempt_number: u32) -> GenerationAttempt;
}

/// Summary accepted in Phase 1, with the embedding computed while checking it.
struct SeedTopic {
    summary: String,
    embedding: Option<Vec<f32>>,
}

pub struct TwoPhaseGenerator {
    llm: Arc<dyn LlmProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
    detector: Arc<DuplicateDetector>,
    url_checker: Arc<dyn SourceUrlChecker>,
    classifier: Arc<dyn RateLimitClassifier>,
    config: GenerationConfig,
    item_schema: String,
}

pub fn render_prompt(template: &str, category: &str, topic: &str, schema: &str) -> String {
    template
        .replace("{category}", category)
        .replace("{topic}", topic)
        .replace("{schema}", schema)
}

impl TwoPhaseGenerator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        detector: Arc<DuplicateDetector>,
        url_checker: Arc<dyn SourceUrlChecker>,
        classifier: Arc<dyn RateLimitClassifier>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            llm,
            embeddings,
            detector,
            url_checker,
            classifier,
            config,
            item_schema: GeneratedItemDto::schema_json(),
        }
    }

    fn category_for(&self, attempt_number: u32) -> &str {
        if self.config.categories.is_empty() {
            return "general knowledge";
        }
        let index = attempt_number.saturating_sub(1) as usize % self.config.categories.len();
        &self.config.categories[index]
    }

    fn provider_failure(&self, attempt_number: u32, phase: AttemptPhase, err: AppError) -> GenerationAttempt {
        let message = err.to_string();
        let info = self.classifier.classify(&message);

        let outcome = if info.is_rate_limit {
            log::warn!(
                "Attempt {}: provider rate limited (wait {}ms, daily={})",
                attempt_number,
                info.wait_ms,
                info.is_daily
            );
            AttemptOutcome::RateLimited(info)
        } else {
            log::error!("Attempt {}: provider call failed: {}", attempt_number, message);
            AttemptOutcome::ProviderError(message)
        };

        GenerationAttempt::new(attempt_number, phase, outcome)
    }

    /// Phase 1. `Err` carries a finished duplicate attempt; `Ok(None)` means "go on without a seed".
    async fn summary_phase(
        &self,
        attempt_number: u32,
        category: &str,
    ) -> Result<Option<SeedTopic>, GenerationAttempt> {
        let prompt = render_prompt(&self.config.summary_prompt, category, "", &self.item_schema);
        let params = GenerationParams {
            temperature: self.config.summary_temperature,
            max_output_tokens: self.config.summary_max_tokens,
        };

        let completion = match self.llm.generate(&prompt, params).await {
            Ok(completion) => completion,
            Err(e) => {
                log::warn!(
                    "Attempt {}: topic summary call failed, continuing without one: {}",
                    attempt_number,
                    e
                );
                return Ok(None);
            }
        };

        if completion.truncated {
            log::warn!("Attempt {}: topic summary was truncated, ignoring it", attempt_number);
            return Ok(None);
        }

        let summary = clean_summary(&completion.text);
        if let Err(reason) = validate_summary(&summary) {
            log::warn!(
                "Attempt {}: unusable topic summary '{}': {}",
                attempt_number,
                summary,
                reason
            );
            return Ok(None);
        }

        let check = self.detector.check(&summary).await;
        if let Some(found) = check.duplicate {
            return Err(GenerationAttempt::new(
                attempt_number,
                AttemptPhase::Summary,
                AttemptOutcome::Duplicate(found),
            ));
        }

        log::debug!("Attempt {}: accepted topic '{}'", attempt_number, summary);
        Ok(Some(SeedTopic {
            summary,
            embedding: check.embedding,
        }))
    }

    async fn full_phase(
        &self,
        attempt_number: u32,
        category: &str,
        seed: Option<SeedTopic>,
    ) -> GenerationAttempt {
        let full = |outcome| GenerationAttempt::new(attempt_number, AttemptPhase::Full, outcome);

        let topic = seed
            .as_ref()
            .map(|s| s.summary.as_str())
            .unwrap_or(FREE_TOPIC_INSTRUCTION);
        let prompt = render_prompt(&self.config.item_prompt, category, topic, &self.item_schema);
        let params = GenerationParams {
            temperature: self.config.item_temperature,
            max_output_tokens: self.config.item_max_tokens,
        };

        let completion = match self.llm.generate(&prompt, params).await {
            Ok(completion) => completion,
            Err(e) => return self.provider_failure(attempt_number, AttemptPhase::Full, e),
        };

        // A response cut off at the token ceiling is never parsed, even if it happens to be valid JSON.
        if completion.truncated {
            log::warn!("Attempt {}: item response truncated at token limit", attempt_number);
            return full(AttemptOutcome::ProviderError(
                "item response truncated at token limit".to_string(),
            ));
        }

        let Some(raw_json) = extract_json_object(&completion.text) else {
            return full(AttemptOutcome::Invalid(
                "no JSON object in item response".to_string(),
            ));
        };

        let value: serde_json::Value = match serde_json::from_str(raw_json) {
            Ok(value) => value,
            Err(e) => {
                return full(AttemptOutcome::Invalid(format!(
                    "malformed JSON in item response: {}",
                    e
                )))
            }
        };

        let candidate = match validate_item(&value) {
            Ok(candidate) => candidate,
            Err(reason) => {
                log::warn!("Attempt {}: invalid item: {}", attempt_number, reason);
                return full(AttemptOutcome::Invalid(reason));
            }
        };

        if !self.url_checker.is_reachable(&candidate.source_url).await {
            return full(AttemptOutcome::Invalid(format!(
                "source URL unreachable: {}",
                candidate.source_url
            )));
        }

        let summary_changed = seed.as_ref().map_or(true, |s| {
            normalize_summary(&s.summary) != normalize_summary(&candidate.summary)
        });

        let embedding = if summary_changed {
            // The provider may drift from the seeded topic, so the claim it actually made is checked too.
            let check = self.detector.check(&candidate.summary).await;
            if let Some(found) = check.duplicate {
                return full(AttemptOutcome::Duplicate(found));
            }
            check.embedding
        } else {
            match seed.and_then(|s| s.embedding) {
                Some(embedding) => Some(embedding),
                None => self.embed_or_skip(&candidate.summary).await,
            }
        };

        let item = Item::accept(candidate, &self.llm.model_id(), embedding);
        log::info!(
            "Attempt {}: accepted item {} '{}'",
            attempt_number,
            item.id,
            item.summary
        );
        full(AttemptOutcome::Success(Box::new(item)))
    }

    async fn embed_or_skip(&self, summary: &str) -> Option<Vec<f32>> {
        match self.embeddings.embed(summary).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                log::warn!("Storing item without embedding: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl CandidateGenerator for TwoPhaseGenerator {
    async fn generate(&self, attempt_number: u32) -> GenerationAttempt {
        let category = self.category_for(attempt_number).to_string();

        let seed = match self.summary_phase(attempt_number, &category).await {
            Ok(seed) => seed,
            Err(duplicate) => return duplicate,
        };

        self.full_phase(attempt_number, &category, seed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::domain::{
            generation::{RateLimitInfo, SimilarityMethod},
            SimilarItem,
        },
        repositories::MockItemRepository,
        services::{
            model_service::{Completion, MockEmbeddingProvider, MockLlmProvider},
            rate_limit::HeuristicRateLimitClassifier,
            source_url_checker::MockSourceUrlChecker,
        },
    };
    use mockall::Sequence;

    const ITEM_JSON: &str = r#"Here you go:
{"question": "How tall is Angel Falls in metres?", "answer": 979, "unit": "metres",
 "category": "geography", "summary": "Height of Angel Falls in Venezuela",
 "sourceName": "Britannica", "sourceUrl": "https://www.britannica.com/place/Angel-Falls"}"#;

    fn completion(text: &str) -> Completion {
        Completion {
            text: text.to_string(),
            truncated: false,
        }
    }

    fn unique_repo() -> MockItemRepository {
        let mut repo = MockItemRepository::new();
        repo.expect_find_similar_by_summary()
            .returning(|_, _, _| Ok(vec![]));
        repo.expect_find_similar_by_embedding()
            .returning(|_, _, _| Ok(vec![]));
        repo
    }

    fn embedder() -> MockEmbeddingProvider {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|_| Ok(vec![0.5, 0.5]));
        embedder
    }

    fn reachable(reachable: bool) -> MockSourceUrlChecker {
        let mut checker = MockSourceUrlChecker::new();
        checker.expect_is_reachable().returning(move |_| reachable);
        checker
    }

    fn generator(
        llm: MockLlmProvider,
        repo: MockItemRepository,
        checker: MockSourceUrlChecker,
    ) -> TwoPhaseGenerator {
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(embedder());
        let detector = Arc::new(DuplicateDetector::new(
            Arc::new(repo),
            embeddings.clone(),
            0.35,
            0.85,
        ));
        TwoPhaseGenerator::new(
            Arc::new(llm),
            embeddings,
            detector,
            Arc::new(checker),
            Arc::new(HeuristicRateLimitClassifier::default()),
            GenerationConfig::test_config(),
        )
    }

    /// Summary call first, item call second.
    fn scripted_llm(summary: Result<Completion, AppError>, item: Result<Completion, AppError>) -> MockLlmProvider {
        let mut llm = MockLlmProvider::new();
        let mut seq = Sequence::new();
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(move |_, _| summary);
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(move |_, _| item);
        llm.expect_model_id().returning(|| "test-chat-model".to_string());
        llm
    }

    #[test]
    fn render_prompt_fills_placeholders() {
        let prompt = render_prompt("{category}: {topic} {schema}", "space", "Mass of Ceres", "{}");
        assert_eq!(prompt, "space: Mass of Ceres {}");
    }

    #[tokio::test]
    async fn accepted_item_reuses_phase_one_embedding() {
        let llm = scripted_llm(
            Ok(completion("Height of Angel Falls in Venezuela")),
            Ok(completion(ITEM_JSON)),
        );
        let attempt = generator(llm, unique_repo(), reachable(true)).generate(1).await;

        assert_eq!(attempt.phase, AttemptPhase::Full);
        let AttemptOutcome::Success(item) = attempt.outcome else {
            panic!("expected success, got {:?}", attempt.outcome);
        };
        assert_eq!(item.answer, 979.0);
        assert_eq!(item.creator, "test-chat-model");
        assert_eq!(item.embedding, Some(vec![0.5, 0.5]));
    }

    #[tokio::test]
    async fn phase_one_duplicate_skips_phase_two() {
        let mut llm = MockLlmProvider::new();
        llm.expect_generate()
            .times(1)
            .returning(|_, _| Ok(completion("Height of Angel Falls in Venezuela")));

        let mut repo = MockItemRepository::new();
        repo.expect_find_similar_by_summary().returning(|_, _, _| {
            Ok(vec![SimilarItem {
                id: "existing".to_string(),
                summary: "Angel Falls height in Venezuela".to_string(),
                similarity_score: 0.8,
            }])
        });

        let attempt = generator(llm, repo, reachable(true)).generate(1).await;

        assert_eq!(attempt.phase, AttemptPhase::Summary);
        let AttemptOutcome::Duplicate(found) = attempt.outcome else {
            panic!("expected duplicate");
        };
        assert_eq!(found.id, "existing");
        assert_eq!(found.method, SimilarityMethod::Lexical);
    }

    #[tokio::test]
    async fn phase_one_failure_falls_through_to_phase_two() {
        let llm = scripted_llm(
            Err(AppError::ProviderError("upstream connection reset".into())),
            Ok(completion(ITEM_JSON)),
        );
        let attempt = generator(llm, unique_repo(), reachable(true)).generate(1).await;

        assert!(matches!(attempt.outcome, AttemptOutcome::Success(_)));
    }

    #[tokio::test]
    async fn malformed_phase_one_summary_is_ignored() {
        let llm = scripted_llm(
            Ok(completion("{\"summary\": \"Angel Falls\"}")),
            Ok(completion(ITEM_JSON)),
        );
        let attempt = generator(llm, unique_repo(), reachable(true)).generate(2).await;

        assert!(matches!(attempt.outcome, AttemptOutcome::Success(_)));
    }

    #[tokio::test]
    async fn truncated_item_is_error_even_if_json_parses() {
        let llm = scripted_llm(
            Ok(completion("Height of Angel Falls in Venezuela")),
            Ok(Completion {
                text: ITEM_JSON.to_string(),
                truncated: true,
            }),
        );
        let attempt = generator(llm, unique_repo(), reachable(true)).generate(1).await;

        assert!(matches!(attempt.outcome, AttemptOutcome::ProviderError(_)));
    }

    #[tokio::test]
    async fn unreachable_source_is_invalid() {
        let llm = scripted_llm(
            Ok(completion("Height of Angel Falls in Venezuela")),
            Ok(completion(ITEM_JSON)),
        );
        let attempt = generator(llm, unique_repo(), reachable(false)).generate(1).await;

        let AttemptOutcome::Invalid(reason) = attempt.outcome else {
            panic!("expected invalid");
        };
        assert!(reason.contains("source URL unreachable"));
    }

    #[tokio::test]
    async fn phase_two_rate_limit_is_classified() {
        let llm = scripted_llm(
            Ok(completion("Height of Angel Falls in Venezuela")),
            Err(AppError::ProviderError("429 Too Many Requests: retry after 42s".into())),
        );
        let attempt = generator(llm, unique_repo(), reachable(true)).generate(1).await;

        assert_eq!(
            attempt.outcome,
            AttemptOutcome::RateLimited(RateLimitInfo {
                is_rate_limit: true,
                wait_ms: 42_000,
                is_daily: false,
            })
        );
    }

    #[tokio::test]
    async fn drifted_summary_is_checked_again() {
        let llm = scripted_llm(
            Ok(completion("Depth of Lake Baikal in Siberia")),
            Ok(completion(ITEM_JSON)),
        );

        let mut repo = MockItemRepository::new();
        repo.expect_find_similar_by_summary()
            .withf(|summary, _, _| summary.contains("Baikal"))
            .returning(|_, _, _| Ok(vec![]));
        repo.expect_find_similar_by_summary()
            .withf(|summary, _, _| summary.contains("Angel"))
            .returning(|_, _, _| {
                Ok(vec![SimilarItem {
                    id: "angel".to_string(),
                    summary: "Angel Falls height".to_string(),
                    similarity_score: 0.6,
                }])
            });
        repo.expect_find_similar_by_embedding()
            .returning(|_, _, _| Ok(vec![]));

        let attempt = generator(llm, repo, reachable(true)).generate(1).await;

        assert_eq!(attempt.phase, AttemptPhase::Full);
        assert!(matches!(attempt.outcome, AttemptOutcome::Duplicate(_)));
    }

    #[tokio::test]
    async fn string_answer_is_invalid() {
        let llm = scripted_llm(
            Ok(completion("Height of Angel Falls in Venezuela")),
            Ok(completion(&ITEM_JSON.replace("\"answer\": 979", "\"answer\": \"979\""))),
        );
        let attempt = generator(llm, unique_repo(), reachable(true)).generate(1).await;

        assert!(matches!(attempt.outcome, AttemptOutcome::Invalid(_)));
    }
}
