use std::sync::Arc;

use crate::{
    config::Config,
    db::Database,
    errors::AppResult,
    repositories::{ItemRepository, MongoItemRepository},
    services::{
        duplicate_detector::DuplicateDetector,
        generation_scheduler::GenerationScheduler,
        item_generator::TwoPhaseGenerator,
        item_service::ItemService,
        model_service::{EmbeddingProvider, LlmProvider, OpenAiModelService},
        rate_limit::HeuristicRateLimitClassifier,
        source_url_checker::HttpSourceUrlChecker,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub scheduler: Arc<GenerationScheduler>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let db = Database::connect(&config).await?;

        let item_repository = Arc::new(MongoItemRepository::new(&db, &config.items_collection));
        item_repository.ensure_indexes().await?;
        let item_repository: Arc<dyn ItemRepository> = item_repository;

        let model_service = Arc::new(OpenAiModelService::new(&config)?);
        let llm: Arc<dyn LlmProvider> = model_service.clone();
        let embeddings: Arc<dyn EmbeddingProvider> = model_service;

        let detector = Arc::new(DuplicateDetector::from_config(
            item_repository.clone(),
            embeddings.clone(),
            &config.generation,
        ));
        let url_checker = Arc::new(HttpSourceUrlChecker::new(
            config.generation.source_url_timeout,
        )?);
        let classifier = Arc::new(HeuristicRateLimitClassifier::from_config(&config.generation));

        let generator = Arc::new(TwoPhaseGenerator::new(
            llm,
            embeddings,
            detector,
            url_checker,
            classifier,
            config.generation.clone(),
        ));

        let item_service = Arc::new(ItemService::new(item_repository));
        let scheduler = Arc::new(GenerationScheduler::new(
            generator,
            item_service,
            &config.generation,
        ));

        log::info!(
            "Generation pipeline ready: chat model {}, embedding model {} ({} dims)",
            config.chat_model,
            config.embedding_model,
            config.embedding_dimensions
        );

        Ok(Self { db, scheduler })
    }
}
