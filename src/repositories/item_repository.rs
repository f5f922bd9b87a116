use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, IndexOptions},
    Collection, IndexModel,
};
use serde::Deserialize;

use crate::{
    db::Database,
    errors::AppResult,
    models::domain::{Item, ItemStatus, SimilarItem},
    services::similarity::{cosine_similarity, trigram_similarity},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn count_active(&self) -> AppResult<u64>;
    /// Inserts a new item. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, item: Item) -> AppResult<Item>;
    /// Stored summaries scoring at least `threshold`, best first.
    async fn find_similar_by_summary(
        &self,
        summary: &str,
        threshold: f64,
        limit: usize,
    ) -> AppResult<Vec<SimilarItem>>;
    /// Stored embeddings scoring at least `threshold`, best first.
    async fn find_similar_by_embedding(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> AppResult<Vec<SimilarItem>>;
}

#[derive(Debug, Deserialize)]
struct SummaryRow {
    id: String,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    id: String,
    summary: String,
    embedding: Vec<f32>,
}

/// Keeps scores at or above `threshold`, sorted descending and capped at `limit`.
pub fn rank_matches(
    mut matches: Vec<SimilarItem>,
    threshold: f64,
    limit: usize,
) -> Vec<SimilarItem> {
    matches.retain(|m| m.similarity_score >= threshold);
    matches.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    matches.truncate(limit);
    matches
}

/// Active items carrying a non-empty summary.
fn summary_scan_filter() -> Document {
    doc! {
        "status": ItemStatus::Active.as_str(),
        "summary": { "$exists": true, "$ne": "" },
    }
}

/// Active items carrying an embedding.
fn embedding_scan_filter() -> Document {
    doc! {
        "status": ItemStatus::Active.as_str(),
        "embedding": { "$exists": true },
    }
}

pub struct MongoItemRepository {
    collection: Collection<Item>,
}

impl MongoItemRepository {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        let collection = db.get_collection(collection_name);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for items collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;

        let status_index = IndexModel::builder().keys(doc! { "status": 1 }).build();

        self.collection.create_index(status_index).await?;

        log::info!("Successfully created indexes for items collection");
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for MongoItemRepository {
    async fn count_active(&self) -> AppResult<u64> {
        let count = self
            .collection
            .count_documents(doc! { "status": ItemStatus::Active.as_str() })
            .await?;
        Ok(count)
    }

    async fn insert(&self, item: Item) -> AppResult<Item> {
        self.collection.insert_one(&item).await?;
        Ok(item)
    }

    async fn find_similar_by_summary(
        &self,
        summary: &str,
        threshold: f64,
        limit: usize,
    ) -> AppResult<Vec<SimilarItem>> {
        let find_options = FindOptions::builder()
            .projection(doc! { "_id": 0, "id": 1, "summary": 1 })
            .build();

        let mut cursor = self
            .collection
            .clone_with_type::<SummaryRow>()
            .find(summary_scan_filter())
            .with_options(find_options)
            .await?;

        let mut matches = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            let score = trigram_similarity(summary, &row.summary);
            if score >= threshold {
                matches.push(SimilarItem {
                    id: row.id,
                    summary: row.summary,
                    similarity_score: score,
                });
            }
        }

        Ok(rank_matches(matches, threshold, limit))
    }

    async fn find_similar_by_embedding(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> AppResult<Vec<SimilarItem>> {
        let find_options = FindOptions::builder()
            .projection(doc! { "_id": 0, "id": 1, "summary": 1, "embedding": 1 })
            .build();

        let mut cursor = self
            .collection
            .clone_with_type::<EmbeddingRow>()
            .find(embedding_scan_filter())
            .with_options(find_options)
            .await?;

        let mut matches = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            // Rows embedded with a different model dimension are skipped.
            let Some(score) = cosine_similarity(embedding, &row.embedding) else {
                continue;
            };
            if score >= threshold {
                matches.push(SimilarItem {
                    id: row.id,
                    summary: row.summary,
                    similarity_score: score,
                });
            }
        }

        Ok(rank_matches(matches, threshold, limit))
    }
}
