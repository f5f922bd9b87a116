use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::dto::generated_item::GeneratedItemDto;

/// A persisted trivia item with a numeric answer.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Item {
    pub id: String,
    pub question: String,
    pub answer: f64,
    pub unit: String,
    pub category: String,
    pub summary: String,
    pub source_name: String,
    pub source_url: String,
    pub creator: String, // model that generated the item
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Retired,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Retired => "retired",
        }
    }
}

impl Item {
    /// Builds an active item from a validated candidate, assigning a fresh id.
    pub fn accept(
        candidate: GeneratedItemDto,
        creator: &str,
        embedding: Option<Vec<f32>>,
    ) -> Self {
        Item {
            id: Uuid::new_v4().to_string(),
            question: candidate.question,
            answer: candidate.answer,
            unit: candidate.unit,
            category: candidate.category,
            summary: candidate.summary,
            source_name: candidate.source_name,
            source_url: candidate.source_url,
            creator: creator.to_string(),
            status: ItemStatus::Active,
            embedding,
            created_at: Some(Utc::now()),
        }
    }
}

/// A stored item that scored above a similarity threshold.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimilarItem {
    pub id: String,
    pub summary: String,
    pub similarity_score: f64,
}
