use std::sync::Arc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::Item,
    repositories::ItemRepository,
};

/// Whether `store` wrote the item or found it already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    AlreadyStored,
}

pub struct ItemService {
    repository: Arc<dyn ItemRepository>,
}

impl ItemService {
    pub fn new(repository: Arc<dyn ItemRepository>) -> Self {
        Self { repository }
    }

    pub async fn count_active(&self) -> AppResult<u64> {
        self.repository.count_active().await
    }

    /// Inserts an accepted item. Re-storing the same id is not an error.
    pub async fn store(&self, item: Item) -> AppResult<StoreOutcome> {
        let id = item.id.clone();

        match self.repository.insert(item).await {
            Ok(stored) => {
                log::info!("Stored item {} in category '{}'", stored.id, stored.category);
                Ok(StoreOutcome::Inserted)
            }
            Err(AppError::AlreadyExists(_)) => {
                log::debug!("Item {} was already stored", id);
                Ok(StoreOutcome::AlreadyStored)
            }
            Err(e) => {
                log::error!("Failed to store item {}: {}", id, e);
                Err(e)
            }
        }
    }
}
