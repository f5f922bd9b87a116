pub mod item_repository;

pub use item_repository::{ItemRepository, MongoItemRepository};

#[cfg(test)]
pub use item_repository::MockItemRepository;
