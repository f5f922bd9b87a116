pub mod generated_item;
pub mod request;
