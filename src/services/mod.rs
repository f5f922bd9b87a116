pub mod duplicate_detector;
pub mod generation_scheduler;
pub mod item_generator;
pub mod item_service;
pub mod item_validation;
pub mod model_service;
pub mod rate_limit;
pub mod similarity;
pub mod source_url_checker;
