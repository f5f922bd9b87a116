pub mod generation_handler;

pub use generation_handler::{health_check, run_generation};
