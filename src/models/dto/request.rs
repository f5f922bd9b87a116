use serde::Deserialize;
use validator::Validate;

/// Body of a manual or scheduled generation trigger.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateItemsRequest {
    /// Desired number of active items in the corpus after the run.
    #[validate(range(min = 1, max = 1000))]
    pub target_count: u64,
}
