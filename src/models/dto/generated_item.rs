use schemars::JsonSchema;
use serde::Deserialize;
use validator::{Validate, ValidationError};

/// Field names the provider must return, in the order listed in the prompt.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "question",
    "answer",
    "unit",
    "category",
    "summary",
    "sourceName",
    "sourceUrl",
];

/// The item object the provider is asked to emit in Phase 2.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedItemDto {
    /// Question text; must name the unit of the answer.
    #[validate(length(min = 10, max = 500))]
    pub question: String,
    /// The numeric answer. A JSON number, never a string.
    pub answer: f64,
    #[validate(length(min = 1, max = 50))]
    pub unit: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    /// 3 to 10 word description of the fact.
    #[validate(length(min = 1, max = 200))]
    pub summary: String,
    #[validate(length(min = 1, max = 200))]
    pub source_name: String,
    #[validate(url, custom(function = "validate_http_scheme"))]
    pub source_url: String,
}

fn validate_http_scheme(url: &str) -> Result<(), ValidationError> {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::new("http_scheme"))
    }
}

impl GeneratedItemDto {
    /// JSON schema of the expected item, embedded in the generation prompt.
    pub fn schema_json() -> String {
        let schema = schemars::schema_for!(GeneratedItemDto);
        serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
    }
}
