use crate::models::domain::{Item, ItemStatus};

#[cfg(test)]
pub mod fixtures {
    use super::*;
    use serde_json::{json, Value};

    /// A complete, valid item response as the provider would return it.
    pub fn valid_item_json() -> Value {
        json!({
            "question": "How tall is Angel Falls in metres?",
            "answer": 979,
            "unit": "metres",
            "category": "geography",
            "summary": "Height of Angel Falls in Venezuela",
            "sourceName": "Britannica",
            "sourceUrl": "https://www.britannica.com/place/Angel-Falls"
        })
    }

    /// An accepted item ready for persistence
    pub fn sample_item() -> Item {
        Item {
            id: "7f9c2ba4-e88f-4d2b-9e3a-1c5b8d6f0a11".to_string(),
            question: "How tall is Angel Falls in metres?".to_string(),
            answer: 979.0,
            unit: "metres".to_string(),
            category: "geography".to_string(),
            summary: "Height of Angel Falls in Venezuela".to_string(),
            source_name: "Britannica".to_string(),
            source_url: "https://www.britannica.com/place/Angel-Falls".to_string(),
            creator: "test-chat-model".to_string(),
            status: ItemStatus::Active,
            embedding: Some(vec![0.6, 0.8]),
            created_at: None,
        }
    }
}

#[cfg(test)]
pub mod test_helpers {
    use actix_web::http::StatusCode;

    /// Asserts that a status code represents an error (4xx or 5xx)
    pub fn assert_error_status(status: StatusCode) {
        assert!(
            status.is_client_error() || status.is_server_error(),
            "Expected error status, got: {}",
            status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use crate::services::item_validation::validate_item;

    #[test]
    fn test_fixture_json_is_valid_item() {
        let candidate = validate_item(&valid_item_json()).expect("fixture should validate");
        assert_eq!(candidate.summary, sample_item().summary);
    }
}
