use numeracy_server::models::{
    domain::{Item, ItemStatus, RunResult},
    dto::request::GenerateItemsRequest,
};
use validator::Validate;

fn stored_item() -> Item {
    Item {
        id: "0b1e5c2e-7d0f-4f43-9a55-2f7f3c8d9e10".to_string(),
        question: "How deep is Lake Baikal in metres?".to_string(),
        answer: 1642.0,
        unit: "metres".to_string(),
        category: "geography".to_string(),
        summary: "Maximum depth of Lake Baikal".to_string(),
        source_name: "Britannica".to_string(),
        source_url: "https://www.britannica.com/place/Lake-Baikal".to_string(),
        creator: "gpt-4o-mini".to_string(),
        status: ItemStatus::Active,
        embedding: None,
        created_at: None,
    }
}

#[actix_web::test]
async fn test_item_row_shape() {
    let json = serde_json::to_value(stored_item()).unwrap();

    assert_eq!(json["status"], "active");
    assert_eq!(json["source_url"], "https://www.britannica.com/place/Lake-Baikal");
    assert!(json.get("embedding").is_none());

    let back: Item = serde_json::from_value(json).unwrap();
    assert_eq!(back, stored_item());
}

#[actix_web::test]
async fn test_run_result_body() {
    let mut result = RunResult::new(20, 18);
    result.rate_limit_waits_ms.push(42_000);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["target"], 20);
    assert_eq!(json["rate_limit_waits_ms"][0], 42_000);
    assert_eq!(json["errors"].as_array().map(Vec::len), Some(0));
}

#[cfg(test)]
mod sync_tests {
    use super::*;

    #[test]
    fn test_trigger_request_bounds() {
        let parse = |body: &str| serde_json::from_str::<GenerateItemsRequest>(body).unwrap();

        assert!(parse(r#"{"target_count": 1}"#).validate().is_ok());
        assert!(parse(r#"{"target_count": 1000}"#).validate().is_ok());
        assert!(parse(r#"{"target_count": 1001}"#).validate().is_err());
    }
}
