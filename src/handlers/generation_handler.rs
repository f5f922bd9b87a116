use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};
use validator::Validate;

use crate::{
    app_state::AppState, errors::AppError, models::dto::request::GenerateItemsRequest,
};

/// Runs one budgeted generation pass and returns its summary.
#[post("/generation/run")]
pub async fn run_generation(
    state: web::Data<Arc<AppState>>,
    request: web::Json<GenerateItemsRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    request.validate()?;

    let result = state.scheduler.run(request.target_count).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[get("/health")]
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let db_health = state.db.health_check().await;

    let response = serde_json::json!({
        "status": if db_health.is_ok() { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {
            "mongodb": if db_health.is_ok() { "ok" } else { "error" }
        }
    });

    if db_health.is_ok() {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
