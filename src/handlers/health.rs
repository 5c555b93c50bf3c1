// src/handlers/health.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::storage::cache::SnapshotCache;

pub async fn healthz(cache: web::Data<SnapshotCache>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "cacheReady": cache.is_ready(),
        "cacheStale": cache.needs_refresh(),
    }))
}
