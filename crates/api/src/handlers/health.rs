use axum::response::IntoResponse;
use serde_json::json;

use crate::response::success;

/// 健康检查
pub async fn health_check() -> impl IntoResponse {
    success(json!({
        "status": "healthy",
        "service": "fieldops",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
