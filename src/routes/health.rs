//! # 헬스체크(Health Check) 핸들러
//!
//! - `GET /api/health` → `{ "status": "ok", "timers": 3 }`
//!
//! 권한자 태스크가 살아서 응답하는지까지 확인합니다.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{error::AppError, routes::AppState};

/// `GET /api/health`: 권한자에게 왕복 요청을 보내 서버 상태를 확인합니다.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let timers = state.authority.timers().await?;
    Ok(Json(json!({
        "status": "ok",
        "timers": timers.len()
    })))
}
