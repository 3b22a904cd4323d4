//! # 타이머 라우트 핸들러
//!
//! ## 엔드포인트
//! - `GET  /api/timers`      → 모든 타이머 상태
//! - `POST /api/timers/{id}` → 채널 밖에서 타이머 상태를 갱신
//!
//! `POST`는 WebSocket의 `update_timer`와 의미가 같습니다.
//! 다만 보낸 쪽이 연결이 아니므로 모든 연결에 전파됩니다.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    models::{Timer, TimerMap},
    routes::AppState,
};

/// `GET /api/timers`: 모든 타이머의 현재 상태를 조회합니다.
pub async fn list_timers(State(state): State<AppState>) -> Result<Json<TimerMap>, AppError> {
    let timers = state.authority.timers().await?;
    Ok(Json(timers))
}

/// `POST /api/timers/{id}`: 타이머 전체 상태를 교체합니다.
///
/// 응답: `{ "success": true, "data": {...} }`, 없는 타이머면 404
pub async fn update_timer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(timer): Json<Timer>,
) -> Result<Json<Value>, AppError> {
    let applied = state
        .authority
        .post_update(id, timer)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(json!({ "success": true, "data": applied })))
}
