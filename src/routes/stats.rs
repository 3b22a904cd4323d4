//! # 통계 라우트 핸들러
//!
//! - `GET /api/stats` → `{ "date", "timers": { name: { totalSeconds, studiedSeconds } } }`

use axum::{extract::State, Json};

use crate::{error::AppError, models::StudyStats, routes::AppState};

/// `GET /api/stats`: 실행 중인 타이머 몫을 다시 계산한 오늘의 통계
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StudyStats>, AppError> {
    let stats = state.authority.stats().await?;
    Ok(Json(stats))
}
