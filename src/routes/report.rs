//! # 리포트 생성 라우트 핸들러
//!
//! - `POST /api/generate-report`
//!
//! 1. 권한자에게서 최신 통계 스냅샷을 받아
//! 2. 파일로 저장한 뒤 (리포트 프로세스가 파일 경로를 받으므로 기다립니다)
//! 3. 외부 리포트 프로세스를 실행합니다.
//!
//! 성공: `{ "success": true, "reportUrl": "..." }`
//! 실패: `{ "success": false, "message": "...", "diagnostics": "..." }` (HTTP 500)

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{error::AppError, routes::AppState};

pub async fn generate_report(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let snapshot = state.authority.stats_snapshot().await?;
    let path = state.snapshots.write(&snapshot).await?;
    let report_url = state.reports.run(&path).await?;
    tracing::info!("Report for {} available at {}", snapshot.date, report_url);
    Ok(Json(json!({ "success": true, "reportUrl": report_url })))
}
