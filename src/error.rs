//! # 에러 처리 모듈
//!
//! HTTP 경계에서 발생할 수 있는 에러 타입을 정의합니다.
//!
//! 이 모듈의 핵심:
//! - `AppError` 열거형(enum): 라우트 핸들러의 모든 에러 종류를 하나로 통합
//! - `IntoResponse` 구현: 에러를 HTTP 응답으로 자동 변환
//!
//! 동기화 채널(WebSocket) 쪽 에러는 여기로 올라오지 않습니다.
//! 권한자 내부에서 로그로 남기고 그 자리에서 처리합니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::PersistenceError;

/// 라우트 핸들러에서 발생할 수 있는 모든 에러 종류
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// 권한자 태스크가 종료되어 요청을 처리할 수 없음 (HTTP 503)
    #[error("Timer authority is not running")]
    AuthorityUnavailable,

    /// 스냅샷 파일 저장 실패 (HTTP 500)
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// 외부 리포트 프로세스 실패 (HTTP 500)
    /// `diagnostics`에는 프로세스의 stderr/stdout이 그대로 담깁니다.
    #[error("Report generation failed: {message}")]
    ReportFailed {
        message: String,
        diagnostics: String,
    },
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러는 실제 내용을 로그에만 기록하고 클라이언트에는 일반적인 메시지를 돌려줍니다.
    /// 리포트 실패만 예외로, 진단 출력을 함께 돌려줍니다.
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::AuthorityUnavailable => {
                tracing::error!("Timer authority is not running");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "authority_unavailable",
                    self.to_string(),
                )
            }
            AppError::Persistence(ref e) => {
                tracing::error!("Persistence error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_error",
                    "Failed to write statistics snapshot".to_string(),
                )
            }
            AppError::ReportFailed {
                message,
                diagnostics,
            } => {
                tracing::error!("Report generation failed: {}", message);
                // 프론트엔드는 `success` 플래그로 실패 알림을 띄웁니다.
                let body = Json(json!({
                    "success": false,
                    "message": message,
                    "diagnostics": diagnostics,
                }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };

        // 결과: { "error": { "code": "not_found", "message": "Resource not found" } }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
