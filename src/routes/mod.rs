//! # 라우트 핸들러 모듈
//!
//! HTTP 요청과 WebSocket 업그레이드를 처리하는 핸들러 함수들입니다.
//!
//! 각 하위 모듈:
//! - `health`: 서버 상태 확인
//! - `report`: 외부 리포트 생성
//! - `stats`: 오늘의 공부 시간 통계
//! - `timers`: 타이머 조회와 채널 밖 갱신
//! - `ws`: 동기화 채널

pub mod health;
pub mod report;
pub mod stats;
pub mod timers;
pub mod ws;

use std::sync::Arc;

pub use health::*;
pub use report::*;
pub use stats::*;
pub use timers::*;
pub use ws::*;

use crate::{
    authority::AuthorityHandle,
    services::{ReportRunner, SnapshotStore},
};

/// 애플리케이션 공유 상태
///
/// 타이머 상태 자체는 여기 없습니다. 핸들러는 `authority` 핸들로
/// 권한자 액터에게 요청할 뿐 상태를 직접 만지지 않습니다.
#[derive(Clone)]
pub struct AppState {
    pub authority: AuthorityHandle,
    pub snapshots: SnapshotStore,
    pub reports: Arc<ReportRunner>,
}
