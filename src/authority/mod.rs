//! # 권한자(Authority) 모듈
//!
//! 타이머 상태의 단일 정본과 그 주변 장치들입니다.
//! - `store`: 순수한 상태와 연산 (`TimerAuthority`)
//! - `broadcaster`: 연결 목록, 전파, 생존 확인
//! - `actor`: 위 둘을 독점 소유하는 태스크와 그 핸들

pub mod actor;
pub mod broadcaster;
pub mod store;

pub use actor::*;
pub use broadcaster::*;
pub use store::*;
