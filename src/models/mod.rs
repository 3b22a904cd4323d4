//! # 데이터 모델 모듈
//!
//! 서버와 클라이언트가 함께 쓰는 데이터 구조체들입니다.
//! - `timer`: 카운트다운 타이머 상태
//! - `stats`: 공부 시간 통계와 스냅샷 파일 형식
//! - `message`: 동기화 채널의 메시지 종류

pub mod message;
pub mod stats;
pub mod timer;

pub use message::*;
pub use stats::*;
pub use timer::*;
