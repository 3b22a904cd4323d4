//! # 복제본(replica) 클라이언트
//!
//! - `replica`: 타이머 하나의 로컬 카운트다운과 보정 규칙
//! - `storage`: 타이머별 로컬 저장 파일
//! - `connection`: 권한자 연결, 재연결 대기, heartbeat
//! - `runtime`: 위 셋을 묶어 명령과 이벤트를 처리하는 루프

pub mod connection;
pub mod replica;
pub mod runtime;
pub mod storage;

pub use connection::*;
pub use replica::*;
pub use runtime::*;
pub use storage::*;
