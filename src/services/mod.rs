//! # 서비스 모듈
//!
//! 권한자 바깥의 부수 효과를 담당합니다.
//! - `persistence`: 통계 스냅샷 파일 저장/로드
//! - `report`: 외부 리포트 생성 프로세스 실행
//! - `file_write`: 임시 파일을 거치는 원자적 파일 쓰기

pub mod file_write;
pub mod persistence;
pub mod report;

pub use file_write::*;
pub use persistence::*;
pub use report::*;
