//! # StudySync
//!
//! 공부 시간 카운트다운 타이머 세 개를 여러 클라이언트 사이에서 동기화합니다.
//!
//! 모듈 구조:
//! - `authority`: 타이머의 단일 권한자 (상태, 연결 목록, 액터 루프)
//! - `client`: 복제본 클라이언트 (로컬 카운트다운, 보정, 재연결)
//! - `models`: 타이머, 통계, 동기화 메시지 타입
//! - `routes`: HTTP/WebSocket 핸들러
//! - `services`: 스냅샷 저장, 리포트 프로세스 실행
//! - `clock`, `config`, `error`: 공통 유틸리티

pub mod authority;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
