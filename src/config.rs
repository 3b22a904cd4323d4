//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버/클라이언트 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져오며, 모든 항목에 기본값이 있습니다.
//!
//! 서버 설정 항목:
//! - `HOST`, `PORT`: 서버 바인딩 주소
//! - `DATA_PATH`: 통계 스냅샷(`stats_<date>.json`) 저장 디렉토리
//! - `STATIC_PATH`: 프론트엔드 정적 파일 디렉토리
//! - `DEFAULT_TOTAL_SECONDS`: 타이머 하루 예산
//! - `REPORT_COMMAND`, `REPORT_ARGS`, `REPORT_URL`: 외부 리포트 프로세스
//!
//! 클라이언트 설정 항목:
//! - `SERVER_URL`: 권한자 WebSocket 주소
//! - `STATE_PATH`: 타이머별 로컬 저장 파일 디렉토리

use std::env;

use crate::models::DEFAULT_TOTAL_SECONDS;

/// 서버(authority) 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
    /// 통계 스냅샷 저장 디렉토리 (기본값: "data")
    pub data_path: String,
    /// 정적 프론트엔드 파일 디렉토리 (기본값: "public")
    pub static_path: String,
    /// 타이머 하루 예산 (초)
    pub default_total_seconds: u64,
    /// 리포트 생성 프로그램 (기본값: "python3")
    pub report_command: String,
    /// 스냅샷 경로 앞에 붙는 인자들 (기본값: ["collect.py"])
    pub report_args: Vec<String>,
    /// 프로그램이 위치를 출력하지 않았을 때 돌려줄 리포트 주소
    pub report_url: String,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// 파싱할 수 없는 숫자 값은 조용히 기본값으로 대체됩니다.
    pub fn from_env() -> Self {
        Self {
            host: var_or("HOST", "0.0.0.0"),
            port: var_or("PORT", "3000").parse().unwrap_or(3000),
            data_path: var_or("DATA_PATH", "data"),
            static_path: var_or("STATIC_PATH", "public"),
            default_total_seconds: env::var("DEFAULT_TOTAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TOTAL_SECONDS),
            report_command: var_or("REPORT_COMMAND", "python3"),
            report_args: var_or("REPORT_ARGS", "collect.py")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            report_url: var_or("REPORT_URL", "/report.html"),
        }
    }
}

/// 클라이언트(replica) 설정
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 권한자 WebSocket 주소 (기본값: "ws://127.0.0.1:3000/ws")
    pub server_url: String,
    /// 로컬 저장 디렉토리 (기본값: ".studysync")
    pub state_path: String,
    pub default_total_seconds: u64,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            server_url: var_or("SERVER_URL", "ws://127.0.0.1:3000/ws"),
            state_path: var_or("STATE_PATH", ".studysync"),
            default_total_seconds: env::var("DEFAULT_TOTAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TOTAL_SECONDS),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
