//! # 시계(Clock) 유틸리티
//!
//! 일일 초기화와 스냅샷 저장에 쓰이는 날짜 문자열을 만듭니다.
//!
//! 두 가지 형식이 있습니다:
//! - **일자 키(day key)**: `2024-1-2`처럼 0으로 채우지 않는 형식.
//!   자정이 지났는지 감지하고, 로컬 저장소 기록이 오래됐는지 판정합니다.
//! - **날짜 문자열(date string)**: `2024-01-02`처럼 0으로 채운 형식.
//!   스냅샷 파일 이름과 `date` 필드에 쓰입니다.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};

/// 로컬 달력 기준의 오늘 날짜
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 일자 키를 만듭니다. 예: `2024-1-2`
pub fn day_key(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}

/// 날짜 문자열을 만듭니다. 예: `2024-01-02`
pub fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `since`부터 `now`까지 흐른 시간을 초 단위로 내림하여 반환합니다.
///
/// 시계가 거꾸로 간 경우(기기 간 시각 차이 등)에는 0을 반환합니다.
pub fn elapsed_whole_seconds(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - since).num_seconds()).unwrap_or(0)
}
