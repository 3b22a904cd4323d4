//! # 타이머(Timer) 모델
//!
//! 세 개의 고정된 타이머(연구, 시험 준비, 기타)의 상태를 정의합니다.
//! 서버(authority)와 모든 클라이언트(replica)가 같은 구조체를 복제해서 사용합니다.
//!
//! JSON 필드는 camelCase로 직렬화됩니다:
//! `{ "name", "totalSeconds", "remainingSeconds", "running", "lastUpdated" }`

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 하루 기본 예산: 3시간
pub const DEFAULT_TOTAL_SECONDS: u64 = 3 * 3600;

/// 고정된 타이머 식별자와 기본 이름
///
/// 식별자는 절대 바뀌지 않습니다. 이름은 편집될 수 있지만
/// 일일 초기화 때에도 현재 이름이 유지됩니다.
pub const TIMER_DEFAULTS: [(&str, &str); 3] = [
    ("timer1", "research"),
    ("timer2", "exam-prep"),
    ("timer3", "other"),
];

/// 타이머 ID → 타이머 상태. 정렬된 맵이라 직렬화 순서가 항상 같습니다.
pub type TimerMap = BTreeMap<String, Timer>;

/// 하나의 카운트다운 타이머 상태
///
/// 불변식: `remaining_seconds <= total_seconds`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    /// 화면 표시용 이름 (통계도 이 이름으로 집계됩니다)
    pub name: String,
    /// 하루 예산 (초)
    pub total_seconds: u64,
    /// 남은 시간 (초). 실행 중에는 줄어들기만 합니다.
    pub remaining_seconds: u64,
    /// 카운트다운 진행 여부
    pub running: bool,
    /// 마지막으로 권한 있는 변경이 일어난 시각.
    /// 클라이언트는 이 값을 기준으로 전송 중에 흐른 시간을 보정합니다.
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl Timer {
    /// 예산이 가득 찬 정지 상태의 타이머를 만듭니다.
    pub fn new(name: impl Into<String>, total_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            total_seconds,
            remaining_seconds: total_seconds,
            running: false,
            last_updated: now,
        }
    }

    /// 이름만 유지한 채 주어진 예산으로 되돌립니다.
    pub fn reset(&mut self, total_seconds: u64, now: DateTime<Utc>) {
        self.total_seconds = total_seconds;
        self.remaining_seconds = total_seconds;
        self.running = false;
        self.last_updated = now;
    }

    /// `remaining_seconds`를 `[0, total_seconds]` 범위로 잘라냅니다.
    pub fn clamped(mut self) -> Self {
        self.remaining_seconds = self.remaining_seconds.min(self.total_seconds);
        self
    }

    /// 예산 중 이미 소진한 시간 (초)
    pub fn consumed_seconds(&self) -> u64 {
        self.total_seconds.saturating_sub(self.remaining_seconds)
    }
}

/// 기본 이름과 예산으로 세 타이머를 모두 만듭니다.
pub fn default_timers(total_seconds: u64, now: DateTime<Utc>) -> TimerMap {
    TIMER_DEFAULTS
        .iter()
        .map(|(id, name)| (id.to_string(), Timer::new(*name, total_seconds, now)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_fields() {
        let now = Utc::now();
        let timer = Timer::new("research", 10800, now);
        let value = serde_json::to_value(&timer).unwrap();
        assert_eq!(value["totalSeconds"], 10800);
        assert_eq!(value["remainingSeconds"], 10800);
        assert_eq!(value["running"], false);
        assert!(value["lastUpdated"].is_string());
    }

    #[test]
    fn missing_last_updated_defaults_to_now() {
        let timer: Timer = serde_json::from_str(
            r#"{"name":"other","totalSeconds":60,"remainingSeconds":30,"running":true}"#,
        )
        .unwrap();
        assert_eq!(timer.remaining_seconds, 30);
        assert!(timer.running);
    }

    #[test]
    fn clamped_caps_remaining_at_total() {
        let mut timer = Timer::new("other", 100, Utc::now());
        timer.remaining_seconds = 500;
        assert_eq!(timer.clamped().remaining_seconds, 100);
    }

    #[test]
    fn reset_preserves_name() {
        let mut timer = Timer::new("renamed", 100, Utc::now());
        timer.remaining_seconds = 3;
        timer.running = true;
        timer.reset(10800, Utc::now());
        assert_eq!(timer.name, "renamed");
        assert_eq!(timer.remaining_seconds, 10800);
        assert!(!timer.running);
    }

    #[test]
    fn default_timers_has_three_fixed_identities() {
        let timers = default_timers(DEFAULT_TOTAL_SECONDS, Utc::now());
        let ids: Vec<_> = timers.keys().cloned().collect();
        assert_eq!(ids, ["timer1", "timer2", "timer3"]);
        assert_eq!(timers["timer2"].name, "exam-prep");
    }
}
