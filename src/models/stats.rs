//! # 공부 시간 통계 모델
//!
//! - `StudyStatsEntry`: 타이머 이름별 누적 통계 (초 단위 원본 값)
//! - `StudyStats`: 하루치 통계 전체 (`GET /api/stats`의 응답 본문)
//! - `StatsSnapshot`: 디스크에 저장되는 파생 형식 (시간/분/백분율)
//!
//! 통계는 파생 데이터일 뿐이며 `remainingSeconds`의 원천이 아닙니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::TimerMap;

/// 이름 하나에 대한 누적 통계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStatsEntry {
    pub total_seconds: u64,
    /// 오늘 실제로 카운트다운된 시간. 하루 안에서는 늘어나기만 합니다.
    pub studied_seconds: u64,
}

/// 하루치 통계
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyStats {
    /// 날짜 문자열 (`YYYY-MM-DD`)
    pub date: String,
    pub timers: BTreeMap<String, StudyStatsEntry>,
}

impl StudyStats {
    /// 현재 타이머 이름들로 0에서 시작하는 통계를 만듭니다.
    pub fn for_timers(date: impl Into<String>, timers: &TimerMap) -> Self {
        let timers = timers
            .values()
            .map(|timer| {
                (
                    timer.name.clone(),
                    StudyStatsEntry {
                        total_seconds: timer.total_seconds,
                        studied_seconds: 0,
                    },
                )
            })
            .collect();
        Self {
            date: date.into(),
            timers,
        }
    }

    /// 이름에 학습 시간을 더합니다. 항목이 없으면 새로 만듭니다.
    pub fn add_studied(&mut self, name: &str, total_seconds: u64, delta: u64) {
        let entry = self.timers.entry(name.to_string()).or_insert(StudyStatsEntry {
            total_seconds,
            studied_seconds: 0,
        });
        // 클라이언트가 보낸 값이므로 넘치면 최댓값에서 멈춥니다.
        entry.studied_seconds = entry.studied_seconds.saturating_add(delta);
    }
}

/// 스냅샷 파일의 이름별 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub total_hours: f64,
    pub studied_hours: f64,
    pub studied_minutes: u64,
    pub completion_percentage: f64,
    pub remaining_hours: f64,
    /// 시작 시 오늘 상태를 정확히 복원하기 위한 원본 값.
    /// 이 필드가 없는 파일은 `studied_minutes`로 대신 복원합니다.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studied_seconds: Option<u64>,
}

/// 스냅샷 파일의 전체 합계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub total_possible_hours: f64,
    pub total_studied_hours: f64,
    pub total_studied_minutes: u64,
    pub overall_completion: f64,
}

/// 하루에 파일 하나(`stats_<date>.json`)로 저장되는 통계 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub date: String,
    pub timers: BTreeMap<String, SnapshotRecord>,
    pub summary: SnapshotSummary,
}

impl StatsSnapshot {
    /// 초 단위 통계에서 파생 필드를 모두 다시 계산합니다.
    pub fn from_stats(stats: &StudyStats) -> Self {
        let timers = stats
            .timers
            .iter()
            .map(|(name, entry)| {
                let record = SnapshotRecord {
                    total_hours: hours(entry.total_seconds),
                    studied_hours: hours(entry.studied_seconds),
                    studied_minutes: entry.studied_seconds / 60,
                    completion_percentage: percentage(entry.studied_seconds, entry.total_seconds),
                    remaining_hours: round_to(
                        (entry.total_seconds as f64 - entry.studied_seconds as f64) / 3600.0,
                        2,
                    ),
                    total_seconds: Some(entry.total_seconds),
                    studied_seconds: Some(entry.studied_seconds),
                };
                (name.clone(), record)
            })
            .collect();

        let total_studied = stats
            .timers
            .values()
            .fold(0u64, |acc, e| acc.saturating_add(e.studied_seconds));
        let total_time = stats
            .timers
            .values()
            .fold(0u64, |acc, e| acc.saturating_add(e.total_seconds));

        Self {
            date: stats.date.clone(),
            timers,
            summary: SnapshotSummary {
                total_possible_hours: hours(total_time),
                total_studied_hours: hours(total_studied),
                total_studied_minutes: total_studied / 60,
                overall_completion: percentage(total_studied, total_time),
            },
        }
    }
}

impl SnapshotRecord {
    /// 기록된 학습 시간 (초). 원본 값이 없으면 분 단위에서 복원합니다.
    pub fn studied_seconds_or_estimate(&self) -> u64 {
        self.studied_seconds
            .unwrap_or_else(|| self.studied_minutes.saturating_mul(60))
    }
}

fn hours(seconds: u64) -> f64 {
    round_to(seconds as f64 / 3600.0, 2)
}

/// 분모가 0이면 0%로 취급합니다.
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
