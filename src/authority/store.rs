//! # 타이머 권한자(TimerAuthority)
//!
//! 모든 타이머와 통계의 정본(canonical)을 가진 단일 저장소입니다.
//! 이 구조체는 순수한 상태와 연산만 가지며, 현재 시각은 항상 인자로 받습니다.
//! 동시 접근 제어는 이 구조체를 소유한 액터(`actor.rs`)가 담당합니다.
//!
//! ## 일관성 모델: 마지막 쓰기 승리(last-writer-wins)
//! `apply_update`는 들어온 상태로 타이머 레코드 **전체를 교체**합니다.
//! 두 복제본이 같은 타이머를 동시에 갱신하면 권한자에 늦게 도착한 쪽이 이깁니다.
//! 필드 단위 병합을 하지 않으므로 진짜 동시 편집에서는 갱신이 유실될 수 있습니다.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::{
    clock,
    models::{default_timers, StatsSnapshot, StudyStats, Timer, TimerMap},
};

/// `apply_update`의 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpdate {
    /// 새 정본 상태 (다른 복제본으로 전파할 값)
    pub timer: Timer,
    /// 이번 갱신으로 늘어난 학습 시간 = max(0, 이전 remaining - 새 remaining)
    pub studied_delta: u64,
}

/// 일일 초기화가 일어났을 때 바깥에서 처리해야 할 일
#[derive(Debug, Clone, PartialEq)]
pub struct Rollover {
    /// 초기화 직전 상태로 만든 **전날** 스냅샷
    pub snapshot: StatsSnapshot,
    /// 초기화된 타이머 전체 (`reset_all`로 전파)
    pub timers: TimerMap,
}

pub struct TimerAuthority {
    timers: TimerMap,
    stats: StudyStats,
    day_key: String,
    default_total_seconds: u64,
}

impl TimerAuthority {
    /// 기본 상태로 권한자를 만듭니다.
    pub fn new(today: NaiveDate, default_total_seconds: u64, now: DateTime<Utc>) -> Self {
        let timers = default_timers(default_total_seconds, now);
        let stats = StudyStats::for_timers(clock::date_string(today), &timers);
        Self {
            timers,
            stats,
            day_key: clock::day_key(today),
            default_total_seconds,
        }
    }

    /// 오늘 날짜의 스냅샷으로 학습 시간과 남은 시간을 복원합니다.
    ///
    /// 스냅샷 날짜가 오늘이 아니면 아무것도 하지 않습니다.
    pub fn seed_from_snapshot(&mut self, snapshot: &StatsSnapshot) {
        if snapshot.date != self.stats.date {
            warn!(
                "Ignoring snapshot for {} (today is {})",
                snapshot.date, self.stats.date
            );
            return;
        }

        for timer in self.timers.values_mut() {
            let Some(record) = snapshot.timers.get(&timer.name) else {
                continue;
            };
            let studied = record.studied_seconds_or_estimate();
            timer.remaining_seconds = timer.total_seconds.saturating_sub(studied);
            timer.running = false;
            self.stats.add_studied(&timer.name, timer.total_seconds, studied);
        }
        info!("Seeded timers from snapshot {}", snapshot.date);
    }

    /// 클라이언트가 보낸 전체 상태로 타이머를 교체합니다.
    ///
    /// 알 수 없는 `timer_id`는 로그만 남기고 `None`을 반환합니다.
    /// 학습 시간 증가분은 **현재 저장된 값**과 비교해 계산하므로,
    /// 이미 적용된 갱신을 다시 보내도 증가분은 0입니다.
    pub fn apply_update(&mut self, timer_id: &str, incoming: Timer) -> Option<AppliedUpdate> {
        let Some(slot) = self.timers.get_mut(timer_id) else {
            warn!("Ignoring update for unknown timer {}", timer_id);
            return None;
        };

        let old_remaining = slot.remaining_seconds;
        *slot = incoming.clamped();
        let timer = slot.clone();

        let studied_delta = old_remaining.saturating_sub(timer.remaining_seconds);
        if studied_delta > 0 {
            self.stats
                .add_studied(&timer.name, timer.total_seconds, studied_delta);
        }

        Some(AppliedUpdate {
            timer,
            studied_delta,
        })
    }

    /// 모든 타이머의 현재 상태 (읽기 전용 복사본)
    pub fn snapshot_all(&self) -> TimerMap {
        self.timers.clone()
    }

    pub fn timer(&self, timer_id: &str) -> Option<&Timer> {
        self.timers.get(timer_id)
    }

    /// 실행 중인 타이머의 학습 시간을 `total - remaining`으로 다시 계산한 통계.
    ///
    /// 정지된 타이머의 누적 값은 건드리지 않습니다. 실행 중에 예산이 바뀌었다면
    /// 그 이름으로 앞서 누적된 값이 이 재계산으로 덮어써집니다.
    pub fn compute_stats(&mut self) -> StudyStats {
        for timer in self.timers.values().filter(|t| t.running) {
            let entry = self
                .stats
                .timers
                .entry(timer.name.clone())
                .or_insert(crate::models::StudyStatsEntry {
                    total_seconds: timer.total_seconds,
                    studied_seconds: 0,
                });
            entry.total_seconds = timer.total_seconds;
            entry.studied_seconds = timer.consumed_seconds();
        }
        self.stats.clone()
    }

    /// 통계를 최신화한 뒤 파일 저장 형식으로 변환합니다.
    pub fn stats_snapshot(&mut self) -> StatsSnapshot {
        StatsSnapshot::from_stats(&self.compute_stats())
    }

    /// 날짜가 바뀌었는지 확인하고, 바뀌었으면 전체를 초기화합니다.
    ///
    /// 초기화 순서:
    /// 1. 현재 통계로 전날 날짜가 붙은 스냅샷 생성
    /// 2. 모든 타이머를 이름만 유지한 채 기본 예산으로 되돌림
    /// 3. 통계를 0으로 초기화
    /// 4. 저장된 일자 키 갱신
    pub fn check_day_rollover(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Option<Rollover> {
        let new_key = clock::day_key(today);
        if new_key == self.day_key {
            return None;
        }

        info!("Day changed ({} -> {}), resetting timers", self.day_key, new_key);
        let snapshot = self.stats_snapshot();

        for timer in self.timers.values_mut() {
            timer.reset(self.default_total_seconds, now);
        }
        self.stats = StudyStats::for_timers(clock::date_string(today), &self.timers);
        self.day_key = new_key;

        Some(Rollover {
            snapshot,
            timers: self.timers.clone(),
        })
    }

    pub fn day_key(&self) -> &str {
        &self.day_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SnapshotRecord, SnapshotSummary, DEFAULT_TOTAL_SECONDS};
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn authority() -> TimerAuthority {
        TimerAuthority::new(day(2024, 1, 1), DEFAULT_TOTAL_SECONDS, t0())
    }

    fn state(name: &str, remaining: u64, running: bool) -> Timer {
        Timer {
            name: name.to_string(),
            total_seconds: DEFAULT_TOTAL_SECONDS,
            remaining_seconds: remaining,
            running,
            last_updated: t0(),
        }
    }

    #[test]
    fn apply_update_replaces_record_and_counts_delta() {
        let mut authority = authority();
        let applied = authority
            .apply_update("timer1", state("research", 10770, false))
            .unwrap();
        assert_eq!(applied.studied_delta, 30);
        assert_eq!(authority.timer("timer1").unwrap().remaining_seconds, 10770);
        assert_eq!(authority.compute_stats().timers["research"].studied_seconds, 30);
    }

    #[test]
    fn replayed_update_contributes_nothing() {
        let mut authority = authority();
        authority.apply_update("timer1", state("research", 10700, true));
        let replay = authority
            .apply_update("timer1", state("research", 10700, true))
            .unwrap();
        assert_eq!(replay.studied_delta, 0);
    }

    #[test]
    fn remaining_increase_never_reduces_studied() {
        let mut authority = authority();
        authority.apply_update("timer2", state("exam-prep", 10000, false));
        let applied = authority
            .apply_update("timer2", state("exam-prep", 10800, false))
            .unwrap();
        assert_eq!(applied.studied_delta, 0);
        assert_eq!(authority.compute_stats().timers["exam-prep"].studied_seconds, 800);
    }

    #[test]
    fn unknown_timer_is_ignored() {
        let mut authority = authority();
        let before = authority.snapshot_all();
        assert!(authority.apply_update("timer9", state("x", 1, true)).is_none());
        assert_eq!(authority.snapshot_all(), before);
    }

    #[test]
    fn incoming_remaining_is_clamped_to_total() {
        let mut authority = authority();
        let mut bogus = state("research", 99_999, false);
        bogus.total_seconds = 600;
        let applied = authority.apply_update("timer1", bogus).unwrap();
        assert_eq!(applied.timer.remaining_seconds, 600);
    }

    #[test]
    fn renamed_timer_accumulates_under_new_name() {
        let mut authority = authority();
        authority.apply_update("timer3", state("reading", 10740, false));
        let stats = authority.compute_stats();
        assert_eq!(stats.timers["reading"].studied_seconds, 60);
        assert_eq!(stats.timers["other"].studied_seconds, 0);
    }

    #[test]
    fn compute_stats_rederives_running_timers_only() {
        let mut authority = authority();
        authority.apply_update("timer1", state("research", 10000, true));
        authority.apply_update("timer2", state("exam-prep", 10500, false));
        // 실행 중인 타이머를 직접 한 번 더 진행시킨 상태를 흉내냅니다.
        authority.timers.get_mut("timer1").unwrap().remaining_seconds = 9000;

        let stats = authority.compute_stats();
        assert_eq!(stats.timers["research"].studied_seconds, 1800);
        assert_eq!(stats.timers["exam-prep"].studied_seconds, 300);
    }

    #[test]
    fn same_day_check_is_a_no_op() {
        let mut authority = authority();
        assert!(authority.check_day_rollover(day(2024, 1, 1), t0()).is_none());
        assert_eq!(authority.day_key(), "2024-1-1");
    }

    #[test]
    fn rollover_snapshots_previous_day_then_resets() {
        let mut authority = authority();
        authority.apply_update("timer1", state("research", 7200, false));
        let mut renamed = state("thesis", 10000, true);
        renamed.total_seconds = 12000;
        authority.apply_update("timer2", renamed);

        let rollover = authority
            .check_day_rollover(day(2024, 1, 2), t0())
            .unwrap();

        assert_eq!(rollover.snapshot.date, "2024-01-01");
        assert_eq!(rollover.snapshot.timers["research"].studied_minutes, 60);
        assert_eq!(authority.day_key(), "2024-1-2");

        for timer in rollover.timers.values() {
            assert_eq!(timer.remaining_seconds, timer.total_seconds);
            assert!(!timer.running);
        }
        assert_eq!(rollover.timers["timer2"].name, "thesis");

        let stats = authority.compute_stats();
        assert_eq!(stats.date, "2024-01-02");
        assert!(stats.timers.values().all(|e| e.studied_seconds == 0));
    }

    #[test]
    fn oversized_budgets_saturate_instead_of_overflowing() {
        let mut authority = authority();
        let huge = |remaining| Timer {
            name: "research".to_string(),
            total_seconds: u64::MAX,
            remaining_seconds: remaining,
            running: false,
            last_updated: t0(),
        };

        for remaining in [u64::MAX, 0, u64::MAX, 0] {
            authority.apply_update("timer1", huge(remaining)).unwrap();
        }
        assert_eq!(
            authority.compute_stats().timers["research"].studied_seconds,
            u64::MAX
        );

        let mut other = huge(u64::MAX);
        other.name = "exam-prep".to_string();
        other.running = true;
        authority.apply_update("timer2", other).unwrap();

        let snapshot = authority.stats_snapshot();
        assert_eq!(snapshot.summary.total_studied_minutes, u64::MAX / 60);
        assert!(snapshot.summary.total_possible_hours > 0.0);
    }

    #[test]
    fn seed_restores_todays_progress() {
        let mut authority = authority();
        let mut timers = std::collections::BTreeMap::new();
        timers.insert(
            "research".to_string(),
            SnapshotRecord {
                total_hours: 3.0,
                studied_hours: 0.5,
                studied_minutes: 30,
                completion_percentage: 16.7,
                remaining_hours: 2.5,
                total_seconds: Some(10800),
                studied_seconds: Some(1805),
            },
        );
        let snapshot = StatsSnapshot {
            date: "2024-01-01".to_string(),
            timers,
            summary: SnapshotSummary {
                total_possible_hours: 9.0,
                total_studied_hours: 0.5,
                total_studied_minutes: 30,
                overall_completion: 5.6,
            },
        };

        authority.seed_from_snapshot(&snapshot);
        assert_eq!(authority.timer("timer1").unwrap().remaining_seconds, 8995);
        assert_eq!(authority.compute_stats().timers["research"].studied_seconds, 1805);

        let mut stale = snapshot;
        stale.date = "2023-12-31".to_string();
        let mut fresh = self::authority();
        fresh.seed_from_snapshot(&stale);
        assert_eq!(fresh.timer("timer1").unwrap().remaining_seconds, 10800);
    }
}
