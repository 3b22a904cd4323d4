//! # 타이머 복제본(TimerReplica) 상태 기계
//!
//! 클라이언트가 화면 표시와 낙관적 로컬 카운트다운을 위해 가진 타이머 하나의 사본입니다.
//! 권한자의 상태가 도착하면 **병합하지 않고 보정(reconcile)**합니다.
//!
//! ```text
//!            start (remaining > 0)
//!   Idle ───────────────────────────▶ Running ──┐ tick (1초마다)
//!    ▲                                 │   ▲    │
//!    └──────────── pause ──────────────┘   └────┘
//!                                       │
//!                          tick → 0     ▼
//!                                    Finished
//! ```
//!
//! 모든 연산은 현재 시각을 인자로 받는 순수한 동기 함수입니다.
//! 반환하는 `Effect`로 호출자가 로컬 저장과 권한자 전송을 결정합니다.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::storage::StoredTimer;
use crate::{clock, models::Timer};

/// 실행 중 권한자로 상태를 보내는 주기
pub const PUSH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 정지. 남은 시간이 고정됨
    Idle,
    /// 로컬에서 1초마다 카운트다운 중
    Running,
    /// 남은 시간 0. 실행은 강제로 꺼짐
    Finished,
}

/// 연산 결과로 호출자가 해야 할 일
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Unchanged,
    /// 로컬 저장소에만 기록
    Persist,
    /// 로컬 저장소에 기록하고 권한자에게도 전송
    PersistAndPush,
}

#[derive(Debug, Clone)]
pub struct TimerReplica {
    id: String,
    name: String,
    total_seconds: u64,
    remaining_seconds: u64,
    phase: Phase,
    last_push: DateTime<Utc>,
    push_interval: Duration,
}

impl TimerReplica {
    /// 예산이 가득 찬 `Idle` 상태로 만듭니다.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        total_seconds: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            total_seconds,
            remaining_seconds: total_seconds,
            phase: Phase::Idle,
            last_push: now,
            push_interval: PUSH_INTERVAL,
        }
    }

    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.push_interval = interval;
        self
    }

    /// 로컬 저장소의 기록으로 복원합니다.
    ///
    /// - 기록이 없거나 `dayKey`가 오늘과 다르면 오래된 것으로 보고 기본값으로 시작합니다.
    /// - 실행 중으로 기록돼 있었다면 그 사이 흐른 시간만큼 빼고 이어서 실행합니다.
    ///   0이 되면 `Finished`로 바로 넘어가며, 이때는 권한자에게도 알려야 합니다.
    pub fn restore(
        id: impl Into<String>,
        default_name: impl Into<String>,
        default_total: u64,
        stored: Option<StoredTimer>,
        today_key: &str,
        now: DateTime<Utc>,
    ) -> (Self, Effect) {
        let mut replica = Self::new(id, default_name, default_total, now);
        let Some(stored) = stored.filter(|s| s.day_key == today_key) else {
            return (replica, Effect::Unchanged);
        };

        replica.total_seconds = stored.total_seconds;
        replica.remaining_seconds = stored.remaining_seconds.min(stored.total_seconds);

        if !stored.running {
            replica.phase = if replica.remaining_seconds == 0 {
                Phase::Finished
            } else {
                Phase::Idle
            };
            return (replica, Effect::Unchanged);
        }

        let elapsed = clock::elapsed_whole_seconds(stored.last_updated, now);
        replica.remaining_seconds = replica.remaining_seconds.saturating_sub(elapsed);
        replica.phase = if replica.remaining_seconds == 0 {
            Phase::Finished
        } else {
            Phase::Running
        };
        (replica, Effect::PersistAndPush)
    }

    /// `Idle`/`Finished`에서만 시작합니다. 남은 시간이 없으면 `Finished`로 확정합니다.
    pub fn start(&mut self, now: DateTime<Utc>) -> Effect {
        if self.phase == Phase::Running {
            return Effect::Unchanged;
        }
        if self.remaining_seconds == 0 {
            self.phase = Phase::Finished;
            return Effect::PersistAndPush;
        }
        self.phase = Phase::Running;
        self.last_push = now;
        Effect::PersistAndPush
    }

    /// `Running`에서만 멈춥니다.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Effect {
        if self.phase != Phase::Running {
            return Effect::Unchanged;
        }
        self.phase = Phase::Idle;
        self.last_push = now;
        Effect::PersistAndPush
    }

    /// 1초 진행. 0에 닿으면 `Finished`가 되고 마지막 상태를 전송합니다.
    /// 그 외에는 `push_interval`마다 한 번씩 전송합니다.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Effect {
        if self.phase != Phase::Running {
            return Effect::Unchanged;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = Phase::Finished;
            self.last_push = now;
            return Effect::PersistAndPush;
        }

        let since_push = (now - self.last_push).to_std().unwrap_or(Duration::ZERO);
        if since_push >= self.push_interval {
            self.last_push = now;
            Effect::PersistAndPush
        } else {
            Effect::Persist
        }
    }

    /// 권한자가 보낸 상태로 로컬 카운트다운을 보정합니다.
    ///
    /// - 서버가 실행 중이면 `lastUpdated` 이후 흐른 시간을 빼서 남은 시간을 정합니다.
    ///   0이면 `Finished`, 아니면 보정된 값을 기준으로 `Running`을 유지하거나 시작합니다.
    /// - 서버가 정지 상태면 카운트다운이 진행되지 않았으므로 값을 그대로 받습니다.
    ///
    /// 권한자가 이미 아는 상태이므로 여기서 생긴 전환은 다시 전송하지 않습니다.
    /// 예외는 실행 중인 타이머의 시간이 이미 다 흐른 경우입니다. 권한자는 스스로
    /// 카운트다운하지 않으므로 끝난 상태를 한 번 전송합니다.
    pub fn reconcile(&mut self, server: &Timer, now: DateTime<Utc>) -> Effect {
        self.name = server.name.clone();
        self.total_seconds = server.total_seconds;

        if server.running {
            let elapsed = clock::elapsed_whole_seconds(server.last_updated, now);
            self.remaining_seconds = server
                .remaining_seconds
                .saturating_sub(elapsed)
                .min(self.total_seconds);
            if self.remaining_seconds == 0 {
                self.phase = Phase::Finished;
                self.last_push = now;
                return Effect::PersistAndPush;
            } else if self.phase != Phase::Running {
                self.phase = Phase::Running;
                self.last_push = now;
            }
        } else {
            self.remaining_seconds = server.remaining_seconds.min(self.total_seconds);
            self.phase = if self.remaining_seconds == 0 {
                Phase::Finished
            } else {
                Phase::Idle
            };
        }
        Effect::Persist
    }

    /// 권한자로 보낼 전체 상태
    pub fn to_timer(&self, now: DateTime<Utc>) -> Timer {
        Timer {
            name: self.name.clone(),
            total_seconds: self.total_seconds,
            remaining_seconds: self.remaining_seconds,
            running: self.is_running(),
            last_updated: now,
        }
    }

    /// 로컬 저장소에 기록할 형태
    pub fn to_stored(&self, now: DateTime<Utc>, day_key: &str) -> StoredTimer {
        StoredTimer {
            name: self.name.clone(),
            total_seconds: self.total_seconds,
            remaining_seconds: self.remaining_seconds,
            running: self.is_running(),
            last_updated: now,
            day_key: day_key.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }
}

/// `HH:MM:SS` 형식으로 표시합니다.
pub fn format_hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
