//! # 권한자 액터(AuthorityActor)
//!
//! `TimerAuthority`와 연결 목록(`Broadcaster`)을 **하나의 태스크**가 독점 소유합니다.
//! 바깥에서는 `AuthorityHandle`로 명령을 보내고 `oneshot`으로 답을 받습니다.
//!
//! 루프 한 바퀴는 명령 하나 또는 주기 작업 하나를 끝까지 처리합니다.
//! 처리 도중에 `.await`로 양보하지 않으므로 락 없이도 단일 작성자 불변식이 유지됩니다.
//!
//! 주기 작업 (프로세스가 살아있는 동안 계속 실행):
//! - 1시간마다 일일 초기화 확인
//! - 10분마다 통계 스냅샷 저장
//! - 60초마다 5분 이상 조용한 연결 정리

use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{interval_at, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::{
    broadcaster::{Broadcaster, ConnectionId, Outbound},
    store::TimerAuthority,
};
use crate::{
    clock,
    error::AppError,
    models::{ClientMessage, ServerMessage, StatsSnapshot, StudyStats, Timer, TimerMap},
    services::StatsPersistence,
};

/// 주기 작업 간격
#[derive(Debug, Clone, Copy)]
pub struct AuthorityTimings {
    pub reset_check: Duration,
    pub snapshot: Duration,
    pub sweep: Duration,
    pub idle_timeout: Duration,
}

impl Default for AuthorityTimings {
    fn default() -> Self {
        Self {
            reset_check: Duration::from_secs(60 * 60),
            snapshot: Duration::from_secs(10 * 60),
            sweep: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(5 * 60),
        }
    }
}

enum Command {
    Connect {
        outbound: Outbound,
        reply: oneshot::Sender<ConnectionId>,
    },
    Disconnect {
        id: ConnectionId,
    },
    Inbound {
        id: ConnectionId,
        message: ClientMessage,
    },
    PostUpdate {
        timer_id: String,
        timer: Timer,
        reply: oneshot::Sender<Option<Timer>>,
    },
    Timers {
        reply: oneshot::Sender<TimerMap>,
    },
    Stats {
        reply: oneshot::Sender<StudyStats>,
    },
    StatsSnapshot {
        reply: oneshot::Sender<StatsSnapshot>,
    },
    ResetCheck {
        today: NaiveDate,
        reply: oneshot::Sender<bool>,
    },
}

/// 권한자 액터로 명령을 보내는 핸들. 복제 비용이 싸서 핸들러마다 하나씩 가집니다.
#[derive(Clone)]
pub struct AuthorityHandle {
    tx: mpsc::Sender<Command>,
}

impl AuthorityHandle {
    /// 연결을 등록합니다. 액터는 `init` 프레임을 곧바로 `outbound`에 넣습니다.
    pub async fn connect(&self, outbound: Outbound) -> Result<ConnectionId, AppError> {
        self.request(|reply| Command::Connect { outbound, reply }).await
    }

    pub async fn disconnect(&self, id: ConnectionId) {
        let _ = self.tx.send(Command::Disconnect { id }).await;
    }

    /// 연결에서 받은 메시지를 넘깁니다.
    pub async fn inbound(&self, id: ConnectionId, message: ClientMessage) -> Result<(), AppError> {
        self.tx
            .send(Command::Inbound { id, message })
            .await
            .map_err(|_| AppError::AuthorityUnavailable)
    }

    /// 채널 밖(REST)에서 들어온 갱신. 모든 연결로 전파됩니다.
    /// 알 수 없는 타이머면 `None`.
    pub async fn post_update(
        &self,
        timer_id: String,
        timer: Timer,
    ) -> Result<Option<Timer>, AppError> {
        self.request(|reply| Command::PostUpdate {
            timer_id,
            timer,
            reply,
        })
        .await
    }

    pub async fn timers(&self) -> Result<TimerMap, AppError> {
        self.request(|reply| Command::Timers { reply }).await
    }

    /// 실행 중인 타이머 몫을 다시 계산한 통계
    pub async fn stats(&self) -> Result<StudyStats, AppError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn stats_snapshot(&self) -> Result<StatsSnapshot, AppError> {
        self.request(|reply| Command::StatsSnapshot { reply }).await
    }

    /// 주어진 날짜로 일일 초기화 확인을 즉시 실행합니다. 초기화했으면 `true`.
    pub async fn reset_check(&self, today: NaiveDate) -> Result<bool, AppError> {
        self.request(|reply| Command::ResetCheck { today, reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| AppError::AuthorityUnavailable)?;
        rx.await.map_err(|_| AppError::AuthorityUnavailable)
    }
}

pub struct AuthorityActor {
    authority: TimerAuthority,
    broadcaster: Broadcaster,
    persistence: StatsPersistence,
    timings: AuthorityTimings,
}

impl AuthorityActor {
    /// 액터 태스크를 띄우고 핸들을 반환합니다.
    /// 모든 핸들이 사라지면 루프가 끝납니다.
    pub fn spawn(
        authority: TimerAuthority,
        persistence: StatsPersistence,
        timings: AuthorityTimings,
    ) -> (AuthorityHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(256);
        let actor = Self {
            authority,
            broadcaster: Broadcaster::new(),
            persistence,
            timings,
        };
        let task = tokio::spawn(actor.run(rx));
        (AuthorityHandle { tx }, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut reset_check = ticker(self.timings.reset_check);
        let mut snapshot = ticker(self.timings.snapshot);
        let mut sweep = ticker(self.timings.sweep);

        info!("Timer authority started (day {})", self.authority.day_key());
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = reset_check.tick() => {
                    self.check_rollover(clock::today());
                }
                _ = snapshot.tick() => {
                    self.persistence.submit(self.authority.stats_snapshot());
                }
                _ = sweep.tick() => {
                    let swept = self.broadcaster.sweep(Instant::now(), self.timings.idle_timeout);
                    if !swept.is_empty() {
                        debug!("Swept {} inactive connections", swept.len());
                    }
                }
            }
        }
        info!("Timer authority stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { outbound, reply } => {
                let id = self.broadcaster.register(outbound, Instant::now());
                let init = ServerMessage::Init {
                    data: self.authority.snapshot_all(),
                };
                self.broadcaster.send_to(id, &init);
                let _ = reply.send(id);
            }
            Command::Disconnect { id } => {
                self.broadcaster.remove(id);
            }
            Command::Inbound { id, message } => {
                self.broadcaster.touch(id, Instant::now());
                match message {
                    ClientMessage::UpdateTimer { timer_id, data } => {
                        self.apply_and_broadcast(timer_id, data, Some(id));
                    }
                    ClientMessage::Ping => {
                        self.broadcaster.send_to(id, &ServerMessage::Pong);
                    }
                }
            }
            Command::PostUpdate {
                timer_id,
                timer,
                reply,
            } => {
                let applied = self.apply_and_broadcast(timer_id, timer, None);
                let _ = reply.send(applied);
            }
            Command::Timers { reply } => {
                let _ = reply.send(self.authority.snapshot_all());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.authority.compute_stats());
            }
            Command::StatsSnapshot { reply } => {
                let _ = reply.send(self.authority.stats_snapshot());
            }
            Command::ResetCheck { today, reply } => {
                let _ = reply.send(self.check_rollover(today));
            }
        }
    }

    /// 갱신을 적용하고 `origin`을 뺀 모든 연결에 새 상태를 보냅니다.
    fn apply_and_broadcast(
        &mut self,
        timer_id: String,
        timer: Timer,
        origin: Option<ConnectionId>,
    ) -> Option<Timer> {
        let applied = self.authority.apply_update(&timer_id, timer)?;
        debug!(
            "Applied {} (remaining {}, running {}, +{}s studied)",
            timer_id,
            applied.timer.remaining_seconds,
            applied.timer.running,
            applied.studied_delta
        );

        let message = ServerMessage::TimerUpdate {
            timer_id,
            data: applied.timer.clone(),
        };
        self.broadcaster.broadcast(&message, origin);
        Some(applied.timer)
    }

    fn check_rollover(&mut self, today: NaiveDate) -> bool {
        let Some(rollover) = self.authority.check_day_rollover(today, Utc::now()) else {
            return false;
        };

        // 전날 스냅샷이 초기화 상태보다 먼저 쓰기 태스크에 도착해야 합니다.
        self.persistence.submit(rollover.snapshot);
        let delivered = self
            .broadcaster
            .broadcast(&ServerMessage::ResetAll { data: rollover.timers }, None);
        if delivered == 0 && !self.broadcaster.is_empty() {
            warn!("Reset broadcast reached no connections");
        }
        true
    }
}

/// 첫 틱을 한 주기 뒤로 미룬 interval
fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
