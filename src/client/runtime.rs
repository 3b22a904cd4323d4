//! # 클라이언트 런타임
//!
//! 세 개의 `TimerReplica`를 소유하고 세 가지 입력을 한 루프에서 처리합니다.
//!
//! - 사용자 명령 (`start`, `pause`, `toggle`, `status`, `quit`)
//! - 실행 중인 복제본마다 하나씩 도는 1초 틱 태스크
//! - 연결 관리자가 전달하는 `ConnectionEvent`
//!
//! 연산 결과(`Effect`)에 따라 로컬 저장소에 기록하고 필요하면 권한자로 전송합니다.

use std::{
    collections::{BTreeMap, HashMap},
    str::FromStr,
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant},
};
use tracing::{debug, info, warn};

use super::{
    connection::{ConnectionEvent, ConnectionHandle},
    replica::{format_hms, Effect, Phase, TimerReplica, PUSH_INTERVAL},
    storage::LocalStore,
};
use crate::{
    clock,
    models::{ClientMessage, ServerMessage, Timer, TimerMap, TIMER_DEFAULTS},
};

#[derive(Debug, Clone, Copy)]
pub struct ReplicaTimings {
    pub tick: Duration,
    pub push_interval: Duration,
}

impl Default for ReplicaTimings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            push_interval: PUSH_INTERVAL,
        }
    }
}

/// 터미널에서 입력받는 명령. 대상은 타이머 id 또는 이름입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Start(String),
    Pause(String),
    Toggle(String),
    Status,
    Quit,
}

impl FromStr for UserCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?;
        let target = words.next().map(str::to_string);

        match (verb, target) {
            ("start", Some(t)) => Ok(Self::Start(t)),
            ("pause", Some(t)) => Ok(Self::Pause(t)),
            ("toggle", Some(t)) => Ok(Self::Toggle(t)),
            ("start" | "pause" | "toggle", None) => Err(format!("usage: {} <timer>", verb)),
            ("status", _) => Ok(Self::Status),
            ("quit" | "exit", _) => Ok(Self::Quit),
            _ => Err(format!("unknown command: {}", verb)),
        }
    }
}

enum Input {
    Tick(String),
    Command(UserCommand),
    Event(ConnectionEvent),
    Shutdown,
}

pub struct ClientRuntime {
    replicas: BTreeMap<String, TimerReplica>,
    tickers: HashMap<String, JoinHandle<()>>,
    tick_tx: mpsc::UnboundedSender<String>,
    tick_rx: mpsc::UnboundedReceiver<String>,
    store: LocalStore,
    connection: ConnectionHandle,
    timings: ReplicaTimings,
    connected: bool,
}

impl ClientRuntime {
    /// 모든 타이머를 기본 예산으로 시작합니다.
    pub fn new(
        store: LocalStore,
        connection: ConnectionHandle,
        timings: ReplicaTimings,
        default_total: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let replicas = TIMER_DEFAULTS
            .iter()
            .map(|(id, name)| {
                let replica = TimerReplica::new(*id, *name, default_total, now)
                    .with_push_interval(timings.push_interval);
                (id.to_string(), replica)
            })
            .collect();
        Self::with_replicas(replicas, store, connection, timings)
    }

    /// 로컬 저장소에서 오늘 기록을 복원합니다.
    /// 실행 중이던 타이머는 꺼져 있던 시간만큼 줄어든 채로 다시 돌기 시작합니다.
    pub async fn load(
        store: LocalStore,
        connection: ConnectionHandle,
        timings: ReplicaTimings,
        default_total: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let today = clock::day_key(clock::today());
        let mut replicas = BTreeMap::new();
        let mut effects = Vec::new();

        for (id, name) in TIMER_DEFAULTS.iter() {
            let stored = match store.load(id).await {
                Ok(stored) => stored,
                Err(e) => {
                    warn!("Ignoring local state for {}: {}", id, e);
                    None
                }
            };
            let (replica, effect) =
                TimerReplica::restore(*id, *name, default_total, stored, &today, now);
            replicas.insert(
                id.to_string(),
                replica.with_push_interval(timings.push_interval),
            );
            effects.push((id.to_string(), effect));
        }

        let mut runtime = Self::with_replicas(replicas, store, connection, timings);
        for (id, effect) in effects {
            runtime.apply(&id, effect, now).await;
        }
        runtime
    }

    fn with_replicas(
        replicas: BTreeMap<String, TimerReplica>,
        store: LocalStore,
        connection: ConnectionHandle,
        timings: ReplicaTimings,
    ) -> Self {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        Self {
            replicas,
            tickers: HashMap::new(),
            tick_tx,
            tick_rx,
            store,
            connection,
            timings,
            connected: false,
        }
    }

    /// 명령 채널이나 이벤트 채널이 닫히거나 `quit`을 받을 때까지 실행합니다.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<UserCommand>,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        loop {
            let input = tokio::select! {
                Some(id) = self.tick_rx.recv() => Input::Tick(id),
                command = commands.recv() => match command {
                    Some(UserCommand::Quit) | None => Input::Shutdown,
                    Some(command) => Input::Command(command),
                },
                event = events.recv() => match event {
                    Some(event) => Input::Event(event),
                    None => Input::Shutdown,
                },
            };

            let now = Utc::now();
            match input {
                Input::Tick(id) => self.handle_tick(&id, now).await,
                Input::Command(command) => self.handle_command(command, now).await,
                Input::Event(event) => self.handle_event(event, now).await,
                Input::Shutdown => break,
            }
        }

        for (_, ticker) in self.tickers.drain() {
            ticker.abort();
        }
        info!("Client stopped");
    }

    pub async fn handle_command(&mut self, command: UserCommand, now: DateTime<Utc>) {
        let target = match &command {
            UserCommand::Start(target)
            | UserCommand::Pause(target)
            | UserCommand::Toggle(target) => target.clone(),
            UserCommand::Status => {
                for line in self.status_lines() {
                    println!("{}", line);
                }
                return;
            }
            UserCommand::Quit => return,
        };

        let Some(id) = self.resolve(&target) else {
            warn!("Unknown timer: {}", target);
            return;
        };
        let Some(replica) = self.replicas.get_mut(&id) else {
            return;
        };
        let effect = match command {
            UserCommand::Start(_) => replica.start(now),
            UserCommand::Pause(_) => replica.pause(now),
            UserCommand::Toggle(_) if replica.is_running() => replica.pause(now),
            UserCommand::Toggle(_) => replica.start(now),
            UserCommand::Status | UserCommand::Quit => Effect::Unchanged,
        };
        self.apply(&id, effect, now).await;
    }

    pub async fn handle_tick(&mut self, id: &str, now: DateTime<Utc>) {
        let Some(replica) = self.replicas.get_mut(id) else {
            return;
        };
        let effect = replica.tick(now);
        if replica.phase() == Phase::Finished && effect == Effect::PersistAndPush {
            info!("{} finished", replica.name());
        }
        self.apply(id, effect, now).await;
    }

    pub async fn handle_event(&mut self, event: ConnectionEvent, now: DateTime<Utc>) {
        match event {
            ConnectionEvent::Connected => {
                self.connected = true;
                info!("● connected");
            }
            ConnectionEvent::Disconnected => {
                self.connected = false;
                warn!("○ disconnected, timers keep running locally");
            }
            ConnectionEvent::Message(ServerMessage::Init { data }) => {
                self.reconcile_all(data, now).await;
            }
            ConnectionEvent::Message(ServerMessage::ResetAll { data }) => {
                info!("Daily reset received");
                self.reconcile_all(data, now).await;
            }
            ConnectionEvent::Message(ServerMessage::TimerUpdate { timer_id, data }) => {
                self.reconcile(&timer_id, &data, now).await;
            }
            ConnectionEvent::Message(ServerMessage::Pong) => {}
        }
    }

    async fn reconcile_all(&mut self, timers: TimerMap, now: DateTime<Utc>) {
        for (id, timer) in &timers {
            self.reconcile(id, timer, now).await;
        }
    }

    async fn reconcile(&mut self, id: &str, timer: &Timer, now: DateTime<Utc>) {
        let Some(replica) = self.replicas.get_mut(id) else {
            debug!("Ignoring state for unknown timer {}", id);
            return;
        };
        let effect = replica.reconcile(timer, now);
        self.apply(id, effect, now).await;
    }

    /// `Effect`를 수행하고 틱 태스크를 복제본 상태에 맞춥니다.
    async fn apply(&mut self, id: &str, effect: Effect, now: DateTime<Utc>) {
        self.sync_ticker(id);
        if effect == Effect::Unchanged {
            return;
        }
        let Some(replica) = self.replicas.get(id) else {
            return;
        };

        let record = replica.to_stored(now, &clock::day_key(clock::today()));
        let push = (effect == Effect::PersistAndPush).then(|| ClientMessage::UpdateTimer {
            timer_id: id.to_string(),
            data: replica.to_timer(now),
        });

        if let Err(e) = self.store.save(id, &record).await {
            warn!("Failed to save local state for {}: {}", id, e);
        }
        if let Some(message) = push {
            if let Err(e) = self.connection.send(message) {
                debug!("Update for {} dropped: {}", id, e);
            }
        }
    }

    fn sync_ticker(&mut self, id: &str) {
        let running = self.replicas.get(id).is_some_and(TimerReplica::is_running);
        match (running, self.tickers.contains_key(id)) {
            (true, false) => {
                let ticker = spawn_ticker(id.to_string(), self.timings.tick, self.tick_tx.clone());
                self.tickers.insert(id.to_string(), ticker);
            }
            (false, true) => {
                if let Some(ticker) = self.tickers.remove(id) {
                    ticker.abort();
                }
            }
            _ => {}
        }
    }

    /// id 또는 이름으로 타이머를 찾습니다.
    fn resolve(&self, target: &str) -> Option<String> {
        if self.replicas.contains_key(target) {
            return Some(target.to_string());
        }
        self.replicas
            .iter()
            .find(|(_, replica)| replica.name() == target)
            .map(|(id, _)| id.clone())
    }

    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "[{}]",
            if self.connected { "connected" } else { "disconnected" }
        )];
        lines.extend(self.replicas.values().map(|replica| {
            let phase = match replica.phase() {
                Phase::Idle => "paused",
                Phase::Running => "running",
                Phase::Finished => "finished",
            };
            format!(
                "{:<8} {:<12} {} / {} {}",
                replica.id(),
                replica.name(),
                format_hms(replica.remaining_seconds()),
                format_hms(replica.total_seconds()),
                phase
            )
        }));
        lines
    }

    pub fn replica(&self, id: &str) -> Option<&TimerReplica> {
        self.replicas.get(id)
    }

    pub fn is_ticking(&self, id: &str) -> bool {
        self.tickers.contains_key(id)
    }
}

fn spawn_ticker(id: String, period: Duration, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if tx.send(id.clone()).is_err() {
                break;
            }
        }
    })
}
