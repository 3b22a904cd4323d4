//! # 권한자 연결 관리자(ConnectionManager)
//!
//! 권한자와의 WebSocket 연결 하나를 유지하는 백그라운드 태스크입니다.
//!
//! - 연결에 실패하거나 연결이 끊기면 `BackoffPolicy`에 따라 다시 연결합니다.
//! - 연결된 동안에는 `heartbeat` 주기마다 `ping`을 보냅니다.
//!   응답이 없는 연결은 권한자 쪽 정리(sweep)가 끊어 줍니다.
//! - 받은 메시지와 연결 상태 변화는 `ConnectionEvent`로 런타임에 전달합니다.
//!
//! 연결이 없을 때 보낸 메시지는 큐에 쌓지 않고 버립니다.
//! 대신 즉시 재연결을 요청하며, 재연결 후의 `init`과 주기적 전송이 상태를 다시 맞춥니다.

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch, Notify},
    task::JoinHandle,
    time::{interval_at, sleep, Instant},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::models::{ClientMessage, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 연결이 살아 있는 동안 `ping`을 보내는 주기
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("not connected to the timer authority")]
    NotConnected,

    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),
}

/// 재연결 대기 시간 정책
///
/// 연속 실패 `f`번 뒤의 대기 시간은 `max_attempts`번까지
/// `min(base * multiplier^(f+1), max_delay)`이고, 그 뒤로는 `fallback`으로 고정됩니다.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub fallback: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 1.5,
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            fallback: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures > self.max_attempts {
            return self.fallback;
        }
        let millis = self.base.as_millis() as f64 * self.multiplier.powi(failures as i32 + 1);
        Duration::from_millis(millis.ceil() as u64).min(self.max_delay)
    }
}

/// 연결 관리자가 런타임에 전달하는 사건
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Message(ServerMessage),
}

struct Shared {
    /// 연결된 동안에만 `Some`
    outbound: watch::Sender<Option<mpsc::UnboundedSender<ClientMessage>>>,
    reconnect: Notify,
}

/// 메시지를 권한자로 보내는 핸들. 복제해서 여러 곳에서 쓸 수 있습니다.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionHandle {
    pub fn new() -> Self {
        let (outbound, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                outbound,
                reconnect: Notify::new(),
            }),
        }
    }

    /// 연결되어 있지 않으면 메시지를 버리고 재연결을 요청합니다.
    pub fn send(&self, message: ClientMessage) -> Result<(), ConnectionError> {
        let outbound = self.shared.outbound.borrow().clone();
        if let Some(tx) = outbound {
            if tx.send(message).is_ok() {
                return Ok(());
            }
        }
        self.shared.reconnect.notify_one();
        Err(ConnectionError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .outbound
            .borrow()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// 나가는 메시지를 받을 채널을 연결합니다.
    pub(crate) fn attach(&self, tx: mpsc::UnboundedSender<ClientMessage>) {
        self.shared.outbound.send_replace(Some(tx));
    }

    pub(crate) fn detach(&self) {
        self.shared.outbound.send_replace(None);
    }

    async fn reconnect_requested(&self) {
        self.shared.reconnect.notified().await;
    }
}

pub struct ConnectionManager {
    url: String,
    policy: BackoffPolicy,
    heartbeat: Duration,
    handle: ConnectionHandle,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionManager {
    /// 연결 태스크를 시작합니다. `events`의 수신자가 사라지면 태스크도 끝납니다.
    pub fn spawn(
        url: impl Into<String>,
        policy: BackoffPolicy,
        heartbeat: Duration,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let handle = ConnectionHandle::new();
        let manager = Self {
            url: url.into(),
            policy,
            heartbeat,
            handle: handle.clone(),
            events,
        };
        (handle, tokio::spawn(manager.run()))
    }

    async fn run(self) {
        let mut failures: u32 = 0;

        while !self.events.is_closed() {
            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    failures = 0;
                    tracing::info!("Connected to timer authority at {}", self.url);
                    if self.events.send(ConnectionEvent::Connected).is_err() {
                        return;
                    }

                    if let Err(e) = self.serve(ws).await {
                        tracing::warn!("Connection to timer authority failed: {}", e);
                    }
                    self.handle.detach();

                    tracing::info!("Disconnected from timer authority");
                    if self.events.send(ConnectionEvent::Disconnected).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to connect to {}: {}", self.url, e);
                }
            }

            failures = failures.saturating_add(1);
            let delay = self.policy.delay_after(failures);
            tracing::debug!("Reconnecting in {:?} (failures: {})", delay, failures);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.handle.reconnect_requested() => {
                    tracing::debug!("Reconnect requested by an outbound send");
                }
            }
        }
    }

    /// 연결 하나가 끝날 때까지 메시지를 주고받습니다.
    async fn serve(&self, ws: WsStream) -> Result<(), ConnectionError> {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();
        self.handle.attach(tx.clone());

        let period = self.heartbeat;
        let heartbeat = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if tx.send(ClientMessage::Ping).is_err() {
                    break;
                }
            }
        });

        let result = loop {
            tokio::select! {
                Some(message) = rx.recv() => {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!("Failed to encode outbound message: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        break Err(e.into());
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(ServerMessage::Pong) => tracing::trace!("Heartbeat acknowledged"),
                            Ok(message) => {
                                if self.events.send(ConnectionEvent::Message(message)).is_err() {
                                    break Ok(());
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Ignoring malformed message from authority: {}", e)
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(e.into()),
                }
            }
        };

        heartbeat.abort();
        result
    }
}
