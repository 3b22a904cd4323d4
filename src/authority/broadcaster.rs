//! # 브로드캐스터와 연결 생존 관리
//!
//! 권한자 쪽의 연결 목록(`ClientConnection`)을 관리합니다.
//! 각 연결은 WebSocket 쓰기 태스크로 이어지는 채널 송신자를 하나씩 가집니다.
//! 송신자를 버리면(drop) 쓰기 태스크가 끝나면서 소켓이 닫힙니다.
//!
//! 채널 크기는 `OUTBOUND_CAPACITY`로 제한됩니다. 소켓을 읽지 않아 큐가 가득 찬 연결은
//! 메시지를 쌓아 두지 않고 바로 끊습니다.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::ServerMessage;

/// 연결 식별자 (UUIDv7)
pub type ConnectionId = Uuid;

/// 직렬화된 JSON 텍스트 프레임을 소켓 쓰기 태스크로 보내는 채널
pub type Outbound = mpsc::Sender<String>;

/// 연결 하나가 쌓아 둘 수 있는 미전송 프레임 수
pub const OUTBOUND_CAPACITY: usize = 64;

/// 연결 하나의 쓰기 채널을 만듭니다.
pub fn outbound_channel() -> (Outbound, mpsc::Receiver<String>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// 권한자가 보는 클라이언트 연결 하나
#[derive(Debug)]
pub struct ClientConnection {
    pub outbound: Outbound,
    /// 마지막으로 (ping 포함) 메시지를 받은 시각
    pub last_active_at: Instant,
}

#[derive(Debug, Default)]
pub struct Broadcaster {
    connections: HashMap<ConnectionId, ClientConnection>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 연결을 등록하고 식별자를 발급합니다.
    pub fn register(&mut self, outbound: Outbound, now: Instant) -> ConnectionId {
        let id = Uuid::now_v7();
        self.connections.insert(
            id,
            ClientConnection {
                outbound,
                last_active_at: now,
            },
        );
        info!("Client {} connected ({} total)", id, self.connections.len());
        id
    }

    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            info!("Client {} disconnected ({} left)", id, self.connections.len());
        }
        removed
    }

    /// 연결의 마지막 활동 시각을 갱신합니다.
    pub fn touch(&mut self, id: ConnectionId, now: Instant) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.last_active_at = now;
        }
    }

    /// 연결 하나에만 메시지를 보냅니다.
    pub fn send_to(&mut self, id: ConnectionId, message: &ServerMessage) -> bool {
        let Some(text) = encode(message) else {
            return false;
        };
        let Some(connection) = self.connections.get(&id) else {
            return false;
        };
        let delivered = deliver(id, connection, text);
        if !delivered {
            self.remove(id);
        }
        delivered
    }

    /// `exclude`를 뺀 모든 연결에 메시지를 보냅니다.
    ///
    /// 메시지는 한 번만 직렬화합니다. 쓰기 태스크가 이미 끝났거나 큐가 가득 찬 연결은
    /// 목록에서 제거합니다.
    /// 반환값은 실제로 전달한 연결 수입니다.
    pub fn broadcast(&mut self, message: &ServerMessage, exclude: Option<ConnectionId>) -> usize {
        let Some(text) = encode(message) else {
            return 0;
        };

        let mut dropped = Vec::new();
        let mut delivered = 0;
        for (id, connection) in &self.connections {
            if Some(*id) == exclude {
                continue;
            }
            if deliver(*id, connection, text.clone()) {
                delivered += 1;
            } else {
                dropped.push(*id);
            }
        }
        for id in dropped {
            self.remove(id);
        }
        delivered
    }

    /// `idle_timeout`보다 오래 조용했던 연결을 닫고 목록에서 제거합니다.
    pub fn sweep(&mut self, now: Instant, idle_timeout: Duration) -> Vec<ConnectionId> {
        let stale: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, c)| now.saturating_duration_since(c.last_active_at) > idle_timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            info!("Client {} inactive, closing connection", id);
            self.connections.remove(id);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// 큐에 넣지 못하면 `false`. 호출자가 연결을 제거합니다.
fn deliver(id: ConnectionId, connection: &ClientConnection, text: String) -> bool {
    match connection.outbound.try_send(text) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Client {} is not reading its socket, closing connection", id);
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Dropping closed connection {}", id);
            false
        }
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to serialize outbound message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_skips_the_originator() {
        let mut broadcaster = Broadcaster::new();
        let now = Instant::now();
        let (tx_a, mut rx_a) = outbound_channel();
        let (tx_b, mut rx_b) = outbound_channel();
        let a = broadcaster.register(tx_a, now);
        broadcaster.register(tx_b, now);

        let delivered = broadcaster.broadcast(&ServerMessage::Pong, Some(a));

        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn closed_receivers_are_pruned() {
        let mut broadcaster = Broadcaster::new();
        let (tx, rx) = outbound_channel();
        broadcaster.register(tx, Instant::now());
        drop(rx);

        assert_eq!(broadcaster.broadcast(&ServerMessage::Pong, None), 0);
        assert!(broadcaster.is_empty());
    }

    #[test]
    fn sweep_closes_only_idle_connections() {
        let mut broadcaster = Broadcaster::new();
        let start = Instant::now();
        let (tx_idle, mut rx_idle) = outbound_channel();
        let (tx_live, _rx_live) = outbound_channel();
        let idle = broadcaster.register(tx_idle, start);
        let live = broadcaster.register(tx_live, start);

        let later = start + Duration::from_secs(301);
        broadcaster.touch(live, start + Duration::from_secs(200));

        let swept = broadcaster.sweep(later, Duration::from_secs(300));
        assert_eq!(swept, vec![idle]);
        assert_eq!(broadcaster.len(), 1);
        // 송신자가 사라졌으므로 수신 쪽은 채널 종료를 봅니다.
        assert_eq!(
            rx_idle.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn connection_that_stops_reading_is_dropped_when_full() {
        let mut broadcaster = Broadcaster::new();
        let now = Instant::now();
        let (tx_slow, mut rx_slow) = outbound_channel();
        let (tx_fast, mut rx_fast) = outbound_channel();
        broadcaster.register(tx_slow, now);
        let fast = broadcaster.register(tx_fast, now);

        for _ in 0..OUTBOUND_CAPACITY {
            assert_eq!(broadcaster.broadcast(&ServerMessage::Pong, None), 2);
            rx_fast.try_recv().unwrap();
        }
        assert_eq!(broadcaster.broadcast(&ServerMessage::Pong, None), 1);
        assert_eq!(broadcaster.len(), 1);
        assert!(broadcaster.send_to(fast, &ServerMessage::Pong));

        // 이미 쌓인 프레임을 비우고 나면 채널 종료를 봅니다.
        for _ in 0..OUTBOUND_CAPACITY {
            rx_slow.try_recv().unwrap();
        }
        assert_eq!(
            rx_slow.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
    }
}
