//! # 동기화 채널(WebSocket) 핸들러
//!
//! - `GET /ws` → WebSocket 업그레이드
//!
//! 연결 하나당 두 개의 태스크가 돕니다.
//! - 쓰기 태스크: 권한자가 `Outbound` 채널에 넣은 JSON을 소켓으로 보냅니다.
//!   권한자가 송신자를 버리면(비활성 정리 등) 소켓을 닫고 끝납니다.
//! - 읽기 태스크: 텍스트 프레임을 `ClientMessage`로 파싱해 권한자에게 넘깁니다.
//!   파싱에 실패한 프레임은 로그만 남기고 연결은 유지합니다.
//!
//! 둘 중 하나가 끝나면 나머지도 중단하고 연결을 정리합니다.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::{
    authority::{outbound_channel, AuthorityHandle},
    models::ClientMessage,
    routes::AppState,
};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.authority))
}

async fn handle_socket(socket: WebSocket, authority: AuthorityHandle) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = outbound_channel();

    let id = match authority.connect(tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejecting WebSocket connection: {}", e);
            return;
        }
    };

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                debug!("Failed to write to client {}: {}", id, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader = authority.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => {
                            if reader.inbound(id, message).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid message from client {}: {}", id, e),
                    }
                }
                Ok(Message::Close(_)) => break,
                // ping/pong 프레임은 axum이 처리합니다.
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket error for client {}: {}", id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    authority.disconnect(id).await;
    info!("WebSocket connection {} closed", id);
}
