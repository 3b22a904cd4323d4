//! # 동기화 채널 메시지
//!
//! 권한자(authority)와 복제본(replica) 사이를 오가는 JSON 메시지입니다.
//! `type` 필드를 태그로 쓰는 enum이라, 처리하는 쪽의 `match`가
//! 모든 종류를 빠짐없이 다루는지 컴파일러가 검사합니다.
//!
//! | type           | 방향               | 효과                          |
//! |----------------|--------------------|-------------------------------|
//! | `init`         | authority → client | 연결 직후 복제본 초기화        |
//! | `update_timer` | client → authority | 적용 후 다른 클라이언트에 전파 |
//! | `timer_update` | authority → client | 복제본 보정(reconcile)         |
//! | `reset_all`    | authority → client | 일일 초기화 상태로 보정        |
//! | `ping`/`pong`  | 양방향             | 연결 생존 확인                 |

use serde::{Deserialize, Serialize};

use super::{Timer, TimerMap};

/// 클라이언트가 보내는 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    UpdateTimer {
        #[serde(rename = "timerId")]
        timer_id: String,
        data: Timer,
    },
    Ping,
}

/// 권한자가 보내는 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Init {
        data: TimerMap,
    },
    TimerUpdate {
        #[serde(rename = "timerId")]
        timer_id: String,
        data: Timer,
    },
    ResetAll {
        data: TimerMap,
    },
    Pong,
}
