//! 권한자 액터와 복제본 두 개를 묶은 동기화 시나리오 테스트
//!
//! 네트워크 대신 액터의 채널을 직접 연결하고, 시간은 인자로 흘려보냅니다.

use chrono::{DateTime, Duration, TimeZone, Utc};
use studysync::{
    authority::{
        outbound_channel, AuthorityActor, AuthorityHandle, AuthorityTimings, ConnectionId,
        TimerAuthority,
    },
    client::{Effect, Phase, TimerReplica},
    clock,
    models::{ClientMessage, ServerMessage, DEFAULT_TOTAL_SECONDS},
    services::StatsPersistence,
};
use tokio::sync::mpsc;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

struct Client {
    id: ConnectionId,
    inbox: mpsc::Receiver<String>,
    replica: TimerReplica,
    sent: usize,
}

impl Client {
    async fn connect(authority: &AuthorityHandle) -> Self {
        let (tx, inbox) = outbound_channel();
        let id = authority.connect(tx).await.unwrap();
        Self {
            id,
            inbox,
            replica: TimerReplica::new("timer1", "research", DEFAULT_TOTAL_SECONDS, t(0)),
            sent: 0,
        }
    }

    /// 복제본 연산 결과가 전송을 요구하면 권한자로 보냅니다.
    async fn apply(&mut self, authority: &AuthorityHandle, effect: Effect, now: DateTime<Utc>) {
        if effect == Effect::PersistAndPush {
            let message = ClientMessage::UpdateTimer {
                timer_id: "timer1".to_string(),
                data: self.replica.to_timer(now),
            };
            authority.inbound(self.id, message).await.unwrap();
            self.sent += 1;
        }
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(text) = self.inbox.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    /// 받은 메시지로 복제본을 보정합니다.
    fn reconcile_all(&mut self, now: DateTime<Utc>) -> Vec<ServerMessage> {
        let messages = self.drain();
        for message in &messages {
            match message {
                ServerMessage::Init { data } | ServerMessage::ResetAll { data } => {
                    if let Some(timer) = data.get("timer1") {
                        self.replica.reconcile(timer, now);
                    }
                }
                ServerMessage::TimerUpdate { timer_id, data } if timer_id == "timer1" => {
                    self.replica.reconcile(data, now);
                }
                _ => {}
            }
        }
        messages
    }
}

fn spawn_authority() -> AuthorityHandle {
    let authority = TimerAuthority::new(clock::today(), DEFAULT_TOTAL_SECONDS, t(0));
    let (persistence, _snapshots) = StatsPersistence::channel();
    let (handle, _task) =
        AuthorityActor::spawn(authority, persistence, AuthorityTimings::default());
    handle
}

#[tokio::test]
async fn thirty_seconds_of_study_reach_the_other_client() {
    let authority = spawn_authority();
    let mut a = Client::connect(&authority).await;
    let mut b = Client::connect(&authority).await;
    a.drain();
    b.drain();

    let effect = a.replica.start(t(0));
    a.apply(&authority, effect, t(0)).await;
    for s in 1..=30 {
        let effect = a.replica.tick(t(s));
        a.apply(&authority, effect, t(s)).await;
    }
    let effect = a.replica.pause(t(30));
    a.apply(&authority, effect, t(30)).await;

    let stats = authority.stats().await.unwrap();
    assert_eq!(stats.timers["research"].studied_seconds, 30);

    // 시작, 10/20/30초 주기 전송, 일시정지
    assert_eq!(a.sent, 5);
    assert!(a.drain().is_empty());

    let received = b.reconcile_all(t(31));
    match received.last() {
        Some(ServerMessage::TimerUpdate { timer_id, data }) => {
            assert_eq!(timer_id, "timer1");
            assert_eq!(data.remaining_seconds, 10770);
            assert!(!data.running);
        }
        other => panic!("expected timer_update, got {other:?}"),
    }
    assert_eq!(b.sent, 0);
    assert_eq!(b.replica.remaining_seconds(), 10770);
    assert_eq!(b.replica.phase(), Phase::Idle);
}

#[tokio::test]
async fn late_joiner_corrects_for_elapsed_time() {
    let authority = spawn_authority();
    let mut a = Client::connect(&authority).await;
    a.drain();

    let effect = a.replica.start(t(0));
    a.apply(&authority, effect, t(0)).await;

    // B는 20초 뒤에 들어와 init을 받습니다.
    let mut b = Client::connect(&authority).await;
    b.reconcile_all(t(20));
    assert!(b.replica.is_running());
    assert_eq!(b.replica.remaining_seconds(), DEFAULT_TOTAL_SECONDS - 20);
    assert_eq!(b.sent, 0);
}

#[tokio::test]
async fn finishing_stops_every_replica() {
    let authority = spawn_authority();
    let mut a = Client::connect(&authority).await;
    let mut b = Client::connect(&authority).await;
    a.drain();
    b.drain();

    a.replica = TimerReplica::new("timer1", "research", 3, t(0));
    let effect = a.replica.start(t(0));
    a.apply(&authority, effect, t(0)).await;
    for s in 1..=3 {
        let effect = a.replica.tick(t(s));
        a.apply(&authority, effect, t(s)).await;
    }
    assert_eq!(a.replica.phase(), Phase::Finished);

    let timers = authority.timers().await.unwrap();
    assert_eq!(timers["timer1"].remaining_seconds, 0);
    assert!(!timers["timer1"].running);

    b.reconcile_all(t(4));
    assert_eq!(b.replica.phase(), Phase::Finished);
    assert_eq!(b.replica.total_seconds(), 3);
}
