//! # StudySync 터미널 클라이언트
//!
//! 권한자 서버에 연결해 세 타이머를 로컬에서 카운트다운합니다.
//! 서버와 연결이 끊겨도 타이머는 계속 돌고, 다시 연결되면 서버 상태로 보정됩니다.
//!
//! 표준 입력 명령:
//! ```text
//! start <timer>    타이머 시작 (id 또는 이름: timer1, research)
//! pause <timer>    일시정지
//! toggle <timer>   시작/일시정지 전환
//! status           현재 상태 출력
//! quit             종료
//! ```

use anyhow::Result;
use chrono::Utc;
use studysync::{
    client::{
        BackoffPolicy, ClientRuntime, ConnectionManager, LocalStore, ReplicaTimings,
        UserCommand, HEARTBEAT_INTERVAL,
    },
    config::ClientConfig,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studysync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    tracing::info!("Local state directory: {}", config.state_path);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (connection, manager) = ConnectionManager::spawn(
        config.server_url.clone(),
        BackoffPolicy::default(),
        HEARTBEAT_INTERVAL,
        events_tx,
    );

    let runtime = ClientRuntime::load(
        LocalStore::new(&config.state_path),
        connection,
        ReplicaTimings::default(),
        config.default_total_seconds,
        Utc::now(),
    )
    .await;
    for line in runtime.status_lines() {
        println!("{}", line);
    }

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(commands_tx));

    runtime.run(commands_rx, events_rx).await;
    manager.abort();
    Ok(())
}

/// 표준 입력을 한 줄씩 읽어 명령으로 바꿉니다. EOF에서 끝납니다.
async fn read_commands(tx: mpsc::UnboundedSender<UserCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<UserCommand>() {
            Ok(command) => {
                let quit = command == UserCommand::Quit;
                if tx.send(command).is_err() || quit {
                    break;
                }
            }
            Err(message) => eprintln!("{}", message),
        }
    }
}
