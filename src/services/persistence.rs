//! # 통계 스냅샷 저장(StatsPersistence)
//!
//! 하루치 통계를 `stats_<YYYY-MM-DD>.json` 파일로 저장합니다.
//!
//! - `SnapshotStore`: 파일 경로 계산과 실제 읽기/쓰기
//! - `StatsPersistence`: 권한자 루프가 막히지 않도록 채널 너머의
//!   전용 쓰기 태스크에 스냅샷을 넘기는 핸들
//!
//! 저장 실패는 로그만 남기며, 타이머 변경이나 브로드캐스트를 막지 않습니다.

use std::path::PathBuf;

use thiserror::Error;
use tokio::{fs, sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::write_atomic;
use crate::models::StatsSnapshot;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// 스냅샷 파일이 모이는 디렉토리
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 날짜 문자열에 해당하는 파일 경로. 예: `data/stats_2024-01-01.json`
    pub fn path_for(&self, date: &str) -> PathBuf {
        self.dir.join(format!("stats_{}.json", date))
    }

    /// 스냅샷을 보기 좋게 들여쓴 JSON으로 저장하고 경로를 반환합니다.
    /// 같은 날짜의 파일이 있으면 원자적으로 교체합니다.
    pub async fn write(&self, snapshot: &StatsSnapshot) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&snapshot.date);
        let body = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(path.clone(), body).await?;
        Ok(path)
    }

    /// 날짜의 스냅샷을 읽습니다. 파일이 없으면 `None`.
    pub async fn load(&self, date: &str) -> Result<Option<StatsSnapshot>, PersistenceError> {
        let path = self.path_for(date);
        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&body)?))
    }
}

/// 스냅샷 쓰기 요청을 받는 핸들. 복제해서 여러 곳에서 쓸 수 있습니다.
#[derive(Debug, Clone)]
pub struct StatsPersistence {
    tx: mpsc::UnboundedSender<StatsSnapshot>,
}

impl StatsPersistence {
    /// 핸들과 그 요청을 받는 수신 채널을 만듭니다.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatsSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 쓰기 태스크를 띄우고 핸들을 반환합니다.
    pub fn spawn(store: SnapshotStore) -> (Self, JoinHandle<()>) {
        let (handle, mut rx) = Self::channel();
        let task = tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                match store.write(&snapshot).await {
                    Ok(path) => info!("Saved study statistics to {}", path.display()),
                    Err(e) => error!("Failed to save statistics for {}: {}", snapshot.date, e),
                }
            }
            debug!("Snapshot writer stopped");
        });
        (handle, task)
    }

    /// 스냅샷 저장을 요청합니다. 기다리지 않습니다.
    pub fn submit(&self, snapshot: StatsSnapshot) {
        if self.tx.send(snapshot).is_err() {
            warn!("Snapshot writer is gone, dropping snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StudyStats, StudyStatsEntry};

    fn snapshot(date: &str, studied: u64) -> StatsSnapshot {
        let mut stats = StudyStats {
            date: date.to_string(),
            timers: Default::default(),
        };
        stats.timers.insert(
            "research".to_string(),
            StudyStatsEntry {
                total_seconds: 10800,
                studied_seconds: studied,
            },
        );
        StatsSnapshot::from_stats(&stats)
    }

    #[tokio::test]
    async fn write_then_load_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data"));

        let path = store.write(&snapshot("2024-01-01", 600)).await.unwrap();
        assert!(path.ends_with("stats_2024-01-01.json"));

        let loaded = store.load("2024-01-01").await.unwrap().unwrap();
        assert_eq!(loaded.timers["research"].studied_seconds, Some(600));
        assert!(store.load("2024-01-02").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rewrite_replaces_whole_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.write(&snapshot("2024-01-01", 600)).await.unwrap();
        store.write(&snapshot("2024-01-01", 1200)).await.unwrap();

        let loaded = store.load("2024-01-01").await.unwrap().unwrap();
        assert_eq!(loaded.timers["research"].studied_seconds, Some(1200));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        std::fs::write(store.path_for("2024-01-01"), "{ nope").unwrap();
        assert!(matches!(
            store.load("2024-01-01").await,
            Err(PersistenceError::Json(_))
        ));
    }

    #[tokio::test]
    async fn writer_task_persists_submitted_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let (persistence, task) = StatsPersistence::spawn(store.clone());

        persistence.submit(snapshot("2024-01-03", 120));
        drop(persistence);
        task.await.unwrap();

        let loaded = store.load("2024-01-03").await.unwrap().unwrap();
        assert_eq!(loaded.timers["research"].studied_minutes, 2);
    }

    #[tokio::test]
    async fn write_failure_does_not_stop_the_writer() {
        let dir = tempfile::tempdir().unwrap();
        // 디렉토리 자리에 파일이 있으면 create_dir_all이 실패합니다.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let (persistence, task) = StatsPersistence::spawn(SnapshotStore::new(&blocked));

        persistence.submit(snapshot("2024-01-01", 1));
        persistence.submit(snapshot("2024-01-02", 2));
        drop(persistence);
        task.await.unwrap();
    }
}
