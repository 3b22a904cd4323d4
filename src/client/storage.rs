//! # 로컬 저장소
//!
//! 클라이언트가 재시작하거나 오프라인이 되어도 타이머를 이어갈 수 있도록
//! 타이머마다 `timer_<id>.json` 파일 하나에 마지막 상태를 기록합니다.
//!
//! `dayKey`로 기록이 오늘 것인지 판정하며, 어제 기록은 복원하지 않습니다.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::write_atomic;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access local state: {0}")]
    Io(#[from] std::io::Error),

    #[error("local state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// 파일에 기록되는 타이머 하나의 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTimer {
    pub name: String,
    pub total_seconds: u64,
    pub remaining_seconds: u64,
    pub running: bool,
    pub last_updated: DateTime<Utc>,
    /// 기록한 날의 일자 키 (예: `2024-1-2`)
    pub day_key: String,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, timer_id: &str) -> PathBuf {
        self.dir.join(format!("timer_{}.json", timer_id))
    }

    /// 기록이 없으면 `Ok(None)`
    pub async fn load(&self, timer_id: &str) -> Result<Option<StoredTimer>, StorageError> {
        let path = self.path_for(timer_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub async fn save(&self, timer_id: &str, timer: &StoredTimer) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(timer)?;
        write_atomic(self.path_for(timer_id), json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> StoredTimer {
        StoredTimer {
            name: "research".to_string(),
            total_seconds: 10800,
            remaining_seconds: 9000,
            running: true,
            last_updated: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            day_key: "2024-1-2".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.load("timer1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_timer_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("nested"));
        store.save("timer1", &sample()).await.unwrap();

        assert!(store.path_for("timer1").ends_with("timer_timer1.json"));
        assert_eq!(store.load("timer1").await.unwrap(), Some(sample()));
        assert!(store.load("timer2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repeated_saves_leave_a_single_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        for remaining in [9000, 8999, 8998] {
            let timer = StoredTimer {
                remaining_seconds: remaining,
                ..sample()
            };
            store.save("timer1", &timer).await.unwrap();
        }

        let loaded = store.load("timer1").await.unwrap().unwrap();
        assert_eq!(loaded.remaining_seconds, 8998);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn file_uses_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.save("timer1", &sample()).await.unwrap();

        let raw = std::fs::read_to_string(store.path_for("timer1")).unwrap();
        assert!(raw.contains("\"remainingSeconds\": 9000"));
        assert!(raw.contains("\"dayKey\": \"2024-1-2\""));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        std::fs::write(store.path_for("timer1"), b"{not json").unwrap();
        assert!(matches!(
            store.load("timer1").await,
            Err(StorageError::Json(_))
        ));
    }
}
