//! # 원자적 파일 쓰기
//!
//! 같은 디렉토리에 임시 파일을 만들어 내용을 모두 쓴 뒤 대상 경로로 이름을 바꿉니다.
//! 쓰는 도중 프로세스가 죽어도 대상 파일은 이전 내용이거나 새 내용 중 하나입니다.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

/// `contents`로 `path`를 통째로 교체합니다. 상위 디렉토리는 이미 있어야 합니다.
pub async fn write_atomic(path: PathBuf, contents: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&contents)?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}
