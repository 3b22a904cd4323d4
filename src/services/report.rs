//! # 외부 리포트 생성 프로세스
//!
//! 저장된 스냅샷 파일 경로를 마지막 인자로 외부 프로그램을 실행합니다.
//! (기본값: `python3 collect.py <snapshot-path>`)
//!
//! 성공하면 리포트 위치를 돌려주고, 실패하면 캡처한 진단 출력을
//! `AppError::ReportFailed`에 담아 호출자에게 돌려줍니다.
//! 실패했을 때 부분적으로 만들어진 리포트는 노출하지 않습니다.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct ReportRunner {
    command: String,
    args: Vec<String>,
    default_url: String,
}

impl ReportRunner {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        default_url: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            default_url: default_url.into(),
        }
    }

    /// 리포트 프로세스를 실행하고 생성된 리포트 위치를 반환합니다.
    ///
    /// 프로그램이 마지막 줄에 `/` 또는 `http`로 시작하는 위치를 출력하면 그것을,
    /// 아니면 설정된 기본 주소를 돌려줍니다.
    pub async fn run(&self, snapshot_path: &Path) -> Result<String, AppError> {
        info!(
            "Generating report: {} {:?} {}",
            self.command,
            self.args,
            snapshot_path.display()
        );

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(snapshot_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::ReportFailed {
                message: format!("failed to start {}", self.command),
                diagnostics: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(AppError::ReportFailed {
                message: format!("report process exited with {}", output.status),
                diagnostics: format!("{}{}", stderr, stdout),
            });
        }

        debug!("Report process output: {}", stdout.trim());
        Ok(self.report_location(&stdout))
    }

    fn report_location(&self, stdout: &str) -> String {
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .filter(|line| line.starts_with('/') || line.starts_with("http"))
            .map(str::to_string)
            .unwrap_or_else(|| self.default_url.clone())
    }
}
