use tokio::process::Command;
use tracing::{error, info};

use common::error::AppError;

/// Runs the external indexing process over the configured root directory and
/// waits for it to finish. The index output lands in `<root>/output`, where
/// the retrieval side picks it up on its next initialization.
///
/// Failures (command not on PATH, non-zero exit) surface to whoever
/// triggered the run; an engine that was already invalidated simply stays
/// uninitialized until a later run succeeds.
pub async fn run_index(command: &str, root_dir: &str) -> Result<(), AppError> {
    info!(command, root_dir, "starting index run");

    let output = Command::new(command)
        .arg("index")
        .arg("--root")
        .arg(root_dir)
        .output()
        .await
        .map_err(|e| {
            error!("failed to spawn indexer '{command}': {e}");
            AppError::Ingestion(format!("indexer command '{command}' could not be started: {e}"))
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        info!("indexer stdout:\n{stdout}");
    }

    if output.status.success() {
        if !stderr.trim().is_empty() {
            info!("indexer stderr:\n{stderr}");
        }
        info!("index run completed");
        Ok(())
    } else {
        if !stderr.trim().is_empty() {
            error!("indexer stderr:\n{stderr}");
        }
        Err(AppError::Ingestion(format!(
            "indexer exited with status {}",
            output.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_command_is_an_ingestion_error() {
        let err = run_index("definitely-not-a-real-indexer", "./data")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Ingestion(_)));
        assert!(err.to_string().contains("could not be started"));
    }

    #[tokio::test]
    async fn test_successful_run() {
        // `true` ignores its arguments and exits 0.
        run_index("true", "./data").await.unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_ingestion_error() {
        let err = run_index("false", "./data").await.unwrap_err();
        assert!(matches!(err, AppError::Ingestion(_)));
        assert!(err.to_string().contains("exited with status"));
    }
}
