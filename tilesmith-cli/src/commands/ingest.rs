//! `tilesmith ingest`: validate a directory of `x,y` point files.

use crate::error::CliError;
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tilesmith::config::ConfigFile;
use tilesmith::ingest::{IngestError, IngestFile, IngestInfo, LogProgress, PoolConfig, WorkerPool};
use tracing::{info, warn};

/// Checks that every non-blank line of `path` is two finite numbers
/// separated by a comma. Returns the number of records.
pub fn validate_points_file(path: &Path) -> Result<usize, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut records = 0;
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 2 {
            return Err(format!(
                "line {}: expected 2 fields, found {}",
                index + 1,
                fields.len()
            ));
        }
        for value in fields {
            match value.parse::<f64>() {
                Ok(v) if v.is_finite() => {}
                _ => return Err(format!("line {}: `{}` is not a number", index + 1, value)),
            }
        }
        records += 1;
    }
    Ok(records)
}

pub async fn run(dir: &Path, workers: Option<usize>, config: &ConfigFile) -> Result<(), CliError> {
    let info = IngestInfo::from_dir(dir)?;
    let pool_config = match workers {
        Some(n) => PoolConfig::new(n),
        None => config.ingest.to_pool_config(),
    };
    let pool = WorkerPool::new(pool_config);

    info!(
        dir = %dir.display(),
        files = info.len(),
        total_bytes = info.total_bytes,
        workers = pool.workers(),
        "Validating point files"
    );

    // The pool only fails the run for errors seen before its last hand-off,
    // so every rejected file is also collected here.
    let file_count = info.len();
    let rejected = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&rejected);
    pool.execute(
        info.files,
        move |file: &IngestFile| {
            validate_points_file(&file.path).map(|_| ()).map_err(|message| {
                record.lock().push(IngestError::Item {
                    item: file.path.display().to_string(),
                    message: message.clone(),
                });
                message
            })
        },
        Arc::new(LogProgress::new()),
    )
    .await?;

    let mut rejected = std::mem::take(&mut *rejected.lock());
    if !rejected.is_empty() {
        for err in &rejected {
            warn!(error = %err, "Rejected point file");
        }
        return Err(rejected.swap_remove(0).into());
    }

    println!("Validated {} files in {}", file_count, dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.csv", "1.5,2\n\n-3, 4e2\n");
        assert_eq!(validate_points_file(&path), Ok(2));
    }

    #[test]
    fn test_wrong_field_count() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.csv", "1,2\n1,2,3\n");
        assert_eq!(
            validate_points_file(&path),
            Err("line 2: expected 2 fields, found 3".to_string())
        );
    }

    #[test]
    fn test_not_a_number() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.csv", "1,NaN\n");
        assert_eq!(
            validate_points_file(&path),
            Err("line 1: `NaN` is not a number".to_string())
        );
    }

    #[tokio::test]
    async fn test_run_reports_bad_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "good.csv", "1,2\n");
        write(&dir, "bad.csv", "oops\n");

        let result = run(dir.path(), Some(2), &ConfigFile::default()).await;
        match result {
            Err(CliError::Ingest(tilesmith::ingest::IngestError::Item { item, .. })) => {
                assert!(item.ends_with("bad.csv"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_accepts_valid_dir() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.csv", "1,2\n3,4\n");
        write(&dir, "b.csv", "5,6\n");
        assert!(run(dir.path(), Some(2), &ConfigFile::default()).await.is_ok());
    }
}
