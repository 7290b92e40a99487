//! Retention cleanup for rolling log files.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;

/// Delete files in `log_dir` whose name starts with `prefix` and whose last
/// modification is older than `retention_days`.
///
/// Returns the number of files removed. A missing directory removes nothing.
pub fn prune_old_logs(log_dir: impl AsRef<Path>, prefix: &str, retention_days: u32) -> Result<usize> {
    let log_dir = log_dir.as_ref();
    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
    let mut removed = 0;

    for entry in std::fs::read_dir(log_dir).context("failed to read log directory")? {
        let entry = entry.context("failed to read directory entry")?;
        let path = entry.path();

        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix));
        if !is_log || !path.is_file() {
            continue;
        }

        let modified: DateTime<Utc> = entry
            .metadata()
            .and_then(|m| m.modified())
            .context("failed to get file modification time")?
            .into();

        if modified < cutoff {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration as StdDuration, SystemTime};

    #[test]
    fn test_prunes_only_expired_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let old_log = dir.path().join("assessor.log.2020-01-01");
        let fresh_log = dir.path().join("assessor.log.2026-10-16");
        let other = dir.path().join("notes.txt");
        for path in [&old_log, &fresh_log, &other] {
            std::fs::write(path, "x").unwrap();
        }

        let long_ago = SystemTime::now() - StdDuration::from_secs(90 * 24 * 3600);
        for path in [&old_log, &other] {
            std::fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(long_ago)
                .unwrap();
        }

        let removed = prune_old_logs(dir.path(), "assessor.log", 30).unwrap();
        assert_eq!(removed, 1);
        assert!(!old_log.exists());
        assert!(fresh_log.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_missing_directory_is_noop() {
        assert_eq!(prune_old_logs("/nonexistent/logs", "assessor.log", 30).unwrap(), 0);
    }
}
