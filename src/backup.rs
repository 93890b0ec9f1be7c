// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Raw scheduler payloads kept on disk next to the database.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

const BACKUP_STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Write `payload` to `<dir>/<dataset>_<timestamp>.json`, creating `dir` if needed
pub fn write_backup(dir: &Path, dataset: &str, polled_at: NaiveDateTime, payload: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(backup_file_name(dataset, polled_at));
    fs::write(&path, payload)?;
    tracing::debug!(path = %path.display(), bytes = payload.len(), "wrote raw payload backup");
    Ok(path)
}

fn backup_file_name(dataset: &str, polled_at: NaiveDateTime) -> String {
    format!("{}_{}.json", dataset, polled_at.format(BACKUP_STAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn polled_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 25)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap()
    }

    #[test]
    fn test_backup_file_name() {
        assert_eq!(backup_file_name("jobs", polled_at()), "jobs_2024-09-25T14-30-05.json");
    }

    #[test]
    fn test_write_backup_creates_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("backups/pbs");
        let path = write_backup(&target, "nodes", polled_at(), b"{\"nodes\": {}}").unwrap();

        assert_eq!(path, target.join("nodes_2024-09-25T14-30-05.json"));
        assert_eq!(fs::read(&path).unwrap(), b"{\"nodes\": {}}");
    }

    #[test]
    fn test_write_backup_into_file_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        assert!(write_backup(&blocker, "jobs", polled_at(), b"{}").is_err());
    }
}
