//! Online page-copy backups for the embedded backend.
//!
//! Snapshots are written to a temp file, integrity-checked, then renamed
//! into the backup directory. Restore verifies before swapping the live
//! file. The remote backend delegates to the server's native tooling; see
//! the store-level entry points.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::Connection;

use openmemory_core::{OmError, OmResult};

use crate::embedded::map_sqlite_err;

/// Pages copied per step; between steps the source stays live.
const PAGES_PER_STEP: std::os::raw::c_int = 128;

/// One snapshot in the backup directory.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub file_name: String,
}

/// Copy the live database into `dir`, reporting `(total_pages,
/// remaining_pages)` after every step. Returns the snapshot path.
pub fn create_backup(
    conn: &Connection,
    dir: &Path,
    mut progress: impl FnMut(usize, usize),
) -> OmResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| OmError::storage(format!("create backup dir: {e}")))?;

    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let final_path = dir.join(format!("openmemory-{stamp}.db"));
    let tmp_path = dir.join(format!(".openmemory-{stamp}.db.partial"));

    {
        let mut dst = Connection::open(&tmp_path)
            .map_err(|e| map_sqlite_err(e, "open backup target"))?;
        let backup = rusqlite::backup::Backup::new(conn, &mut dst)
            .map_err(|e| map_sqlite_err(e, "begin backup"))?;
        loop {
            let step = backup
                .step(PAGES_PER_STEP)
                .map_err(|e| map_sqlite_err(e, "backup step"))?;
            let p = backup.progress();
            progress(p.pagecount as usize, p.remaining as usize);
            match step {
                rusqlite::backup::StepResult::Done => break,
                rusqlite::backup::StepResult::More => continue,
                rusqlite::backup::StepResult::Busy | rusqlite::backup::StepResult::Locked => {
                    std::thread::sleep(std::time::Duration::from_millis(25));
                }
                _ => {
                    std::thread::sleep(std::time::Duration::from_millis(25));
                }
            }
        }
    }

    verify_snapshot(&tmp_path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp_path);
    })?;

    std::fs::rename(&tmp_path, &final_path)
        .map_err(|e| OmError::storage(format!("finalize backup: {e}")))?;
    Ok(final_path)
}

/// Run an integrity check against a snapshot file.
pub fn verify_snapshot(path: &Path) -> OmResult<()> {
    let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| map_sqlite_err(e, "open snapshot"))?;
    let verdict: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(|e| map_sqlite_err(e, "integrity check"))?;
    if verdict != "ok" {
        return Err(OmError::storage(format!(
            "snapshot failed integrity check: {verdict}"
        )));
    }
    Ok(())
}

/// Replace the live file with a verified snapshot. The previous live file
/// is kept alongside with a `.pre-restore` suffix until the next restore.
/// Must run while no engine holds the live file open.
pub fn restore_backup(snapshot: &Path, live: &Path) -> OmResult<()> {
    verify_snapshot(snapshot)?;
    if live.exists() {
        let saved = live.with_extension("db.pre-restore");
        std::fs::copy(live, &saved)
            .map_err(|e| OmError::storage(format!("preserve live file: {e}")))?;
    }
    std::fs::copy(snapshot, live).map_err(|e| OmError::storage(format!("restore copy: {e}")))?;
    Ok(())
}

/// Snapshots in the directory, newest first.
pub fn list_backups(dir: &Path) -> OmResult<Vec<BackupInfo>> {
    let mut out = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(OmError::storage(format!("read backup dir: {e}"))),
    };
    for entry in entries {
        let entry = entry.map_err(|e| OmError::storage(format!("read backup dir: {e}")))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with("openmemory-") || !name.ends_with(".db") {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| OmError::storage(format!("stat backup: {e}")))?;
        out.push(BackupInfo {
            path: entry.path(),
            size_bytes: meta.len(),
            file_name: name,
        });
    }
    out.sort_by(|a, b| b.file_name.cmp(&a.file_name));
    Ok(out)
}

/// Delete snapshots beyond the newest `keep`. Returns how many were
/// removed.
pub fn prune_backups(dir: &Path, keep: usize) -> OmResult<usize> {
    let backups = list_backups(dir)?;
    let mut removed = 0;
    for stale in backups.iter().skip(keep) {
        std::fs::remove_file(&stale.path)
            .map_err(|e| OmError::storage(format!("prune backup: {e}")))?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    fn seeded_db(dir: &Path) -> PathBuf {
        let path = dir.join("live.db");
        let conn = Connection::open(&path).unwrap();
        migrations::run_embedded(&conn).unwrap();
        conn.execute(
            "INSERT INTO memories (id, user_id, content, content_hash, primary_sector,
                 created_at, updated_at, last_accessed_at)
             VALUES ('m1', 'u1', 'ct', 'h1', 'semantic',
                 '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z',
                 '2026-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();
        path
    }

    #[test]
    fn backup_restore_round_trip_is_bit_faithful() {
        let tmp = tempfile::tempdir().unwrap();
        let live = seeded_db(tmp.path());
        let backups = tmp.path().join("backups");

        let conn = Connection::open(&live).unwrap();
        let mut reports = Vec::new();
        let snapshot =
            create_backup(&conn, &backups, |total, remaining| reports.push((total, remaining)))
                .unwrap();
        drop(conn);

        assert!(!reports.is_empty());
        assert_eq!(reports.last().unwrap().1, 0);

        let restored = tmp.path().join("restored.db");
        restore_backup(&snapshot, &restored).unwrap();

        let check = Connection::open(&restored).unwrap();
        let content: String = check
            .query_row("SELECT content FROM memories WHERE id = 'm1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(content, "ct");
    }

    #[test]
    fn retention_prunes_oldest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("backups");
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..4 {
            std::fs::write(dir.join(format!("openmemory-2026010100000{i}.db")), b"x").unwrap();
        }
        let removed = prune_backups(&dir, 2).unwrap();
        assert_eq!(removed, 2);
        let left = list_backups(&dir).unwrap();
        assert_eq!(left.len(), 2);
        assert!(left[0].file_name.ends_with("03.db"));
    }

    #[test]
    fn corrupt_snapshot_fails_verification() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("openmemory-x.db");
        std::fs::write(&bogus, b"not a database at all").unwrap();
        assert!(verify_snapshot(&bogus).is_err());
    }
}
