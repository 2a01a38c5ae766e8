use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

const BACKUP_PREFIX: &str = "openclaw-backup-";
const BACKUP_SUFFIX: &str = ".tar.gz";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Nothing to back up at {0}")]
    MissingSource(PathBuf),
    #[error("Backup archive not found: {0}")]
    MissingArchive(PathBuf),
    #[error("`tar` was not found on PATH")]
    TarUnavailable,
    #[error("tar {action} failed: {detail}")]
    Tar { action: &'static str, detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// `YYYYMMDD-HHMMSS` taken from the file name.
    pub timestamp: String,
}

pub fn backup_file_name(at: DateTime<Local>) -> String {
    format!("{BACKUP_PREFIX}{}{BACKUP_SUFFIX}", at.format("%Y%m%d-%H%M%S"))
}

/// Archive the whole OpenClaw home into `backup_dir`.
pub fn create_backup(source_home: &Path, backup_dir: &Path) -> Result<BackupInfo, BackupError> {
    if !source_home.is_dir() {
        return Err(BackupError::MissingSource(source_home.to_path_buf()));
    }
    let (parent, base) = split_home(source_home)?;
    fs::create_dir_all(backup_dir)?;
    let path = backup_dir.join(backup_file_name(Local::now()));

    let mut cmd = Command::new(tar_binary()?);
    cmd.arg("-czf").arg(&path).arg("-C").arg(parent).arg(base);
    run_tar(cmd, "create")?;

    let info = backup_info(&path).ok_or_else(|| BackupError::MissingArchive(path.clone()))?;
    info!(path = %info.path.display(), size = info.size, "backup created");
    Ok(info)
}

/// Check the archive can be listed end to end.
pub fn verify_backup(archive: &Path) -> Result<(), BackupError> {
    if !archive.is_file() {
        return Err(BackupError::MissingArchive(archive.to_path_buf()));
    }
    let mut cmd = Command::new(tar_binary()?);
    cmd.arg("-tzf").arg(archive);
    run_tar(cmd, "verify")
}

/// Backups in `dir`, newest first.
pub fn list_backups(dir: &Path) -> Vec<BackupInfo> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut backups: Vec<BackupInfo> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| backup_info(&entry.path()))
        .collect();
    backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    backups
}

/// Replace the OpenClaw home with the archive's contents.
pub fn restore_backup(archive: &Path, source_home: &Path) -> Result<(), BackupError> {
    verify_backup(archive)?;
    let (parent, _) = split_home(source_home)?;
    if source_home.exists() {
        fs::remove_dir_all(source_home)?;
    }
    fs::create_dir_all(parent)?;
    let mut cmd = Command::new(tar_binary()?);
    cmd.arg("-xzf").arg(archive).arg("-C").arg(parent);
    run_tar(cmd, "restore")?;
    info!(archive = %archive.display(), home = %source_home.display(), "backup restored");
    Ok(())
}

fn backup_info(path: &Path) -> Option<BackupInfo> {
    let file_name = path.file_name()?.to_string_lossy().to_string();
    let timestamp = file_name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?
        .to_string();
    let metadata = fs::metadata(path).ok().filter(|m| m.is_file())?;
    Some(BackupInfo {
        path: path.to_path_buf(),
        file_name,
        size: metadata.len(),
        timestamp,
    })
}

fn split_home(home: &Path) -> Result<(&Path, &std::ffi::OsStr), BackupError> {
    match (home.parent(), home.file_name()) {
        (Some(parent), Some(base)) => Ok((parent, base)),
        _ => Err(BackupError::MissingSource(home.to_path_buf())),
    }
}

fn tar_binary() -> Result<PathBuf, BackupError> {
    which::which("tar").map_err(|_| BackupError::TarUnavailable)
}

fn run_tar(mut cmd: Command, action: &'static str) -> Result<(), BackupError> {
    let output = cmd.output()?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(BackupError::Tar {
        action,
        detail: if stderr.is_empty() {
            output.status.to_string()
        } else {
            stderr
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn tar_available() -> bool {
        which::which("tar").is_ok()
    }

    #[test]
    fn backup_file_name_embeds_timestamp() {
        let at = Local
            .with_ymd_and_hms(2026, 2, 20, 14, 0, 13)
            .single()
            .expect("valid time");
        assert_eq!(backup_file_name(at), "openclaw-backup-20260220-140013.tar.gz");
    }

    #[test]
    fn list_backups_sorts_newest_first_and_ignores_others() {
        let temp = TempDir::new().expect("tempdir");
        for name in [
            "openclaw-backup-20250101-000000.tar.gz",
            "openclaw-backup-20260220-140013.tar.gz",
            "openclaw-backup-20251231-235959.tar.gz",
            "notes.txt",
            "openclaw-backup-broken.zip",
        ] {
            fs::write(temp.path().join(name), "x").expect("write");
        }
        let stamps: Vec<String> = list_backups(temp.path())
            .into_iter()
            .map(|b| b.timestamp)
            .collect();
        assert_eq!(
            stamps,
            vec!["20260220-140013", "20251231-235959", "20250101-000000"]
        );
    }

    #[test]
    fn create_backup_requires_source() {
        let temp = TempDir::new().expect("tempdir");
        let err = create_backup(&temp.path().join(".openclaw"), temp.path()).expect_err("missing");
        assert!(matches!(err, BackupError::MissingSource(_)));
    }

    #[test]
    fn verify_rejects_corrupt_archive() {
        if !tar_available() {
            return;
        }
        let temp = TempDir::new().expect("tempdir");
        let bogus = temp.path().join("openclaw-backup-20260101-000000.tar.gz");
        fs::write(&bogus, "definitely not gzip").expect("write");
        assert!(matches!(verify_backup(&bogus), Err(BackupError::Tar { .. })));
    }

    #[test]
    fn create_verify_and_restore_round_trip() {
        if !tar_available() {
            return;
        }
        let temp = TempDir::new().expect("tempdir");
        let home = temp.path().join(".openclaw");
        fs::create_dir_all(home.join("workspace")).expect("mkdir");
        fs::write(home.join("workspace").join("SOUL.md"), "soul").expect("write");
        let backups = temp.path().join("backups");

        let info = create_backup(&home, &backups).expect("create");
        assert!(info.size > 0);
        verify_backup(&info.path).expect("verify");

        fs::write(home.join("workspace").join("SOUL.md"), "changed").expect("write");
        fs::write(home.join("stray.txt"), "stray").expect("write");
        restore_backup(&info.path, &home).expect("restore");
        assert_eq!(
            fs::read_to_string(home.join("workspace").join("SOUL.md")).expect("read"),
            "soul"
        );
        assert!(!home.join("stray.txt").exists());
    }
}
