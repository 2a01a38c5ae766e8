use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Entry names never copied out of the OpenClaw workspace. Matched against
/// the workspace root's immediate children only.
pub const SKIP_ENTRIES: &[&str] = &[".git", ".openclaw", ".DS_Store", ".gitignore", "sessions"];

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to prepare target workspace {path}: {source}")]
    Target {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read source workspace {path}: {source}")]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct WorkspaceOptions {
    /// Replace files that already exist at the destination (after backing them
    /// up to `<name>.bak`). When false such files are reported as skipped.
    pub overwrite: bool,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Migrated,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Path relative to the workspace root.
    pub name: String,
    pub source: PathBuf,
    pub dest: PathBuf,
    pub lines: usize,
    pub backed_up: bool,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl FileOutcome {
    pub(crate) fn new(name: &str, source: &Path, dest: &Path) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            lines: 0,
            backed_up: false,
            status: OutcomeStatus::Migrated,
        }
    }

    pub(crate) fn skipped(mut self, reason: &str) -> Self {
        self.status = OutcomeStatus::Skipped {
            reason: reason.to_string(),
        };
        self
    }

    pub(crate) fn failed(mut self, error: String) -> Self {
        self.status = OutcomeStatus::Failed { error };
        self
    }

    pub fn is_migrated(&self) -> bool {
        matches!(self.status, OutcomeStatus::Migrated)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkspaceResult {
    pub total: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub files: Vec<FileOutcome>,
}

impl WorkspaceResult {
    fn record(&mut self, outcome: FileOutcome) {
        self.total += 1;
        match &outcome.status {
            OutcomeStatus::Migrated => {
                debug!(name = %outcome.name, lines = outcome.lines, backed_up = outcome.backed_up, "migrated");
                self.migrated += 1;
            }
            OutcomeStatus::Skipped { reason } => {
                debug!(name = %outcome.name, %reason, "skipped");
                self.skipped += 1;
            }
            OutcomeStatus::Failed { error } => {
                warn!(name = %outcome.name, %error, "workspace item failed");
                self.errors += 1;
            }
        }
        self.files.push(outcome);
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|outcome| outcome.error().is_some())
    }
}

/// What a workspace migration would touch, without touching anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspacePreview {
    pub files: usize,
    pub directories: usize,
}

pub fn is_skipped_entry(name: &str) -> bool {
    SKIP_ENTRIES.contains(&name)
}

/// Newline-separated segment count: an empty file counts 1 and a trailing
/// newline adds one.
pub fn count_lines(content: &[u8]) -> usize {
    content.iter().filter(|byte| **byte == b'\n').count() + 1
}

pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

pub fn migrate_workspace(
    source_root: &Path,
    target_root: &Path,
    options: &WorkspaceOptions,
) -> Result<WorkspaceResult, WorkspaceError> {
    fs::create_dir_all(target_root).map_err(|source| WorkspaceError::Target {
        path: target_root.to_path_buf(),
        source,
    })?;
    let entries = sorted_entries(source_root).map_err(|source| WorkspaceError::Source {
        path: source_root.to_path_buf(),
        source,
    })?;

    let mut result = WorkspaceResult::default();
    for (name, is_dir) in entries {
        let entry_name = name.to_string_lossy().to_string();
        if is_skipped_entry(&entry_name) {
            debug!(name = %entry_name, "skip-listed entry ignored");
            continue;
        }
        let src = source_root.join(&name);
        let dst = target_root.join(&name);
        if is_dir {
            migrate_directory(&src, &dst, Path::new(&name), options, &mut result);
        } else {
            result.record(migrate_file(&src, &dst, &entry_name, options));
        }
    }
    Ok(result)
}

/// Copy one file, backing up an existing destination first.
pub fn migrate_file(src: &Path, dst: &Path, name: &str, options: &WorkspaceOptions) -> FileOutcome {
    let mut outcome = FileOutcome::new(name, src, dst);

    let source = match File::open(src) {
        Ok(source) => source,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return outcome.skipped("source missing");
        }
        Err(err) => return outcome.failed(format!("read {name}: {err}")),
    };
    let permissions = match source.metadata() {
        Ok(metadata) => metadata.permissions(),
        Err(err) => return outcome.failed(format!("stat {name}: {err}")),
    };

    if dst.exists() {
        if !options.overwrite {
            return outcome.skipped("destination exists");
        }
        if let Err(err) = replace_backup(dst) {
            return outcome.failed(format!("back up {}: {err}", dst.display()));
        }
        outcome.backed_up = true;
    }

    match copy_with_permissions(source, dst, permissions) {
        Ok(lines) => {
            outcome.lines = lines;
            outcome
        }
        Err(err) => outcome.failed(format!("copy {name}: {err}")),
    }
}

/// Count what [`migrate_workspace`] would copy: files at any depth and
/// directories directly under the root.
pub fn preview_workspace(source_root: &Path) -> Result<WorkspacePreview, WorkspaceError> {
    let entries = sorted_entries(source_root).map_err(|source| WorkspaceError::Source {
        path: source_root.to_path_buf(),
        source,
    })?;
    let mut preview = WorkspacePreview::default();
    for (name, is_dir) in entries {
        if is_skipped_entry(&name.to_string_lossy()) {
            continue;
        }
        if is_dir {
            preview.directories += 1;
            preview.files += count_files(&source_root.join(&name));
        } else {
            preview.files += 1;
        }
    }
    Ok(preview)
}

/// Recursive file count; unreadable directories count as empty.
pub fn count_files(dir: &Path) -> usize {
    let Ok(entries) = sorted_entries(dir) else {
        return 0;
    };
    entries
        .into_iter()
        .map(|(name, is_dir)| if is_dir { count_files(&dir.join(name)) } else { 1 })
        .sum()
}

fn migrate_directory(
    src: &Path,
    dst: &Path,
    relative: &Path,
    options: &WorkspaceOptions,
    result: &mut WorkspaceResult,
) {
    let dir_name = relative.to_string_lossy().to_string();
    if let Err(err) = fs::create_dir_all(dst) {
        result.record(FileOutcome::new(&dir_name, src, dst).failed(format!("create {dir_name}: {err}")));
        return;
    }
    let entries = match sorted_entries(src) {
        Ok(entries) => entries,
        Err(err) => {
            result.record(FileOutcome::new(&dir_name, src, dst).failed(format!("list {dir_name}: {err}")));
            return;
        }
    };

    for (name, is_dir) in entries {
        let child_src = src.join(&name);
        let child_dst = dst.join(&name);
        let child_relative = relative.join(&name);
        if is_dir {
            migrate_directory(&child_src, &child_dst, &child_relative, options, result);
        } else {
            let child_name = child_relative.to_string_lossy().to_string();
            result.record(migrate_file(&child_src, &child_dst, &child_name, options));
        }
    }
}

/// Directory children sorted by name. Symlinks are not followed.
fn sorted_entries(dir: &Path) -> io::Result<Vec<(OsString, bool)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
        entries.push((entry.file_name(), is_dir));
    }
    entries.sort();
    Ok(entries)
}

/// Copy `dst` over `<dst>.bak`. A backup left by an earlier run is removed
/// first so read-only copies do not block the next one.
pub(crate) fn replace_backup(dst: &Path) -> io::Result<()> {
    let backup = backup_path(dst);
    match fs::remove_file(&backup) {
        Err(err) if err.kind() != ErrorKind::NotFound => return Err(err),
        _ => {}
    }
    fs::copy(dst, &backup).map(|_| ())
}

/// Stream `source` into a sibling temp file, apply `permissions` and rename
/// it over `dst`. Returns the newline-segment count of what was copied.
fn copy_with_permissions(
    source: File,
    dst: &Path,
    permissions: fs::Permissions,
) -> io::Result<usize> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = with_suffix(dst, ".clawmig-tmp");
    let copied = copy_via_temp(source, &tmp, dst, permissions);
    if copied.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    copied
}

fn copy_via_temp(
    source: File,
    tmp: &Path,
    dst: &Path,
    permissions: fs::Permissions,
) -> io::Result<usize> {
    let mut reader = NewlineCounter::new(source);
    let mut writer = File::create(tmp)?;
    io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    drop(writer);
    fs::set_permissions(tmp, permissions)?;
    fs::rename(tmp, dst)?;
    Ok(reader.newlines + 1)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

struct NewlineCounter<R> {
    inner: R,
    newlines: usize,
}

impl<R> NewlineCounter<R> {
    fn new(inner: R) -> Self {
        Self { inner, newlines: 0 }
    }
}

impl<R: Read> Read for NewlineCounter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.newlines += buf[..read].iter().filter(|byte| **byte == b'\n').count();
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn count_lines_counts_newline_segments() {
        assert_eq!(count_lines(b""), 1);
        assert_eq!(count_lines(b"one"), 1);
        assert_eq!(count_lines(b"one\ntwo"), 2);
        assert_eq!(count_lines(b"one\ntwo\n"), 3);
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/tmp/ws/SOUL.md")),
            PathBuf::from("/tmp/ws/SOUL.md.bak")
        );
    }

    #[test]
    fn missing_source_file_is_skipped_without_side_effects() {
        let temp = TempDir::new().expect("tempdir");
        let src = temp.path().join("src").join("SOUL.md");
        let dst_dir = temp.path().join("dst");
        let dst = dst_dir.join("SOUL.md");

        let outcome = migrate_file(&src, &dst, "SOUL.md", &WorkspaceOptions::default());
        assert!(outcome.is_skipped());
        assert!(!outcome.backed_up);
        assert!(!dst_dir.exists());
    }

    #[test]
    fn existing_destination_is_backed_up_before_overwrite() {
        let temp = TempDir::new().expect("tempdir");
        let src = temp.path().join("new.md");
        let dst = temp.path().join("out").join("SOUL.md");
        fs::create_dir_all(dst.parent().expect("parent")).expect("mkdir");
        fs::write(&src, "new soul\n").expect("write src");
        fs::write(&dst, b"old soul\x00bytes").expect("write dst");

        let outcome = migrate_file(&src, &dst, "SOUL.md", &WorkspaceOptions::default());
        assert!(outcome.is_migrated());
        assert!(outcome.backed_up);
        assert_eq!(outcome.lines, 2);
        assert_eq!(fs::read(backup_path(&dst)).expect("backup"), b"old soul\x00bytes");
        assert_eq!(fs::read_to_string(&dst).expect("dst"), "new soul\n");
    }

    #[test]
    fn existing_destination_is_kept_without_overwrite() {
        let temp = TempDir::new().expect("tempdir");
        let src = temp.path().join("a.md");
        let dst = temp.path().join("b.md");
        fs::write(&src, "new").expect("write src");
        fs::write(&dst, "old").expect("write dst");

        let outcome = migrate_file(&src, &dst, "a.md", &WorkspaceOptions { overwrite: false });
        assert_eq!(
            outcome.status,
            OutcomeStatus::Skipped {
                reason: "destination exists".to_string()
            }
        );
        assert_eq!(fs::read_to_string(&dst).expect("dst"), "old");
        assert!(!backup_path(&dst).exists());
    }

    #[cfg(unix)]
    #[test]
    fn permissions_follow_the_source_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("tempdir");
        let src = temp.path().join("run.sh");
        let dst = temp.path().join("copy").join("run.sh");
        fs::write(&src, "#!/bin/sh\necho hi\n").expect("write");
        fs::set_permissions(&src, fs::Permissions::from_mode(0o750)).expect("chmod");

        let outcome = migrate_file(&src, &dst, "run.sh", &WorkspaceOptions::default());
        assert!(outcome.is_migrated());
        let mode = fs::metadata(&dst).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[cfg(unix)]
    #[test]
    fn read_only_files_survive_repeated_runs() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("tempdir");
        let src = temp.path().join("IDENTITY.md");
        let dst = temp.path().join("copy").join("IDENTITY.md");
        fs::write(&src, "v1\n").expect("write");
        fs::set_permissions(&src, fs::Permissions::from_mode(0o444)).expect("chmod");

        for round in ["v1\n", "v2\n", "v3\n"] {
            fs::set_permissions(&src, fs::Permissions::from_mode(0o644)).expect("chmod");
            fs::write(&src, round).expect("write");
            fs::set_permissions(&src, fs::Permissions::from_mode(0o444)).expect("chmod");

            let outcome = migrate_file(&src, &dst, "IDENTITY.md", &WorkspaceOptions::default());
            assert!(outcome.is_migrated(), "{round}: {:?}", outcome.status);
            assert_eq!(fs::read_to_string(&dst).expect("dst"), round);
            let mode = fs::metadata(&dst).expect("meta").permissions().mode();
            assert_eq!(mode & 0o777, 0o444);
        }
        assert_eq!(fs::read_to_string(backup_path(&dst)).expect("bak"), "v2\n");
        assert!(!with_suffix(&dst, ".clawmig-tmp").exists());
    }

    #[test]
    fn streamed_copy_counts_lines_like_count_lines() {
        let temp = TempDir::new().expect("tempdir");
        let src = temp.path().join("big.md");
        let content = "line\n".repeat(20_000);
        fs::write(&src, &content).expect("write");

        let outcome = migrate_file(&src, &temp.path().join("out.md"), "big.md", &WorkspaceOptions::default());
        assert_eq!(outcome.lines, count_lines(content.as_bytes()));
        assert_eq!(outcome.lines, 20_001);

        let empty = temp.path().join("empty.md");
        fs::write(&empty, "").expect("write");
        let outcome = migrate_file(&empty, &temp.path().join("out-empty.md"), "empty.md", &WorkspaceOptions::default());
        assert_eq!(outcome.lines, 1);
    }

    #[test]
    fn preview_counts_files_and_top_level_dirs() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        fs::write(root.join("SOUL.md"), "soul").expect("write");
        fs::write(root.join(".DS_Store"), "junk").expect("write");
        fs::create_dir_all(root.join("memory").join("2025")).expect("mkdir");
        fs::write(root.join("memory").join("MEMORY.md"), "m").expect("write");
        fs::write(root.join("memory").join("2025").join("jan.md"), "j").expect("write");
        fs::create_dir_all(root.join("sessions")).expect("mkdir");
        fs::write(root.join("sessions").join("main.jsonl"), "{}").expect("write");

        let preview = preview_workspace(root).expect("preview");
        assert_eq!(
            preview,
            WorkspacePreview {
                files: 3,
                directories: 1
            }
        );
    }
}
