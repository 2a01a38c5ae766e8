use std::fs;

use serde::Serialize;

use crate::detect::{dir_file_count, dir_size};
use crate::settings::MigrationPaths;
use crate::workspace::count_lines;

/// Files whose absence means the agent lost its persona.
pub const KEY_FILES: &[&str] = &["SOUL.md", "IDENTITY.md", "AGENTS.md"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFileStatus {
    pub name: String,
    pub present: bool,
    pub lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub workspace_exists: bool,
    pub file_count: usize,
    pub total_bytes: u64,
    pub config_exists: bool,
    pub key_files: Vec<KeyFileStatus>,
}

impl VerifyReport {
    pub fn all_key_files_present(&self) -> bool {
        self.key_files.iter().all(|file| file.present)
    }

    pub fn is_healthy(&self) -> bool {
        self.workspace_exists && self.config_exists && self.all_key_files_present()
    }
}

pub fn verify_target(paths: &MigrationPaths) -> VerifyReport {
    let workspace = paths.target_workspace();
    let workspace_exists = workspace.is_dir();
    let key_files = KEY_FILES
        .iter()
        .map(|name| match fs::read(workspace.join(name)) {
            Ok(content) => KeyFileStatus {
                name: name.to_string(),
                present: true,
                lines: count_lines(&content),
            },
            Err(_) => KeyFileStatus {
                name: name.to_string(),
                present: false,
                lines: 0,
            },
        })
        .collect();

    VerifyReport {
        workspace_exists,
        file_count: if workspace_exists { dir_file_count(&workspace) } else { 0 },
        total_bytes: if workspace_exists { dir_size(&workspace) } else { 0 },
        config_exists: paths.target_config().is_file(),
        key_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_target_is_unhealthy() {
        let temp = TempDir::new().expect("tempdir");
        let paths = MigrationPaths::new(
            &temp.path().join(".openclaw"),
            &temp.path().join(".picoclaw"),
            temp.path(),
        );
        let report = verify_target(&paths);
        assert!(!report.workspace_exists);
        assert!(!report.config_exists);
        assert_eq!(report.file_count, 0);
        assert!(!report.is_healthy());
    }

    #[test]
    fn populated_target_reports_key_files() {
        let temp = TempDir::new().expect("tempdir");
        let paths = MigrationPaths::new(
            &temp.path().join(".openclaw"),
            &temp.path().join(".picoclaw"),
            temp.path(),
        );
        let ws = paths.target_workspace();
        fs::create_dir_all(&ws).expect("mkdir");
        fs::write(ws.join("SOUL.md"), "a\nb\n").expect("write");
        fs::write(ws.join("IDENTITY.md"), "id").expect("write");
        fs::write(paths.target_config(), "{}").expect("write");

        let report = verify_target(&paths);
        assert!(report.workspace_exists);
        assert!(report.config_exists);
        assert_eq!(report.file_count, 2);
        assert_eq!(report.key_files[0].lines, 3);
        assert!(!report.key_files[2].present);
        assert!(!report.all_key_files_present());
        assert!(!report.is_healthy());

        fs::write(ws.join("AGENTS.md"), "agents").expect("write");
        assert!(verify_target(&paths).is_healthy());
    }
}
