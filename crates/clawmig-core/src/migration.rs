use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::attention::{manual_attention, model_advice, update_model_in_config, AttentionItem, ModelAdvice};
use crate::backup::{create_backup, verify_backup, BackupError, BackupInfo};
use crate::convert::{convert_config, ConvertOptions};
use crate::detect::{detect_installation, Assistant, Installation};
use crate::document::{read_config, read_optional_config, write_config, Document, DocumentError};
use crate::merge::merge_config;
use crate::settings::MigrationPaths;
use crate::verify::{verify_target, VerifyReport};
use crate::workspace::{
    count_lines, migrate_workspace, preview_workspace, replace_backup, FileOutcome, WorkspaceError,
    WorkspaceOptions, WorkspacePreview, WorkspaceResult,
};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("No OpenClaw installation at {0}")]
    SourceNotFound(PathBuf),
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, Copy)]
pub struct MigrateOptions {
    /// Report what would happen without writing anything.
    pub dry_run: bool,
    /// Archive the OpenClaw home before touching the target.
    pub backup: bool,
    /// Swap a known-outdated default model for its replacement.
    pub upgrade_model: bool,
    pub overwrite: bool,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
            upgrade_model: false,
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub paths: MigrationPaths,
    pub source: Installation,
    pub target_existed: bool,
    pub backup: Option<BackupInfo>,
    /// Set when the archive was written but could not be listed back.
    pub backup_warning: Option<String>,
    pub workspace: Option<WorkspaceResult>,
    pub preview: Option<WorkspacePreview>,
    pub config: Option<FileOutcome>,
    pub model: Option<ModelAdvice>,
    pub model_upgraded: bool,
    pub attention: Vec<AttentionItem>,
    pub verify: Option<VerifyReport>,
}

impl MigrationReport {
    pub fn error_count(&self) -> usize {
        let workspace = self.workspace.as_ref().map(|ws| ws.errors).unwrap_or(0);
        let config = self
            .config
            .as_ref()
            .map(|outcome| usize::from(outcome.error().is_some()))
            .unwrap_or(0);
        workspace + config
    }
}

/// Read an OpenClaw config, convert it and optionally lay it over an
/// existing PicoClaw config that must parse.
pub fn convert_file(
    source: &Path,
    merge_with: Option<&Path>,
    options: &ConvertOptions,
) -> Result<Document, DocumentError> {
    let converted = convert_config(&read_config(source)?, options);
    match merge_with {
        Some(path) => Ok(merge_config(Some(&read_config(path)?), converted)),
        None => Ok(converted),
    }
}

/// Convert `source` and write it to `target`, keeping keys the user already
/// set there. An unreadable target is replaced, but backed up first.
pub fn migrate_config(source: &Path, target: &Path, options: &ConvertOptions) -> FileOutcome {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "config.json".to_string());
    let mut outcome = FileOutcome::new(&name, source, target);

    let source_config = match read_config(source) {
        Ok(config) => config,
        Err(err) if err.is_not_found() => return outcome.skipped("source missing"),
        Err(err) => return outcome.failed(err.to_string()),
    };
    let converted = convert_config(&source_config, options);

    let existing = match read_optional_config(target) {
        Ok(existing) => existing,
        Err(err) => {
            warn!(path = %target.display(), error = %err, "existing config unreadable; replacing it");
            None
        }
    };
    let merged = merge_config(existing.as_ref(), converted);

    if target.exists() {
        if let Err(err) = replace_backup(target) {
            return outcome.failed(format!("back up {}: {err}", target.display()));
        }
        outcome.backed_up = true;
    }
    if let Some(parent) = target.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            return outcome.failed(format!("create {}: {err}", parent.display()));
        }
    }
    if let Err(err) = write_config(&merged, target) {
        return outcome.failed(err.to_string());
    }
    outcome.lines = fs::read(target).map(|content| count_lines(&content)).unwrap_or(0);
    outcome
}

pub fn run_migration(
    paths: &MigrationPaths,
    options: &MigrateOptions,
) -> Result<MigrationReport, MigrationError> {
    let source = detect_installation(Assistant::OpenClaw, &paths.source_home);
    if !source.found {
        return Err(MigrationError::SourceNotFound(paths.source_home.clone()));
    }
    let target_existed = paths.target_home.is_dir();
    let mut report = MigrationReport {
        dry_run: options.dry_run,
        paths: paths.clone(),
        target_existed,
        backup: None,
        backup_warning: None,
        workspace: None,
        preview: None,
        config: None,
        model: source.config.as_ref().and_then(model_advice),
        model_upgraded: false,
        attention: manual_attention(&source),
        verify: None,
        source,
    };

    let source_workspace = paths.source_workspace();
    if options.dry_run {
        if source_workspace.is_dir() {
            report.preview = Some(preview_workspace(&source_workspace)?);
        }
        return Ok(report);
    }

    if options.backup {
        let backup = create_backup(&paths.source_home, &paths.backup_dir)?;
        if let Err(err) = verify_backup(&backup.path) {
            warn!(path = %backup.path.display(), error = %err, "backup could not be verified");
            report.backup_warning = Some(err.to_string());
        }
        report.backup = Some(backup);
    }

    if source_workspace.is_dir() {
        let workspace_options = WorkspaceOptions {
            overwrite: options.overwrite,
        };
        let result = migrate_workspace(&source_workspace, &paths.target_workspace(), &workspace_options)?;
        info!(
            migrated = result.migrated,
            skipped = result.skipped,
            errors = result.errors,
            "workspace migrated"
        );
        report.workspace = Some(result);
    }

    if paths.source_config().is_file() {
        let convert_options = ConvertOptions {
            workspace: paths.target_workspace_display.clone(),
        };
        report.config = Some(migrate_config(
            &paths.source_config(),
            &paths.target_config(),
            &convert_options,
        ));
    }

    let config_written = report.config.as_ref().is_some_and(FileOutcome::is_migrated);
    if options.upgrade_model && config_written {
        if let Some(recommended) = report.model.as_ref().and_then(|advice| advice.recommended.clone()) {
            report.model_upgraded = update_model_in_config(&paths.target_config(), &recommended)?;
        }
    }

    report.verify = Some(verify_target(paths));
    Ok(report)
}
