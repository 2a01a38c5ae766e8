use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::convert::DEFAULT_TARGET_WORKSPACE;

pub const SOURCE_HOME_ENV: &str = "OPENCLAW_HOME";
pub const TARGET_HOME_ENV: &str = "PICOCLAW_HOME";
pub const BACKUP_DIR_ENV: &str = "CLAWMIG_BACKUP_DIR";
pub const CLAWMIG_HOME_ENV: &str = "CLAWMIG_HOME";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Unable to resolve home directory; set HOME or USERPROFILE")]
    NoHome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub source_home: Option<PathBuf>,
    pub target_home: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    /// Value written to `agents.defaults.workspace` in the converted config.
    pub target_workspace_display: Option<String>,
    /// Replace existing workspace files (after a `.bak` copy). Defaults to true.
    pub overwrite: Option<bool>,
}

impl Settings {
    pub fn workspace_display(&self) -> String {
        self.target_workspace_display
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TARGET_WORKSPACE.to_string())
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite.unwrap_or(true)
    }
}

/// Explicit command-line choices; these beat everything else.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub source_home: Option<PathBuf>,
    pub target_home: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
}

/// Every location a migration run touches, resolved once up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPaths {
    pub source_home: PathBuf,
    pub target_home: PathBuf,
    pub backup_dir: PathBuf,
    pub target_workspace_display: String,
}

impl MigrationPaths {
    pub fn new(source_home: &Path, target_home: &Path, backup_dir: &Path) -> Self {
        Self {
            source_home: source_home.to_path_buf(),
            target_home: target_home.to_path_buf(),
            backup_dir: backup_dir.to_path_buf(),
            target_workspace_display: DEFAULT_TARGET_WORKSPACE.to_string(),
        }
    }

    pub fn source_config(&self) -> PathBuf {
        self.source_home.join("openclaw.json")
    }

    pub fn source_workspace(&self) -> PathBuf {
        self.source_home.join("workspace")
    }

    pub fn target_config(&self) -> PathBuf {
        self.target_home.join("config.json")
    }

    pub fn target_workspace(&self) -> PathBuf {
        self.target_home.join("workspace")
    }
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    for var in ["HOME", "USERPROFILE"] {
        if let Ok(value) = std::env::var(var) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
    }
    None
}

fn env_path(var: &str) -> Option<PathBuf> {
    let value = std::env::var(var).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

pub fn resolve_clawmig_home_dir() -> Option<PathBuf> {
    env_path(CLAWMIG_HOME_ENV).or_else(|| resolve_user_home_dir().map(|home| home.join(".clawmig")))
}

pub fn settings_path() -> Option<PathBuf> {
    resolve_clawmig_home_dir().map(|home| home.join("config.toml"))
}

pub fn load_settings_from(path: &Path) -> Result<Option<Settings>, SettingsError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&text)?))
}

/// Settings from the default location; absent file means defaults.
pub fn load_settings() -> Result<Settings, SettingsError> {
    match settings_path() {
        Some(path) => Ok(load_settings_from(&path)?.unwrap_or_default()),
        None => Ok(Settings::default()),
    }
}

pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(settings)?)?;
    Ok(())
}

/// Flag, then environment, then settings file, then `~/<default>`.
pub fn resolve_paths(
    overrides: &PathOverrides,
    settings: &Settings,
) -> Result<MigrationPaths, SettingsError> {
    let home = resolve_user_home_dir();
    let pick = |flag: &Option<PathBuf>,
                env: &str,
                configured: &Option<PathBuf>,
                default: &str|
     -> Result<PathBuf, SettingsError> {
        if let Some(path) = flag.clone().or_else(|| env_path(env)).or_else(|| configured.clone()) {
            return Ok(path);
        }
        home.as_ref()
            .map(|home| if default.is_empty() { home.clone() } else { home.join(default) })
            .ok_or(SettingsError::NoHome)
    };

    Ok(MigrationPaths {
        source_home: pick(&overrides.source_home, SOURCE_HOME_ENV, &settings.source_home, ".openclaw")?,
        target_home: pick(&overrides.target_home, TARGET_HOME_ENV, &settings.target_home, ".picoclaw")?,
        backup_dir: pick(&overrides.backup_dir, BACKUP_DIR_ENV, &settings.backup_dir, "")?,
        target_workspace_display: settings.workspace_display(),
    })
}
