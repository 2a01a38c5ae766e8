use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::convert::{effective_model, source_agent_section};
use crate::document::{list, object, object_at, read_config, Document};
use crate::workspace::count_files;

/// Persona files an agent workspace is expected to carry.
pub const STANDARD_FILES: &[&str] = &[
    "SOUL.md",
    "IDENTITY.md",
    "AGENTS.md",
    "USER.md",
    "TOOLS.md",
    "HEARTBEAT.md",
];

/// Directories OpenClaw itself manages inside the workspace.
pub const STANDARD_DIRS: &[&str] = &[
    "memory", "skills", "cron", "sessions", "state", "config", ".git", ".openclaw",
];

const IGNORED_FILES: &[&str] = &[".DS_Store", ".gitignore"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assistant {
    OpenClaw,
    PicoClaw,
}

impl Assistant {
    pub fn binary_name(self) -> &'static str {
        match self {
            Self::OpenClaw => "openclaw",
            Self::PicoClaw => "picoclaw",
        }
    }

    pub fn config_file_name(self) -> &'static str {
        match self {
            Self::OpenClaw => "openclaw.json",
            Self::PicoClaw => "config.json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigSummary {
    pub default_model: Option<String>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub heartbeat_enabled: Option<bool>,
    pub heartbeat_interval: Option<u64>,
    pub workspace_path: Option<String>,
    pub config_file_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Installation {
    pub assistant: Assistant,
    pub found: bool,
    pub home_dir: PathBuf,
    pub config_path: PathBuf,
    pub workspace_dir: PathBuf,
    pub binary_path: Option<PathBuf>,
    pub version: Option<String>,
    pub workspace_files: Vec<String>,
    pub extra_files: Vec<String>,
    pub extra_dirs: Vec<String>,
    pub has_memory: bool,
    pub has_skills: bool,
    pub has_cron: bool,
    pub has_sessions: bool,
    #[serde(skip)]
    pub config: Option<Document>,
    pub config_error: Option<String>,
    pub config_summary: Option<ConfigSummary>,
}

pub fn detect_installation(assistant: Assistant, home_dir: &Path) -> Installation {
    let config_path = home_dir.join(assistant.config_file_name());
    let workspace_dir = home_dir.join("workspace");
    let mut inst = Installation {
        assistant,
        found: home_dir.is_dir(),
        home_dir: home_dir.to_path_buf(),
        config_path: config_path.clone(),
        workspace_dir: workspace_dir.clone(),
        binary_path: None,
        version: None,
        workspace_files: Vec::new(),
        extra_files: Vec::new(),
        extra_dirs: Vec::new(),
        has_memory: false,
        has_skills: false,
        has_cron: false,
        has_sessions: false,
        config: None,
        config_error: None,
        config_summary: None,
    };

    if let Some((binary, version)) = locate_binary(assistant.binary_name()) {
        inst.binary_path = Some(binary);
        inst.version = version;
    }
    if !inst.found {
        return inst;
    }

    if config_path.is_file() {
        match read_config(&config_path) {
            Ok(config) => {
                let size = fs::metadata(&config_path).map(|m| m.len()).unwrap_or(0);
                inst.config_summary = Some(summarize_config(&config, size));
                inst.config = Some(config);
            }
            Err(err) => {
                debug!(path = %config_path.display(), %err, "config unreadable");
                inst.config_error = Some(err.to_string());
            }
        }
    }

    scan_workspace(&mut inst);
    inst
}

fn scan_workspace(inst: &mut Installation) {
    let dir = inst.workspace_dir.clone();
    if let Ok(entries) = fs::read_dir(&dir) {
        let mut names: Vec<(String, bool)> = entries
            .filter_map(Result::ok)
            .map(|entry| {
                let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
                (entry.file_name().to_string_lossy().to_string(), is_dir)
            })
            .collect();
        names.sort();
        for (name, is_dir) in names {
            if is_dir {
                if !STANDARD_DIRS.contains(&name.as_str()) {
                    inst.extra_dirs.push(name);
                }
            } else if STANDARD_FILES.contains(&name.as_str()) {
                inst.workspace_files.push(name);
            } else if !IGNORED_FILES.contains(&name.as_str()) {
                inst.extra_files.push(name);
            }
        }
    }

    inst.has_memory = dir_has_entries(&dir.join("memory"));
    inst.has_skills = dir_has_entries(&dir.join("skills"));
    inst.has_cron = dir_has_entries(&dir.join("cron"));
    inst.has_sessions = dir_has_entries(&dir.join("sessions"));
}

fn dir_has_entries(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Binary on PATH plus whatever it prints for `--version`.
fn locate_binary(name: &str) -> Option<(PathBuf, Option<String>)> {
    let path = which::which(name).ok()?;
    let version = Command::new(&path)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|raw| !raw.is_empty());
    Some((path, version))
}

pub fn summarize_config(config: &Document, file_size: u64) -> ConfigSummary {
    let mut summary = ConfigSummary {
        config_file_size: file_size,
        ..ConfigSummary::default()
    };

    summary.default_model = effective_model(config).map(str::to_string);
    if let Some(agent) = source_agent_section(config) {
        summary.max_tokens = ["max_tokens", "maxTokens"]
            .iter()
            .find_map(|key| agent.get(*key).and_then(Value::as_u64));
        summary.temperature = agent.get("temperature").and_then(Value::as_f64);
    }
    summary.workspace_path = object_at(config, &["agents", "defaults"])
        .and_then(|defaults| defaults.get("workspace"))
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(heartbeat) = object(config, "heartbeat") {
        summary.heartbeat_enabled = heartbeat.get("enabled").and_then(Value::as_bool);
        summary.heartbeat_interval = heartbeat.get("interval").and_then(Value::as_u64);
    }
    summary
}

pub fn provider_names(config: &Document) -> Vec<String> {
    object(config, "providers")
        .map(|providers| providers.keys().cloned().collect())
        .unwrap_or_default()
}

/// Channels with `"enabled": true`.
pub fn enabled_channels(config: &Document) -> Vec<String> {
    let Some(channels) = object(config, "channels") else {
        return Vec::new();
    };
    channels
        .iter()
        .filter(|(_, value)| {
            value
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Names of MCP servers listed under either spelling of the key.
pub fn mcp_server_names(config: &Document) -> Vec<String> {
    ["mcp_servers", "mcpServers"]
        .iter()
        .filter_map(|key| list(config, key))
        .flatten()
        .filter_map(|server| server.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

pub fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| match entry.file_type() {
            Ok(kind) if kind.is_dir() => dir_size(&entry.path()),
            Ok(_) => entry.metadata().map(|m| m.len()).unwrap_or(0),
            Err(_) => 0,
        })
        .sum()
}

pub fn dir_file_count(path: &Path) -> usize {
    count_files(path)
}

/// 1024-based, one decimal above bytes: `512 B`, `1.5 KB`, `2.0 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0usize;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, suffix)
}
