use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::convert::{effective_model, is_supported_channel};
use crate::detect::{enabled_channels, mcp_server_names, Installation};
use crate::document::{read_config, write_config, Document, DocumentError};

/// Models PicoClaw users should move off, with the suggested replacement.
pub const MODEL_UPGRADES: &[(&str, &str)] = &[
    ("anthropic/claude-sonnet-4-5", "anthropic/claude-sonnet-4-6"),
    ("anthropic/claude-3-5-sonnet", "anthropic/claude-sonnet-4-6"),
    ("anthropic/claude-3-opus", "anthropic/claude-opus-4-6"),
    ("openai/gpt-4", "openai/gpt-5.2"),
    ("openai/gpt-4-turbo", "openai/gpt-5.2"),
    ("openai/gpt-4o", "openai/gpt-5.2"),
    ("openrouter/anthropic/claude-sonnet-4-5", "openrouter/anthropic/claude-sonnet-4-6"),
    ("openrouter/anthropic/claude-3-5-sonnet", "openrouter/anthropic/claude-sonnet-4-6"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionKind {
    McpServers,
    CronJobs,
    SessionHistory,
    UnsupportedChannels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttentionItem {
    pub kind: AttentionKind,
    pub message: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelAdvice {
    pub current: String,
    pub recommended: Option<String>,
}

impl ModelAdvice {
    pub fn is_outdated(&self) -> bool {
        self.recommended.is_some()
    }
}

/// Enabled channels the converter will drop. Uses the converter's own
/// supported set so the two never disagree.
pub fn unsupported_channels(config: &Document) -> Vec<String> {
    enabled_channels(config)
        .into_iter()
        .filter(|name| !is_supported_channel(name))
        .collect()
}

/// Everything the migration cannot carry over by itself.
pub fn manual_attention(source: &Installation) -> Vec<AttentionItem> {
    let mut items = Vec::new();

    if let Some(config) = source.config.as_ref() {
        let servers = mcp_server_names(config);
        if !servers.is_empty() {
            items.push(AttentionItem {
                kind: AttentionKind::McpServers,
                message: format!("MCP servers ({}): verify format in config", servers.join(", ")),
                names: servers,
            });
        }
    }

    if source.has_cron {
        items.push(AttentionItem {
            kind: AttentionKind::CronJobs,
            message: "Cron jobs: recreate with `picoclaw cron add ...`".to_string(),
            names: Vec::new(),
        });
    }

    if source.has_sessions {
        items.push(AttentionItem {
            kind: AttentionKind::SessionHistory,
            message: "Session history was not migrated (incompatible format)".to_string(),
            names: Vec::new(),
        });
    }

    if let Some(config) = source.config.as_ref() {
        let unsupported = unsupported_channels(config);
        if !unsupported.is_empty() {
            items.push(AttentionItem {
                kind: AttentionKind::UnsupportedChannels,
                message: format!(
                    "Unsupported channels: {} (not available in PicoClaw)",
                    unsupported.join(", ")
                ),
                names: unsupported,
            });
        }
    }

    items
}

pub fn recommended_upgrade(model: &str) -> Option<&'static str> {
    MODEL_UPGRADES
        .iter()
        .find(|(outdated, _)| *outdated == model)
        .map(|(_, upgrade)| *upgrade)
}

/// Effective default model of an OpenClaw config, if any.
pub fn extract_model(config: &Document) -> Option<String> {
    effective_model(config).map(str::to_string)
}

pub fn model_advice(config: &Document) -> Option<ModelAdvice> {
    let current = extract_model(config)?;
    let recommended = recommended_upgrade(&current).map(str::to_string);
    Some(ModelAdvice {
        current,
        recommended,
    })
}

/// Rewrite `agents.defaults.model` in an existing PicoClaw config. Returns
/// false when the file has no `agents.defaults` object to update.
pub fn update_model_in_config(path: &Path, model: &str) -> Result<bool, DocumentError> {
    let mut config = read_config(path)?;
    let updated = match config
        .get_mut("agents")
        .and_then(|agents| agents.get_mut("defaults"))
        .and_then(Value::as_object_mut)
    {
        Some(defaults) => {
            defaults.insert("model".into(), Value::from(model));
            true
        }
        None => false,
    };
    if updated {
        write_config(&config, path)?;
    }
    Ok(updated)
}
