//! OpenClaw config (`openclaw.json`) to PicoClaw config (`config.json`).
//!
//! The conversion is total: a section of the wrong shape is dropped, never
//! reported as an error. Callers that need to tell the user what was left
//! behind use [`crate::attention`], which filters with the same tables.

use serde_json::{json, Map, Value};

use crate::document::{first_non_empty_str, list, object, object_at, Document};

/// Provider names that get a `model_list` entry, with the model that entry points at.
pub const VENDOR_DEFAULT_MODELS: &[(&str, &str)] = &[
    ("openrouter", "openrouter/anthropic/claude-sonnet-4.6"),
    ("anthropic", "anthropic/claude-sonnet-4.6"),
    ("openai", "openai/gpt-5.2"),
    ("gemini", "gemini/gemini-2.0-flash"),
    ("zhipu", "zhipu/glm-4.7"),
    ("groq", "groq/llama-3.3-70b-versatile"),
    ("deepseek", "deepseek/deepseek-chat"),
    ("ollama", "ollama/llama3"),
];

/// Channels PicoClaw can run. Everything else is dropped on conversion.
pub const SUPPORTED_CHANNELS: &[&str] = &[
    "telegram", "discord", "qq", "dingtalk", "line", "slack", "feishu", "onebot",
];

pub const DEFAULT_TARGET_WORKSPACE: &str = "~/.picoclaw/workspace";

const API_KEY_ALIASES: &[&str] = &["api_key", "apiKey"];
const API_BASE_ALIASES: &[&str] = &["api_base", "apiBase"];
const MODEL_OBJECT_KEYS: &[&str] = &["primary", "name", "model", "default"];
const MCP_SERVER_KEYS: &[&str] = &["mcp_servers", "mcpServers"];

/// Agent fields copied into `agents.defaults`: target key and the source
/// spellings tried for it, first match wins.
const AGENT_FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("max_tokens", &["max_tokens", "maxTokens"]),
    ("temperature", &["temperature"]),
    ("max_tool_iterations", &["max_tool_iterations", "maxToolIterations"]),
];

const DEFAULT_HEARTBEAT_INTERVAL: u64 = 30;
const DUCKDUCKGO_MAX_RESULTS: u64 = 5;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Written verbatim into `agents.defaults.workspace`.
    pub workspace: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            workspace: DEFAULT_TARGET_WORKSPACE.to_string(),
        }
    }
}

pub fn vendor_default_model(provider: &str) -> Option<&'static str> {
    VENDOR_DEFAULT_MODELS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, model)| *model)
}

pub fn is_supported_channel(name: &str) -> bool {
    SUPPORTED_CHANNELS.contains(&name)
}

pub fn convert_config(source: &Document, options: &ConvertOptions) -> Document {
    let mut target = Document::new();
    convert_providers(source, &mut target);
    convert_agent_defaults(source, &mut target, options);
    convert_channels(source, &mut target);
    convert_tools(source, &mut target);
    convert_heartbeat(source, &mut target);
    convert_mcp_servers(source, &mut target);
    target
}

/// The agent section the converter reads: `agent`, else `agents.defaults`.
/// The two are never combined.
pub fn source_agent_section(source: &Document) -> Option<&Document> {
    object(source, "agent").or_else(|| object_at(source, &["agents", "defaults"]))
}

/// Model string from an agent section; either a plain string or an object
/// such as `{"primary": "anthropic/claude-sonnet-4-5"}`.
pub fn agent_model(agent: &Document) -> Option<&str> {
    match agent.get("model")? {
        Value::String(model) if !model.is_empty() => Some(model),
        Value::Object(model) => first_non_empty_str(model, MODEL_OBJECT_KEYS),
        _ => None,
    }
}

/// Default model of a whole OpenClaw config: `agent.model`, then
/// `agents.defaults.model`. Unlike [`source_agent_section`] the fallback is
/// per field, so an `agent` section without a model does not hide one set
/// under `agents.defaults`.
pub fn effective_model(source: &Document) -> Option<&str> {
    [object(source, "agent"), object_at(source, &["agents", "defaults"])]
        .into_iter()
        .flatten()
        .find_map(agent_model)
}

/// `camelCase` to `snake_case`; keys without uppercase letters pass through.
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (idx, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn convert_providers(source: &Document, target: &mut Document) {
    let Some(providers) = object(source, "providers") else {
        return;
    };

    let mut model_list = Vec::new();
    let mut legacy = Map::new();
    for (name, value) in providers {
        let Some(provider) = value.as_object() else {
            continue;
        };
        let api_key = first_non_empty_str(provider, API_KEY_ALIASES);
        let api_base = first_non_empty_str(provider, API_BASE_ALIASES);

        let mut credentials = Map::new();
        if let Some(key) = api_key {
            credentials.insert("api_key".into(), Value::from(key));
        }
        if let Some(base) = api_base {
            credentials.insert("api_base".into(), Value::from(base));
        }

        if let Some(model) = vendor_default_model(name) {
            let mut entry = Map::new();
            entry.insert("model_name".into(), Value::from(name.as_str()));
            entry.insert("model".into(), Value::from(model));
            entry.extend(credentials.clone());
            model_list.push(Value::Object(entry));
        }
        if !credentials.is_empty() {
            legacy.insert(name.clone(), Value::Object(credentials));
        }
    }

    if !model_list.is_empty() {
        target.insert("model_list".into(), Value::Array(model_list));
    }
    if !legacy.is_empty() {
        target.insert("providers".into(), Value::Object(legacy));
    }
}

fn convert_agent_defaults(source: &Document, target: &mut Document, options: &ConvertOptions) {
    let Some(agent) = source_agent_section(source) else {
        return;
    };

    let mut defaults = Map::new();
    defaults.insert("workspace".into(), Value::from(options.workspace.as_str()));
    if let Some(model) = agent_model(agent) {
        defaults.insert("model".into(), Value::from(model));
    }
    for (target_key, aliases) in AGENT_FIELD_ALIASES {
        if let Some(value) = aliases
            .iter()
            .filter_map(|alias| agent.get(*alias))
            .find(|value| is_meaningful(value))
        {
            defaults.insert((*target_key).into(), value.clone());
        }
    }

    target.insert("agents".into(), json!({ "defaults": defaults }));
}

/// Zero, negative and empty values are treated as "not configured".
fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Number(number) => number.as_f64().map(|n| n > 0.0).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

fn convert_channels(source: &Document, target: &mut Document) {
    let Some(channels) = object(source, "channels") else {
        return;
    };

    let mut converted = Map::new();
    for (name, value) in channels {
        if !is_supported_channel(name) {
            continue;
        }
        let Some(channel) = value.as_object() else {
            continue;
        };
        let fields: Map<String, Value> = channel
            .iter()
            .map(|(key, value)| (camel_to_snake(key), value.clone()))
            .collect();
        converted.insert(name.clone(), Value::Object(fields));
    }

    if !converted.is_empty() {
        target.insert("channels".into(), Value::Object(converted));
    }
}

fn convert_tools(source: &Document, target: &mut Document) {
    let Some(tools) = object(source, "tools") else {
        return;
    };

    let mut converted = Map::new();
    if let Some(web) = object(tools, "web") {
        let mut web_out = Map::new();
        if let Some(brave) = object(web, "brave") {
            web_out.insert("brave".into(), Value::Object(brave.clone()));
        }
        web_out.insert(
            "duckduckgo".into(),
            json!({ "enabled": true, "max_results": DUCKDUCKGO_MAX_RESULTS }),
        );
        converted.insert("web".into(), Value::Object(web_out));
    }
    if let Some(cron) = object(tools, "cron") {
        converted.insert("cron".into(), Value::Object(cron.clone()));
    }

    if !converted.is_empty() {
        target.insert("tools".into(), Value::Object(converted));
    }
}

fn convert_heartbeat(source: &Document, target: &mut Document) {
    let mut heartbeat = Map::new();
    heartbeat.insert("enabled".into(), Value::Bool(true));
    heartbeat.insert("interval".into(), Value::from(DEFAULT_HEARTBEAT_INTERVAL));

    if let Some(existing) = object(source, "heartbeat") {
        if let Some(enabled) = existing.get("enabled").filter(|v| v.is_boolean()) {
            heartbeat.insert("enabled".into(), enabled.clone());
        }
        if let Some(interval) = existing.get("interval").filter(|v| v.is_number()) {
            heartbeat.insert("interval".into(), interval.clone());
        }
    }

    target.insert("heartbeat".into(), Value::Object(heartbeat));
}

fn convert_mcp_servers(source: &Document, target: &mut Document) {
    let servers = MCP_SERVER_KEYS.iter().find_map(|key| list(source, key));
    if let Some(servers) = servers.filter(|servers| !servers.is_empty()) {
        target.insert("mcp_servers".into(), Value::Array(servers.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().expect("object")
    }

    fn convert(value: Value) -> Document {
        convert_config(&doc(value), &ConvertOptions::default())
    }

    #[test]
    fn camel_to_snake_handles_common_keys() {
        assert_eq!(camel_to_snake("apiKey"), "api_key");
        assert_eq!(camel_to_snake("botToken"), "bot_token");
        assert_eq!(camel_to_snake("allowFromUserIds"), "allow_from_user_ids");
        assert_eq!(camel_to_snake("Token"), "token");
        assert_eq!(camel_to_snake("enabled"), "enabled");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
        assert_eq!(camel_to_snake(""), "");
    }

    #[test]
    fn camel_to_snake_is_idempotent() {
        for key in ["apiKey", "appSecretKey", "x", "webhookURL", "snake_case"] {
            let once = camel_to_snake(key);
            assert_eq!(camel_to_snake(&once), once);
        }
    }

    #[test]
    fn empty_source_only_gets_heartbeat() {
        let target = convert(json!({}));
        assert_eq!(
            Value::Object(target),
            json!({"heartbeat": {"enabled": true, "interval": 30}})
        );
    }

    #[test]
    fn providers_split_into_model_list_and_legacy_map() {
        let target = convert(json!({
            "providers": {
                "anthropic": {"apiKey": "sk-a"},
                "openai": {"api_key": "sk-o", "apiBase": "https://proxy.local/v1"},
                "custom-llm": {"api_key": "sk-c"},
            }
        }));
        assert_eq!(
            target["model_list"],
            json!([
                {"model_name": "anthropic", "model": "anthropic/claude-sonnet-4.6", "api_key": "sk-a"},
                {"model_name": "openai", "model": "openai/gpt-5.2", "api_key": "sk-o", "api_base": "https://proxy.local/v1"},
            ])
        );
        assert_eq!(
            target["providers"],
            json!({
                "anthropic": {"api_key": "sk-a"},
                "openai": {"api_key": "sk-o", "api_base": "https://proxy.local/v1"},
                "custom-llm": {"api_key": "sk-c"},
            })
        );
    }

    #[test]
    fn providers_without_credentials_stay_out_of_legacy_map() {
        let target = convert(json!({
            "providers": {"ollama": {}, "openai": "not-an-object", "custom": {}}
        }));
        assert_eq!(
            target["model_list"],
            json!([{"model_name": "ollama", "model": "ollama/llama3"}])
        );
        assert!(!target.contains_key("providers"));
    }

    #[test]
    fn missing_providers_section_omits_both_outputs() {
        for source in [json!({}), json!({"providers": ["anthropic"]})] {
            let target = convert(source);
            assert!(!target.contains_key("model_list"));
            assert!(!target.contains_key("providers"));
        }
    }

    #[test]
    fn snake_case_credentials_win_over_camel_case() {
        let target = convert(json!({
            "providers": {"groq": {"api_key": "snake", "apiKey": "camel"}}
        }));
        assert_eq!(target["providers"]["groq"]["api_key"], json!("snake"));
    }

    #[test]
    fn agent_section_maps_aliases_and_skips_zero_values() {
        let target = convert(json!({
            "agent": {
                "model": "anthropic/claude-x",
                "maxTokens": 8192,
                "temperature": 0,
                "maxToolIterations": 20,
                "unknownField": true,
            }
        }));
        assert_eq!(
            target["agents"],
            json!({"defaults": {
                "workspace": "~/.picoclaw/workspace",
                "model": "anthropic/claude-x",
                "max_tokens": 8192,
                "max_tool_iterations": 20,
            }})
        );
    }

    #[test]
    fn agent_model_object_uses_key_priority() {
        let target = convert(json!({
            "agent": {"model": {"default": "d", "name": "n", "primary": ""}}
        }));
        assert_eq!(target["agents"]["defaults"]["model"], json!("n"));
    }

    #[test]
    fn agent_section_prefers_agent_over_agents_defaults() {
        let target = convert(json!({
            "agent": {"maxTokens": 100},
            "agents": {"defaults": {"model": "from-defaults", "maxTokens": 200}},
        }));
        let defaults = &target["agents"]["defaults"];
        assert_eq!(defaults["max_tokens"], json!(100));
        assert!(defaults.get("model").is_none());
    }

    #[test]
    fn agents_defaults_is_used_when_agent_is_absent() {
        let options = ConvertOptions {
            workspace: "/srv/pico/workspace".to_string(),
        };
        let target = convert_config(
            &doc(json!({"agents": {"defaults": {"model": {"primary": "openai/gpt-4o"}}}})),
            &options,
        );
        assert_eq!(
            target["agents"]["defaults"],
            json!({"workspace": "/srv/pico/workspace", "model": "openai/gpt-4o"})
        );
    }

    #[test]
    fn agent_of_wrong_shape_is_skipped() {
        let target = convert(json!({"agent": "nope"}));
        assert!(!target.contains_key("agents"));
    }

    #[test]
    fn unsupported_channels_are_dropped_and_fields_renamed() {
        let target = convert(json!({
            "channels": {
                "telegram": {"enabled": true, "botToken": "t", "allowFrom": ["1"]},
                "whatsapp": {"enabled": true},
                "signal": {"enabled": false},
                "slack": "malformed",
            }
        }));
        assert_eq!(
            target["channels"],
            json!({"telegram": {"enabled": true, "bot_token": "t", "allow_from": ["1"]}})
        );
    }

    #[test]
    fn only_unsupported_channels_omit_section() {
        let target = convert(json!({"channels": {"whatsapp": {"enabled": true}}}));
        assert!(!target.contains_key("channels"));
    }

    #[test]
    fn tools_web_adds_duckduckgo_and_keeps_brave() {
        let target = convert(json!({
            "tools": {
                "web": {"brave": {"apiKey": "b", "maxResults": 3}, "other": 1},
                "cron": {"enabled": true},
                "shell": {"enabled": true},
            }
        }));
        assert_eq!(
            target["tools"],
            json!({
                "web": {
                    "brave": {"apiKey": "b", "maxResults": 3},
                    "duckduckgo": {"enabled": true, "max_results": 5},
                },
                "cron": {"enabled": true},
            })
        );
    }

    #[test]
    fn tools_without_known_sections_are_omitted() {
        let target = convert(json!({"tools": {"shell": {}}}));
        assert!(!target.contains_key("tools"));
    }

    #[test]
    fn heartbeat_overrides_field_by_field() {
        let target = convert(json!({"heartbeat": {"enabled": false}}));
        assert_eq!(target["heartbeat"], json!({"enabled": false, "interval": 30}));

        let target = convert(json!({"heartbeat": {"interval": 15, "enabled": "yes"}}));
        assert_eq!(target["heartbeat"], json!({"enabled": true, "interval": 15}));
    }

    #[test]
    fn mcp_servers_pass_through_from_either_spelling() {
        let servers = json!([{"name": "fs", "command": "mcp-fs", "envVars": {"A": "1"}}]);
        let target = convert(json!({"mcpServers": servers.clone()}));
        assert_eq!(target["mcp_servers"], servers);

        let target = convert(json!({
            "mcp_servers": [{"name": "snake"}],
            "mcpServers": [{"name": "camel"}],
        }));
        assert_eq!(target["mcp_servers"], json!([{"name": "snake"}]));

        let target = convert(json!({"mcp_servers": {"name": "not a list"}}));
        assert!(!target.contains_key("mcp_servers"));
    }

    #[test]
    fn conversion_does_not_mutate_source() {
        let source = doc(json!({"channels": {"telegram": {"botToken": "t"}}}));
        let before = source.clone();
        let _ = convert_config(&source, &ConvertOptions::default());
        assert_eq!(source, before);
    }
}
