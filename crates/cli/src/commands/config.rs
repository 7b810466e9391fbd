use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use restock_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let event_names = config
        .calendar
        .events
        .iter()
        .map(|event| format!("{:02}-{:02} {}", event.month, event.day, event.name))
        .collect::<Vec<_>>()
        .join(", ");

    let fields: Vec<(&str, String, String)> = vec![
        (
            "database.url",
            config.database.url.clone(),
            source("database.url", "RESTOCK_DATABASE_URL"),
        ),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            source("database.max_connections", "RESTOCK_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            source("database.timeout_secs", "RESTOCK_DATABASE_TIMEOUT_SECS"),
        ),
        (
            "llm.provider",
            config.llm.provider.as_str().to_string(),
            source("llm.provider", "RESTOCK_LLM_PROVIDER"),
        ),
        ("llm.model", config.llm.model.clone(), source("llm.model", "RESTOCK_LLM_MODEL")),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            source("llm.base_url", "RESTOCK_LLM_BASE_URL"),
        ),
        ("llm.api_key", llm_api_key.to_string(), source("llm.api_key", "RESTOCK_LLM_API_KEY")),
        (
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            source("llm.timeout_secs", "RESTOCK_LLM_TIMEOUT_SECS"),
        ),
        (
            "llm.max_output_tokens",
            config.llm.max_output_tokens.to_string(),
            source("llm.max_output_tokens", "RESTOCK_LLM_MAX_OUTPUT_TOKENS"),
        ),
        (
            "planning.cache_scope",
            format!("{:?}", config.planning.cache_scope).to_lowercase(),
            source("planning.cache_scope", "RESTOCK_PLANNING_CACHE_SCOPE"),
        ),
        (
            "planning.min_inventory_chars",
            config.planning.min_inventory_chars.to_string(),
            source("planning.min_inventory_chars", "RESTOCK_PLANNING_MIN_INVENTORY_CHARS"),
        ),
        (
            "calendar.utc_offset_minutes",
            config.calendar.utc_offset_minutes.to_string(),
            source("calendar.utc_offset_minutes", "RESTOCK_CALENDAR_UTC_OFFSET_MINUTES"),
        ),
        (
            "calendar.events",
            event_names,
            field_source(
                "calendar.events",
                None,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            source("server.bind_address", "RESTOCK_SERVER_BIND_ADDRESS"),
        ),
        (
            "server.port",
            config.server.port.to_string(),
            source("server.port", "RESTOCK_SERVER_PORT"),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", "RESTOCK_LOGGING_LEVEL"),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", "RESTOCK_LOGGING_FORMAT"),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.into_iter().map(|(key, value, source)| render_line(key, &value, source)));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("restock.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/restock.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
