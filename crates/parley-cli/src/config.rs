//! Settings file support
//!
//! The file is TOML with the same tree as the built-in settings; whatever it
//! sets is deep-merged over the defaults.

use parley_core::JsonSettings;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
}

/// `$PARLEY_CONFIG_PATH`, else `<config_dir>/parley/config.toml`
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    config_dir().join("config.toml")
}

/// Where `--verbose` writes its trace log
pub fn log_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
        .join("parley.log")
}

/// Parse a settings file into the JSON tree the settings layer merges
pub fn parse(content: &str) -> Result<Value, toml::de::Error> {
    let table: toml::Table = toml::from_str(content)?;
    Ok(serde_json::to_value(table).unwrap_or_else(|_| Value::Object(Default::default())))
}

/// Load settings from `path`. A missing file means defaults; a broken one
/// is reported and ignored.
pub fn load_from(path: &Path) -> JsonSettings {
    if !path.exists() {
        return JsonSettings::default();
    }
    let overrides = match fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("ignoring {}: {}", path.display(), e);
                eprintln!("Warning: failed to parse {}: {}", path.display(), e);
                return JsonSettings::default();
            }
        },
        Err(e) => {
            tracing::warn!("cannot read {}: {}", path.display(), e);
            eprintln!("Warning: failed to read {}: {}", path.display(), e);
            return JsonSettings::default();
        }
    };
    tracing::debug!("loaded settings from {}", path.display());
    JsonSettings::with_overrides(overrides)
}

pub fn load() -> JsonSettings {
    load_from(&config_path())
}

/// Write the example file unless one exists; returns its path
pub fn init() -> io::Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Ok(path);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, example_config())?;
    Ok(path)
}

pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux), ~/Library/Application Support/parley/config.toml (macOS)
# or %APPDATA%\parley\config.toml (Windows). Every key is optional.

[api_settings]
# openai, groq or openrouter
current_provider = "openai"

# [api_settings.providers.openai]
# base_url = "https://api.openai.com/v1"
# api_key_env = "OPENAI_API_KEY"

[chat_settings]
model = "gpt-3.5-turbo"
temperature = 0.7
# Messages sent with each chat request; 0 sends the whole conversation
max_conversation_history = 5
# system_prompt = "You are a helpful assistant."

[image_settings]
enabled = true
model = "dall-e-3"
size = "1024x1024"
quality = "standard"
max_context_history = 20
# Skip the prompt-enhancement step and send the conversation as the prompt
use_raw_prompt = false
show_enhanced_prompt = true

[vision_settings]
enabled = true
model = "gpt-4o"
max_tokens = 1000
# auto, low or high
detail = "auto"

[voice_settings]
enabled = true
model = "whisper-1"
language = "en"

[task_settings]
# Requests running longer than this fail with a timeout; 0 disables it
timeout_secs = 120

[ui_settings]
# dark or light
theme = "dark"
"#
}
