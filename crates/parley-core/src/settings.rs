//! Read-only settings lookups.
//!
//! The core only ever reads settings, through key paths such as
//! `["chat_settings", "model"]`. [`JsonSettings`] is the standard
//! implementation: built-in defaults deep-merged with user overrides.
//! The typed views below read what each request needs at submit time.

use std::time::Duration;

use parley_ai::ImageDetail;
use parley_ai::providers::openai::DEFAULT_BASE_URL;
use serde_json::{Value, json};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. You can also generate images using DALL-E 3 when users type '/image' followed by their image description.";

pub const DEFAULT_PROMPT_PROCESSOR_PROMPT: &str = "You are a creative assistant that helps enhance image generation prompts. Your goal is to make the prompts more detailed and effective for DALL-E image generation while maintaining the user's original intent.";

/// Key-path lookup into a settings tree
pub trait Settings: Send + Sync {
    fn get(&self, path: &[&str]) -> Option<Value>;
}

/// Settings backed by a JSON tree
#[derive(Debug, Clone)]
pub struct JsonSettings {
    root: Value,
}

impl Default for JsonSettings {
    fn default() -> Self {
        Self {
            root: Self::defaults(),
        }
    }
}

impl JsonSettings {
    /// Defaults with `overrides` merged on top
    pub fn with_overrides(overrides: Value) -> Self {
        let mut root = Self::defaults();
        deep_merge(&mut root, overrides);
        Self { root }
    }

    /// Set a single value, creating intermediate objects as needed
    pub fn set(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut node = &mut self.root;
        for key in parents {
            if !node.get(*key).is_some_and(Value::is_object) {
                node[*key] = json!({});
            }
            node = &mut node[*key];
        }
        node[*last] = value;
    }

    /// The built-in settings tree
    pub fn defaults() -> Value {
        json!({
            "api_settings": {
                "current_provider": "openai",
                "providers": {
                    "openai": {
                        "base_url": DEFAULT_BASE_URL,
                        "api_key_env": "OPENAI_API_KEY"
                    },
                    "groq": {
                        "base_url": "https://api.groq.com/openai/v1",
                        "api_key_env": "GROQ_API_KEY"
                    },
                    "openrouter": {
                        "base_url": "https://openrouter.ai/api/v1",
                        "api_key_env": "OPENROUTER_API_KEY"
                    }
                }
            },
            "chat_settings": {
                "model": "gpt-3.5-turbo",
                "temperature": 0.7,
                "max_conversation_history": 5,
                "system_prompt": DEFAULT_SYSTEM_PROMPT
            },
            "image_settings": {
                "enabled": true,
                "model": "dall-e-3",
                "size": "1024x1024",
                "quality": "standard",
                "max_context_history": 20,
                "use_raw_prompt": false,
                "show_enhanced_prompt": true,
                "prompt_processor": {
                    "model": "gpt-4o",
                    "temperature": 0.7,
                    "system_prompt": DEFAULT_PROMPT_PROCESSOR_PROMPT
                }
            },
            "vision_settings": {
                "enabled": true,
                "model": "gpt-4o",
                "max_tokens": 1000,
                "detail": "auto"
            },
            "voice_settings": {
                "enabled": true,
                "model": "whisper-1",
                "language": "en"
            },
            "task_settings": {
                "timeout_secs": 120
            },
            "ui_settings": {
                "theme": "dark"
            }
        })
    }
}

impl Settings for JsonSettings {
    fn get(&self, path: &[&str]) -> Option<Value> {
        let mut node = &self.root;
        for key in path {
            node = node.get(*key)?;
        }
        (!node.is_null()).then(|| node.clone())
    }
}

/// Merge `overrides` into `base`: objects merge recursively, anything else replaces
pub fn deep_merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}

fn get_str(s: &dyn Settings, path: &[&str], default: &str) -> String {
    s.get(path)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| default.to_string())
}

fn get_f64(s: &dyn Settings, path: &[&str], default: f64) -> f64 {
    s.get(path).and_then(|v| v.as_f64()).unwrap_or(default)
}

fn get_i64(s: &dyn Settings, path: &[&str], default: i64) -> i64 {
    s.get(path).and_then(|v| v.as_i64()).unwrap_or(default)
}

fn get_bool(s: &dyn Settings, path: &[&str], default: bool) -> bool {
    s.get(path).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Endpoint of the selected provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub name: String,
    pub base_url: String,
    pub api_key_env: String,
}

impl ProviderSettings {
    /// The provider named by `api_settings.current_provider`, if it is configured
    pub fn read(s: &dyn Settings) -> Option<Self> {
        let name = get_str(s, &["api_settings", "current_provider"], "openai");
        let entry = s.get(&["api_settings", "providers", name.as_str()])?;
        Some(Self {
            base_url: entry.get("base_url")?.as_str()?.to_string(),
            api_key_env: entry.get("api_key_env")?.as_str()?.to_string(),
            name,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub max_history: i64,
    pub system_prompt: String,
}

impl ChatSettings {
    pub fn read(s: &dyn Settings) -> Self {
        Self {
            model: get_str(s, &["chat_settings", "model"], "gpt-3.5-turbo"),
            temperature: get_f64(s, &["chat_settings", "temperature"], 0.7) as f32,
            max_history: get_i64(s, &["chat_settings", "max_conversation_history"], 5),
            system_prompt: get_str(s, &["chat_settings", "system_prompt"], DEFAULT_SYSTEM_PROMPT),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptProcessor {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSettings {
    pub enabled: bool,
    pub model: String,
    pub size: String,
    pub quality: String,
    pub max_context_history: i64,
    pub use_raw_prompt: bool,
    pub show_enhanced_prompt: bool,
    pub processor: PromptProcessor,
}

impl ImageSettings {
    pub fn read(s: &dyn Settings) -> Self {
        let p = |key: &'static str| ["image_settings", "prompt_processor", key];
        Self {
            enabled: get_bool(s, &["image_settings", "enabled"], true),
            model: get_str(s, &["image_settings", "model"], "dall-e-3"),
            size: get_str(s, &["image_settings", "size"], "1024x1024"),
            quality: get_str(s, &["image_settings", "quality"], "standard"),
            max_context_history: get_i64(s, &["image_settings", "max_context_history"], 20),
            use_raw_prompt: get_bool(s, &["image_settings", "use_raw_prompt"], false),
            show_enhanced_prompt: get_bool(s, &["image_settings", "show_enhanced_prompt"], true),
            processor: PromptProcessor {
                model: get_str(s, &p("model"), "gpt-4o"),
                temperature: get_f64(s, &p("temperature"), 0.7) as f32,
                system_prompt: get_str(s, &p("system_prompt"), DEFAULT_PROMPT_PROCESSOR_PROMPT),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionSettings {
    pub enabled: bool,
    pub model: String,
    pub max_tokens: u32,
    pub detail: ImageDetail,
}

impl VisionSettings {
    pub fn read(s: &dyn Settings) -> Self {
        let detail = get_str(s, &["vision_settings", "detail"], "auto");
        Self {
            enabled: get_bool(s, &["vision_settings", "enabled"], true),
            model: get_str(s, &["vision_settings", "model"], "gpt-4o"),
            max_tokens: get_i64(s, &["vision_settings", "max_tokens"], 1000).clamp(1, u32::MAX as i64)
                as u32,
            detail: ImageDetail::parse(&detail).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub enabled: bool,
    pub model: String,
    pub language: Option<String>,
}

impl VoiceSettings {
    pub fn read(s: &dyn Settings) -> Self {
        let language = get_str(s, &["voice_settings", "language"], "en");
        Self {
            enabled: get_bool(s, &["voice_settings", "enabled"], true),
            model: get_str(s, &["voice_settings", "model"], "whisper-1"),
            language: (!language.is_empty()).then_some(language),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSettings {
    /// Local time budget per task; `None` disables it
    pub timeout: Option<Duration>,
}

impl TaskSettings {
    pub fn read(s: &dyn Settings) -> Self {
        let secs = get_f64(s, &["task_settings", "timeout_secs"], 120.0);
        // Budgets too large for a Duration count as no budget
        Self {
            timeout: Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|budget| !budget.is_zero()),
        }
    }
}

/// Presentation choices for the interactive front end
#[derive(Debug, Clone, PartialEq)]
pub struct UiSettings {
    pub theme: String,
}

impl UiSettings {
    pub fn read(s: &dyn Settings) -> Self {
        Self {
            theme: get_str(s, &["ui_settings", "theme"], "dark"),
        }
    }
}
