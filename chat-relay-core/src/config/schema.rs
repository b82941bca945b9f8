//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Root configuration for chat-relay
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Inference server configuration
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Relay behaviour
    #[serde(default)]
    pub relay: RelayConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Inference server (Ollama-compatible) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of the inference server
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model used for full-history chats
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used in fast mode and by the quick endpoint
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
}

fn default_api_base() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_fast_model() -> String {
    "gemma2:2b".to_string()
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            fast_model: default_fast_model(),
        }
    }
}

/// Which deployment flavour the relay runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Forward the whole session transcript on every chat
    #[default]
    Full,
    /// Forward a synthetic system+user pair with short generation options
    Fast,
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayMode::Full => f.write_str("full"),
            RelayMode::Fast => f.write_str("fast"),
        }
    }
}

impl FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(RelayMode::Full),
            "fast" => Ok(RelayMode::Fast),
            other => Err(format!("unknown relay mode '{}' (expected full or fast)", other)),
        }
    }
}

/// Relay behaviour: mode, timeouts and fast-mode prompt settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub mode: RelayMode,
    /// Outbound timeout for full-history chats
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_secs: u64,
    /// Outbound timeout for fast-mode chats
    #[serde(default = "default_fast_timeout")]
    pub fast_timeout_secs: u64,
    /// Outbound timeout for the quick endpoint
    #[serde(default = "default_quick_timeout")]
    pub quick_timeout_secs: u64,
    /// Timeout for the model-listing probe
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
    /// System prompt injected in fast mode
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Generation options sent in fast mode
    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_chat_timeout() -> u64 {
    120
}

fn default_fast_timeout() -> u64 {
    15
}

fn default_quick_timeout() -> u64 {
    10
}

fn default_health_timeout() -> u64 {
    5
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Keep responses clear and concise. \
     Respond in the same language as the user."
        .to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: RelayMode::default(),
            chat_timeout_secs: default_chat_timeout(),
            fast_timeout_secs: default_fast_timeout(),
            quick_timeout_secs: default_quick_timeout(),
            health_timeout_secs: default_health_timeout(),
            system_prompt: default_system_prompt(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Generation parameters forwarded to the inference server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Upper bound on produced tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_max_tokens() -> u32 {
    100
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_k() -> u32 {
    40
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_k: default_top_k(),
        }
    }
}
