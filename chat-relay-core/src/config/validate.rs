//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push("server.host must not be empty".to_string());
    }
    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }

    let api_base = config.inference.api_base.trim();
    if api_base.is_empty() {
        errors.push("inference.api_base must not be empty".to_string());
    } else if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
        errors.push("inference.api_base must start with http:// or https://".to_string());
    }
    if config.inference.model.trim().is_empty() {
        errors.push("inference.model must not be empty".to_string());
    }
    if config.inference.fast_model.trim().is_empty() {
        errors.push("inference.fast_model must not be empty".to_string());
    }

    for (name, value) in [
        ("chat_timeout_secs", config.relay.chat_timeout_secs),
        ("fast_timeout_secs", config.relay.fast_timeout_secs),
        ("quick_timeout_secs", config.relay.quick_timeout_secs),
        ("health_timeout_secs", config.relay.health_timeout_secs),
    ] {
        if value == 0 {
            errors.push(format!("relay.{} must be > 0", name));
        }
    }

    let generation = &config.relay.generation;
    if generation.max_tokens == 0 {
        errors.push("relay.generation.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&generation.temperature) {
        errors.push("relay.generation.temperature must be in [0.0, 2.0]".to_string());
    }
    if generation.top_k == 0 {
        errors.push("relay.generation.top_k must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
