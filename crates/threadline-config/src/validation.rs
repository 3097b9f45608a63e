// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid hosts, non-empty paths, and positive bounds.

use crate::diagnostic::ConfigError;
use crate::model::ThreadlineConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ThreadlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` must be one of: {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::Validation {
            message: "server.port must not be 0".to_string(),
        });
    }

    for (token, user) in &config.auth.tokens {
        if token.len() < 16 {
            errors.push(ConfigError::Validation {
                message: format!("auth.tokens entry for user `{user}` must be at least 16 characters"),
            });
        }
        if user.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "auth.tokens must map every token to a non-empty user id".to_string(),
            });
        }
    }

    let base_url = config.openai.base_url.trim();
    if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        errors.push(ConfigError::Validation {
            message: format!("openai.base_url `{base_url}` must start with http:// or https://"),
        });
    }

    if config.openai.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "openai.request_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.relay.max_poll_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.max_poll_attempts must be at least 1".to_string(),
        });
    }

    if config.relay.token_ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.token_ttl_secs must be at least 1".to_string(),
        });
    }

    if config.relay.token_sweep_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.token_sweep_secs must be at least 1".to_string(),
        });
    }

    if config.relay.fallback_message.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "relay.fallback_message must not be empty".to_string(),
        });
    }

    if config.relay.error_message.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "relay.error_message must not be empty".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
