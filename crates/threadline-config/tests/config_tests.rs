// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Threadline configuration system.

use threadline_config::diagnostic::ConfigError;
use threadline_config::model::DriverMode;
use threadline_config::{load_and_validate_str, load_config, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[log]
level = "debug"

[server]
host = "0.0.0.0"
port = 9000

[auth]
tokens = { "tok_alice_0123456789" = "alice" }

[openai]
api_key = "sk-test"
base_url = "http://localhost:4010/v1"
max_retries = 3

[relay]
mode = "stream"
max_poll_attempts = 10
poll_interval_ms = 100
token_ttl_secs = 30

[storage]
database_path = "/tmp/threadline-test.db"
wal_mode = false

[prometheus]
enabled = true
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.server.port, 9000);
    assert_eq!(
        config.auth.tokens.get("tok_alice_0123456789").map(String::as_str),
        Some("alice")
    );
    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.openai.max_retries, 3);
    assert_eq!(config.relay.mode, DriverMode::Stream);
    assert_eq!(config.relay.max_poll_attempts, 10);
    assert_eq!(config.relay.token_ttl_secs, 30);
    assert!(!config.storage.wal_mode);
    assert!(config.prometheus.enabled);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML is valid");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.relay.mode, DriverMode::Poll);
    assert_eq!(config.relay.max_poll_attempts, 60);
    assert_eq!(config.relay.poll_interval_ms, 250);
    assert_eq!(config.relay.token_ttl_secs, 600);
    assert_eq!(config.openai.beta_header, "assistants=v2");
    assert!(config.relay.fallback_message.contains("technical difficulties"));
    assert!(config.auth.tokens.is_empty());
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[relay]
max_pol_attempts = 5
"#;

    let errors = load_and_validate_str(toml).expect_err("typo must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => {
            assert_eq!(key, "max_pol_attempts");
            assert_eq!(suggestion.as_deref(), Some("max_poll_attempts"));
            assert!(valid_keys.contains("poll_interval_ms"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn invalid_driver_mode_is_rejected() {
    let err = load_config_from_str("[relay]\nmode = \"push\"\n").unwrap_err();
    assert!(err.to_string().contains("push"), "got: {err}");
}

#[test]
fn wrong_type_reports_key() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n").unwrap_err();
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { key, .. } if key.contains("port")),
        "got: {:?}",
        errors[0]
    );
}

#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[server]
port = 0

[relay]
token_ttl_secs = 0
fallback_message = ""
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn debug_output_redacts_secrets() {
    let toml = r#"
[auth]
tokens = { "tok_secret_0123456789" = "alice" }

[openai]
api_key = "sk-live-very-secret"
"#;
    let config = load_config_from_str(toml).unwrap();
    let debug = format!("{config:?}");
    assert!(!debug.contains("sk-live-very-secret"));
    assert!(!debug.contains("tok_secret_0123456789"));
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "threadline.toml",
            "[relay]\nmax_poll_attempts = 10\n\n[server]\nport = 9000\n",
        )?;
        jail.set_env("THREADLINE_RELAY_MAX_POLL_ATTEMPTS", "3");
        jail.set_env("THREADLINE_OPENAI_BASE_URL", "http://127.0.0.1:9999/v1");

        let config = load_config()?;
        assert_eq!(config.relay.max_poll_attempts, 3);
        assert_eq!(config.openai.base_url, "http://127.0.0.1:9999/v1");
        assert_eq!(config.server.port, 9000);
        Ok(())
    });
}
