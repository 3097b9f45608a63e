// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin subcommands that seed businesses and agents.

use std::str::FromStr;

use threadline_config::ThreadlineConfig;
use threadline_core::{Capability, ChatStore, NewAgent, RelayError};
use threadline_storage::SqliteStorage;

async fn open_storage(config: &ThreadlineConfig) -> Result<SqliteStorage, RelayError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(storage)
}

/// `threadline business create --name <name>`
pub async fn create_business(config: &ThreadlineConfig, name: &str) -> Result<(), RelayError> {
    if name.trim().is_empty() {
        return Err(RelayError::Input("business name must not be empty".into()));
    }
    let storage = open_storage(config).await?;
    let business = storage.create_business(name.trim()).await?;
    print_json(&business)?;
    storage.close().await
}

/// `threadline agent create ...`
pub async fn create_agent(
    config: &ThreadlineConfig,
    business_id: i64,
    name: &str,
    instructions: &str,
    model: &str,
    capabilities: &[String],
) -> Result<(), RelayError> {
    let capabilities = parse_capabilities(capabilities)?;
    let storage = open_storage(config).await?;
    if storage.get_business(business_id).await?.is_none() {
        return Err(RelayError::NotFound {
            kind: "business",
            id: business_id.to_string(),
        });
    }

    let agent = storage
        .create_agent(&NewAgent {
            business_id,
            name: name.to_string(),
            instructions: instructions.to_string(),
            model: model.to_string(),
            capabilities,
        })
        .await?;
    print_json(&agent)?;
    storage.close().await
}

fn parse_capabilities(raw: &[String]) -> Result<Vec<Capability>, RelayError> {
    let mut capabilities = Vec::with_capacity(raw.len());
    for name in raw {
        let capability = Capability::from_str(name)
            .map_err(|_| RelayError::Input(format!("unknown capability '{name}'")))?;
        if !capabilities.contains(&capability) {
            capabilities.push(capability);
        }
    }
    Ok(capabilities)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), RelayError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RelayError::Internal(format!("failed to encode output: {e}")))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_dedups_capabilities() {
        let parsed =
            parse_capabilities(&["attachments".into(), "voice".into(), "attachments".into()])
                .unwrap();
        assert_eq!(parsed, vec![Capability::Attachments, Capability::Voice]);
    }

    #[test]
    fn rejects_unknown_capability() {
        let err = parse_capabilities(&["telepathy".into()]).unwrap_err();
        assert!(matches!(err, RelayError::Input(_)));
    }

    #[tokio::test]
    async fn creates_business_then_agent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ThreadlineConfig::default();
        config.storage.database_path = dir.path().join("admin.db").to_string_lossy().into_owned();

        create_business(&config, "Acme").await.unwrap();
        create_agent(&config, 1, "Helper", "Be brief.", "gpt-4o-mini", &["voice".into()])
            .await
            .unwrap();

        let missing = create_agent(&config, 99, "Ghost", "", "gpt-4o-mini", &[]).await;
        assert!(matches!(missing, Err(RelayError::NotFound { .. })));
    }
}
