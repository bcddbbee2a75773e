//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, path: Option<PathBuf>) -> Result<()> {
    let config_path = path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Set { key, value } => {
            let updated = set_value(&settings, key, value)?;
            updated.save_to(&config_path)?;
            Output::success(&format!("Set {} = {}", key, value));
            Output::kv("Config file", &config_path.display().to_string());
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Return `settings` with the dotted `key` set to `value`.
///
/// The value is parsed as a TOML literal when possible (numbers, booleans),
/// otherwise taken as a string. The result must still deserialize and validate.
pub fn set_value(settings: &Settings, key: &str, value: &str) -> Result<Settings> {
    let mut root = toml::Value::try_from(settings).context("Failed to serialize config")?;

    let parts: Vec<&str> = key.split('.').collect();
    let (field, sections) = parts
        .split_last()
        .context("Configuration key must not be empty")?;
    if sections.is_empty() {
        anyhow::bail!("Configuration key must be section.field, got {}", key);
    }

    let mut table = root.as_table_mut().context("Config root is not a table")?;
    for section in sections {
        table = table
            .get_mut(*section)
            .and_then(|v| v.as_table_mut())
            .with_context(|| format!("Unknown config section: {}", section))?;
    }

    let parsed = toml::from_str::<toml::Table>(&format!("v = {}", value))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(value.to_string()));
    table.insert(field.to_string(), parsed);

    let updated: Settings = root
        .try_into()
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;

    // Unknown fields are dropped on deserialize; make sure the key stuck.
    let check = toml::Value::try_from(&updated).context("Failed to serialize config")?;
    let stuck = parts
        .iter()
        .try_fold(&check, |v, part| v.get(*part))
        .is_some();
    if !stuck {
        anyhow::bail!("Unknown config key: {}", key);
    }

    updated.validate()?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_number_and_string() {
        let settings = Settings::default();
        let updated = set_value(&settings, "retrieval.final_top_k", "5").unwrap();
        assert_eq!(updated.retrieval.final_top_k, 5);

        let updated = set_value(&updated, "answer.primary_model", "gpt-4o").unwrap();
        assert_eq!(updated.answer.primary_model, "gpt-4o");
        assert_eq!(updated.retrieval.final_top_k, 5);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let settings = Settings::default();
        assert!(set_value(&settings, "retrieval.final_top_k", "many").is_err());
        assert!(set_value(&settings, "retrieval.final_top_k", "0").is_err());
        assert!(set_value(&settings, "nosuch.key", "1").is_err());
    }
}
