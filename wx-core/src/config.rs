use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::provider::{DriverSettings, ProviderId};

/// Configuration for a single provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Location code, geoname id or `lat,lon`.
    #[serde(default)]
    pub station: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "bbc" or "openmeteo".
    pub default_provider: Option<String>,

    /// Locale used for provider-side text, e.g. "pt_BR".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Optional phrase catalog (TOML) used to translate condition text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<PathBuf>,

    /// Example TOML:
    /// [providers.owmfree]
    /// station = "2267057"
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `wx configure <provider>` (e.g. `wx configure openmeteo`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn has_provider(&self, id: ProviderId) -> bool {
        self.providers.contains_key(id.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Settings a driver for `id` is built from, if the provider is configured.
    pub fn driver_settings(&self, id: ProviderId) -> Option<DriverSettings> {
        self.provider_config(id).map(|cfg| DriverSettings {
            station: cfg.station.clone(),
            api_key: cfg.api_key.clone(),
            language: self.language.clone(),
        })
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "wx-drivers", "wx")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider's station and API key; the first provider
    /// configured becomes the default.
    pub fn upsert_provider(
        &mut self,
        provider_id: ProviderId,
        station: String,
        api_key: Option<String>,
    ) {
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { station, api_key });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).and_then(|cfg| cfg.api_key.as_deref())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        match self.provider_config(provider_id) {
            Some(cfg) => {
                !cfg.station.trim().is_empty()
                    && (!provider_id.capabilities().requires_api_key
                        || cfg.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()))
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_provider_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_provider_id().unwrap_err();

        assert!(err.to_string().contains("No default provider configured"));
    }

    #[test]
    fn upsert_sets_default_and_settings() {
        let mut cfg = Config::default();
        cfg.language = Some("pt_BR".into());

        cfg.upsert_provider(ProviderId::OwmFree, "2267057".into(), Some("OWM_KEY".into()));

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OwmFree);

        let settings = cfg.driver_settings(ProviderId::OwmFree).expect("configured");
        assert_eq!(settings.station, "2267057");
        assert_eq!(settings.api_key.as_deref(), Some("OWM_KEY"));
        assert_eq!(settings.language.as_deref(), Some("pt_BR"));
        assert_eq!(cfg.provider_api_key(ProviderId::OwmFree), Some("OWM_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OwmFree));
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider(ProviderId::Bbc, "2643743".into(), None);
        cfg.upsert_provider(ProviderId::OpenMeteo, "38.72,-9.14".into(), None);

        let default = cfg.default_provider_id().expect("default provider must exist");

        assert_eq!(default, ProviderId::Bbc);
        assert!(cfg.has_provider(ProviderId::OpenMeteo));
    }

    #[test]
    fn set_default_provider_overrides_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider(ProviderId::Bbc, "2643743".into(), None);
        cfg.set_default_provider(ProviderId::Nws);

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::Nws);
    }

    #[test]
    fn keyed_provider_without_key_is_not_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider(ProviderId::Google, "40.71,-74.0".into(), None);
        assert!(!cfg.is_provider_configured(ProviderId::Google));
        assert!(cfg.driver_settings(ProviderId::Google).is_some());
    }

    #[test]
    fn parses_toml_file_contents() {
        let cfg = Config::from_toml_str(
            r#"
            default_provider = "nws"
            language = "en_US"

            [providers.nws]
            station = "39.7456,-97.0892"
            "#,
        )
        .expect("valid config");

        assert_eq!(cfg.default_provider_id().unwrap(), ProviderId::Nws);
        assert!(cfg.is_provider_configured(ProviderId::Nws));
        assert_eq!(cfg.provider_api_key(ProviderId::Nws), None);
    }

    #[test]
    fn serializes_without_empty_optionals() {
        let mut cfg = Config::default();
        cfg.upsert_provider(ProviderId::Bbc, "2643743".into(), None);
        let text = toml::to_string_pretty(&cfg).expect("serializable");
        assert!(!text.contains("api_key"));
        assert!(text.contains("station = \"2643743\""));
    }
}
