use crate::{
    Config, WeatherRecord,
    error::{DriverError, RefreshError, Result},
    provider::{
        bbc::BbcDriver, google::GoogleDriver, nws::NwsDriver, openmeteo::OpenMeteoDriver,
        owmfree::OwmFreeDriver,
    },
    station::StationKinds,
    translate::Translator,
    transport::Transport,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::{fmt::Debug, sync::Arc};

pub mod bbc;
pub mod google;
pub mod nws;
pub mod openmeteo;
pub mod owmfree;

/// Sent to providers that ask clients to identify themselves (NWS, Nominatim).
pub(crate) const USER_AGENT: &str = concat!("wx-core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Bbc,
    Google,
    Nws,
    OwmFree,
    OpenMeteo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Bbc => "bbc",
            ProviderId::Google => "google",
            ProviderId::Nws => "nws",
            ProviderId::OwmFree => "owmfree",
            ProviderId::OpenMeteo => "openmeteo",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::Bbc,
            ProviderId::Google,
            ProviderId::Nws,
            ProviderId::OwmFree,
            ProviderId::OpenMeteo,
        ]
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        match self {
            ProviderId::Bbc => &bbc::CAPABILITIES,
            ProviderId::Google => &google::CAPABILITIES,
            ProviderId::Nws => &nws::CAPABILITIES,
            ProviderId::OwmFree => &owmfree::CAPABILITIES,
            ProviderId::OpenMeteo => &openmeteo::CAPABILITIES,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "bbc" => Ok(ProviderId::Bbc),
            "google" => Ok(ProviderId::Google),
            "nws" => Ok(ProviderId::Nws),
            "owmfree" | "owm" => Ok(ProviderId::OwmFree),
            "openmeteo" | "open-meteo" => Ok(ProviderId::OpenMeteo),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. \
                 Supported providers: bbc, google, nws, owmfree, openmeteo."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaFields {
    pub country: bool,
    pub region: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentFields {
    pub feels_like: bool,
    pub pressure: bool,
    pub pressure_trend: bool,
    pub visibility: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastFields {
    pub humidity: bool,
    pub pressure: bool,
}

/// What a provider can fill in. Fixed per provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Number of forecast days, day 0 included.
    pub horizon: usize,
    pub stations: StationKinds,
    pub requires_api_key: bool,
    pub meta: MetaFields,
    pub current: CurrentFields,
    pub forecast: ForecastFields,
}

/// Attribution shown next to the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: &'static str,
    pub url: String,
}

/// Per-driver user input.
#[derive(Debug, Clone, Default)]
pub struct DriverSettings {
    pub station: String,
    pub api_key: Option<String>,
    /// Locale such as `pt_BR.UTF-8` or `en`.
    pub language: Option<String>,
}

impl DriverSettings {
    pub fn new(station: impl Into<String>) -> Self {
        Self { station: station.into(), ..Self::default() }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub(crate) fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(DriverError::MissingApiKey)
    }
}

/// Collaborators injected into every driver.
#[derive(Debug, Clone)]
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub translator: Arc<dyn Translator>,
}

#[async_trait]
pub trait WeatherDriver: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> &'static Capabilities {
        self.id().capabilities()
    }

    fn link(&self, record: &WeatherRecord) -> Link;

    /// Produce a fresh record. `today` anchors weekday names when the
    /// provider does not report dates.
    async fn fetch(&self, today: NaiveDate) -> std::result::Result<WeatherRecord, RefreshError>;
}

/// Construct a driver from config and explicit ProviderId.
pub fn driver_from_config(
    id: ProviderId,
    config: &Config,
    services: Services,
) -> anyhow::Result<Box<dyn WeatherDriver>> {
    let settings = config.driver_settings(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No settings configured for provider '{id}'.\n\
                 Hint: run `wx configure {id}` and enter a station."
        )
    })?;

    Ok(build_driver(id, settings, services))
}

/// Construct the default driver from config, using `default_provider` field.
pub fn default_driver_from_config(
    config: &Config,
    services: Services,
) -> anyhow::Result<Box<dyn WeatherDriver>> {
    let id = config.default_provider_id()?;
    driver_from_config(id, config, services)
}

pub fn build_driver(
    id: ProviderId,
    settings: DriverSettings,
    services: Services,
) -> Box<dyn WeatherDriver> {
    match id {
        ProviderId::Bbc => Box::new(BbcDriver::new(settings, services)),
        ProviderId::Google => Box::new(GoogleDriver::new(settings, services)),
        ProviderId::Nws => Box::new(NwsDriver::new(settings, services)),
        ProviderId::OwmFree => Box::new(OwmFreeDriver::new(settings, services)),
        ProviderId::OpenMeteo => Box::new(OpenMeteoDriver::new(settings, services)),
    }
}

/// Maps a locale like `pt_BR.UTF-8` through a provider language table,
/// trying the full tag before the primary language.
pub(crate) fn language_code(
    table: &[(&str, &'static str)],
    language: Option<&str>,
) -> Option<&'static str> {
    let tag = language?.split(['.', '@']).next()?.trim().to_lowercase().replace('-', "_");
    let find = |key: &str| table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);
    find(tag.as_str()).or_else(|| tag.split('_').next().and_then(find))
}
