//! Core library for the `wx` weather tool.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Drivers for BBC, Google Weather, NWS, OpenWeatherMap (free tier) and Open-Meteo
//! - The normalized [`WeatherRecord`] every driver produces, with per-section status
//! - The [`WeatherFeed`] a host drives refreshes through
//!
//! It is used by `wx-cli`, but can also be reused by other binaries or services.

pub mod assemble;
pub mod bucket;
pub mod config;
pub mod convert;
pub mod error;
pub mod feed;
pub mod mapper;
pub mod model;
pub mod provider;
pub mod station;
pub mod translate;
pub mod transport;

pub(crate) mod json;

pub use config::{Config, ProviderConfig};
pub use error::{DriverError, RefreshError};
pub use feed::{RenderSink, WeatherFeed};
pub use model::{
    Current, DayForecast, Days, Location, Section, ServiceStatus, Status, Visibility, WeatherRecord,
};
pub use provider::{
    Capabilities, DriverSettings, Link, ProviderId, Services, WeatherDriver, build_driver,
    default_driver_from_config, driver_from_config,
};
pub use station::{StationKinds, StationSpec};
pub use translate::{CatalogTranslator, NoTranslation, Translator};
pub use transport::{HttpTransport, Request, Transport, TransportError};
