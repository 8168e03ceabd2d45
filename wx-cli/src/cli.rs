use std::{fs, sync::Arc};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use tracing::{debug, info};
use wx_core::{
    CatalogTranslator, Config, HttpTransport, NoTranslation, ProviderId, RenderSink,
    ServiceStatus, Services, StationSpec, Translator, Visibility, WeatherFeed, WeatherRecord,
    build_driver,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "wx",
    version,
    about = "Weather from BBC, Google, NWS, OpenWeatherMap and Open-Meteo"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the station (and API key, if needed) for a provider.
    Configure {
        /// Provider short name: bbc, google, nws, owmfree or openmeteo.
        provider: String,

        /// Make this provider the default.
        #[arg(long)]
        default: bool,
    },

    /// Fetch and print the weather.
    Show {
        /// Provider to use instead of the configured default.
        #[arg(long)]
        provider: Option<String>,

        /// Station override: location id or `lat,lon`.
        #[arg(long)]
        station: Option<String>,

        /// Locale override, e.g. `pt_BR`.
        #[arg(long)]
        lang: Option<String>,

        /// Print the normalized record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List supported providers and what they need.
    Providers,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider, default } => configure(&provider, default),
            Command::Show { provider, station, lang, json } => {
                show(provider.as_deref(), station, lang, json).await
            }
            Command::Providers => {
                let config = Config::load()?;
                for id in ProviderId::all() {
                    let caps = id.capabilities();
                    println!(
                        "{:<10} {} days, stations: {}{}{}",
                        id.as_str(),
                        caps.horizon,
                        if caps.stations.code { "id or lat,lon" } else { "lat,lon" },
                        if caps.requires_api_key { ", API key required" } else { "" },
                        if config.is_provider_configured(*id) { " [configured]" } else { "" },
                    );
                }
                Ok(())
            }
        }
    }
}

fn configure(provider: &str, make_default: bool) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let caps = id.capabilities();
    let mut config = Config::load()?;
    let existing = config.provider_config(id).cloned().unwrap_or_default();

    let help = if caps.stations.code {
        "Location id (e.g. 2643743) or latitude,longitude"
    } else {
        "latitude,longitude, e.g. 38.8894,-77.0352"
    };
    let station = Text::new("Station:")
        .with_help_message(help)
        .with_initial_value(&existing.station)
        .prompt()?;
    StationSpec::parse(&station, caps.stations)
        .with_context(|| format!("'{station}' is not a station {id} understands"))?;

    let api_key = if caps.requires_api_key {
        let entered = Password::new("API key:")
            .without_confirmation()
            .with_help_message("Leave empty to keep the stored key")
            .prompt()?;
        match entered.trim() {
            "" => existing.api_key.clone(),
            key => Some(key.to_string()),
        }
    } else {
        None
    };
    if caps.requires_api_key && api_key.is_none() {
        bail!("{id} needs an API key");
    }

    config.upsert_provider(id, station.trim().to_string(), api_key);
    if make_default {
        config.set_default_provider(id);
    }
    config.save()?;

    println!("Saved {id} settings to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(
    provider: Option<&str>,
    station: Option<String>,
    lang: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let id = match provider {
        Some(name) => ProviderId::try_from(name)?,
        None => config.default_provider_id()?,
    };

    let mut settings = config.driver_settings(id).unwrap_or_default();
    if settings.station.is_empty() && station.is_none() {
        bail!("No station for '{id}'.\nHint: run `wx configure {id}` or pass --station.");
    }
    if let Some(station) = station {
        settings.station = station;
    }
    if let Some(lang) = lang {
        settings.language = Some(lang);
    }

    let services = Services {
        transport: Arc::new(HttpTransport::new()),
        translator: translator(&config)?,
    };
    info!(provider = %id, station = %settings.station, "refreshing");
    debug!(has_key = settings.api_key.is_some(), language = ?settings.language, "driver settings");
    let mut feed = WeatherFeed::new(build_driver(id, settings, services));

    let mut sink = TerminalSink { quiet: json, error: None };
    let ok = feed.refresh(&mut sink).await;

    if json {
        println!("{}", serde_json::to_string_pretty(feed.record())?);
    } else if ok {
        let link = feed.link();
        println!();
        println!("{} ({}), updated {}", link.text, link.url, chrono::Local::now().format("%H:%M"));
    }

    match sink.error {
        Some(message) if !ok => bail!(message),
        _ => Ok(()),
    }
}

/// Phrase catalog from config, or pass-through when none is set.
fn translator(config: &Config) -> anyhow::Result<Arc<dyn Translator>> {
    let Some(path) = &config.translations else {
        return Ok(Arc::new(NoTranslation));
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read translations: {}", path.display()))?;
    let catalog = CatalogTranslator::from_toml_str(&contents)
        .with_context(|| format!("Failed to parse translations: {}", path.display()))?;
    debug!(phrases = catalog.len(), "loaded translations");
    Ok(Arc::new(catalog))
}

/// Prints each section as it is published.
struct TerminalSink {
    quiet: bool,
    error: Option<String>,
}

impl RenderSink for TerminalSink {
    fn display_meta(&mut self, record: &WeatherRecord) {
        if self.quiet {
            return;
        }
        let loc = &record.location;
        if record.status.meta != ServiceStatus::Ok {
            println!("Location unavailable");
            return;
        }
        let place = [Some(loc.city.as_str()), loc.region.as_deref(), Some(loc.country.as_str())]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{place}");
    }

    fn display_current(&mut self, record: &WeatherRecord) {
        if self.quiet {
            return;
        }
        if record.status.cc != ServiceStatus::Ok {
            println!("Current conditions unavailable");
            return;
        }
        let cc = &record.current;
        match cc.temperature.filter(|_| cc.has_temperature) {
            Some(t) => println!("  {t:.1}°C  {}  [{}]", cc.condition_text, cc.icon),
            None => println!("  {}  [{}]", cc.condition_text, cc.icon),
        }
        if let Some(feels) = cc.feels_like {
            println!("  feels like {feels:.1}°C");
        }
        if let Some(speed) = cc.wind_speed {
            println!("  wind {speed:.0} km/h {}", cc.wind_direction);
        }
        if let Some(humidity) = cc.humidity {
            println!("  humidity {humidity:.0}%");
        }
        if let Some(pressure) = cc.pressure {
            match &cc.pressure_trend {
                Some(trend) => println!("  pressure {pressure:.0} hPa, {trend}"),
                None => println!("  pressure {pressure:.0} hPa"),
            }
        }
        match &cc.visibility {
            Some(Visibility::Km(km)) => println!("  visibility {km:.0} km"),
            Some(Visibility::Descriptive(text)) => println!("  visibility {text}"),
            None => {}
        }
    }

    fn display_forecast(&mut self, record: &WeatherRecord) {
        if self.quiet {
            return;
        }
        if record.status.forecast != ServiceStatus::Ok {
            println!("Forecast unavailable");
            return;
        }
        println!();
        for day in record.days.iter().filter(|d| !d.day.is_empty()) {
            let temps = match (day.max_temperature, day.min_temperature) {
                (Some(max), Some(min)) => format!("{max:>5.1} / {min:>5.1}"),
                (Some(max), None) => format!("{max:>5.1} /   -  "),
                (None, Some(min)) => format!("  -   / {min:>5.1}"),
                (None, None) => "  -   /   -  ".to_string(),
            };
            println!("  {:<4}{temps}  {:<4}{}", day.day, day.icon, day.condition_text);
        }
    }

    fn show_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }
}
