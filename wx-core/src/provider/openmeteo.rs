//! Open-Meteo (non-commercial API) with geocode.xyz for place names.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    assemble::Assembler,
    convert::{compass_from, day_name},
    error::{DriverError, RefreshError, Result},
    json::{self, fetch_json, present},
    mapper::CodeTable,
    model::{Coordinates, Current, DayForecast, Days, Location, Section, WeatherRecord},
    provider::{
        Capabilities, CurrentFields, DriverSettings, ForecastFields, Link, MetaFields, ProviderId,
        Services, WeatherDriver,
    },
    station::{StationKinds, StationSpec},
    transport::Request,
    translate::Translator,
};

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const GEOCODE_URL: &str = "https://geocode.xyz";

const CURRENT_VARS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,is_day,\
weather_code,surface_pressure,wind_speed_10m,wind_direction_10m";
const DAILY_VARS: &str = "weather_code,temperature_2m_max,temperature_2m_min,wind_speed_10m_max,\
wind_direction_10m_dominant,relative_humidity_2m_mean,surface_pressure_mean";

pub const CAPABILITIES: Capabilities = Capabilities {
    horizon: 7,
    stations: StationKinds::LAT_LON_ONLY,
    requires_api_key: false,
    meta: MetaFields { country: true, region: true },
    current: CurrentFields {
        feels_like: true,
        pressure: true,
        pressure_trend: false,
        visibility: false,
    },
    forecast: ForecastFields { humidity: true, pressure: true },
};

/// WMO weather interpretation codes.
const ICONS: CodeTable = CodeTable::new(
    &[
        ("0", "32"),
        ("1", "34"),
        ("2", "30"),
        ("3", "26d"),
        ("45", "20"),
        ("48", "20"),
        ("51", "09"),
        ("53", "09"),
        ("55", "09"),
        ("56", "08"),
        ("57", "08"),
        ("61", "11"),
        ("63", "12"),
        ("65", "12"),
        ("66", "10"),
        ("67", "10"),
        ("71", "13"),
        ("73", "14"),
        ("75", "16"),
        ("77", "18"),
        ("80", "39"),
        ("81", "37"),
        ("82", "04"),
        ("85", "41"),
        ("86", "41"),
        ("95", "04"),
        ("96", "04"),
        ("99", "04"),
    ],
    &[
        ("0", "31"),
        ("1", "34"),
        ("2", "29"),
        ("80", "39"),
        ("81", "47"),
        ("85", "46"),
        ("86", "46"),
    ],
);

const TEXT: CodeTable = CodeTable::new(
    &[
        ("0", "Sunny"),
        ("1", "Mainly Clear"),
        ("2", "Partly Cloudy"),
        ("3", "Overcast"),
        ("45", "Fog"),
        ("48", "Depositing Rime Fog"),
        ("51", "Drizzle: Light Intensity"),
        ("53", "Drizzle: Moderate Intensity"),
        ("55", "Drizzle: Dense Intensity"),
        ("56", "Freezing Drizzle: Light Intensity"),
        ("57", "Freezing Drizzle: Dense Intensity"),
        ("61", "Rain: Slight Intensity"),
        ("63", "Rain: Moderate Intensity"),
        ("65", "Rain: Heavy Intensity"),
        ("66", "Freezing Rain: Light Intensity"),
        ("67", "Freezing Rain: Heavy Intensity"),
        ("71", "Snowfall: Slight Intensity"),
        ("73", "Snowfall: Moderate Intensity"),
        ("75", "Snowfall: Heavy Intensity"),
        ("77", "Snow Grains"),
        ("80", "Rain Showers: Slight"),
        ("81", "Rain Showers: Moderate"),
        ("82", "Rain Showers: Violent"),
        ("85", "Snow Showers: Slight"),
        ("86", "Snow Showers: Heavy"),
        ("95", "Thunderstorm: Slight or Moderate"),
        ("96", "Thunderstorm with slight hail"),
        ("99", "Thunderstorm with heavy hail"),
    ],
    &[("0", "Clear Sky")],
);

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default, deserialize_with = "json::number")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    longitude: Option<f64>,
    current: Option<CurrentBlock>,
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    #[serde(default, deserialize_with = "json::number")]
    temperature_2m: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    relative_humidity_2m: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    apparent_temperature: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    is_day: Option<f64>,
    #[serde(default, deserialize_with = "json::code")]
    weather_code: Option<String>,
    #[serde(default, deserialize_with = "json::number")]
    surface_pressure: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    wind_speed_10m: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    wind_direction_10m: Option<f64>,
}

impl CurrentBlock {
    fn is_daytime(&self) -> bool {
        self.is_day.is_none_or(|flag| flag == 1.0)
    }
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default, deserialize_with = "json::codes")]
    weather_code: Vec<Option<String>>,
    #[serde(default, deserialize_with = "json::numbers")]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "json::numbers")]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "json::numbers")]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "json::numbers")]
    wind_direction_10m_dominant: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "json::numbers")]
    relative_humidity_2m_mean: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "json::numbers")]
    surface_pressure_mean: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default, deserialize_with = "text")]
    city: Option<String>,
    #[serde(default, deserialize_with = "text")]
    state: Option<String>,
    #[serde(default, deserialize_with = "text")]
    country: Option<String>,
}

/// geocode.xyz answers `{}` instead of a string when it knows nothing.
fn text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn has_latitude(value: &Value) -> bool {
    present(value.get("latitude"))
}

fn has_city(value: &Value) -> bool {
    value.get("city").is_some_and(Value::is_string) && present(value.get("city"))
}

#[derive(Debug)]
pub struct OpenMeteoDriver {
    settings: DriverSettings,
    services: Services,
}

impl OpenMeteoDriver {
    pub fn new(settings: DriverSettings, services: Services) -> Self {
        Self { settings, services }
    }

    fn station(&self) -> Result<Coordinates> {
        match StationSpec::parse(&self.settings.station, CAPABILITIES.stations)? {
            StationSpec::LatLon(coordinates) => Ok(coordinates),
            _ => Err(DriverError::InvalidStation {
                station: self.settings.station.clone(),
                reason: "expected latitude,longitude".to_string(),
            }),
        }
    }
}

fn forecast_request(at: Coordinates) -> Request {
    Request::new(FORECAST_URL)
        .query("latitude", at.lat)
        .query("longitude", at.lon)
        .query("current", CURRENT_VARS)
        .query("daily", DAILY_VARS)
        .query("timezone", "auto")
}

fn geocode_request(at: Coordinates) -> Request {
    Request::new(format!("{GEOCODE_URL}/{},{}", at.lat, at.lon)).query("geoit", "json")
}

#[async_trait]
impl WeatherDriver for OpenMeteoDriver {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    fn link(&self, _record: &WeatherRecord) -> Link {
        Link { text: "Open-Meteo", url: "https://open-meteo.com/".to_string() }
    }

    async fn fetch(&self, today: NaiveDate) -> std::result::Result<WeatherRecord, RefreshError> {
        let mut asm = Assembler::new(CAPABILITIES.horizon, self.services.translator.as_ref());
        let requested = asm.require(Section::Meta, self.station())?;
        let transport = self.services.transport.as_ref();

        let forecast_req = forecast_request(requested);
        let forecast: ForecastResponse =
            match fetch_json(transport, "forecast", &forecast_req, has_latitude).await {
                Ok(forecast) => forecast,
                Err(err) => {
                    return Err(asm.abort_sections(&[Section::Current, Section::Forecast], err));
                }
            };

        // The grid point Open-Meteo snapped to, used for the place lookup.
        let resolved = match (forecast.latitude, forecast.longitude) {
            (Some(lat), Some(lon)) => Coordinates { lat, lon },
            _ => requested,
        };
        debug!(lat = resolved.lat, lon = resolved.lon, "open-meteo grid point");

        let geocode = fetch_json::<GeocodeResponse>(
            transport,
            "location metadata",
            &geocode_request(resolved),
            has_city,
        )
        .await;

        let translator = asm.translator();
        asm.meta(geocode.and_then(|geo| parse_meta(&geo, resolved)));
        asm.current(parse_current(&forecast, translator));
        asm.forecast(parse_forecast(&forecast, today, translator));

        Ok(asm.finish())
    }
}

fn parse_meta(geo: &GeocodeResponse, at: Coordinates) -> Result<Location> {
    let city = geo.city.clone().ok_or_else(|| DriverError::missing(Section::Meta, "city"))?;
    Ok(Location {
        id: None,
        city,
        country: geo.country.clone().unwrap_or_default(),
        region: geo.state.clone(),
        coordinates: Some(at),
    })
}

fn parse_current(forecast: &ForecastResponse, translator: &dyn Translator) -> Result<Current> {
    let cc = forecast
        .current
        .as_ref()
        .ok_or_else(|| DriverError::missing(Section::Current, "current"))?;
    let is_day = cc.is_daytime();
    let code = cc.weather_code.as_deref().unwrap_or_default();

    let mut current = Current {
        feels_like: cc.apparent_temperature,
        humidity: cc.relative_humidity_2m,
        pressure: cc.surface_pressure,
        wind_speed: cc.wind_speed_10m,
        wind_direction: compass_from(cc.wind_direction_10m),
        condition_text: TEXT.describe(code, is_day, translator),
        icon: ICONS.icon(code, is_day).to_string(),
        ..Current::default()
    };
    current.set_temperature(cc.temperature_2m);
    Ok(current)
}

fn parse_forecast(
    forecast: &ForecastResponse,
    today: NaiveDate,
    translator: &dyn Translator,
) -> Result<Days> {
    let daily = forecast
        .daily
        .as_ref()
        .ok_or_else(|| DriverError::missing(Section::Forecast, "daily"))?;
    if daily.time.is_empty() {
        return Err(DriverError::missing(Section::Forecast, "daily.time"));
    }
    let is_day_now = forecast.current.as_ref().is_none_or(CurrentBlock::is_daytime);

    let mut days = Days::blank(CAPABILITIES.horizon);
    for (i, slot) in days.iter_mut().enumerate().take(daily.time.len()) {
        let is_day = i != 0 || is_day_now;
        let code = at(&daily.weather_code, i).unwrap_or_default();
        let date = NaiveDate::parse_from_str(&daily.time[i], "%Y-%m-%d").ok();

        *slot = DayForecast {
            day: match date {
                Some(date) => day_name(date, 0),
                None => day_name(today, i),
            }
            .to_string(),
            max_temperature: at(&daily.temperature_2m_max, i),
            min_temperature: at(&daily.temperature_2m_min, i),
            humidity: at(&daily.relative_humidity_2m_mean, i),
            pressure: at(&daily.surface_pressure_mean, i),
            wind_speed: at(&daily.wind_speed_10m_max, i),
            wind_direction: compass_from(at(&daily.wind_direction_10m_dominant, i)),
            condition_text: TEXT.describe(&code, is_day, translator),
            icon: ICONS.icon(&code, is_day).to_string(),
        };
    }
    Ok(days)
}

fn at<T: Clone>(series: &[Option<T>], i: usize) -> Option<T> {
    series.get(i).cloned().flatten()
}
