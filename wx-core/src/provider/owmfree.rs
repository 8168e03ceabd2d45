//! OpenWeatherMap free tier: current weather plus the 5 day / 3 hour forecast.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    assemble::Assembler,
    bucket::{BucketPolicy, Calendar, DaySummary, Sample, Today, summarize_days},
    convert::{compass_direction, compass_from, day_name, m_to_km, mps_to_kph, title_case},
    error::{DriverError, RefreshError, Result},
    json::{self, fetch_json},
    mapper::{CodeTable, PriorityTable},
    model::{Coordinates, Current, DayForecast, Days, Location, Section, Visibility, WeatherRecord},
    provider::{
        Capabilities, CurrentFields, DriverSettings, ForecastFields, Link, MetaFields, ProviderId,
        Services, WeatherDriver, language_code,
    },
    station::{StationKinds, StationSpec},
    transport::Request,
};

const API_URL: &str = "https://api.openweathermap.org/data/2.5";
const LINK_URL: &str = "https://openweathermap.org/city/";

pub const CAPABILITIES: Capabilities = Capabilities {
    horizon: 5,
    stations: StationKinds::ANY,
    requires_api_key: true,
    meta: MetaFields { country: true, region: false },
    current: CurrentFields {
        feels_like: true,
        pressure: true,
        pressure_trend: false,
        visibility: true,
    },
    forecast: ForecastFields { humidity: true, pressure: true },
};

/// OWM icon ids already carry the day/night suffix.
const ICONS: CodeTable = CodeTable::new(
    &[
        ("01d", "32"),
        ("01n", "31"),
        ("02d", "34"),
        ("02n", "33"),
        ("03d", "28"),
        ("03n", "27"),
        ("04d", "26"),
        ("04n", "26"),
        ("09d", "39"),
        ("09n", "45"),
        ("10d", "12"),
        ("10n", "12"),
        ("11d", "04"),
        ("11n", "04"),
        ("13d", "16"),
        ("13n", "16"),
        ("50d", "20"),
        ("50n", "20"),
    ],
    &[],
);

/// Daytime significance used to pick one condition per forecast day.
const PRIORITY: PriorityTable = PriorityTable::new(&[
    ("50d", 0),
    ("02d", 1),
    ("01d", 2),
    ("03d", 3),
    ("04d", 4),
    ("09d", 5),
    ("10d", 6),
    ("11d", 7),
    ("13d", 8),
]);

const LANGUAGES: &[(&str, &str)] = &[
    ("af", "af"),
    ("ar", "ar"),
    ("az", "az"),
    ("be", "be"),
    ("bg", "bg"),
    ("ca", "ca"),
    ("cs", "cz"),
    ("cz", "cz"),
    ("da", "da"),
    ("de", "de"),
    ("el", "el"),
    ("en", "en"),
    ("es", "es"),
    ("eu", "eu"),
    ("fa", "fa"),
    ("fi", "fi"),
    ("fr", "fr"),
    ("gl", "gl"),
    ("he", "he"),
    ("hi", "hi"),
    ("hr", "hr"),
    ("hu", "hu"),
    ("id", "id"),
    ("is", "is"),
    ("it", "it"),
    ("ja", "ja"),
    ("ko", "kr"),
    ("kr", "kr"),
    ("ku", "ku"),
    ("la", "la"),
    ("lt", "lt"),
    ("mk", "mk"),
    ("nl", "nl"),
    ("no", "no"),
    ("pl", "pl"),
    ("pt", "pt"),
    ("pt_br", "pt_br"),
    ("ro", "ro"),
    ("ru", "ru"),
    ("se", "se"),
    ("sk", "sk"),
    ("sl", "sl"),
    ("sp", "sp"),
    ("sr", "sr"),
    ("sv", "sv"),
    ("th", "th"),
    ("tr", "tr"),
    ("ua", "ua"),
    ("uk", "uk"),
    ("vi", "vi"),
    ("zh_cn", "zh_cn"),
    ("zh_tw", "zh_tw"),
    ("zu", "zu"),
];

#[derive(Debug, Default, Deserialize)]
struct Main {
    #[serde(default, deserialize_with = "json::number")]
    temp: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    feels_like: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    temp_min: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    temp_max: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    pressure: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    grnd_level: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    humidity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default, deserialize_with = "json::number")]
    speed: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Condition {
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Sys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Coord {
    #[serde(default, deserialize_with = "json::number")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    lon: Option<f64>,
}

impl Coord {
    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates { lat: self.lat?, lon: self.lon? })
    }
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    #[serde(default, deserialize_with = "json::code")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    coord: Option<Coord>,
    #[serde(default)]
    sys: Option<Sys>,
    #[serde(default)]
    main: Option<Main>,
    #[serde(default)]
    wind: Option<Wind>,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default, deserialize_with = "json::number")]
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    city: Option<City>,
    #[serde(default)]
    list: Vec<Block>,
}

#[derive(Debug, Default, Deserialize)]
struct City {
    #[serde(default, deserialize_with = "json::code")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    coord: Option<Coord>,
    /// Seconds east of UTC.
    #[serde(default)]
    timezone: Option<i64>,
}

impl ForecastResponse {
    /// Offset of the forecast location, UTC when missing or out of range.
    fn offset(&self) -> FixedOffset {
        self.city
            .as_ref()
            .and_then(|c| c.timezone)
            .and_then(|secs| i32::try_from(secs).ok())
            .and_then(FixedOffset::east_opt)
            .unwrap_or(Utc.fix())
    }
}

/// One 3-hour forecast block.
#[derive(Debug, Default, Deserialize)]
struct Block {
    #[serde(default)]
    dt: Option<i64>,
    #[serde(default)]
    main: Option<Main>,
    #[serde(default)]
    wind: Option<Wind>,
    #[serde(default)]
    weather: Vec<Condition>,
}

/// `cod` is a number on `/weather` and a string on `/forecast`.
fn has_ok_cod(value: &Value) -> bool {
    match value.get("cod") {
        Some(Value::Number(n)) => n.as_u64() == Some(200),
        Some(Value::String(s)) => s.trim() == "200",
        _ => false,
    }
}

#[derive(Debug)]
pub struct OwmFreeDriver {
    settings: DriverSettings,
    services: Services,
}

impl OwmFreeDriver {
    pub fn new(settings: DriverSettings, services: Services) -> Self {
        Self { settings, services }
    }

    fn request(&self, path: &str, key: &str, spec: &StationSpec) -> Request {
        let mut req = Request::new(format!("{API_URL}/{path}"))
            .query("appid", key)
            .query("units", "metric");
        req = match spec {
            StationSpec::LatLon(at) => req.query("lat", at.lat).query("lon", at.lon),
            StationSpec::GeoId(id) => req.query("id", id),
            StationSpec::Code(name) => req.query("q", name),
        };
        match language_code(LANGUAGES, self.settings.language.as_deref()) {
            Some(lang) => req.query("lang", lang),
            None => req,
        }
    }
}

#[async_trait]
impl WeatherDriver for OwmFreeDriver {
    fn id(&self) -> ProviderId {
        ProviderId::OwmFree
    }

    fn link(&self, record: &WeatherRecord) -> Link {
        let id = record.location.id.as_deref().unwrap_or_default();
        Link { text: "openweathermap.org", url: format!("{LINK_URL}{id}") }
    }

    /// Day names come from the forecast timestamps, so `today` is not consulted.
    async fn fetch(&self, _today: NaiveDate) -> std::result::Result<WeatherRecord, RefreshError> {
        let mut asm = Assembler::new(CAPABILITIES.horizon, self.services.translator.as_ref());
        let key = asm.require(Section::Meta, self.settings.require_api_key())?;
        let spec = asm.require(
            Section::Meta,
            StationSpec::parse(&self.settings.station, CAPABILITIES.stations),
        )?;

        let transport = self.services.transport.as_ref();
        let current_req = self.request("weather", key, &spec);
        let forecast_req = self.request("forecast", key, &spec);
        let (current, forecast) = tokio::join!(
            fetch_json::<CurrentResponse>(
                transport,
                "current conditions",
                &current_req,
                has_ok_cod,
            ),
            fetch_json::<ForecastResponse>(transport, "forecast", &forecast_req, has_ok_cod),
        );

        asm.meta(parse_meta(forecast.as_ref().ok(), current.as_ref().ok(), &spec));
        asm.current(current.and_then(|c| parse_current(&c)));
        asm.forecast(forecast.and_then(|f| parse_forecast(&f)));

        Ok(asm.finish())
    }
}

/// The forecast's `city` block is preferred; `/weather` fills what it lacks.
fn parse_meta(
    forecast: Option<&ForecastResponse>,
    current: Option<&CurrentResponse>,
    spec: &StationSpec,
) -> Result<Location> {
    let city = forecast.and_then(|f| f.city.as_ref());
    let name = city
        .and_then(|c| c.name.clone())
        .or_else(|| current.and_then(|c| c.name.clone()))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DriverError::missing(Section::Meta, "city.name"))?;
    let country = city
        .and_then(|c| c.country.clone())
        .or_else(|| current.and_then(|c| c.sys.as_ref()).and_then(|s| s.country.clone()))
        .unwrap_or_default();
    let coordinates = city
        .and_then(|c| c.coord.as_ref())
        .and_then(Coord::coordinates)
        .or_else(|| current.and_then(|c| c.coord.as_ref()).and_then(Coord::coordinates))
        .or_else(|| spec.coordinates());
    let id = match spec {
        StationSpec::GeoId(id) => Some(id.to_string()),
        _ => None,
    }
    .or_else(|| current.and_then(|c| c.id.clone()))
        .or_else(|| city.and_then(|c| c.id.clone()));

    Ok(Location { id, city: name, country, region: None, coordinates })
}

fn parse_current(response: &CurrentResponse) -> Result<Current> {
    let main = response
        .main
        .as_ref()
        .ok_or_else(|| DriverError::missing(Section::Current, "main"))?;
    let condition = response.weather.first();
    let wind = response.wind.as_ref();

    let mut current = Current {
        feels_like: main.feels_like,
        humidity: main.humidity,
        pressure: main.pressure,
        wind_speed: wind.and_then(|w| w.speed).map(mps_to_kph),
        wind_direction: compass_from(wind.and_then(|w| w.deg)),
        visibility: response.visibility.map(|m| Visibility::Km(m_to_km(m))),
        condition_text: title_case(
            condition.and_then(|c| c.description.as_deref()).unwrap_or_default(),
        ),
        icon: icon(condition).to_string(),
        ..Current::default()
    };
    current.set_temperature(main.temp);
    Ok(current)
}

fn icon(condition: Option<&Condition>) -> &'static str {
    ICONS.icon(condition.and_then(|c| c.icon.as_deref()).unwrap_or_default(), true)
}

fn sample(block: &Block, offset: FixedOffset) -> Option<Sample> {
    let time = DateTime::from_timestamp(block.dt?, 0)?.with_timezone(&offset);
    let main = block.main.as_ref();
    let wind = block.wind.as_ref();
    let condition = block.weather.first();
    Some(Sample {
        temp_max: main.and_then(|m| m.temp_max),
        temp_min: main.and_then(|m| m.temp_min),
        humidity: main.and_then(|m| m.humidity),
        // Samples carry pascal.
        pressure_pa: main.and_then(|m| m.grnd_level).map(|hpa| hpa * 100.0),
        wind_speed: wind.and_then(|w| w.speed).map(mps_to_kph),
        wind_direction: wind.and_then(|w| w.deg).map(compass_direction),
        condition: condition.and_then(|c| c.icon.clone()),
        text: condition.and_then(|c| c.description.as_deref()).map(title_case),
        ..Sample::at(time)
    })
}

fn parse_forecast(response: &ForecastResponse) -> Result<Days> {
    let offset = response.offset();
    let samples: Vec<Sample> = response.list.iter().filter_map(|b| sample(b, offset)).collect();
    let reference = samples
        .first()
        .map(|s| s.time)
        .ok_or_else(|| DriverError::missing(Section::Forecast, "list[0].dt"))?;
    let base = reference.date_naive();
    let policy = BucketPolicy::new(CAPABILITIES.horizon)
        .today(Today::FirstSample)
        .calendar(Calendar::Local)
        .priority(&PRIORITY);

    let mut days = Days::blank(CAPABILITIES.horizon);
    for (offset, (slot, summary)) in
        days.iter_mut().zip(summarize_days(&reference, &samples, &policy)).enumerate()
    {
        if let Some(summary) = summary {
            *slot = day_from(summary, base, offset);
        }
    }
    Ok(days)
}

fn day_from(summary: DaySummary, base: NaiveDate, offset: usize) -> DayForecast {
    DayForecast {
        day: day_name(base, offset).to_string(),
        max_temperature: summary.temp_max,
        min_temperature: summary.temp_min,
        humidity: summary.humidity,
        pressure: summary.pressure_hpa,
        wind_speed: summary.wind_speed,
        wind_direction: summary.wind_direction.unwrap_or_default(),
        condition_text: summary.text.unwrap_or_default(),
        icon: ICONS.icon(summary.condition.as_deref().unwrap_or_default(), true).to_string(),
    }
}
