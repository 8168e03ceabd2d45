use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    assemble::Assembler,
    convert::day_name,
    error::{DriverError, RefreshError, Result},
    json::{self, fetch_json, present},
    mapper::CodeTable,
    model::{Coordinates, Current, DayForecast, Days, Location, Section, Visibility, WeatherRecord},
    provider::{
        Capabilities, CurrentFields, DriverSettings, ForecastFields, Link, MetaFields, ProviderId,
        Services, WeatherDriver,
    },
    station::{StationKinds, StationSpec},
    transport::Request,
    translate::Translator,
};

const LOCATOR_URL: &str = "https://open.live.bbc.co.uk/locator/locations";
const BROKER_URL: &str = "https://weather-broker-cdn.api.bbci.co.uk/en";
const LINK_URL: &str = "https://www.bbc.com/weather/";

pub const CAPABILITIES: Capabilities = Capabilities {
    horizon: 7,
    stations: StationKinds::ANY,
    requires_api_key: false,
    meta: MetaFields { country: true, region: false },
    current: CurrentFields {
        feels_like: true,
        pressure: true,
        pressure_trend: true,
        visibility: true,
    },
    forecast: ForecastFields { humidity: true, pressure: true },
};

const ICONS: CodeTable = CodeTable::new(
    &[
        ("1", "32"),
        ("2", "30"),
        ("3", "30"),
        ("4", "23"),
        ("5", "20"),
        ("6", "20"),
        ("7", "26"),
        ("8", "26d"),
        ("10", "11"),
        ("11", "09"),
        ("12", "11"),
        ("14", "12"),
        ("15", "12"),
        ("17", "18"),
        ("18", "18"),
        ("20", "18"),
        ("21", "18"),
        ("23", "13"),
        ("24", "13"),
        ("26", "16"),
        ("27", "16"),
        ("29", "04"),
        ("30", "04"),
        ("31", "01"),
        ("32", "20"),
        ("33", "15"),
        ("34", "08"),
        ("35", "23"),
        ("36", "26"),
        ("39", "11"),
    ],
    &[
        ("0", "31"),
        ("1", "31"),
        ("2", "29"),
        ("3", "29"),
        ("9", "11"),
        ("13", "12"),
        ("16", "18"),
        ("19", "18"),
        ("22", "46"),
        ("25", "16"),
        ("28", "04"),
    ],
);

const TEXT: CodeTable = CodeTable::new(
    &[
        ("Sandstorm", "Sand Storm"),
        ("Light Rain Showers", "Light Rain Shower"),
        ("Heavy Rain Showers", "Heavy Rain Shower"),
        ("Sleet Showers", "Sleet Shower"),
        ("Hail Showers", "Hail Shower"),
        ("Thundery Showers", "Thundery Shower"),
    ],
    &[],
);

#[derive(Debug, Deserialize)]
struct LocatorResponse {
    response: LocatorBody,
}

/// Search results by coordinates, or the location itself when looked up by id.
#[derive(Debug, Deserialize)]
struct LocatorBody {
    results: Option<LocatorResults>,
    #[serde(flatten)]
    place: Place,
}

#[derive(Debug, Deserialize)]
struct LocatorResults {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Place {
    #[serde(default, deserialize_with = "json::code")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default, alias = "latitude", deserialize_with = "json::number")]
    lat: Option<f64>,
    #[serde(default, alias = "longitude", deserialize_with = "json::number")]
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    #[serde(default)]
    temperature: Option<ObservedTemperature>,
    #[serde(default)]
    wind: Option<ObservedWind>,
    #[serde(default, deserialize_with = "json::number")]
    humidity_percent: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    pressure_mb: Option<f64>,
    #[serde(default, deserialize_with = "json::code")]
    pressure_direction: Option<String>,
    #[serde(default, deserialize_with = "json::code")]
    visibility: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ObservedTemperature {
    #[serde(rename = "C", default, deserialize_with = "json::number")]
    celsius: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservedWind {
    #[serde(default, deserialize_with = "json::number")]
    wind_speed_kph: Option<f64>,
    #[serde(default)]
    wind_direction_abbreviation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastResponse {
    #[serde(default)]
    is_night: bool,
    #[serde(default)]
    forecasts: Vec<ForecastDay>,
}

#[derive(Debug, Default, Deserialize)]
struct ForecastDay {
    #[serde(default)]
    summary: Option<Summary>,
    #[serde(default)]
    detailed: Option<Detailed>,
}

#[derive(Debug, Default, Deserialize)]
struct Summary {
    #[serde(default)]
    report: Option<SummaryReport>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryReport {
    #[serde(default)]
    local_date: Option<String>,
    #[serde(default, deserialize_with = "json::number")]
    max_temp_c: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    min_temp_c: Option<f64>,
    #[serde(default)]
    weather_type_text: Option<String>,
    #[serde(default, deserialize_with = "json::code")]
    weather_type: Option<String>,
    #[serde(default)]
    wind_direction: Option<String>,
    #[serde(default, deserialize_with = "json::number")]
    wind_speed_kph: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Detailed {
    #[serde(default)]
    reports: Vec<DetailedReport>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailedReport {
    #[serde(default, deserialize_with = "json::number")]
    feels_like_temperature_c: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    humidity: Option<f64>,
    #[serde(default, deserialize_with = "json::number")]
    pressure: Option<f64>,
    #[serde(default, deserialize_with = "json::code")]
    pressure_direction: Option<String>,
    #[serde(default, deserialize_with = "json::code")]
    visibility: Option<String>,
    #[serde(default)]
    weather_type_text: Option<String>,
    #[serde(default, deserialize_with = "json::code")]
    weather_type: Option<String>,
}

impl ForecastDay {
    fn report(&self) -> Option<&SummaryReport> {
        self.summary.as_ref().and_then(|s| s.report.as_ref())
    }

    fn first_detail(&self) -> Option<&DetailedReport> {
        self.detailed.as_ref().and_then(|d| d.reports.first())
    }
}

fn has_search_results(value: &Value) -> bool {
    present(value.pointer("/response/results/results"))
}

fn has_location_name(value: &Value) -> bool {
    present(value.pointer("/response/name"))
}

fn has_observations(value: &Value) -> bool {
    present(value.get("observations"))
}

fn has_forecasts(value: &Value) -> bool {
    present(value.get("forecasts"))
}

#[derive(Debug)]
pub struct BbcDriver {
    settings: DriverSettings,
    services: Services,
}

impl BbcDriver {
    pub fn new(settings: DriverSettings, services: Services) -> Self {
        Self { settings, services }
    }

    /// Resolve the station to a BBC location, searching by coordinates when needed.
    async fn locate(&self, spec: &StationSpec) -> Result<Place> {
        let transport = self.services.transport.as_ref();
        match spec {
            StationSpec::LatLon(at) => {
                let search: LocatorResponse =
                    fetch_json(transport, "location", &search_request(*at), has_search_results)
                        .await?;
                let place = search
                    .response
                    .results
                    .and_then(|r| r.results.into_iter().next())
                    .unwrap_or_default();
                if place.id.is_none() {
                    return Err(DriverError::missing(Section::Meta, "results[0].id"));
                }
                Ok(place)
            }
            StationSpec::GeoId(_) | StationSpec::Code(_) => {
                let id = spec.location_id().unwrap_or_default();
                let found: LocatorResponse =
                    fetch_json(transport, "location", &lookup_request(&id), has_location_name)
                        .await?;
                let mut place = found.response.place;
                place.id.get_or_insert(id);
                Ok(place)
            }
        }
    }
}

fn search_request(at: Coordinates) -> Request {
    Request::new(LOCATOR_URL)
        .query("la", at.lat)
        .query("lo", at.lon)
        .query("format", "json")
}

fn lookup_request(id: &str) -> Request {
    Request::new(format!("{LOCATOR_URL}/{id}")).query("format", "json")
}

#[async_trait]
impl WeatherDriver for BbcDriver {
    fn id(&self) -> ProviderId {
        ProviderId::Bbc
    }

    fn link(&self, record: &WeatherRecord) -> Link {
        let id = record.location.id.as_deref().unwrap_or_default();
        Link { text: "bbc.co.uk/weather", url: format!("{LINK_URL}{id}") }
    }

    async fn fetch(&self, today: NaiveDate) -> std::result::Result<WeatherRecord, RefreshError> {
        let mut asm = Assembler::new(CAPABILITIES.horizon, self.services.translator.as_ref());
        let spec = asm.require(
            Section::Meta,
            StationSpec::parse(&self.settings.station, CAPABILITIES.stations),
        )?;
        let place = asm.require(Section::Meta, self.locate(&spec).await)?;
        let id = place.id.clone().unwrap_or_default();

        let transport = self.services.transport.as_ref();
        let observation_req = Request::new(format!("{BROKER_URL}/observation/{id}"));
        let forecast_req = Request::new(format!("{BROKER_URL}/forecast/aggregated/{id}"));
        let (observation, forecast) = tokio::join!(
            fetch_json::<ObservationResponse>(
                transport,
                "current conditions",
                &observation_req,
                has_observations
            ),
            fetch_json::<ForecastResponse>(transport, "forecast", &forecast_req, has_forecasts),
        );

        let translator = asm.translator();
        asm.meta(parse_meta(&place));
        asm.current(
            observation
                .and_then(|obs| parse_current(&obs, forecast.as_ref().ok(), translator)),
        );
        asm.forecast(forecast.and_then(|f| parse_forecast(&f, today, translator)));

        Ok(asm.finish())
    }
}

fn parse_meta(place: &Place) -> Result<Location> {
    let city = place.name.clone().filter(|s| !s.is_empty());
    let country = place.country.clone().filter(|s| !s.is_empty());
    match (city, country) {
        (Some(city), Some(country)) => Ok(Location {
            id: place.id.clone(),
            city,
            country,
            region: None,
            coordinates: match (place.lat, place.lon) {
                (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
                _ => None,
            },
        }),
        (None, _) => Err(DriverError::missing(Section::Meta, "name")),
        (_, None) => Err(DriverError::missing(Section::Meta, "country")),
    }
}

/// Observed values win; the first detailed forecast report fills the gaps
/// and supplies the condition.
fn parse_current(
    observations: &ObservationResponse,
    forecast: Option<&ForecastResponse>,
    translator: &dyn Translator,
) -> Result<Current> {
    let obs = observations
        .observations
        .first()
        .ok_or_else(|| DriverError::missing(Section::Current, "observations[0]"))?;
    let detail = forecast.and_then(|f| f.forecasts.first()).and_then(ForecastDay::first_detail);
    let is_day = !forecast.is_some_and(|f| f.is_night);

    let pressure_trend = obs
        .pressure_direction
        .clone()
        .or_else(|| detail.and_then(|d| d.pressure_direction.clone()))
        .map(|trend| translator.translate(&trend));
    let visibility = obs
        .visibility
        .clone()
        .or_else(|| detail.and_then(|d| d.visibility.clone()))
        .map(|v| Visibility::Descriptive(translator.translate(&v)));
    let text = detail.and_then(|d| d.weather_type_text.as_deref()).unwrap_or_default();
    let code = detail.and_then(|d| d.weather_type.as_deref()).unwrap_or_default();
    let wind = obs.wind.as_ref();

    let mut current = Current {
        feels_like: detail.and_then(|d| d.feels_like_temperature_c),
        humidity: obs.humidity_percent.or_else(|| detail.and_then(|d| d.humidity)),
        pressure: obs.pressure_mb.or_else(|| detail.and_then(|d| d.pressure)),
        pressure_trend,
        wind_speed: wind.and_then(|w| w.wind_speed_kph),
        wind_direction: wind
            .and_then(|w| w.wind_direction_abbreviation.clone())
            .unwrap_or_default(),
        visibility,
        condition_text: TEXT.describe(text, true, translator),
        icon: ICONS.icon(code, is_day).to_string(),
        ..Current::default()
    };
    current.set_temperature(obs.temperature.as_ref().and_then(|t| t.celsius));
    Ok(current)
}

fn parse_forecast(
    forecast: &ForecastResponse,
    today: NaiveDate,
    translator: &dyn Translator,
) -> Result<Days> {
    let first = forecast
        .forecasts
        .first()
        .and_then(ForecastDay::report)
        .ok_or_else(|| DriverError::missing(Section::Forecast, "forecasts[0].summary.report"))?;
    let reference = first
        .local_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or(today);

    let mut days = Days::blank(CAPABILITIES.horizon);
    for (i, (slot, day)) in days.iter_mut().zip(&forecast.forecasts).enumerate() {
        let Some(report) = day.report() else {
            continue;
        };
        let detail = day.first_detail();
        let is_day = i != 0 || !forecast.is_night;

        *slot = DayForecast {
            day: day_name(reference, i).to_string(),
            max_temperature: report.max_temp_c,
            min_temperature: report.min_temp_c,
            humidity: detail.and_then(|d| d.humidity),
            pressure: detail.and_then(|d| d.pressure),
            wind_speed: report.wind_speed_kph,
            wind_direction: report.wind_direction.clone().unwrap_or_default(),
            condition_text: TEXT.describe(
                report.weather_type_text.as_deref().unwrap_or_default(),
                true,
                translator,
            ),
            icon: ICONS
                .icon(report.weather_type.as_deref().unwrap_or_default(), is_day)
                .to_string(),
        };
    }
    Ok(days)
}
