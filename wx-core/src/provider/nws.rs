//! US National Weather Service (api.weather.gov).
//!
//! Resolution is sequential: the point lookup yields the station list and the
//! forecast URLs, the station list yields the observation station. The latest
//! observation and the three forecasts are then fetched together.
//!
//! Days 1-6 combine two sources: temperature, humidity and pressure come from
//! the grid series bucketed per UTC day, condition and wind from the daytime
//! 12-hour period starting at 06:00 on the matching local date.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::{
    assemble::Assembler,
    bucket::{BucketPolicy, Calendar, Sample, Today, day_offset, summarize_days},
    convert::{compass_from, day_name, first_number, m_to_km, pa_to_hpa},
    error::{DriverError, RefreshError, Result},
    json::{self, fetch_json, present},
    mapper::CodeTable,
    model::{Coordinates, Current, DayForecast, Days, Location, Section, Visibility, WeatherRecord},
    provider::{
        Capabilities, CurrentFields, DriverSettings, ForecastFields, Link, MetaFields, ProviderId,
        Services, USER_AGENT, WeatherDriver,
    },
    station::{StationKinds, StationSpec},
    transport::Request,
    translate::Translator,
};

const API_URL: &str = "https://api.weather.gov";

pub const CAPABILITIES: Capabilities = Capabilities {
    horizon: 7,
    stations: StationKinds::LAT_LON_ONLY,
    requires_api_key: false,
    meta: MetaFields { country: false, region: true },
    current: CurrentFields {
        feels_like: false,
        pressure: true,
        pressure_trend: false,
        visibility: true,
    },
    forecast: ForecastFields { humidity: true, pressure: false },
};

const ICONS: CodeTable = CodeTable::new(
    &[
        ("skc", "32"),
        ("few", "34"),
        ("sct", "30"),
        ("bkn", "28"),
        ("ovc", "26d"),
        ("wind_skc", "32"),
        ("wind_few", "34"),
        ("wind_sct", "30"),
        ("wind_bkn", "28"),
        ("wind_ovc", "26d"),
        ("snow", "14"),
        ("rain_snow", "15"),
        ("rain_sleet", "06"),
        ("snow_sleet", "07"),
        ("fzra", "10"),
        ("rain_fzra", "10"),
        ("snow_fzra", "10"),
        ("sleet", "18"),
        ("rain", "11"),
        ("rain_showers", "12"),
        ("rain_showers_hi", "04"),
        ("tsra", "04"),
        ("tsra_sct", "04"),
        ("tsra_hi", "04"),
        ("tornado", "00"),
        ("hurricane", "01"),
        ("tropical_storm", "01"),
        ("dust", "19"),
        ("smoke", "19"),
        ("haze", "22"),
        ("hot", "36"),
        ("cold", "25"),
        ("blizzard", "15"),
        ("fog", "20"),
    ],
    &[
        ("skc", "31"),
        ("few", "33"),
        ("sct", "29"),
        ("bkn", "27"),
        ("wind_skc", "31"),
        ("wind_few", "33"),
        ("wind_sct", "29"),
        ("wind_bkn", "27"),
        ("haze", "21"),
    ],
);

/// Local start hour of the daytime 12-hour period.
const DAYTIME_START_HOUR: u32 = 6;

#[derive(Debug, Deserialize)]
struct PointResponse {
    properties: PointProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointProperties {
    observation_stations: Option<String>,
    forecast_hourly: Option<String>,
    forecast: Option<String>,
    forecast_grid_data: Option<String>,
    relative_location: Option<RelativeLocation>,
}

#[derive(Debug, Deserialize)]
struct RelativeLocation {
    geometry: Option<Geometry>,
    properties: Option<Place>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// GeoJSON order: longitude first.
    #[serde(default, deserialize_with = "json::numbers")]
    coordinates: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct Place {
    city: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StationsResponse {
    #[serde(default)]
    features: Vec<StationFeature>,
}

#[derive(Debug, Deserialize)]
struct StationFeature {
    properties: StationProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationProperties {
    station_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    properties: Observation,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    text_description: Option<String>,
    icon: Option<String>,
    #[serde(default, deserialize_with = "quantity")]
    temperature: Option<f64>,
    #[serde(default, deserialize_with = "quantity")]
    relative_humidity: Option<f64>,
    #[serde(default, deserialize_with = "quantity")]
    barometric_pressure: Option<f64>,
    #[serde(default, deserialize_with = "quantity")]
    wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "quantity")]
    wind_direction: Option<f64>,
    #[serde(default, deserialize_with = "quantity")]
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PeriodsResponse {
    properties: Periods,
}

#[derive(Debug, Default, Deserialize)]
struct Periods {
    #[serde(default)]
    periods: Vec<Period>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Period {
    start_time: Option<DateTime<FixedOffset>>,
    is_daytime: Option<bool>,
    #[serde(default, deserialize_with = "quantity")]
    temperature: Option<f64>,
    #[serde(default, deserialize_with = "quantity")]
    relative_humidity: Option<f64>,
    wind_speed: Option<String>,
    wind_direction: Option<String>,
    icon: Option<String>,
    short_forecast: Option<String>,
}

impl Period {
    fn wind_speed(&self) -> Option<f64> {
        self.wind_speed.as_deref().and_then(first_number)
    }

    fn icon_key(&self) -> &str {
        self.icon.as_deref().map(icon_key).unwrap_or_default()
    }

    fn starts_daytime(&self) -> bool {
        self.is_daytime == Some(true)
            && self.start_time.is_some_and(|t| t.hour() == DAYTIME_START_HOUR)
    }
}

#[derive(Debug, Deserialize)]
struct GridResponse {
    properties: Grid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Grid {
    #[serde(default)]
    max_temperature: Series,
    #[serde(default)]
    min_temperature: Series,
    #[serde(default)]
    relative_humidity: Series,
    #[serde(default)]
    pressure: Series,
}

#[derive(Debug, Default, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<GridValue>,
}

impl Series {
    fn first(&self) -> Option<f64> {
        self.values.first().and_then(|v| v.value)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridValue {
    /// ISO 8601 interval, `2024-03-18T06:00:00+00:00/PT12H`.
    valid_time: String,
    #[serde(default, deserialize_with = "json::number")]
    value: Option<f64>,
}

impl GridValue {
    fn start(&self) -> Option<DateTime<FixedOffset>> {
        let start = self.valid_time.split('/').next()?;
        DateTime::parse_from_rfc3339(start).ok()
    }
}

/// NWS quantities come as `{ "unitCode": ..., "value": 12.5 }` or, in
/// forecast periods, as bare numbers.
fn quantity<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::Object(map)) => map.get("value").and_then(Value::as_f64),
        _ => None,
    })
}

/// `https://api.weather.gov/icons/land/day/tsra,40?size=medium` -> `tsra`.
fn icon_key(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or_default();
    let last = path.rsplit('/').next().unwrap_or_default();
    last.split(',').next().unwrap_or_default()
}

fn has_id(value: &Value) -> bool {
    present(value.get("id"))
}

fn has_type(value: &Value) -> bool {
    present(value.get("type"))
}

#[derive(Debug)]
pub struct NwsDriver {
    settings: DriverSettings,
    services: Services,
}

/// Endpoints advertised by the point lookup.
#[derive(Debug)]
struct Endpoints {
    stations: String,
    hourly: String,
    twelve_hour: String,
    grid: String,
}

impl NwsDriver {
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

fn get(url: impl Into<String>) -> Request {
    Request::new(url).user_agent(USER_AGENT)
}

fn endpoints(point: &PointProperties) -> Result<Endpoints> {
    let take = |url: &Option<String>, field: &str| {
        url.clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DriverError::missing(Section::Meta, field))
    };
    Ok(Endpoints {
        stations: take(&point.observation_stations, "properties.observationStations")?,
        hourly: take(&point.forecast_hourly, "properties.forecastHourly")?,
        twelve_hour: take(&point.forecast, "properties.forecast")?,
        grid: take(&point.forecast_grid_data, "properties.forecastGridData")?,
    })
}

#[async_trait]
impl WeatherDriver for NwsDriver {
    fn id(&self) -> ProviderId {
        ProviderId::Nws
    }

    fn link(&self, record: &WeatherRecord) -> Link {
        let (lat, lon) = match record.location.coordinates {
            Some(c) => (c.lat.to_string(), c.lon.to_string()),
            None => Default::default(),
        };
        Link {
            text: "weather.gov",
            url: format!(
                "https://forecast.weather.gov/MapClick.php?textField1={lat}&textField2={lon}"
            ),
        }
    }

    async fn fetch(&self, today: NaiveDate) -> std::result::Result<WeatherRecord, RefreshError> {
        let mut asm = Assembler::new(CAPABILITIES.horizon, self.services.translator.as_ref());
        let at = asm.require(Section::Meta, self.station())?;
        let transport = self.services.transport.as_ref();

        let point_req = get(format!("{API_URL}/points/{},{}", at.lat, at.lon));
        let point: PointResponse = asm.require(
            Section::Meta,
            fetch_json(transport, "point metadata", &point_req, has_id).await,
        )?;
        let urls = asm.require(Section::Meta, endpoints(&point.properties))?;

        let stations: StationsResponse = asm.require(
            Section::Current,
            fetch_json(transport, "observation stations", &get(urls.stations.as_str()), has_type)
                .await,
        )?;
        let station_id = asm.require(
            Section::Current,
            stations
                .features
                .first()
                .and_then(|f| f.properties.station_identifier.clone())
                .ok_or_else(|| {
                    DriverError::missing(
                        Section::Current,
                        "features[0].properties.stationIdentifier",
                    )
                }),
        )?;
        debug!(station = %station_id, "nws observation station");

        let latest_req = get(format!("{API_URL}/stations/{station_id}/observations/latest"));
        let hourly_req = get(urls.hourly.as_str()).query("units", "si");
        let twelve_req = get(urls.twelve_hour.as_str()).query("units", "si");
        let grid_req = get(urls.grid.as_str());
        let (latest, hourly, twelve_hour, grid) = tokio::join!(
            fetch_json::<ObservationResponse>(
                transport,
                "latest observation",
                &latest_req,
                has_type,
            ),
            fetch_json::<PeriodsResponse>(transport, "hourly forecast", &hourly_req, has_type),
            fetch_json::<PeriodsResponse>(transport, "12-hour forecast", &twelve_req, has_type),
            fetch_json::<GridResponse>(transport, "grid forecast", &grid_req, has_type),
        );

        let translator = asm.translator();
        let first_hour = hourly.as_ref().ok().and_then(|h| h.properties.periods.first());

        asm.meta(parse_meta(&point.properties));
        asm.current(latest.and_then(|obs| parse_current(&obs.properties, first_hour, translator)));
        asm.forecast(twelve_hour.and_then(|periods| {
            grid.and_then(|grid| {
                parse_forecast(&periods.properties, &grid.properties, first_hour, today, translator)
            })
        }));

        Ok(asm.finish())
    }
}

fn parse_meta(point: &PointProperties) -> Result<Location> {
    let relative = point
        .relative_location
        .as_ref()
        .ok_or_else(|| DriverError::missing(Section::Meta, "relativeLocation"))?;
    let place = relative
        .properties
        .as_ref()
        .ok_or_else(|| DriverError::missing(Section::Meta, "relativeLocation.properties"))?;
    let city = place
        .city
        .clone()
        .ok_or_else(|| DriverError::missing(Section::Meta, "relativeLocation.properties.city"))?;

    let coordinates = relative.geometry.as_ref().and_then(|g| {
        let lon = g.coordinates.first().copied().flatten()?;
        let lat = g.coordinates.get(1).copied().flatten()?;
        Some(Coordinates { lat, lon })
    });

    Ok(Location {
        id: None,
        city,
        country: String::new(),
        region: place.state.clone(),
        coordinates,
    })
}

/// Latest observation, with the first hourly period standing in for
/// anything the station did not report.
fn parse_current(
    obs: &Observation,
    hour: Option<&Period>,
    translator: &dyn Translator,
) -> Result<Current> {
    let is_daytime = hour.and_then(|h| h.is_daytime).unwrap_or(true);
    let icon = obs
        .icon
        .as_deref()
        .filter(|i| !i.is_empty())
        .or_else(|| hour.and_then(|h| h.icon.as_deref()))
        .map(icon_key)
        .unwrap_or_default();
    let text = obs
        .text_description
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| hour.and_then(|h| h.short_forecast.as_deref()))
        .unwrap_or_default();

    let wind_direction = match obs.wind_direction {
        Some(degrees) => compass_from(Some(degrees)),
        None => hour.and_then(|h| h.wind_direction.clone()).unwrap_or_default(),
    };

    let mut current = Current {
        humidity: obs.relative_humidity.or_else(|| hour.and_then(|h| h.relative_humidity)),
        pressure: obs.barometric_pressure.map(pa_to_hpa),
        wind_speed: obs.wind_speed.or_else(|| hour.and_then(Period::wind_speed)),
        wind_direction,
        visibility: obs.visibility.map(|m| Visibility::Km(m_to_km(m))),
        condition_text: localize(text, translator),
        icon: ICONS.icon(icon, is_daytime).to_string(),
        ..Current::default()
    };
    current.set_temperature(obs.temperature.or_else(|| hour.and_then(|h| h.temperature)));
    Ok(current)
}

/// Day 0 comes from the first 12-hour period and the first grid values.
///
/// `hour` is the first hourly period; its day/night flag picks the day 0 icon.
fn parse_forecast(
    periods: &Periods,
    grid: &Grid,
    hour: Option<&Period>,
    today: NaiveDate,
    translator: &dyn Translator,
) -> Result<Days> {
    let first = periods
        .periods
        .first()
        .ok_or_else(|| DriverError::missing(Section::Forecast, "properties.periods"))?;
    let reference = first
        .start_time
        .ok_or_else(|| DriverError::missing(Section::Forecast, "periods[0].startTime"))?;
    let reference_date = reference.date_naive();
    debug!(%reference, %today, "nws forecast reference");

    let is_daytime = hour.and_then(|h| h.is_daytime).or(first.is_daytime).unwrap_or(true);
    let mut days = Days::blank(CAPABILITIES.horizon);
    days[0] = DayForecast {
        day: day_name(reference_date, 0).to_string(),
        max_temperature: grid.max_temperature.first(),
        min_temperature: grid.min_temperature.first(),
        humidity: grid.relative_humidity.first(),
        pressure: None,
        wind_speed: first.wind_speed(),
        wind_direction: first.wind_direction.clone().unwrap_or_default(),
        condition_text: localize(first.short_forecast.as_deref().unwrap_or_default(), translator),
        icon: ICONS.icon(first.icon_key(), is_daytime).to_string(),
    };

    let policy = BucketPolicy::new(CAPABILITIES.horizon).today(Today::Skip);
    let mut summaries = summarize_days(&reference, &grid_samples(grid), &policy);
    let daytime = daytime_by_day(periods, &reference);

    for offset in 1..CAPABILITIES.horizon {
        let summary = summaries.get_mut(offset).and_then(Option::take);
        let period = daytime.get(offset).copied().flatten();
        if summary.is_none() && period.is_none() {
            continue;
        }
        let summary = summary.unwrap_or_default();
        let text = period.and_then(|p| p.short_forecast.as_deref()).unwrap_or_default();
        days[offset] = DayForecast {
            day: day_name(reference_date, offset).to_string(),
            max_temperature: summary.temp_max,
            min_temperature: summary.temp_min,
            humidity: summary.humidity,
            pressure: summary.pressure_hpa,
            wind_speed: period.and_then(Period::wind_speed),
            wind_direction: period.and_then(|p| p.wind_direction.clone()).unwrap_or_default(),
            condition_text: localize(text, translator),
            icon: ICONS.icon(period.map_or("", Period::icon_key), true).to_string(),
        };
    }
    Ok(days)
}

/// Grid values as bucketable samples, one field per sample.
fn grid_samples(grid: &Grid) -> Vec<Sample> {
    let series: [(&Series, fn(&mut Sample, f64)); 4] = [
        (&grid.max_temperature, |s, v| s.temp_max = Some(v)),
        (&grid.min_temperature, |s, v| s.temp_min = Some(v)),
        (&grid.relative_humidity, |s, v| s.humidity = Some(v)),
        (&grid.pressure, |s, v| s.pressure_pa = Some(v)),
    ];
    let mut samples = Vec::new();
    for (values, assign) in series {
        for entry in &values.values {
            let (Some(time), Some(value)) = (entry.start(), entry.value) else {
                continue;
            };
            let mut sample = Sample::at(time);
            assign(&mut sample, value);
            samples.push(sample);
        }
    }
    samples
}

/// Daytime periods indexed by the local date of their start, counted from
/// the local date of `reference`.
fn daytime_by_day<'p>(
    periods: &'p Periods,
    reference: &DateTime<FixedOffset>,
) -> Vec<Option<&'p Period>> {
    let mut days = vec![None; CAPABILITIES.horizon];
    for period in periods.periods.iter().filter(|p| p.starts_daytime()) {
        let Some(start) = period.start_time else {
            continue;
        };
        let offset = day_offset(reference, &start, Calendar::Local);
        if let Some(slot) = usize::try_from(offset).ok().and_then(|i| days.get_mut(i)) {
            slot.get_or_insert(period);
        }
    }
    days
}

fn localize(text: &str, translator: &dyn Translator) -> String {
    if text.is_empty() { String::new() } else { translator.translate(text) }
}
