//! Google Maps Platform Weather API, with Nominatim for place names.
//!
//! Condition text arrives already localized through `languageCode`, so it is
//! not run through the translator.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    assemble::Assembler,
    convert::{compass_from, day_name},
    error::{DriverError, RefreshError, Result},
    json::{self, fetch_json, present},
    mapper::CodeTable,
    model::{Coordinates, Current, DayForecast, Days, Location, Section, Visibility, WeatherRecord},
    provider::{
        Capabilities, CurrentFields, DriverSettings, ForecastFields, Link, MetaFields, ProviderId,
        Services, USER_AGENT, WeatherDriver, language_code,
    },
    station::{StationKinds, StationSpec},
    transport::Request,
};

const WEATHER_URL: &str = "https://weather.googleapis.com/v1";
const REVERSE_GEOCODE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

pub const CAPABILITIES: Capabilities = Capabilities {
    horizon: 7,
    stations: StationKinds::LAT_LON_ONLY,
    requires_api_key: true,
    meta: MetaFields { country: true, region: false },
    current: CurrentFields {
        feels_like: true,
        pressure: true,
        pressure_trend: false,
        visibility: true,
    },
    forecast: ForecastFields { humidity: true, pressure: false },
};

const LANGUAGES: &[(&str, &str)] = &[
    ("ar", "ar"),
    ("bg", "bg"),
    ("bn", "bn"),
    ("ca", "ca"),
    ("cs", "cs"),
    ("da", "da"),
    ("de", "de"),
    ("el", "el"),
    ("en", "en"),
    ("en_gb", "en-GB"),
    ("en_us", "en-US"),
    ("es", "es"),
    ("es_es", "es-ES"),
    ("es_419", "es-419"),
    ("fa", "fa"),
    ("fi", "fi"),
    ("fr", "fr"),
    ("fr_ca", "fr-CA"),
    ("he", "iw"),
    ("hi", "hi"),
    ("hr", "hr"),
    ("hu", "hu"),
    ("id", "id"),
    ("it", "it"),
    ("ja", "ja"),
    ("ko", "ko"),
    ("lt", "lt"),
    ("lv", "lv"),
    ("ml", "ml"),
    ("mr", "mr"),
    ("ms", "ms"),
    ("nb", "no"),
    ("nl", "nl"),
    ("pl", "pl"),
    ("pt", "pt"),
    ("pt_pt", "pt-PT"),
    ("pt_br", "pt-BR"),
    ("ro", "ro"),
    ("ru", "ru"),
    ("sk", "sk"),
    ("sl", "sl"),
    ("sr", "sr"),
    ("sv", "sv"),
    ("sw", "sw"),
    ("ta", "ta"),
    ("te", "te"),
    ("th", "th"),
    ("tr", "tr"),
    ("uk", "uk"),
    ("ur", "ur"),
    ("vi", "vi"),
    ("zh_cn", "zh-CN"),
    ("zh_hans", "zh-Hans"),
    ("zh_hant", "zh-Hant"),
    ("zh_hk", "zh-HK"),
    ("zh_tw", "zh-TW"),
];

const ICONS: CodeTable = CodeTable::new(
    &[
        ("CHANCE_OF_SHOWERS", "09"),
        ("CLEAR", "32"),
        ("CLOUDY", "26"),
        ("HEAVY_RAIN", "12"),
        ("HEAVY_THUNDERSTORM", "37"),
        ("LIGHT_RAIN", "09"),
        ("LIGHT_SNOW", "13"),
        ("MOSTLY_CLEAR", "34"),
        ("MOSTLY_CLOUDY", "28"),
        ("PARTLY_CLOUDY", "30"),
        ("RAIN", "11"),
        ("RAIN_AND_SNOW", "05"),
        ("RAIN_SHOWERS", "39"),
        ("SCATTERED_SHOWERS", "11"),
        ("SCATTERED_THUNDERSTORMS", "38"),
        ("SNOW", "14"),
        ("SNOW_SHOWERS", "41"),
        ("THUNDERSTORM", "04"),
        ("WINDY", "24"),
        ("BLOWING_SNOW", "15"),
        ("CHANCE_OF_SNOW_SHOWERS", "13"),
        ("HAIL", "18"),
        ("HAIL_SHOWERS", "18"),
        ("HEAVY_RAIN_SHOWERS", "12"),
        ("HEAVY_SNOW", "16"),
        ("HEAVY_SNOW_SHOWERS", "41"),
        ("HEAVY_SNOW_STORM", "16"),
        ("LIGHT_RAIN_SHOWERS", "09"),
        ("LIGHT_SNOW_SHOWERS", "13"),
        ("LIGHT_THUNDERSTORM_RAIN", "37"),
        ("LIGHT_TO_MODERATE_RAIN", "12"),
        ("LIGHT_TO_MODERATE_SNOW", "13"),
        ("MODERATE_TO_HEAVY_RAIN", "12"),
        ("MODERATE_TO_HEAVY_SNOW", "16"),
        ("RAIN_PERIODICALLY_HEAVY", "12"),
        ("SCATTERED_SNOW_SHOWERS", "14"),
        ("SNOWSTORM", "14"),
        ("SNOW_PERIODICALLY_HEAVY", "16"),
        ("THUNDERSHOWER", "37"),
        ("WIND_AND_RAIN", "12"),
        ("TYPE_UNSPECIFIED", "na"),
    ],
    &[
        ("CLEAR", "31"),
        ("HEAVY_SNOW_SHOWERS", "46"),
        ("HEAVY_THUNDERSTORM", "47"),
        ("LIGHT_THUNDERSTORM_RAIN", "47"),
        ("MOSTLY_CLEAR", "33"),
        ("MOSTLY_CLOUDY", "27"),
        ("PARTLY_CLOUDY", "29"),
        ("RAIN_SHOWERS", "45"),
        ("SNOW_SHOWERS", "46"),
        ("THUNDERSHOWER", "47"),
    ],
);

#[derive(Debug, Deserialize)]
struct ReverseGeocode {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Degrees {
    #[serde(default, deserialize_with = "json::number")]
    degrees: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Speed {
    #[serde(default, deserialize_with = "json::number")]
    value: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    direction: Option<Degrees>,
    speed: Option<Speed>,
}

impl Wind {
    fn speed(&self) -> Option<f64> {
        self.speed.as_ref().and_then(|s| s.value)
    }

    fn direction(&self) -> String {
        compass_from(self.direction.as_ref().and_then(|d| d.degrees))
    }
}

#[derive(Debug, Default, Deserialize)]
struct LocalizedText {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Condition {
    #[serde(rename = "type", default)]
    kind: String,
    description: Option<LocalizedText>,
}

impl Condition {
    fn text(&self) -> String {
        self.description.as_ref().map(|d| d.text.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AirPressure {
    #[serde(default, deserialize_with = "json::number")]
    mean_sea_level_millibars: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Distance {
    #[serde(default, deserialize_with = "json::number")]
    distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentConditions {
    is_daytime: Option<bool>,
    temperature: Option<Degrees>,
    feels_like_temperature: Option<Degrees>,
    #[serde(default, deserialize_with = "json::number")]
    relative_humidity: Option<f64>,
    air_pressure: Option<AirPressure>,
    visibility: Option<Distance>,
    wind: Option<Wind>,
    weather_condition: Option<Condition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastResponse {
    #[serde(default)]
    forecast_days: Vec<ForecastDay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastDay {
    display_date: Option<DisplayDate>,
    max_temperature: Option<Degrees>,
    min_temperature: Option<Degrees>,
    daytime_forecast: Option<DayPart>,
    nighttime_forecast: Option<DayPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayPart {
    #[serde(default, deserialize_with = "json::number")]
    relative_humidity: Option<f64>,
    wind: Option<Wind>,
    weather_condition: Option<Condition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DisplayDate {
    year: i32,
    month: u32,
    day: u32,
}

fn degrees(value: &Option<Degrees>) -> Option<f64> {
    value.as_ref().and_then(|d| d.degrees)
}

fn has_type(value: &Value) -> bool {
    present(value.get("type"))
}

fn has_time_zone(value: &Value) -> bool {
    present(value.get("timeZone"))
}

#[derive(Debug)]
pub struct GoogleDriver {
    settings: DriverSettings,
    services: Services,
}

impl GoogleDriver {
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

    fn weather_request(&self, path: &str, key: &str, at: Coordinates) -> Request {
        let language = language_code(LANGUAGES, self.settings.language.as_deref()).unwrap_or("en");
        Request::new(format!("{WEATHER_URL}/{path}"))
            .query("key", key)
            .query("location.latitude", at.lat)
            .query("location.longitude", at.lon)
            .query("languageCode", language)
            .query("unitsSystem", "METRIC")
            .user_agent(USER_AGENT)
    }
}

fn reverse_geocode_request(at: Coordinates) -> Request {
    Request::new(REVERSE_GEOCODE_URL)
        .query("lat", at.lat)
        .query("lon", at.lon)
        .query("format", "json")
        .user_agent(USER_AGENT)
}

#[async_trait]
impl WeatherDriver for GoogleDriver {
    fn id(&self) -> ProviderId {
        ProviderId::Google
    }

    fn link(&self, record: &WeatherRecord) -> Link {
        let city = record.location.city.replace(' ', "+");
        Link {
            text: "Google Weather",
            url: format!("https://www.google.com/search?q=Weather+in+{city}"),
        }
    }

    async fn fetch(&self, today: NaiveDate) -> std::result::Result<WeatherRecord, RefreshError> {
        let mut asm = Assembler::new(CAPABILITIES.horizon, self.services.translator.as_ref());
        let key = asm.require(Section::Meta, self.settings.require_api_key())?;
        let at = asm.require(Section::Meta, self.station())?;

        let transport = self.services.transport.as_ref();
        let geocode_req = reverse_geocode_request(at);
        let current_req = self.weather_request("currentConditions:lookup", key, at);
        let forecast_req = self
            .weather_request("forecast/days:lookup", key, at)
            .query("days", 7)
            .query("pageSize", 7);

        let (geocode, current, forecast) = tokio::join!(
            fetch_json::<ReverseGeocode>(transport, "location", &geocode_req, has_type),
            fetch_json::<CurrentConditions>(
                transport,
                "current conditions",
                &current_req,
                has_time_zone,
            ),
            fetch_json::<ForecastResponse>(transport, "forecast", &forecast_req, has_time_zone),
        );

        let is_daytime = current.as_ref().ok().and_then(|c| c.is_daytime).unwrap_or(true);

        asm.meta(geocode.and_then(|g| parse_meta(&g, at)));
        asm.current(current.and_then(|c| parse_current(&c)));
        asm.forecast(forecast.and_then(|f| parse_forecast(&f, is_daytime, today)));

        Ok(asm.finish())
    }
}

fn parse_meta(geocode: &ReverseGeocode, at: Coordinates) -> Result<Location> {
    let address = geocode
        .address
        .as_ref()
        .ok_or_else(|| DriverError::missing(Section::Meta, "address"))?;
    let city = address
        .city
        .clone()
        .or_else(|| address.town.clone())
        .or_else(|| address.village.clone())
        .ok_or_else(|| DriverError::missing(Section::Meta, "address.city"))?;

    Ok(Location {
        id: None,
        city,
        country: address.country.clone().unwrap_or_default(),
        region: None,
        coordinates: Some(at),
    })
}

fn parse_current(cc: &CurrentConditions) -> Result<Current> {
    let temperature = degrees(&cc.temperature)
        .ok_or_else(|| DriverError::missing(Section::Current, "temperature.degrees"))?;
    let is_daytime = cc.is_daytime.unwrap_or(true);
    let condition = cc.weather_condition.as_ref();
    let wind = cc.wind.as_ref();

    let mut current = Current {
        feels_like: degrees(&cc.feels_like_temperature),
        humidity: cc.relative_humidity,
        pressure: cc
            .air_pressure
            .as_ref()
            .and_then(|p| p.mean_sea_level_millibars)
            .map(f64::trunc),
        wind_speed: wind.and_then(Wind::speed),
        wind_direction: wind.map(Wind::direction).unwrap_or_default(),
        visibility: cc.visibility.as_ref().and_then(|v| v.distance).map(Visibility::Km),
        condition_text: condition.map(Condition::text).unwrap_or_default(),
        icon: ICONS.icon(condition.map_or("", |c| c.kind.as_str()), is_daytime).to_string(),
        ..Current::default()
    };
    current.set_temperature(Some(temperature));
    Ok(current)
}

/// Day 0 shows the night half while it is night; every other day the day half.
fn parse_forecast(forecast: &ForecastResponse, is_daytime: bool, today: NaiveDate) -> Result<Days> {
    let first = forecast
        .forecast_days
        .first()
        .ok_or_else(|| DriverError::missing(Section::Forecast, "forecastDays"))?;
    let reference = first
        .display_date
        .as_ref()
        .and_then(|d| NaiveDate::from_ymd_opt(d.year, d.month, d.day))
        .unwrap_or(today);

    let mut days = Days::blank(CAPABILITIES.horizon);
    for (i, (slot, day)) in days.iter_mut().zip(&forecast.forecast_days).enumerate() {
        let day_half = i != 0 || is_daytime;
        let part = if day_half { &day.daytime_forecast } else { &day.nighttime_forecast };
        let part = part.as_ref();
        let condition = part.and_then(|p| p.weather_condition.as_ref());
        let wind = part.and_then(|p| p.wind.as_ref());

        *slot = DayForecast {
            day: day_name(reference, i).to_string(),
            max_temperature: degrees(&day.max_temperature),
            min_temperature: degrees(&day.min_temperature),
            humidity: part.and_then(|p| p.relative_humidity),
            pressure: None,
            wind_speed: wind.and_then(Wind::speed),
            wind_direction: wind.map(Wind::direction).unwrap_or_default(),
            condition_text: condition.map(Condition::text).unwrap_or_default(),
            icon: ICONS.icon(condition.map_or("", |c| c.kind.as_str()), day_half).to_string(),
        };
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::NoTranslation;
    use crate::transport::HttpTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn day_part(kind: &str, text: &str, humidity: u32, wind: f64, bearing: f64) -> Value {
        json!({
            "relativeHumidity": humidity,
            "wind": {
                "direction": { "degrees": bearing },
                "speed": { "value": wind, "unit": "KILOMETERS_PER_HOUR" }
            },
            "weatherCondition": {
                "type": kind,
                "description": { "text": text, "languageCode": "en" }
            }
        })
    }

    fn forecast() -> ForecastResponse {
        serde_json::from_value(json!({
            "timeZone": { "id": "America/New_York" },
            "forecastDays": [
                {
                    "displayDate": { "year": 2024, "month": 3, "day": 20 },
                    "maxTemperature": { "degrees": 14.2 },
                    "minTemperature": { "degrees": 3.1 },
                    "daytimeForecast": day_part("RAIN", "Rain", 80, 20.0, 90.0),
                    "nighttimeForecast": day_part("CLEAR", "Clear", 55, 5.0, 0.0)
                },
                {
                    "displayDate": { "year": 2024, "month": 3, "day": 21 },
                    "maxTemperature": { "degrees": 16.0 },
                    "minTemperature": { "degrees": 7.5 },
                    "daytimeForecast": day_part("PARTLY_CLOUDY", "Partly cloudy", 60, 12.0, 225.0),
                    "nighttimeForecast": day_part("PARTLY_CLOUDY", "Partly cloudy", 70, 8.0, 200.0)
                }
            ]
        }))
        .expect("decodes")
    }

    #[test]
    fn night_uses_nighttime_half_for_day_zero() {
        let today = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let days = parse_forecast(&forecast(), false, today).unwrap();
        assert_eq!(days[0].day, "Wed");
        assert_eq!(days[0].icon, "31");
        assert_eq!(days[0].condition_text, "Clear");
        assert_eq!(days[0].humidity, Some(55.0));
        assert_eq!(days[0].max_temperature, Some(14.2));

        assert_eq!(days[1].day, "Thu");
        assert_eq!(days[1].icon, "30");
        assert_eq!(days[1].wind_direction, "SW");
        assert_eq!(days[1].pressure, None);
        assert_eq!(days[2], DayForecast::default());
    }

    #[test]
    fn daytime_uses_daytime_half() {
        let days = parse_forecast(&forecast(), true, NaiveDate::MIN).unwrap();
        assert_eq!(days[0].icon, "11");
        assert_eq!(days[0].wind_speed, Some(20.0));
        assert_eq!(days[0].wind_direction, "E");
    }

    #[test]
    fn current_conditions() {
        let cc: CurrentConditions = serde_json::from_value(json!({
            "timeZone": { "id": "Europe/Lisbon" },
            "isDaytime": false,
            "temperature": { "degrees": 13.7, "unit": "CELSIUS" },
            "feelsLikeTemperature": { "degrees": 12.9 },
            "relativeHumidity": 81,
            "airPressure": { "meanSeaLevelMillibars": 1016.84 },
            "visibility": { "distance": 16, "unit": "KILOMETERS" },
            "wind": { "direction": { "degrees": 340 }, "speed": { "value": 9 } },
            "weatherCondition": {
                "type": "MOSTLY_CLOUDY",
                "description": { "text": "Mostly cloudy" }
            }
        }))
        .unwrap();

        let current = parse_current(&cc).unwrap();
        assert_eq!(current.temperature, Some(13.7));
        assert_eq!(current.pressure, Some(1016.0));
        assert_eq!(current.visibility, Some(Visibility::Km(16.0)));
        assert_eq!(current.wind_direction, "NNW");
        assert_eq!(current.icon, "27");
        assert_eq!(current.condition_text, "Mostly cloudy");
    }

    #[test]
    fn current_without_temperature_is_incomplete() {
        let cc: CurrentConditions = serde_json::from_value(json!({ "timeZone": {} })).unwrap();
        assert!(matches!(
            parse_current(&cc),
            Err(DriverError::Parse { section: Section::Current, .. })
        ));
    }

    #[test]
    fn meta_falls_back_to_town_and_village() {
        let at = Coordinates { lat: 1.0, lon: 2.0 };
        let geo: ReverseGeocode = serde_json::from_value(json!({
            "type": "hamlet",
            "address": { "village": "Azenhas do Mar", "country": "Portugal" }
        }))
        .unwrap();
        let location = parse_meta(&geo, at).unwrap();
        assert_eq!(location.city, "Azenhas do Mar");
        assert_eq!(location.country, "Portugal");
    }

    #[test]
    fn requests_carry_key_language_and_units() {
        let services = Services {
            transport: Arc::new(HttpTransport::new()),
            translator: Arc::new(NoTranslation),
        };
        let driver = GoogleDriver::new(
            DriverSettings::new("40.7,-74").api_key("KEY").language("he_IL.UTF-8"),
            services,
        );
        let at = Coordinates { lat: 40.7, lon: -74.0 };
        let req = driver.weather_request("currentConditions:lookup", "KEY", at);
        assert_eq!(req.url, "https://weather.googleapis.com/v1/currentConditions:lookup");
        assert_eq!(req.param("key"), Some("KEY"));
        assert_eq!(req.param("languageCode"), Some("iw"));
        assert_eq!(req.param("location.longitude"), Some("-74"));
        assert_eq!(req.param("unitsSystem"), Some("METRIC"));
        assert!(req.user_agent.is_some());
    }

    #[test]
    fn link_searches_for_city() {
        let services = Services {
            transport: Arc::new(HttpTransport::new()),
            translator: Arc::new(NoTranslation),
        };
        let driver = GoogleDriver::new(DriverSettings::new("40.7,-74"), services);
        let mut record = WeatherRecord::blank(7);
        record.location.city = "New York".into();
        assert_eq!(
            driver.link(&record).url,
            "https://www.google.com/search?q=Weather+in+New+York"
        );
    }
}
