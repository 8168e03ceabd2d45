mod common;

use common::{MockTransport, today, with_transport};
use serde_json::{Value, json};
use wx_core::{DriverError, DriverSettings, ProviderId, ServiceStatus, build_driver};

fn forecast_body() -> Value {
    json!({
        "latitude": 38.72,
        "longitude": -9.14,
        "timezone": "Europe/Lisbon",
        "current": {
            "temperature_2m": 21.3,
            "relative_humidity_2m": 64,
            "apparent_temperature": 20.8,
            "is_day": 1,
            "weather_code": "61",
            "surface_pressure": 1008.6,
            "wind_speed_10m": 14.2,
            "wind_direction_10m": 225
        },
        "daily": {
            "time": [
                "2024-03-18", "2024-03-19", "2024-03-20", "2024-03-21",
                "2024-03-22", "2024-03-23", "2024-03-24"
            ],
            "weather_code": [61, 3, 0, 80, 95, 2, 1],
            "temperature_2m_max": [22.0, 19.5, 20.1, 18.0, 17.2, 19.9, 21.4],
            "temperature_2m_min": [14.0, 12.5, 11.8, 12.0, 11.1, 12.3, 13.0],
            "wind_speed_10m_max": [20.0, 15.1, 9.8, 25.3, 31.0, 12.2, 10.0],
            "wind_direction_10m_dominant": [225, 270, 0, 200, 190, 300, 315],
            "relative_humidity_2m_mean": [70, 65, 60, 80, 85, 66, 62],
            "surface_pressure_mean": [1009.0, 1012.0, 1016.0, 1006.0, 1001.0, 1013.0, 1015.0]
        }
    })
}

fn geocode_body() -> Value {
    json!({ "city": "Lisbon", "state": "Lisboa", "country": "Portugal" })
}

fn settings() -> DriverSettings {
    DriverSettings::new("38.72,-9.14")
}

#[tokio::test]
async fn rain_in_lisbon_end_to_end() {
    let (transport, services) = with_transport(
        MockTransport::new()
            .reply("api.open-meteo.com", forecast_body())
            .reply("geocode.xyz", geocode_body()),
    );
    let driver = build_driver(ProviderId::OpenMeteo, settings(), services);

    let record = driver.fetch(today()).await.expect("refresh succeeds");

    assert!(record.status.is_ok());
    assert_eq!(record.location.city, "Lisbon");
    assert_eq!(record.location.country, "Portugal");
    assert_eq!(record.current.temperature, Some(21.3));
    assert!(record.current.has_temperature);
    assert_eq!(record.current.icon, "11");
    assert_eq!(record.current.condition_text, "Rain: Slight Intensity");
    assert_eq!(record.current.wind_direction, "SW");
    assert_eq!(record.days.len(), 7);
    assert_eq!(record.days[0].day, "Mon");
    assert_eq!(record.days[4].icon, "04");
    assert_eq!(record.days[6].day, "Sun");

    let geocode = transport.request_to("geocode.xyz").expect("geocode requested");
    assert_eq!(geocode.url, "https://geocode.xyz/38.72,-9.14");
    assert_eq!(driver.link(&record).url, "https://open-meteo.com/");
}

#[tokio::test]
async fn refresh_is_idempotent() {
    let (_, services) = with_transport(
        MockTransport::new()
            .reply("api.open-meteo.com", forecast_body())
            .reply("geocode.xyz", geocode_body()),
    );
    let driver = build_driver(ProviderId::OpenMeteo, settings(), services);

    let first = driver.fetch(today()).await.expect("first refresh");
    let second = driver.fetch(today()).await.expect("second refresh");
    assert_eq!(first, second);
}

#[tokio::test]
async fn place_lookup_failure_only_affects_location() {
    let (_, services) = with_transport(
        MockTransport::new()
            .reply("api.open-meteo.com", forecast_body())
            .reply(
                "geocode.xyz",
                json!({ "error": { "code": "006", "description": "Request Throttled." } }),
            ),
    );
    let driver = build_driver(ProviderId::OpenMeteo, settings(), services);

    let record = driver.fetch(today()).await.expect("refresh completes");
    assert_eq!(record.status.meta, ServiceStatus::Error);
    assert_eq!(record.status.cc, ServiceStatus::Ok);
    assert_eq!(record.status.forecast, ServiceStatus::Ok);
    assert!(record.status.last_error.is_some());
    assert_eq!(record.current.icon, "11");
}

#[tokio::test]
async fn forecast_failure_aborts_both_sections_it_feeds() {
    let (transport, services) = with_transport(
        MockTransport::new().fail("api.open-meteo.com", 503).reply("geocode.xyz", geocode_body()),
    );
    let driver = build_driver(ProviderId::OpenMeteo, settings(), services);

    let err = driver.fetch(today()).await.unwrap_err();
    assert!(matches!(err.source, DriverError::Transport { step: "forecast", .. }));
    assert_eq!(err.status.cc, ServiceStatus::Error);
    assert_eq!(err.status.forecast, ServiceStatus::Error);
    assert_eq!(err.status.meta, ServiceStatus::Init);
    assert!(transport.request_to("geocode.xyz").is_none());
}

#[tokio::test]
async fn invalid_station_makes_no_requests() {
    let (transport, services) = with_transport(MockTransport::new());
    let driver = build_driver(ProviderId::OpenMeteo, DriverSettings::new("Lisbon"), services);

    let err = driver.fetch(today()).await.unwrap_err();
    assert!(err.source.is_validation());
    assert_eq!(err.status.meta, ServiceStatus::Error);
    assert!(transport.requests().is_empty());

    let (transport, services) = with_transport(MockTransport::new());
    let driver = build_driver(ProviderId::OpenMeteo, DriverSettings::new("  "), services);
    assert!(driver.fetch(today()).await.is_err());
    assert!(transport.requests().is_empty());
}
