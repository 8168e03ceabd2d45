mod common;

use common::{MockTransport, today, with_transport};
use serde_json::{Value, json};
use wx_core::{DriverError, DriverSettings, ProviderId, ServiceStatus, build_driver};

// 2024-03-18T00:00:00Z
const MIDNIGHT: i64 = 1_710_720_000;

fn weather() -> Value {
    json!({
        "cod": 200,
        "id": 2643743,
        "name": "London",
        "coord": { "lon": -0.1257, "lat": 51.5085 },
        "sys": { "country": "GB" },
        "main": { "temp": 9.6, "feels_like": 7.2, "pressure": 1004, "humidity": 87 },
        "wind": { "speed": 6.2, "deg": 230 },
        "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10n" }],
        "visibility": 10000
    })
}

fn forecast() -> Value {
    let list: Vec<Value> = (0..40)
        .map(|i| {
            let hour = 3 * i64::from(i);
            json!({
                "dt": MIDNIGHT + 12 * 3600 + hour * 3600,
                "main": {
                    "temp_max": 8.0 + f64::from(i % 8),
                    "temp_min": 4.0,
                    "humidity": 80,
                    "grnd_level": 1001
                },
                "wind": { "speed": 4.0, "deg": 250 },
                "weather": [{ "description": "overcast clouds", "icon": "04d" }]
            })
        })
        .collect();
    json!({
        "cod": "200",
        "list": list,
        "city": {
            "id": 2643743,
            "name": "London",
            "country": "GB",
            "coord": { "lat": 51.5085, "lon": -0.1257 }
        }
    })
}

fn settings() -> DriverSettings {
    DriverSettings::new("2643743").api_key("secret").language("en_GB.UTF-8")
}

#[tokio::test]
async fn london_by_city_id() {
    let (transport, services) = with_transport(
        MockTransport::new()
            .reply("/data/2.5/weather", weather())
            .reply("/data/2.5/forecast", forecast()),
    );
    let driver = build_driver(ProviderId::OwmFree, settings(), services);

    let record = driver.fetch(today()).await.expect("refresh succeeds");
    assert!(record.status.is_ok());
    assert_eq!(record.location.city, "London");
    assert_eq!(record.location.id.as_deref(), Some("2643743"));
    assert_eq!(record.current.condition_text, "Light Rain");
    assert_eq!(record.current.icon, "12");
    assert_eq!(record.days.len(), 5);
    assert_eq!(record.days[0].day, "Mon");
    assert_eq!(record.days[1].icon, "26");
    assert_eq!(record.days[1].condition_text, "Overcast Clouds");
    assert_eq!(record.days[1].max_temperature, Some(15.0));
    assert_eq!(record.days[1].min_temperature, Some(4.0));

    let link = driver.link(&record);
    assert_eq!(link.url, "https://openweathermap.org/city/2643743");

    let req = transport.request_to("/data/2.5/weather").expect("current requested");
    assert_eq!(req.param("id"), Some("2643743"));
    assert_eq!(req.param("appid"), Some("secret"));
    assert_eq!(req.param("lang"), Some("en"));
}

#[tokio::test]
async fn forecast_failure_keeps_location_and_current() {
    let (_, services) = with_transport(
        MockTransport::new().reply("/data/2.5/weather", weather()).fail("/data/2.5/forecast", 502),
    );
    let driver = build_driver(ProviderId::OwmFree, settings(), services);

    let record = driver.fetch(today()).await.expect("refresh completes");
    assert_eq!(record.status.meta, ServiceStatus::Ok);
    assert_eq!(record.status.cc, ServiceStatus::Ok);
    assert_eq!(record.status.forecast, ServiceStatus::Error);
    assert_eq!(record.location.country, "GB");
    assert!(record.days.iter().all(|d| d.icon.is_empty()));
}

#[tokio::test]
async fn error_cod_is_rejected() {
    let (_, services) = with_transport(
        MockTransport::new()
            .reply("/data/2.5/weather", json!({ "cod": 401, "message": "Invalid API key." }))
            .reply("/data/2.5/forecast", json!({ "cod": "401", "message": "Invalid API key." })),
    );
    let driver = build_driver(ProviderId::OwmFree, settings(), services);

    let record = driver.fetch(today()).await.expect("refresh completes");
    assert_eq!(record.status.meta, ServiceStatus::Error);
    assert_eq!(record.status.cc, ServiceStatus::Error);
    assert_eq!(record.status.forecast, ServiceStatus::Error);
}

#[tokio::test]
async fn missing_api_key_makes_no_requests() {
    let (transport, services) = with_transport(MockTransport::new());
    let driver = build_driver(ProviderId::OwmFree, DriverSettings::new("2643743"), services);

    let err = driver.fetch(today()).await.unwrap_err();
    assert!(matches!(err.source, DriverError::MissingApiKey));
    assert_eq!(err.status.meta, ServiceStatus::Error);
    assert_eq!(err.status.last_error.as_deref(), Some("No API key provided"));
    assert!(transport.requests().is_empty());
}
