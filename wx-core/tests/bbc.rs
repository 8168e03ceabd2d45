mod common;

use common::{MockTransport, today, with_transport};
use serde_json::{Value, json};
use wx_core::{DriverSettings, ProviderId, ServiceStatus, Visibility, build_driver};

fn search() -> Value {
    json!({
        "response": { "results": {
            "results": [{
                "id": "2643743", "name": "London", "country": "GB",
                "latitude": 51.50853, "longitude": -0.12574
            }],
            "totalResults": 1
        } }
    })
}

fn observation() -> Value {
    json!({
        "observations": [{
            "temperature": { "C": 11, "F": 52 },
            "wind": { "windSpeedKph": 17, "windDirectionAbbreviation": "WSW" },
            "humidityPercent": 76,
            "pressureMb": 1009,
            "pressureDirection": "Falling",
            "visibility": "Very Good"
        }]
    })
}

fn forecast() -> Value {
    let days: Vec<Value> = (18..25)
        .map(|date| {
            json!({
                "summary": { "report": {
                    "localDate": format!("2024-03-{date}"),
                    "maxTempC": 13, "minTempC": 6,
                    "weatherType": 7, "weatherTypeText": "Thick Cloud",
                    "windDirection": "W", "windSpeedKph": 19
                }},
                "detailed": { "reports": [{
                    "feelsLikeTemperatureC": 9, "humidity": 80, "pressure": 1010,
                    "weatherType": 12, "weatherTypeText": "Light Rain Showers"
                }]}
            })
        })
        .collect();
    json!({ "isNight": false, "forecasts": days })
}

#[tokio::test]
async fn coordinates_are_resolved_to_a_location_id() {
    let (transport, services) = with_transport(
        MockTransport::new()
            .reply("/locator/locations", search())
            .reply("/observation/2643743", observation())
            .reply("/forecast/aggregated/2643743", forecast()),
    );
    let driver = build_driver(ProviderId::Bbc, DriverSettings::new("51.5085,-0.1257"), services);

    let record = driver.fetch(today()).await.expect("refresh succeeds");
    assert!(record.status.is_ok());
    assert_eq!(record.location.city, "London");
    assert_eq!(record.current.temperature, Some(11.0));
    assert_eq!(record.current.pressure_trend.as_deref(), Some("Falling"));
    assert_eq!(record.current.visibility, Some(Visibility::Descriptive("Very Good".into())));
    assert_eq!(record.current.condition_text, "Light Rain Shower");
    assert_eq!(record.current.icon, "11");
    assert_eq!(record.days[0].day, "Mon");
    assert_eq!(record.days[6].day, "Sun");
    assert_eq!(record.days[6].icon, "26");

    let search = transport.request_to("/locator/locations").expect("locator searched");
    assert_eq!(search.param("la"), Some("51.5085"));
    assert_eq!(driver.link(&record).url, "https://www.bbc.com/weather/2643743");
}

#[tokio::test]
async fn observation_failure_only_marks_current() {
    let (_, services) = with_transport(
        MockTransport::new()
            .fail("/observation/", 500)
            .reply("/forecast/aggregated/2643743", forecast())
            .reply(
                "/locator/locations/2643743",
                json!({ "response": { "id": "2643743", "name": "London", "country": "GB" } }),
            ),
    );
    let driver = build_driver(ProviderId::Bbc, DriverSettings::new("2643743"), services);

    let record = driver.fetch(today()).await.expect("refresh completes");
    assert_eq!(record.status.meta, ServiceStatus::Ok);
    assert_eq!(record.status.cc, ServiceStatus::Error);
    assert_eq!(record.status.forecast, ServiceStatus::Ok);
    assert!(!record.current.has_temperature);
}

#[tokio::test]
async fn locator_failure_stops_before_weather_requests() {
    let (transport, services) = with_transport(MockTransport::new().fail("/locator/", 503));
    let driver = build_driver(ProviderId::Bbc, DriverSettings::new("2643743"), services);

    let err = driver.fetch(today()).await.unwrap_err();
    assert_eq!(err.status.meta, ServiceStatus::Error);
    assert_eq!(transport.requests().len(), 1);
}
