use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Progress of one section of a record during a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Init,
    Ok,
    Error,
}

/// The three independently rendered parts of a [`WeatherRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Meta,
    Current,
    Forecast,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Section::Meta => "location",
            Section::Current => "current conditions",
            Section::Forecast => "forecast",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
    pub meta: ServiceStatus,
    pub cc: ServiceStatus,
    pub forecast: ServiceStatus,
    /// Message of the most recent failure in this refresh, if any.
    pub last_error: Option<String>,
}

impl Status {
    pub fn get(&self, section: Section) -> ServiceStatus {
        match section {
            Section::Meta => self.meta,
            Section::Current => self.cc,
            Section::Forecast => self.forecast,
        }
    }

    pub fn set(&mut self, section: Section, status: ServiceStatus) {
        match section {
            Section::Meta => self.meta = status,
            Section::Current => self.cc = status,
            Section::Forecast => self.forecast = status,
        }
    }

    pub fn is_ok(&self) -> bool {
        [self.meta, self.cc, self.forecast].iter().all(|s| *s == ServiceStatus::Ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    /// Provider-side identifier of the resolved location (BBC / OWM ids).
    pub id: Option<String>,
    pub city: String,
    pub country: String,
    pub region: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// Visibility is numeric for most providers; BBC reports a word ("Good").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Visibility {
    Km(f64),
    Descriptive(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Current {
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    /// Relative humidity, 0-100.
    pub humidity: Option<f64>,
    /// Hectopascal.
    pub pressure: Option<f64>,
    pub pressure_trend: Option<String>,
    /// Kilometres per hour.
    pub wind_speed: Option<f64>,
    /// Compass abbreviation such as `NNE`.
    pub wind_direction: String,
    pub visibility: Option<Visibility>,
    pub condition_text: String,
    pub icon: String,
    /// Only true once a temperature has actually been assigned.
    pub has_temperature: bool,
}

impl Current {
    pub fn set_temperature(&mut self, value: Option<f64>) {
        self.temperature = value;
        self.has_temperature = value.is_some();
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayForecast {
    /// Weekday abbreviation, `Sun` through `Sat`.
    pub day: String,
    pub max_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: String,
    pub condition_text: String,
    pub icon: String,
}

/// Fixed-length run of forecast days.
///
/// Built once with blank entries and never resized, so the display layer can
/// rely on the shape even before any data arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Days(Box<[DayForecast]>);

impl Days {
    pub fn blank(horizon: usize) -> Self {
        Days((0..horizon).map(|_| DayForecast::default()).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DayForecast> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DayForecast> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, DayForecast> {
        self.0.iter_mut()
    }
}

impl Index<usize> for Days {
    type Output = DayForecast;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for Days {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<'a> IntoIterator for &'a Days {
    type Item = &'a DayForecast;
    type IntoIter = std::slice::Iter<'a, DayForecast>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The normalized output every driver produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub location: Location,
    pub current: Current,
    pub days: Days,
    pub status: Status,
}

impl WeatherRecord {
    pub fn blank(horizon: usize) -> Self {
        Self {
            location: Location::default(),
            current: Current::default(),
            days: Days::blank(horizon),
            status: Status::default(),
        }
    }
}
