//! Small unit and label conversions shared by the drivers.

use chrono::{Datelike, NaiveDate, TimeDelta};

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// 16-point compass abbreviation for a bearing in degrees.
pub fn compass_direction(degrees: f64) -> String {
    if !degrees.is_finite() {
        return String::new();
    }
    let normalized = degrees.rem_euclid(360.0);
    let index = (normalized / 22.5).round() as usize % COMPASS.len();
    COMPASS[index].to_string()
}

pub fn compass_from(degrees: Option<f64>) -> String {
    degrees.map(compass_direction).unwrap_or_default()
}

/// Pascal to hectopascal, rounded to the nearest whole hPa.
pub fn pa_to_hpa(pa: f64) -> f64 {
    (pa / 100.0).round()
}

/// Metres to kilometres, rounded to the nearest whole km.
pub fn m_to_km(metres: f64) -> f64 {
    (metres / 1000.0).round()
}

pub fn mps_to_kph(mps: f64) -> f64 {
    mps * 3.6
}

/// Weekday abbreviation of `reference + offset` days.
pub fn day_name(reference: NaiveDate, offset: usize) -> &'static str {
    let date = reference
        .checked_add_signed(TimeDelta::days(offset as i64))
        .unwrap_or(reference);
    DAY_NAMES[date.weekday().num_days_from_sunday() as usize]
}

/// Upper-cases the first letter of every word.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if at_word_start && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }
    out
}

/// First run of digits in a phrase such as `"10 to 15 km/h"`.
pub fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
