// nws_speak - Speech-friendly weather reports from api.weather.gov
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Unit conversions and text normalization for spoken output.

use chrono::DateTime;

const MPS_TO_MPH: f64 = 2.2369362920544;

const DIRECTIONS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
];

pub fn celsius_to_fahrenheit(c: f64) -> i64 {
    (c * 9.0 / 5.0 + 32.0).round() as i64
}

pub fn mps_to_mph(mps: f64) -> i64 {
    (mps * MPS_TO_MPH).round() as i64
}

pub fn kph_to_mps(kph: f64) -> f64 {
    kph / 3.6
}

/// Name of the 16-point compass direction closest to `deg`. Halfway points
/// round away from zero, so 11.25 is "NNE".
pub fn deg_to_dir16(deg: f64) -> &'static str {
    let index = ((deg / 22.5).round() as i64).rem_euclid(16) as usize;
    DIRECTIONS[index]
}

/// Spoken form of a compass abbreviation like "SW" or "VRB".
///
/// Unknown short alphabetic tokens are title-cased and anything else (including
/// words that are already spelled out) is returned unchanged.
pub fn expand_direction(token: &str) -> String {
    let token = token.trim();
    let expanded = match token.to_ascii_uppercase().as_str() {
        "N" => "North",
        "NNE" => "North Northeast",
        "NE" => "Northeast",
        "ENE" => "East Northeast",
        "E" => "East",
        "ESE" => "East Southeast",
        "SE" => "Southeast",
        "SSE" => "South Southeast",
        "S" => "South",
        "SSW" => "South Southwest",
        "SW" => "Southwest",
        "WSW" => "West Southwest",
        "W" => "West",
        "WNW" => "West Northwest",
        "NW" => "Northwest",
        "NNW" => "North Northwest",
        "VRB" => "Variable",
        _ => return fallback_direction(token),
    };

    expanded.to_owned()
}

fn fallback_direction(token: &str) -> String {
    let len = token.chars().count();
    if (1..=3).contains(&len) && token.chars().all(|c| c.is_ascii_alphabetic()) {
        title_case(token)
    } else {
        token.to_owned()
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Replace `°` with the word "degrees", collapse whitespace runs, and trim.
pub fn sanitize(s: &str) -> String {
    s.replace('°', " degrees ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace "mph" or "MPH" (as a whole word) with "miles per hour".
pub fn expand_speed_units(speed: &str) -> String {
    speed
        .split_whitespace()
        .map(|w| match w {
            "mph" | "MPH" => "miles per hour",
            _ => w,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spoken form of a forecast temperature unit.
pub fn temperature_unit_words(unit: &str) -> &str {
    match unit {
        "F" => "degrees Fahrenheit",
        "C" => "degrees Celsius",
        other => other,
    }
}

/// Label for a forecast period such as "Monday 3 PM", from its start time.
///
/// The hour is shown in the timestamp's own offset on a 12-hour clock without a
/// leading zero ("12 AM" for midnight). A missing or unparseable timestamp
/// falls back to `name`, then to "Period".
pub fn period_label(start: Option<&str>, name: Option<&str>) -> String {
    start
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.format("%A %-I %p").to_string())
        .or_else(|| name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_owned))
        .unwrap_or_else(|| "Period".to_owned())
}
