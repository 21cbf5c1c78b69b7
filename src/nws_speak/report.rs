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

use crate::client::{
    AlertFeature, AlertProperties, ClientError, ForecastPeriod, Measurement, ObservationProperties, Point,
    WeatherGovClient, UNIT_DEGREES_F, UNIT_KPH,
};
use crate::config::Config;
use crate::convert;
use crate::speech::LineSink;
use std::error;
use std::fmt;
use tokio::io::{self, AsyncWrite};
use tracing::{Instrument, Level};

pub const INTRO: &str = "Weather report from the National Weather Service.";
pub const CURRENT_UNAVAILABLE: &str = "Current conditions: unavailable.";
pub const FORECAST_HEADING: &str = "Forecast.";
pub const FORECAST_UNAVAILABLE: &str = "Forecast data unavailable.";
pub const NO_ALERTS: &str = "Alerts: none active.";

#[derive(Debug)]
pub enum ReportError {
    Client(ClientError),
    Output(io::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(e) => write!(f, "{}", e),
            Self::Output(e) => write!(f, "unable to write report: {}", e),
        }
    }
}

impl error::Error for ReportError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Client(e) => Some(e),
            Self::Output(e) => Some(e),
        }
    }
}

impl From<ClientError> for ReportError {
    fn from(e: ClientError) -> Self {
        Self::Client(e)
    }
}

impl From<io::Error> for ReportError {
    fn from(e: io::Error) -> Self {
        Self::Output(e)
    }
}

/// Fetches each section of a report in order and writes its lines to a sink.
///
/// The run order is fixed: intro, current conditions, forecast (only when the
/// detailed forecast is enabled) and finally active alerts. Sections are written
/// as soon as they are rendered. Any request failure ends the run.
#[derive(Debug)]
pub struct Reporter<'a> {
    client: &'a WeatherGovClient,
    config: &'a Config,
}

impl<'a> Reporter<'a> {
    pub fn new(client: &'a WeatherGovClient, config: &'a Config) -> Self {
        Reporter { client, config }
    }

    pub async fn run<W>(&self, sink: &mut LineSink<W>) -> Result<(), ReportError>
    where
        W: AsyncWrite + Unpin,
    {
        sink.emit(INTRO).await?;

        let point = self
            .client
            .point(self.config.lat, self.config.lon)
            .instrument(tracing::span!(Level::DEBUG, "nws_point"))
            .await?;

        let current = self
            .current_conditions(&point)
            .instrument(tracing::span!(Level::DEBUG, "nws_current"))
            .await?;
        emit_all(sink, &current).await?;

        if self.config.detailed {
            let forecast = self
                .forecast(&point)
                .instrument(tracing::span!(Level::DEBUG, "nws_forecast"))
                .await?;
            emit_all(sink, &forecast).await?;
        }

        let alerts = self
            .alerts()
            .instrument(tracing::span!(Level::DEBUG, "nws_alerts"))
            .await?;
        sink.emit("").await?;
        emit_all(sink, &alerts).await?;

        sink.flush().await?;
        Ok(())
    }

    /// Lines for the latest observation at the first station near the point.
    pub async fn current_conditions(&self, point: &Point) -> Result<Vec<String>, ClientError> {
        let stations_url = match &point.properties.observation_stations {
            Some(u) => u,
            None => {
                tracing::info!(message = "point metadata has no observation stations");
                return Ok(vec![CURRENT_UNAVAILABLE.to_owned()]);
            }
        };

        let stations = self.client.stations(stations_url).await?;
        let station = match stations.first_station_id() {
            Some(s) => s,
            None => {
                tracing::info!(message = "no observation stations available", url = %stations_url);
                return Ok(vec![CURRENT_UNAVAILABLE.to_owned()]);
            }
        };

        let obs = self.client.latest_observation(&station).await?;
        tracing::info!(message = "fetched latest observation", station = %station);
        Ok(render_current(&station, &obs.properties))
    }

    /// Lines for the forecast section, including its leading blank line and heading.
    pub async fn forecast(&self, point: &Point) -> Result<Vec<String>, ClientError> {
        let grid = match self.config.grid.clone().or_else(|| point.properties.gridpoint()) {
            Some(g) => g,
            None => {
                tracing::info!(message = "no gridpoint configured or available for point");
                return Ok(render_forecast(&[], self.config.periods));
            }
        };

        let forecast = self.client.forecast(&grid, &self.config.forecast_path).await?;
        tracing::info!(
            message = "fetched forecast",
            gridpoint = %grid,
            periods = forecast.properties.periods.len(),
        );

        Ok(render_forecast(&forecast.properties.periods, self.config.periods))
    }

    pub async fn alerts(&self) -> Result<Vec<String>, ClientError> {
        let alerts = self.client.active_alerts(self.config.lat, self.config.lon).await?;
        tracing::info!(message = "fetched active alerts", alerts = alerts.features.len());
        Ok(render_alerts(&alerts.features, self.config.full_alerts))
    }
}

async fn emit_all<W>(sink: &mut LineSink<W>, lines: &[String]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for line in lines {
        sink.emit(line).await?;
    }

    Ok(())
}

/// Render an observation as sentences. Fields without a value are left out.
pub fn render_current(station: &str, obs: &ObservationProperties) -> Vec<String> {
    let mut lines = vec![format!("Current conditions at {}.", station)];

    if let Some(desc) = obs.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        lines.push(sentence(desc));
    }

    if let Some(temp) = obs.temperature.as_ref().and_then(fahrenheit) {
        lines.push(format!("Temperature: {} degrees Fahrenheit.", temp));
    }

    if let Some(speed) = obs.wind_speed.as_ref().and_then(meters_per_second) {
        let mph = convert::mps_to_mph(speed);
        match obs.wind_direction.as_ref().and_then(|m| m.value) {
            Some(deg) => {
                let dir = convert::expand_direction(convert::deg_to_dir16(deg));
                lines.push(format!("Wind: {} at {} miles per hour.", dir, mph));
            }
            None => lines.push(format!("Wind: {} miles per hour.", mph)),
        }
    }

    if let Some(humidity) = percent(obs.relative_humidity.as_ref()) {
        lines.push(format!("Humidity: {} percent.", humidity));
    }

    lines.iter().map(|l| convert::sanitize(l)).collect()
}

/// Render the forecast section: a blank line, a heading, then one line for
/// each of the first `count` periods.
pub fn render_forecast(periods: &[ForecastPeriod], count: usize) -> Vec<String> {
    let mut lines = vec![String::new(), FORECAST_HEADING.to_owned()];
    let selected = &periods[..count.min(periods.len())];

    if selected.is_empty() {
        lines.push(FORECAST_UNAVAILABLE.to_owned());
    } else {
        lines.extend(selected.iter().map(render_period));
    }

    lines
}

/// Render a single forecast period as one line of space separated sentences.
pub fn render_period(period: &ForecastPeriod) -> String {
    let mut parts = vec![format!(
        "{}:",
        convert::period_label(period.start_time.as_deref(), period.name.as_deref())
    )];

    if let Some(short) = non_empty(&period.short_forecast) {
        parts.push(sentence(short));
    }

    if let Some(temp) = period.temperature {
        match non_empty(&period.temperature_unit) {
            Some(unit) => parts.push(format!(
                "Temperature {} {}.",
                temp.round() as i64,
                convert::temperature_unit_words(unit)
            )),
            None => parts.push(format!("Temperature {}.", temp.round() as i64)),
        }
    }

    if let Some(speed) = non_empty(&period.wind_speed) {
        let speed = convert::expand_speed_units(speed);
        match non_empty(&period.wind_direction) {
            Some(dir) => parts.push(format!("Wind {} {}.", convert::expand_direction(dir), speed)),
            None => parts.push(format!("Wind {}.", speed)),
        }
    }

    if let Some(pop) = percent(period.probability_of_precipitation.as_ref()) {
        parts.push(format!("Chance of precipitation {} percent.", pop));
    }

    if let Some(humidity) = percent(period.relative_humidity.as_ref()) {
        parts.push(format!("Humidity {} percent.", humidity));
    }

    if let Some(detail) = non_empty(&period.detailed_forecast) {
        parts.push(detail.to_owned());
    }

    convert::sanitize(&parts.join(" "))
}

/// Render active alerts in the order given.
pub fn render_alerts(alerts: &[AlertFeature], full_text: bool) -> Vec<String> {
    if alerts.is_empty() {
        return vec![NO_ALERTS.to_owned()];
    }

    let mut lines = Vec::with_capacity(alerts.len() + 1);
    lines.push(format!("Alerts: {} active.", alerts.len()));
    lines.extend(alerts.iter().map(|a| render_alert(&a.properties, full_text)));
    lines
}

pub fn render_alert(alert: &AlertProperties, full_text: bool) -> String {
    let event = non_empty(&alert.event).unwrap_or("Alert");
    let mut line = match non_empty(&alert.headline) {
        Some(headline) => format!("{}. {}", event, headline),
        None => format!("{}.", event),
    };

    if full_text {
        if let Some(desc) = non_empty(&alert.description) {
            line.push_str(" Details: ");
            line.push_str(desc);
        }

        if let Some(instruction) = non_empty(&alert.instruction) {
            line.push_str(" Instructions: ");
            line.push_str(instruction);
        }
    }

    convert::sanitize(&line)
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// End `s` with a period unless it already ends with punctuation.
fn sentence(s: &str) -> String {
    if s.ends_with(&['.', '!', '?'][..]) {
        s.to_owned()
    } else {
        format!("{}.", s)
    }
}

fn fahrenheit(m: &Measurement) -> Option<i64> {
    let v = m.value?;
    if m.is_unit(UNIT_DEGREES_F) {
        Some(v.round() as i64)
    } else {
        Some(convert::celsius_to_fahrenheit(v))
    }
}

fn meters_per_second(m: &Measurement) -> Option<f64> {
    let v = m.value?;
    if m.is_unit(UNIT_KPH) {
        Some(convert::kph_to_mps(v))
    } else {
        Some(v)
    }
}

fn percent(m: Option<&Measurement>) -> Option<i64> {
    m.and_then(|m| m.value).map(|v| v.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{UNIT_DEGREES_C, UNIT_MPS};

    const UNIT_PERCENT: &str = "wmoUnit:percent";
    const UNIT_DEGREES_ANGLE: &str = "wmoUnit:degree_(angle)";

    fn period(n: u32) -> ForecastPeriod {
        ForecastPeriod {
            number: Some(n),
            name: Some(format!("Period {}", n)),
            short_forecast: Some(format!("Sunny {}", n)),
            ..ForecastPeriod::default()
        }
    }

    fn alert(event: &str, headline: &str) -> AlertFeature {
        AlertFeature {
            id: None,
            properties: AlertProperties {
                event: Some(event.to_owned()),
                headline: Some(headline.to_owned()),
                description: Some("Heat index values\nup to 105.".to_owned()),
                instruction: Some("Drink plenty of fluids.".to_owned()),
                severity: Some("Moderate".to_owned()),
            },
        }
    }

    #[test]
    fn test_current_temperature_only() {
        let obs = ObservationProperties {
            temperature: Some(Measurement::new(UNIT_DEGREES_C, 0.0)),
            ..ObservationProperties::default()
        };

        assert_eq!(
            vec!["Current conditions at KBOS.", "Temperature: 32 degrees Fahrenheit."],
            render_current("KBOS", &obs)
        );
    }

    #[test]
    fn test_current_all_fields() {
        let obs = ObservationProperties {
            description: Some("Partly  Cloudy".to_owned()),
            temperature: Some(Measurement::new(UNIT_DEGREES_C, 21.7)),
            wind_speed: Some(Measurement::new(UNIT_MPS, 5.0)),
            wind_direction: Some(Measurement::new(UNIT_DEGREES_ANGLE, 225.0)),
            relative_humidity: Some(Measurement::new(UNIT_PERCENT, 54.6)),
            ..ObservationProperties::default()
        };

        assert_eq!(
            vec![
                "Current conditions at KBOS.",
                "Partly Cloudy.",
                "Temperature: 71 degrees Fahrenheit.",
                "Wind: Southwest at 11 miles per hour.",
                "Humidity: 55 percent.",
            ],
            render_current("KBOS", &obs)
        );
    }

    #[test]
    fn test_current_wind_kph_without_direction() {
        let obs = ObservationProperties {
            wind_speed: Some(Measurement::new(UNIT_KPH, 18.0)),
            wind_direction: Some(Measurement {
                unit_code: Some(UNIT_DEGREES_ANGLE.to_owned()),
                value: None,
                quality_control: None,
            }),
            ..ObservationProperties::default()
        };

        assert_eq!(
            vec!["Current conditions at KBOS.", "Wind: 11 miles per hour."],
            render_current("KBOS", &obs)
        );
    }

    #[test]
    fn test_current_null_values_skipped() {
        let obs = ObservationProperties {
            description: Some("  ".to_owned()),
            temperature: Some(Measurement::default()),
            relative_humidity: Some(Measurement::default()),
            ..ObservationProperties::default()
        };

        assert_eq!(vec!["Current conditions at KBOS."], render_current("KBOS", &obs));
    }

    #[test]
    fn test_current_fahrenheit_not_converted_twice() {
        let obs = ObservationProperties {
            temperature: Some(Measurement::new(UNIT_DEGREES_F, 71.6)),
            ..ObservationProperties::default()
        };

        assert_eq!("Temperature: 72 degrees Fahrenheit.", render_current("KBOS", &obs)[1]);
    }

    #[test]
    fn test_forecast_empty() {
        assert_eq!(vec!["", "Forecast.", "Forecast data unavailable."], render_forecast(&[], 4));
    }

    #[test]
    fn test_forecast_truncates_in_order() {
        let periods: Vec<ForecastPeriod> = (1..=10).map(period).collect();
        let lines = render_forecast(&periods, 3);

        assert_eq!(5, lines.len());
        assert_eq!("Period 1: Sunny 1.", lines[2]);
        assert_eq!("Period 2: Sunny 2.", lines[3]);
        assert_eq!("Period 3: Sunny 3.", lines[4]);
    }

    #[test]
    fn test_forecast_fewer_than_requested() {
        let periods: Vec<ForecastPeriod> = (1..=2).map(period).collect();
        assert_eq!(4, render_forecast(&periods, 14).len());
    }

    #[test]
    fn test_period_full() {
        let p = ForecastPeriod {
            number: Some(1),
            name: Some("This Afternoon".to_owned()),
            start_time: Some("2024-01-01T15:00:00-05:00".to_owned()),
            temperature: Some(72.0),
            temperature_unit: Some("F".to_owned()),
            short_forecast: Some("Mostly Sunny".to_owned()),
            wind_direction: Some("SW".to_owned()),
            wind_speed: Some("5 to 10 mph".to_owned()),
            detailed_forecast: Some("Mostly sunny, with a high near 72°.".to_owned()),
            probability_of_precipitation: Some(Measurement::new(UNIT_PERCENT, 20.0)),
            relative_humidity: Some(Measurement::new(UNIT_PERCENT, 55.4)),
        };

        assert_eq!(
            "Monday 3 PM: Mostly Sunny. Temperature 72 degrees Fahrenheit. \
             Wind Southwest 5 to 10 miles per hour. Chance of precipitation 20 percent. \
             Humidity 55 percent. Mostly sunny, with a high near 72 degrees .",
            render_period(&p)
        );
    }

    #[test]
    fn test_period_wind_needs_speed() {
        let p = ForecastPeriod {
            wind_direction: Some("NW".to_owned()),
            temperature: Some(10.0),
            temperature_unit: Some("C".to_owned()),
            ..ForecastPeriod::default()
        };

        assert_eq!("Period: Temperature 10 degrees Celsius.", render_period(&p));
    }

    #[test]
    fn test_period_wind_without_direction() {
        let p = ForecastPeriod {
            name: Some("Tonight".to_owned()),
            wind_speed: Some("15 MPH".to_owned()),
            probability_of_precipitation: Some(Measurement {
                unit_code: Some(UNIT_PERCENT.to_owned()),
                value: None,
                quality_control: None,
            }),
            ..ForecastPeriod::default()
        };

        assert_eq!("Tonight: Wind 15 miles per hour.", render_period(&p));
    }

    #[test]
    fn test_alerts_none() {
        assert_eq!(vec![NO_ALERTS], render_alerts(&[], false));
        assert_eq!(vec![NO_ALERTS], render_alerts(&[], true));
    }

    #[test]
    fn test_alerts_summary() {
        let alerts = vec![
            alert("Heat Advisory", "Heat Advisory issued July 1 at 3:00PM EDT"),
            alert("Flood Watch", "Flood Watch issued July 1 at 4:00PM EDT"),
        ];

        assert_eq!(
            vec![
                "Alerts: 2 active.",
                "Heat Advisory. Heat Advisory issued July 1 at 3:00PM EDT",
                "Flood Watch. Flood Watch issued July 1 at 4:00PM EDT",
            ],
            render_alerts(&alerts, false)
        );
    }

    #[test]
    fn test_alerts_full_text() {
        let alerts = vec![alert("Heat Advisory", "Heat Advisory issued July 1")];

        assert_eq!(
            vec![
                "Alerts: 1 active.",
                "Heat Advisory. Heat Advisory issued July 1 Details: Heat index values up to 105. \
                 Instructions: Drink plenty of fluids.",
            ],
            render_alerts(&alerts, true)
        );
    }

    #[test]
    fn test_alert_missing_fields() {
        let props = AlertProperties::default();
        assert_eq!("Alert.", render_alert(&props, true));
    }

    #[test]
    fn test_sentence() {
        assert_eq!("Cloudy.", sentence("Cloudy"));
        assert_eq!("Cloudy.", sentence("Cloudy."));
        assert_eq!("Storms!", sentence("Storms!"));
    }
}
