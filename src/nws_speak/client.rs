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

use percent_encoding::percent_decode_str;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;
use std::time::Duration;

pub const UNIT_DEGREES_C: &str = "wmoUnit:degC";
pub const UNIT_DEGREES_F: &str = "wmoUnit:degF";
pub const UNIT_KPH: &str = "wmoUnit:km_h-1";
pub const UNIT_MPS: &str = "wmoUnit:m_s-1";

/// Requests to the API are abandoned after this long.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Maximum number of characters of a response body kept for error messages.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug)]
pub enum ClientError {
    /// The request could not be made or the API returned a non-2xx status.
    Fetch {
        url: Url,
        status: Option<StatusCode>,
        preview: String,
        source: Option<reqwest::Error>,
    },
    /// The API returned a body that wasn't the JSON we expected.
    Parse {
        url: Url,
        preview: String,
        source: serde_json::Error,
    },
    InvalidUrl(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch {
                url,
                status: Some(status),
                preview,
                ..
            } => write!(f, "unexpected status {} for {}: {:?}", status, url, preview),
            Self::Fetch {
                url,
                status: None,
                source: Some(e),
                ..
            } => write!(f, "request to {} failed: {}", url, e),
            Self::Fetch { url, .. } => write!(f, "request to {} failed", url),
            Self::Parse { url, preview, source } => {
                write!(f, "invalid JSON from {}: {}: {:?}", url, source, preview)
            }
            Self::InvalidUrl(msg) => write!(f, "invalid URL {}", msg),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Fetch { source: Some(e), .. } => Some(e),
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Office and grid coordinates that address a forecast on the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gridpoint {
    pub office: String,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for Gridpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{},{}", self.office, self.x, self.y)
    }
}

#[derive(Debug)]
pub struct WeatherGovClient {
    client: Client,
    base_url: Url,
    user_agent: String,
}

impl WeatherGovClient {
    const JSON_RESPONSE: &'static str = "application/geo+json";

    pub fn new(client: Client, base_url: &str, user_agent: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!("{}: cannot be a base", base_url)));
        }

        Ok(WeatherGovClient {
            client,
            base_url,
            user_agent: user_agent.to_owned(),
        })
    }

    /// Metadata for a lat/lon point: the stations near it and the gridpoint covering it.
    pub async fn point(&self, lat: f64, lon: f64) -> Result<Point, ClientError> {
        let request_url = self.point_url(lat, lon)?;
        tracing::debug!(message = "making point metadata request", url = %request_url);
        self.fetch(request_url).await
    }

    /// Observation stations from the URL given by point metadata.
    pub async fn stations(&self, stations_url: &str) -> Result<StationCollection, ClientError> {
        let request_url =
            Url::parse(stations_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", stations_url, e)))?;
        tracing::debug!(message = "making station list request", url = %request_url);
        self.fetch(request_url).await
    }

    pub async fn latest_observation(&self, station: &str) -> Result<Observation, ClientError> {
        let request_url = self.observation_url(station)?;
        tracing::debug!(message = "making latest observation request", url = %request_url);
        self.fetch(request_url).await
    }

    /// Forecast for a gridpoint. `path` is the resource under the gridpoint, usually
    /// `forecast` or `forecast/hourly`.
    pub async fn forecast(&self, grid: &Gridpoint, path: &str) -> Result<Forecast, ClientError> {
        let request_url = self.forecast_url(grid, path)?;
        tracing::debug!(message = "making forecast request", url = %request_url);
        self.fetch(request_url).await
    }

    pub async fn active_alerts(&self, lat: f64, lon: f64) -> Result<AlertCollection, ClientError> {
        let request_url = self.alerts_url(lat, lon)?;
        tracing::debug!(message = "making active alerts request", url = %request_url);
        self.fetch(request_url).await
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(|e| ClientError::Fetch {
                url: url.clone(),
                status: e.status(),
                preview: String::new(),
                source: Some(e),
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| ClientError::Fetch {
            url: url.clone(),
            status: Some(status),
            preview: String::new(),
            source: Some(e),
        })?;

        tracing::debug!(message = "received response", url = %url, status = %status, bytes = body.len());

        if !status.is_success() {
            return Err(ClientError::Fetch {
                url,
                status: Some(status),
                preview: preview(&body),
                source: None,
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Parse {
            url,
            preview: preview(&body),
            source: e,
        })
    }

    fn endpoint<'a, I>(&self, segments: I) -> Result<Url, ClientError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{}: cannot be a base", self.base_url)))?
            .clear()
            .extend(segments);

        Ok(url)
    }

    fn point_url(&self, lat: f64, lon: f64) -> Result<Url, ClientError> {
        let point = format_point(lat, lon);
        self.endpoint(["points", point.as_str()])
    }

    fn observation_url(&self, station: &str) -> Result<Url, ClientError> {
        self.endpoint(["stations", station, "observations", "latest"])
    }

    fn forecast_url(&self, grid: &Gridpoint, path: &str) -> Result<Url, ClientError> {
        let coords = format!("{},{}", grid.x, grid.y);
        let segments = ["gridpoints", grid.office.as_str(), coords.as_str()]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));

        self.endpoint(segments)
    }

    fn alerts_url(&self, lat: f64, lon: f64) -> Result<Url, ClientError> {
        let mut url = self.endpoint(["alerts", "active"])?;
        url.query_pairs_mut().append_pair("point", &format_point(lat, lon));
        Ok(url)
    }
}

/// Format a coordinate pair the way the API expects: at most four decimal
/// places and no trailing zeros (more precision gets a redirect).
fn format_point(lat: f64, lon: f64) -> String {
    format!("{},{}", format_coord(lat), format_coord(lon))
}

fn format_coord(v: f64) -> String {
    let s = format!("{:.4}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_owned()
    } else {
        s.to_owned()
    }
}

fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_CHARS).collect()
}

/// Station identifier from the final path segment of a station URL, e.g.
/// `https://api.weather.gov/stations/KBOS` -> `KBOS`.
pub fn station_id_from_url(url: &str) -> Option<String> {
    let last = match Url::parse(url) {
        Ok(u) => u.path_segments()?.filter(|s| !s.is_empty()).last()?.to_owned(),
        Err(_) => url.trim_end_matches('/').rsplit('/').next()?.to_owned(),
    };

    if last.is_empty() {
        return None;
    }

    percent_decode_str(&last).decode_utf8().ok().map(|s| s.into_owned())
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Point {
    #[serde(alias = "id")]
    pub id: Option<String>,
    #[serde(alias = "properties", default)]
    pub properties: PointProperties,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PointProperties {
    #[serde(alias = "gridId")]
    pub grid_id: Option<String>,
    #[serde(alias = "gridX")]
    pub grid_x: Option<u32>,
    #[serde(alias = "gridY")]
    pub grid_y: Option<u32>,
    #[serde(alias = "forecast")]
    pub forecast: Option<String>,
    #[serde(alias = "observationStations")]
    pub observation_stations: Option<String>,
}

impl PointProperties {
    /// The gridpoint covering this point, if the API told us all of it.
    pub fn gridpoint(&self) -> Option<Gridpoint> {
        Some(Gridpoint {
            office: self.grid_id.clone()?,
            x: self.grid_x?,
            y: self.grid_y?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct StationCollection {
    #[serde(alias = "features", default)]
    pub features: Vec<StationFeature>,
    #[serde(alias = "observationStations", default)]
    pub observation_stations: Vec<String>,
}

impl StationCollection {
    /// Identifier of the first station in the collection. Only the first entry
    /// is considered: later stations are never used as a substitute.
    pub fn first_station_id(&self) -> Option<String> {
        if let Some(feature) = self.features.first() {
            return feature.station_id();
        }

        self.observation_stations.first().and_then(|u| station_id_from_url(u))
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct StationFeature {
    #[serde(alias = "id")]
    pub id: Option<String>,
    #[serde(alias = "properties")]
    pub properties: Option<StationProperties>,
}

impl StationFeature {
    pub fn station_id(&self) -> Option<String> {
        let props = self.properties.as_ref();
        props
            .and_then(|p| p.station_identifier.clone())
            .or_else(|| props.and_then(|p| p.id.as_deref()).and_then(station_id_from_url))
            .or_else(|| self.id.as_deref().and_then(station_id_from_url))
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct StationProperties {
    #[serde(alias = "@id")]
    pub id: Option<String>,
    #[serde(alias = "stationIdentifier")]
    pub station_identifier: Option<String>,
    #[serde(alias = "name")]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Observation {
    #[serde(alias = "id")]
    pub id: Option<String>,
    #[serde(alias = "properties", default)]
    pub properties: ObservationProperties,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ObservationProperties {
    #[serde(alias = "station")]
    pub station: Option<String>,
    #[serde(alias = "timestamp")]
    pub timestamp: Option<String>,
    #[serde(alias = "textDescription")]
    pub description: Option<String>,
    #[serde(alias = "temperature")]
    pub temperature: Option<Measurement>,
    #[serde(alias = "windDirection")]
    pub wind_direction: Option<Measurement>,
    #[serde(alias = "windSpeed")]
    pub wind_speed: Option<Measurement>,
    #[serde(alias = "relativeHumidity")]
    pub relative_humidity: Option<Measurement>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Measurement {
    #[serde(alias = "unitCode")]
    pub unit_code: Option<String>,
    #[serde(alias = "value")]
    pub value: Option<f64>,
    #[serde(alias = "qualityControl")]
    pub quality_control: Option<String>,
}

impl Measurement {
    pub fn new(unit_code: &str, value: f64) -> Self {
        Measurement {
            unit_code: Some(unit_code.to_owned()),
            value: Some(value),
            quality_control: None,
        }
    }

    pub fn is_unit(&self, unit_code: &str) -> bool {
        self.unit_code.as_deref() == Some(unit_code)
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Forecast {
    #[serde(alias = "properties", default)]
    pub properties: ForecastProperties,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ForecastProperties {
    #[serde(alias = "updated")]
    pub updated: Option<String>,
    #[serde(alias = "periods", default)]
    pub periods: Vec<ForecastPeriod>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ForecastPeriod {
    #[serde(alias = "number")]
    pub number: Option<u32>,
    #[serde(alias = "name")]
    pub name: Option<String>,
    #[serde(alias = "startTime")]
    pub start_time: Option<String>,
    #[serde(alias = "temperature")]
    pub temperature: Option<f64>,
    #[serde(alias = "temperatureUnit")]
    pub temperature_unit: Option<String>,
    #[serde(alias = "shortForecast")]
    pub short_forecast: Option<String>,
    #[serde(alias = "windDirection")]
    pub wind_direction: Option<String>,
    #[serde(alias = "windSpeed")]
    pub wind_speed: Option<String>,
    #[serde(alias = "detailedForecast")]
    pub detailed_forecast: Option<String>,
    #[serde(alias = "probabilityOfPrecipitation")]
    pub probability_of_precipitation: Option<Measurement>,
    #[serde(alias = "relativeHumidity")]
    pub relative_humidity: Option<Measurement>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct AlertCollection {
    #[serde(alias = "features", default)]
    pub features: Vec<AlertFeature>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct AlertFeature {
    #[serde(alias = "id")]
    pub id: Option<String>,
    #[serde(alias = "properties", default)]
    pub properties: AlertProperties,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct AlertProperties {
    #[serde(alias = "event")]
    pub event: Option<String>,
    #[serde(alias = "headline")]
    pub headline: Option<String>,
    #[serde(alias = "description")]
    pub description: Option<String>,
    #[serde(alias = "instruction")]
    pub instruction: Option<String>,
    #[serde(alias = "severity")]
    pub severity: Option<String>,
}
