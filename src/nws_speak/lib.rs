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

//! Speech-friendly weather reports from api.weather.gov
//!
//! ## Features
//!
//! `nws_speak` fetches current conditions, the forecast, and active alerts for a single
//! latitude/longitude point using the [api.weather.gov] API and prints them as plain sentences,
//! one utterance per line. The output is meant to be read aloud: units are spelled out, compass
//! abbreviations are expanded, and symbols a speech engine would stumble over are removed.
//!
//! * Current conditions from the first [NWS station] near the point: description, temperature,
//!   wind, and humidity.
//! * The first few periods of the gridpoint forecast (only when `DETAILED` is set).
//! * Active alerts for the point, either as a summary or with full description and instructions.
//!
//! Fields the API doesn't report are left out of the output.
//!
//! [NWS station]: https://www.weather.gov/documentation/services-web-api#/default/obs_stations
//! [api.weather.gov]: https://www.weather.gov/documentation/services-web-api
//!
//! ## Build
//!
//! `nws_speak` is a Rust program and must be built from source using a [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! ### Configuration
//!
//! Settings are read from the environment. Names are accepted in upper or lower case and most
//! have aliases (for example `LATITUDE` for `LAT`). Command line flags override the environment.
//!
//! ```text
//! LAT=42.3601 LON=-71.0589 DETAILED=1 ./nws_speak
//! ```
//!
//! The office and grid coordinates used for the forecast (`OFFICE`, `GRID_X`, `GRID_Y`) are
//! looked up from the point when they aren't set.
//!
//! ### Speaking
//!
//! Output can be piped into any line oriented speech engine, or `nws_speak` can start one itself
//! with `SPEAK=1`. The engine defaults to `espeak-ng` and is passed `-v`, `-s`, and `-w` for the
//! `TTS_VOICE`, `TTS_SPEED`, and `TTS_OUTPUT` settings.
//!
//! ```text
//! SPEAK=1 TTS_VOICE=en-us VERBOSE=1 ./nws_speak
//! ```
//!
//! Diagnostics (including request URLs and response sizes with `DEBUG=1`) go to stderr so that
//! stdout only ever contains report text.
//!

pub mod client;
pub mod config;
pub mod convert;
pub mod report;
pub mod speech;
