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

use crate::client::Gridpoint;
use std::error;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_API_URL: &str = "https://api.weather.gov/";
pub const DEFAULT_USER_AGENT: &str = concat!("nws_speak/", env!("CARGO_PKG_VERSION"), " (weather report reader)");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
    Incomplete(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { key, value } => write!(f, "invalid value {:?} for {}", value, key),
            Self::Incomplete(msg) => write!(f, "incomplete configuration: {}", msg),
        }
    }
}

impl error::Error for ConfigError {}

/// A single setting: the canonical name, the value used when nothing is set, and
/// other names that are accepted for it, in the order they are checked.
#[derive(Debug)]
pub struct Rule {
    pub key: &'static str,
    pub default: Option<&'static str>,
    pub aliases: &'static [&'static str],
}

impl Rule {
    const fn new(key: &'static str, default: Option<&'static str>, aliases: &'static [&'static str]) -> Self {
        Rule { key, default, aliases }
    }

    /// Resolve the value of this setting. Each name is tried as given, then upper
    /// case, then lower case. The first one set to a non-blank value wins.
    pub fn resolve<F>(&self, lookup: &F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        std::iter::once(self.key)
            .chain(self.aliases.iter().copied())
            .flat_map(|name| [name.to_owned(), name.to_uppercase(), name.to_lowercase()])
            .find_map(|name| lookup(name.as_str()).filter(|v| !v.trim().is_empty()))
            .or_else(|| self.default.map(str::to_owned))
    }
}

const API_URL: Rule = Rule::new("NWS_API_URL", Some(DEFAULT_API_URL), &["API_URL"]);
const OFFICE: Rule = Rule::new("OFFICE", None, &["WFO", "NWS_OFFICE"]);
const GRID_X: Rule = Rule::new("GRID_X", None, &["GRIDX"]);
const GRID_Y: Rule = Rule::new("GRID_Y", None, &["GRIDY"]);
const LAT: Rule = Rule::new("LAT", Some("42.3601"), &["LATITUDE"]);
const LON: Rule = Rule::new("LON", Some("-71.0589"), &["LONGITUDE", "LNG"]);
const FORECAST_PATH: Rule = Rule::new("FORECAST_PATH", Some("forecast"), &["FORECAST"]);
const PERIODS: Rule = Rule::new("PERIODS", Some("4"), &["FORECAST_PERIODS", "NUM_PERIODS"]);
const DETAILED: Rule = Rule::new("DETAILED", Some("false"), &["DETAIL", "FORECAST_DETAILED"]);
const FULL_ALERTS: Rule = Rule::new("FULL_ALERTS", Some("false"), &["FULL_ALERT_TEXT", "ALERTS_FULL"]);
const DEBUG: Rule = Rule::new("DEBUG", Some("false"), &["NWS_DEBUG"]);
const VERBOSE: Rule = Rule::new("VERBOSE", Some("false"), &["NWS_VERBOSE"]);
const SPEAK: Rule = Rule::new("SPEAK", Some("false"), &["SAY", "TTS"]);
const USER_AGENT: Rule = Rule::new("USER_AGENT", Some(DEFAULT_USER_AGENT), &["NWS_USER_AGENT", "UA"]);
const TTS_BIN: Rule = Rule::new("TTS_BIN", Some("espeak-ng"), &["TTS_ENGINE", "ESPEAK_BIN"]);
const TTS_VOICE: Rule = Rule::new("TTS_VOICE", None, &["VOICE"]);
const TTS_SPEED: Rule = Rule::new("TTS_SPEED", None, &["SPEED", "RATE"]);
const TTS_ARGS: Rule = Rule::new("TTS_ARGS", None, &["TTS_EXTRA_ARGS"]);
const TTS_OUTPUT: Rule = Rule::new("TTS_OUTPUT", None, &["TTS_FILE", "OUTPUT_FILE"]);

/// Every setting, in resolution order.
pub const RULES: &[Rule] = &[
    API_URL,
    OFFICE,
    GRID_X,
    GRID_Y,
    LAT,
    LON,
    FORECAST_PATH,
    PERIODS,
    DETAILED,
    FULL_ALERTS,
    DEBUG,
    VERBOSE,
    SPEAK,
    USER_AGENT,
    TTS_BIN,
    TTS_VOICE,
    TTS_SPEED,
    TTS_ARGS,
    TTS_OUTPUT,
];

/// Settings for the external speech engine. Only used when speaking directly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeechConfig {
    pub binary: String,
    pub voice: Option<String>,
    pub speed: Option<u32>,
    pub extra_args: Vec<String>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub grid: Option<Gridpoint>,
    pub lat: f64,
    pub lon: f64,
    pub forecast_path: String,
    pub periods: usize,
    pub detailed: bool,
    pub full_alerts: bool,
    pub debug: bool,
    pub verbose: bool,
    pub speak: bool,
    pub user_agent: String,
    pub speech: SpeechConfig,
}

impl Config {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration using `lookup` to find the value of each setting by name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let grid = match (
            OFFICE.resolve(&lookup).filter(|s| !s.trim().is_empty()),
            parse_opt::<u32, _>(&GRID_X, &lookup)?,
            parse_opt::<u32, _>(&GRID_Y, &lookup)?,
        ) {
            (Some(office), Some(x), Some(y)) => Some(Gridpoint {
                office: office.trim().to_owned(),
                x,
                y,
            }),
            (None, None, None) => None,
            _ => return Err(ConfigError::Incomplete("office, grid x, and grid y must be set together")),
        };

        Ok(Config {
            api_url: required(&API_URL, &lookup),
            grid,
            lat: parse(&LAT, &lookup)?,
            lon: parse(&LON, &lookup)?,
            forecast_path: required(&FORECAST_PATH, &lookup),
            periods: parse(&PERIODS, &lookup)?,
            detailed: parse_bool(&DETAILED, &lookup)?,
            full_alerts: parse_bool(&FULL_ALERTS, &lookup)?,
            debug: parse_bool(&DEBUG, &lookup)?,
            verbose: parse_bool(&VERBOSE, &lookup)?,
            speak: parse_bool(&SPEAK, &lookup)?,
            user_agent: required(&USER_AGENT, &lookup),
            speech: SpeechConfig {
                binary: required(&TTS_BIN, &lookup),
                voice: TTS_VOICE.resolve(&lookup).filter(|s| !s.trim().is_empty()),
                speed: parse_opt(&TTS_SPEED, &lookup)?,
                extra_args: TTS_ARGS
                    .resolve(&lookup)
                    .map(|s| s.split_whitespace().map(str::to_owned).collect())
                    .unwrap_or_default(),
                output: TTS_OUTPUT
                    .resolve(&lookup)
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        // Defaults are all valid so an empty lookup always succeeds
        Self::from_lookup(|_| None).unwrap_or_else(|e| unreachable!("invalid default configuration: {}", e))
    }
}

fn required<F>(rule: &Rule, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    rule.resolve(lookup).unwrap_or_default()
}

fn parse<T, F>(rule: &Rule, lookup: &F) -> Result<T, ConfigError>
where
    T: FromStr + Default,
    F: Fn(&str) -> Option<String>,
{
    parse_opt(rule, lookup).map(Option::unwrap_or_default)
}

fn parse_opt<T, F>(rule: &Rule, lookup: &F) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match rule.resolve(lookup) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::Invalid {
            key: rule.key,
            value: v,
        }),
    }
}

fn parse_bool<F>(rule: &Rule, lookup: &F) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = rule.resolve(lookup).unwrap_or_default();
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Ok(true),
        "0" | "false" | "no" | "off" | "n" | "" => Ok(false),
        _ => Err(ConfigError::Invalid { key: rule.key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(DEFAULT_API_URL, cfg.api_url);
        assert_eq!(None, cfg.grid);
        assert_eq!(42.3601, cfg.lat);
        assert_eq!(-71.0589, cfg.lon);
        assert_eq!("forecast", cfg.forecast_path);
        assert_eq!(4, cfg.periods);
        assert!(!cfg.detailed);
        assert!(!cfg.full_alerts);
        assert!(!cfg.speak);
        assert_eq!(DEFAULT_USER_AGENT, cfg.user_agent);
        assert_eq!("espeak-ng", cfg.speech.binary);
        assert!(cfg.speech.extra_args.is_empty());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_case_insensitive_names() {
        let cfg = config(&[("detailed", "yes"), ("Lat", "1.5"), ("LATITUDE", "2.5")]).unwrap();
        assert!(cfg.detailed);
        // Mixed case "Lat" isn't tried, so the alias wins
        assert_eq!(2.5, cfg.lat);
    }

    #[test]
    fn test_canonical_before_alias() {
        let cfg = config(&[("LON", "-70"), ("LONGITUDE", "-80"), ("lng", "-90")]).unwrap();
        assert_eq!(-70.0, cfg.lon);

        let cfg = config(&[("LONGITUDE", "-80"), ("lng", "-90")]).unwrap();
        assert_eq!(-80.0, cfg.lon);
    }

    #[test]
    fn test_grid() {
        let cfg = config(&[("wfo", "BOX"), ("GRID_X", "71"), ("gridy", "90")]).unwrap();
        assert_eq!(
            Some(Gridpoint {
                office: "BOX".to_owned(),
                x: 71,
                y: 90
            }),
            cfg.grid
        );
    }

    #[test]
    fn test_grid_incomplete() {
        let err = config(&[("OFFICE", "BOX"), ("GRID_X", "71")]).unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete(_)));
    }

    #[test]
    fn test_invalid_values() {
        let err = config(&[("PERIODS", "lots")]).unwrap_err();
        assert_eq!(
            ConfigError::Invalid {
                key: "PERIODS",
                value: "lots".to_owned()
            },
            err
        );

        let err = config(&[("SPEAK", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SPEAK", .. }));
    }

    #[test]
    fn test_speech_settings() {
        let cfg = config(&[
            ("TTS_BIN", "espeak"),
            ("voice", "en-us"),
            ("RATE", "160"),
            ("TTS_ARGS", "-a 150   -g 5"),
            ("TTS_FILE", "/tmp/weather.wav"),
        ])
        .unwrap();

        assert_eq!("espeak", cfg.speech.binary);
        assert_eq!(Some("en-us".to_owned()), cfg.speech.voice);
        assert_eq!(Some(160), cfg.speech.speed);
        assert_eq!(vec!["-a", "150", "-g", "5"], cfg.speech.extra_args);
        assert_eq!(Some(PathBuf::from("/tmp/weather.wav")), cfg.speech.output);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let cfg = config(&[
            ("LAT", ""),
            ("LON", " "),
            ("PERIODS", ""),
            ("FORECAST_PATH", ""),
            ("USER_AGENT", ""),
            ("NWS_API_URL", "  "),
        ])
        .unwrap();

        assert_eq!(42.3601, cfg.lat);
        assert_eq!(-71.0589, cfg.lon);
        assert_eq!(4, cfg.periods);
        assert_eq!("forecast", cfg.forecast_path);
        assert_eq!(DEFAULT_USER_AGENT, cfg.user_agent);
        assert_eq!(DEFAULT_API_URL, cfg.api_url);
    }

    #[test]
    fn test_blank_value_falls_through_to_alias() {
        let cfg = config(&[("lat", ""), ("LATITUDE", "40")]).unwrap();
        assert_eq!(40.0, cfg.lat);
    }

    #[test]
    fn test_rule_names_unique() {
        let mut seen = std::collections::HashSet::new();
        for rule in RULES {
            for name in std::iter::once(rule.key).chain(rule.aliases.iter().copied()) {
                assert!(seen.insert(name.to_uppercase()), "duplicate setting name {}", name);
            }
        }
    }

    #[test]
    fn test_blank_optional_values_are_unset() {
        let cfg = config(&[("TTS_VOICE", " "), ("TTS_SPEED", ""), ("TTS_OUTPUT", "")]).unwrap();
        assert_eq!(None, cfg.speech.voice);
        assert_eq!(None, cfg.speech.speed);
        assert_eq!(None, cfg.speech.output);
    }
}
