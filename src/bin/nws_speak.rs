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

use clap::Parser;
use nws_speak::client::{WeatherGovClient, DEFAULT_TIMEOUT};
use nws_speak::config::Config;
use nws_speak::report::{ReportError, Reporter};
use nws_speak::speech::{LineSink, SpeechEngine};
use reqwest::Client;
use std::error::Error;
use std::io;
use std::process;
use tracing::Level;

/// Print current conditions, forecast, and alerts from api.weather.gov as
/// speech-friendly text. Settings are read from the environment and can be
/// overridden by the flags below.
#[derive(Debug, Parser)]
#[clap(name = "nws_speak", version = clap::crate_version!())]
struct NwsSpeakApplication {
    /// Base URL for the Weather.gov API
    #[clap(long)]
    api_url: Option<String>,

    /// Latitude of the point to report on
    #[clap(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude of the point to report on
    #[clap(long, allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Number of forecast periods to read
    #[clap(long)]
    periods: Option<usize>,

    /// Include the forecast in the report
    #[clap(long, overrides_with = "no_detailed")]
    detailed: bool,

    /// Leave the forecast out of the report
    #[clap(long, overrides_with = "detailed")]
    no_detailed: bool,

    /// Read the full description and instructions for each alert
    #[clap(long, overrides_with = "no_full_alerts")]
    full_alerts: bool,

    /// Read only the headline of each alert
    #[clap(long, overrides_with = "full_alerts")]
    no_full_alerts: bool,

    /// Send the report to a speech engine instead of stdout
    #[clap(long, overrides_with = "no_speak")]
    speak: bool,

    /// Print the report to stdout even if speech is enabled in the environment
    #[clap(long, overrides_with = "speak")]
    no_speak: bool,

    /// Log every API request and response size to stderr
    #[clap(long, overrides_with = "no_debug")]
    debug: bool,

    /// Don't log API requests
    #[clap(long, overrides_with = "debug")]
    no_debug: bool,

    /// Log progress to stderr and echo spoken text there
    #[clap(long, overrides_with = "no_verbose")]
    verbose: bool,

    /// Don't log progress or echo spoken text
    #[clap(long, overrides_with = "verbose")]
    no_verbose: bool,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive). Takes precedence over --debug and --verbose.
    #[clap(long)]
    log_level: Option<Level>,
}

/// Apply a `--flag` / `--no-flag` pair. The last one given wins since they
/// override each other, and neither leaves the setting alone.
fn switch(setting: &mut bool, on: bool, off: bool) {
    if on {
        *setting = true;
    } else if off {
        *setting = false;
    }
}

impl NwsSpeakApplication {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(lat) = self.lat {
            config.lat = lat;
        }
        if let Some(lon) = self.lon {
            config.lon = lon;
        }
        if let Some(periods) = self.periods {
            config.periods = periods;
        }

        switch(&mut config.detailed, self.detailed, self.no_detailed);
        switch(&mut config.full_alerts, self.full_alerts, self.no_full_alerts);
        switch(&mut config.speak, self.speak, self.no_speak);
        switch(&mut config.debug, self.debug, self.no_debug);
        switch(&mut config.verbose, self.verbose, self.no_verbose);
        config
    }

    fn level(&self, config: &Config) -> Level {
        self.log_level.unwrap_or(if config.debug {
            Level::DEBUG
        } else if config.verbose {
            Level::INFO
        } else {
            Level::WARN
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = NwsSpeakApplication::parse();
    let config = Config::from_env().map(|c| opts.apply(c));
    let level = match &config {
        Ok(c) => opts.level(c),
        Err(_) => opts.log_level.unwrap_or(Level::WARN),
    };

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(io::stderr)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let config = config.unwrap_or_else(|e| {
        tracing::error!(message = "invalid configuration", error = %e);
        process::exit(1)
    });

    let http_client = Client::builder().timeout(DEFAULT_TIMEOUT).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = WeatherGovClient::new(http_client, &config.api_url, &config.user_agent).unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize API client", error = %e);
        process::exit(1)
    });

    tracing::info!(
        message = "generating weather report",
        api_url = %config.api_url,
        lat = config.lat,
        lon = config.lon,
        speak = config.speak,
    );

    let reporter = Reporter::new(&client, &config);
    let res = if config.speak {
        speak(&reporter, &config).await
    } else {
        let mut sink = LineSink::new(tokio::io::stdout());
        reporter.run(&mut sink).await.map_err(Into::into)
    };

    if let Err(e) = res {
        tracing::error!(message = "unable to produce weather report", error = %e);
        process::exit(1)
    }

    Ok(())
}

/// Run the report with a speech engine as the sink, echoing text to stderr when verbose.
async fn speak(reporter: &Reporter<'_>, config: &Config) -> Result<(), Box<dyn Error + Send + Sync>> {
    let (engine, sink) = SpeechEngine::spawn(&config.speech)?;
    let mut sink = sink.with_echo(config.verbose);

    match reporter.run(&mut sink).await {
        Ok(()) => engine.finish(sink).await?,
        Err(ReportError::Output(e)) => {
            // Writes fail when the engine exits early, its status says why
            engine.finish(sink).await?;
            return Err(ReportError::Output(e).into());
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
