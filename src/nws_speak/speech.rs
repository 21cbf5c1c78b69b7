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

use crate::config::SpeechConfig;
use std::error;
use std::fmt;
use std::process::{ExitStatus, Stdio};
use tokio::io::{self, AsyncWrite, AsyncWriteExt, Stderr};
use tokio::process::{Child, ChildStdin, Command};

#[derive(Debug)]
pub enum SpeechError {
    Spawn(String, io::Error),
    Io(io::Error),
    Failed(ExitStatus),
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(program, e) => write!(f, "unable to start speech engine {}: {}", program, e),
            Self::Io(e) => write!(f, "speech engine I/O error: {}", e),
            Self::Failed(status) => write!(f, "speech engine exited with {}", status),
        }
    }
}

impl error::Error for SpeechError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Spawn(_, e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Failed(_) => None,
        }
    }
}

impl From<io::Error> for SpeechError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Destination for rendered report lines.
///
/// Each line is written followed by a newline. When echo is enabled, every line
/// is also copied to stderr so that spoken output can be followed along.
#[derive(Debug)]
pub struct LineSink<W> {
    writer: W,
    echo: Option<Stderr>,
}

impl<W> LineSink<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        LineSink { writer, echo: None }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = if echo { Some(io::stderr()) } else { None };
        self
    }

    pub async fn emit(&mut self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        self.writer.write_all(buf.as_bytes()).await?;
        if let Some(echo) = self.echo.as_mut() {
            echo.write_all(buf.as_bytes()).await?;
        }

        Ok(())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await?;
        if let Some(echo) = self.echo.as_mut() {
            echo.flush().await?;
        }

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// A running speech engine process reading report text from its stdin.
///
/// Arguments follow `espeak-ng` conventions: any extra arguments first, then
/// `-v <voice>`, `-s <speed>`, `-w <file>` when configured, then `--stdin`.
#[derive(Debug)]
pub struct SpeechEngine {
    program: String,
    child: Child,
}

impl SpeechEngine {
    pub fn args(cfg: &SpeechConfig) -> Vec<String> {
        let mut args = cfg.extra_args.clone();
        if let Some(voice) = &cfg.voice {
            args.push("-v".to_owned());
            args.push(voice.clone());
        }
        if let Some(speed) = cfg.speed {
            args.push("-s".to_owned());
            args.push(speed.to_string());
        }
        if let Some(output) = &cfg.output {
            args.push("-w".to_owned());
            args.push(output.display().to_string());
        }

        args.push("--stdin".to_owned());
        args
    }

    /// Start the engine and return it along with a sink that feeds its stdin.
    pub fn spawn(cfg: &SpeechConfig) -> Result<(Self, LineSink<ChildStdin>), SpeechError> {
        let args = Self::args(cfg);
        tracing::debug!(message = "starting speech engine", program = %cfg.binary, args = ?args);

        let mut child = Command::new(&cfg.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Spawn(cfg.binary.clone(), e))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            SpeechError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "speech engine stdin unavailable"))
        })?;

        let engine = SpeechEngine {
            program: cfg.binary.clone(),
            child,
        };

        Ok((engine, LineSink::new(stdin)))
    }

    /// Close the engine's input and wait for it to finish speaking.
    ///
    /// A non-zero exit status is reported ahead of any error closing the
    /// input, since an engine that exits early leaves a broken pipe behind.
    pub async fn finish(mut self, sink: LineSink<ChildStdin>) -> Result<(), SpeechError> {
        let mut stdin = sink.into_inner();
        let closed = stdin.shutdown().await;
        drop(stdin);

        let status = self.child.wait().await?;
        tracing::debug!(message = "speech engine exited", program = %self.program, status = %status);

        if !status.success() {
            return Err(SpeechError::Failed(status));
        }

        closed.map_err(SpeechError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_args_minimal() {
        let cfg = SpeechConfig {
            binary: "espeak-ng".to_owned(),
            ..SpeechConfig::default()
        };

        assert_eq!(vec!["--stdin"], SpeechEngine::args(&cfg));
    }

    #[test]
    fn test_args_full() {
        let cfg = SpeechConfig {
            binary: "espeak-ng".to_owned(),
            voice: Some("en-us".to_owned()),
            speed: Some(150),
            extra_args: vec!["-a".to_owned(), "120".to_owned()],
            output: Some(PathBuf::from("/tmp/wx.wav")),
        };

        assert_eq!(
            vec!["-a", "120", "-v", "en-us", "-s", "150", "-w", "/tmp/wx.wav", "--stdin"],
            SpeechEngine::args(&cfg)
        );
    }

    #[tokio::test]
    async fn test_line_sink_writes_lines() {
        let mut sink = LineSink::new(Vec::new());
        sink.emit("Forecast.").await.unwrap();
        sink.emit("").await.unwrap();
        sink.flush().await.unwrap();

        assert_eq!(b"Forecast.\n\n".to_vec(), sink.into_inner());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_reads_all_input() {
        let cfg = SpeechConfig {
            binary: "sh".to_owned(),
            extra_args: vec!["-c".to_owned(), "cat > /dev/null".to_owned()],
            ..SpeechConfig::default()
        };

        let (engine, mut sink) = SpeechEngine::spawn(&cfg).unwrap();
        sink.emit("Alerts: none active.").await.unwrap();
        engine.finish(sink).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_failure_status() {
        let cfg = SpeechConfig {
            binary: "sh".to_owned(),
            extra_args: vec!["-c".to_owned(), "cat > /dev/null; exit 3".to_owned()],
            ..SpeechConfig::default()
        };

        let (engine, mut sink) = SpeechEngine::spawn(&cfg).unwrap();
        sink.emit("Alerts: none active.").await.unwrap();
        let res = engine.finish(sink).await;
        assert!(matches!(res, Err(SpeechError::Failed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_early_exit_reports_status() {
        let cfg = SpeechConfig {
            binary: "sh".to_owned(),
            extra_args: vec!["-c".to_owned(), "exit 3".to_owned()],
            ..SpeechConfig::default()
        };

        let (engine, mut sink) = SpeechEngine::spawn(&cfg).unwrap();
        let line = "Heat Advisory. ".repeat(1024);

        // The engine never reads, so writes fail once it exits
        let mut write_err = None;
        for _ in 0..1024 {
            if let Err(e) = sink.emit(&line).await {
                write_err = Some(e);
                break;
            }
        }

        assert_eq!(Some(io::ErrorKind::BrokenPipe), write_err.map(|e| e.kind()));
        match engine.finish(sink).await {
            Err(SpeechError::Failed(status)) => assert_eq!(Some(3), status.code()),
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[tokio::test]
    async fn test_engine_missing_binary() {
        let cfg = SpeechConfig {
            binary: "nws-speak-no-such-engine".to_owned(),
            ..SpeechConfig::default()
        };

        let res = SpeechEngine::spawn(&cfg);
        assert!(matches!(res, Err(SpeechError::Spawn(_, _))));
    }
}
