use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::{Error, Result};

pub const DEFAULT_INGEST_SERVER: &str = "rtmp://syd01.contribute.live-video.net/app/";
pub const WIDTH_RANGE: RangeInclusive<i32> = 320..=1920;
pub const HEIGHT_RANGE: RangeInclusive<i32> = 240..=1080;

/// Flag nicks the H.264 encoder's `tune` property understands
pub const ENCODER_TUNE_FLAGS: &[&str] = &["stillimage", "fastdecode", "zerolatency"];

/// Resolved configuration of one compositing run.
///
/// Populated once from the command line and/or a TOML file, validated, and then
/// handed to the graph builder. Nothing mutates it after the pipeline is built.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    pub sources: SourcesConfig,
    pub output: OutputConfig,
    pub streaming: StreamingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Left tile
    pub location_1: String,
    /// Top-right tile
    pub location_2: String,
    /// Bottom-right tile
    pub location_3: String,
}

impl SourcesConfig {
    pub fn locations(&self) -> [&str; 3] {
        [&self.location_1, &self.location_2, &self.location_3]
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub width: i32,
    pub height: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Stream key; absent or empty disables the streaming branch.
    pub api_key: Option<String>,
    pub ingest_server: String,
    pub encoder: EncoderConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            ingest_server: DEFAULT_INGEST_SERVER.to_string(),
            encoder: EncoderConfig::default(),
        }
    }
}

impl StreamingConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// Full network sink location, the ingest server followed by the key.
    pub fn location(&self) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        self.api_key
            .as_deref()
            .map(|key| format!("{}{}", self.ingest_server, key))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub bitrate_kbps: u32,
    pub key_int_max: u32,
    pub tune: String,
    /// 0 lets the encoder pick
    pub threads: u32,
}

impl EncoderConfig {
    /// `tune` normalised to `nick+nick`, checked against the encoder's flag
    /// nicks. `None` leaves the encoder default in place.
    pub fn tune_flags(&self) -> Result<Option<String>> {
        let nicks: Vec<&str> = self
            .tune
            .split('+')
            .map(str::trim)
            .filter(|nick| !nick.is_empty())
            .collect();

        if let Some(unknown) = nicks.iter().find(|nick| !ENCODER_TUNE_FLAGS.contains(*nick)) {
            return Err(Error::Config(format!(
                "unknown encoder tune '{}', expected a combination of {}",
                unknown,
                ENCODER_TUNE_FLAGS.join(", ")
            )));
        }

        Ok((!nicks.is_empty()).then(|| nicks.join("+")))
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            bitrate_kbps: 400,
            key_int_max: 30,
            tune: "zerolatency".to_string(),
            threads: 0,
        }
    }
}

impl StreamConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (i, location) in self.sources.locations().iter().enumerate() {
            if location.trim().is_empty() {
                return Err(Error::Config(format!(
                    "source location {} must not be empty",
                    i + 1
                )));
            }
        }

        if !WIDTH_RANGE.contains(&self.output.width) {
            return Err(Error::Config(format!(
                "output width {} outside of [{}, {}]",
                self.output.width,
                WIDTH_RANGE.start(),
                WIDTH_RANGE.end()
            )));
        }

        if !HEIGHT_RANGE.contains(&self.output.height) {
            return Err(Error::Config(format!(
                "output height {} outside of [{}, {}]",
                self.output.height,
                HEIGHT_RANGE.start(),
                HEIGHT_RANGE.end()
            )));
        }

        if self.streaming.is_enabled() && self.streaming.ingest_server.is_empty() {
            return Err(Error::Config(
                "an ingest server is required when an API key is set".to_string(),
            ));
        }

        self.streaming.encoder.tune_flags()?;

        Ok(())
    }

    /// Whether the streaming branch will be part of the graph.
    pub fn with_streaming(&self) -> bool {
        self.streaming.is_enabled()
    }

    /// URIs handed to the three decoders, in tile order.
    pub fn source_uris(&self) -> Result<[String; 3]> {
        let [a, b, c] = self.sources.locations();
        Ok([location_to_uri(a)?, location_to_uri(b)?, location_to_uri(c)?])
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Configuration file not found: {:?}",
                path
            )));
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!(
                "Failed to read configuration file {:?}: {}",
                path, e
            ))
        })?;

        let config: StreamConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse configuration file {:?}: {}",
                path, e
            ))
        })?;

        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }
}

fn has_uri_scheme(location: &str) -> bool {
    match location.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Turn a source location into something a URI decoder accepts.
///
/// Locations that already carry a scheme are used as-is, anything else is
/// treated as a filesystem path relative to the working directory.
pub fn location_to_uri(location: &str) -> Result<String> {
    if has_uri_scheme(location) {
        return Ok(location.to_string());
    }

    let absolute = std::path::absolute(location)?;
    if !absolute.exists() {
        warn!("Source file {:?} does not exist (yet)", absolute);
    }

    let uri = gst::glib::filename_to_uri(&absolute, None).map_err(|e| {
        Error::Config(format!("Cannot build a URI for {:?}: {}", absolute, e))
    })?;
    debug!("Resolved source location {} to {}", location, uri);
    Ok(uri.to_string())
}
