use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewError};

/// Make a string safe for use in metric and identity paths: `.` becomes
/// `_` and `*` becomes `-`.
pub fn metric_safe(s: &str) -> String {
    s.replace('.', "_").replace('*', "-")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoModule {
    Kafka,
    Zmq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Ascii,
    Binary,
}

pub const DEFAULT_SYNC_INTERVAL: u32 = 3600;
pub const DEFAULT_FF_V4_MIN: u32 = 400_000;
pub const DEFAULT_FF_V6_MIN: u32 = 10_000;

/// View sender configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Transport backing the sender.
    pub io_module: IoModule,
    /// Identity of this sender instance within the topic namespace.
    pub instance: String,
    /// Cadence of full sync frames, in seconds.
    pub sync_interval: u32,
    /// Peers with fewer active IPv4 prefixes than this are not published,
    /// unless their IPv6 count qualifies them.
    pub filter_ff_v4_min: u32,
    pub filter_ff_v6_min: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            io_module: IoModule::Kafka,
            instance: "default".to_string(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            filter_ff_v4_min: DEFAULT_FF_V4_MIN,
            filter_ff_v6_min: DEFAULT_FF_V6_MIN,
        }
    }
}

impl SenderConfig {
    pub fn instance_id(&self) -> String {
        metric_safe(&self.instance)
    }
}

/// View archiver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiverConfig {
    /// Output filename pattern: `%s` expands to the segment's unix time,
    /// plus the standard strftime calendar substitutions.
    pub outfile_pattern: String,
    /// Seconds of views per output file.
    pub rotation_interval: u32,
    /// Align segment boundaries to multiples of the rotation interval.
    pub rotation_align: bool,
    /// Compression level 0..=9, handed to the writer factory.
    pub compression_level: u8,
    pub output_format: OutputFormat,
    /// After each rotation, the closed filename is written here.
    pub latest_filename: Option<String>,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            outfile_pattern: "bgpview.%s.bin".to_string(),
            rotation_interval: 3600,
            rotation_align: true,
            compression_level: 6,
            output_format: OutputFormat::Binary,
            latest_filename: None,
        }
    }
}

impl ArchiverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.outfile_pattern.is_empty() {
            return Err(ViewError::InvalidArg("empty outfile pattern".into()));
        }
        if self.rotation_interval == 0 {
            return Err(ViewError::InvalidArg("zero rotation interval".into()));
        }
        if self.compression_level > 9 {
            return Err(ViewError::InvalidArg(format!(
                "compression level {} out of range",
                self.compression_level
            )));
        }
        Ok(())
    }
}
