use std::path::PathBuf;
use std::time::Duration;

use backon::ConstantBuilder;
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

use crate::error::ConfigError;

pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_OUTPUT: &str = "measurements.csv";

#[derive(Debug, Parser)]
#[command(version, about = "Reads particulate matter from an SDS011 dust sensor")]
pub struct Cli {
    #[command(flatten)]
    pub sensor: SensorArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct SensorArgs {
    /// Serial port the sensor is attached to
    #[arg(long, global = true, default_value = DEFAULT_PORT, env = "SDS011_PORT")]
    pub port: String,

    /// Minutes between measurements (0 = continuous)
    #[arg(long, global = true, default_value_t = 0, env = "SDS011_WORKING_PERIOD")]
    pub working_period: u8,

    /// Retries per read or sensor command before the logger gives up
    #[arg(long, global = true, default_value_t = 20, env = "SDS011_MAX_RETRIES")]
    pub max_retries: usize,

    /// Delay between retries in milliseconds
    #[arg(long, global = true, default_value_t = 100, env = "SDS011_RETRY_DELAY_MS")]
    pub retry_delay_ms: u64,

    #[arg(long, global = true, default_value_t = LevelFilter::Info, env = "SDS011_LOG_LEVEL")]
    pub log_level: LevelFilter,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Append every measurement to a CSV file and echo it to the console
    Log {
        #[arg(long, default_value = DEFAULT_OUTPUT, env = "SDS011_OUTPUT")]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = TimestampFormat::Rfc3339)]
        timestamp_format: TimestampFormat,
    },
    /// Show the latest PM2.5 and PM10 values
    Display {
        #[arg(long, env = "SDS011_OUTPUT")]
        output: Option<PathBuf>,
    },
    /// Show the latest values and a chart of the history
    Plot {
        #[arg(long, env = "SDS011_OUTPUT")]
        output: Option<PathBuf>,

        /// Keep at most this many points (unbounded by default)
        #[arg(long)]
        history: Option<usize>,

        /// Number of columns in the chart
        #[arg(long, default_value_t = 60)]
        width: usize,
    },
}

/// Sensor sampling interval in minutes, 0 for continuous reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkingPeriod(u8);

impl WorkingPeriod {
    pub const MAX_MINUTES: u8 = 30;
    pub const CONTINUOUS: WorkingPeriod = WorkingPeriod(0);

    pub fn new(minutes: u8) -> Result<Self, ConfigError> {
        if minutes > Self::MAX_MINUTES {
            return Err(ConfigError::WorkingPeriod(minutes));
        }
        Ok(WorkingPeriod(minutes))
    }

    pub fn minutes(self) -> u8 {
        self.0
    }

    pub fn is_continuous(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TimestampFormat {
    #[default]
    Rfc3339,
    /// Whole seconds since the Unix epoch
    Unix,
}

impl TimestampFormat {
    pub fn format(self, timestamp: &DateTime<Local>) -> String {
        match self {
            TimestampFormat::Rfc3339 => timestamp.to_rfc3339(),
            TimestampFormat::Unix => timestamp.timestamp().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn builder(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries)
    }
}

impl From<&SensorArgs> for RetryPolicy {
    fn from(args: &SensorArgs) -> Self {
        RetryPolicy {
            max_retries: args.max_retries,
            delay: Duration::from_millis(args.retry_delay_ms),
        }
    }
}
