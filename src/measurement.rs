use std::fmt;

use chrono::{DateTime, Local};

use crate::error::SensorError;

/// Raw sensor output before the acquisition loop stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub pm2_5: f32,
    pub pm10: f32,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub timestamp: DateTime<Local>,
    pub pm2_5: f32,
    pub pm10: f32,
    pub device_id: String,
}

impl Measurement {
    /// Concentrations must be finite and non-negative.
    pub fn new(timestamp: DateTime<Local>, reading: Reading) -> Result<Self, SensorError> {
        for (name, value) in [("pm2.5", reading.pm2_5), ("pm10", reading.pm10)] {
            if !value.is_finite() || value < 0.0 {
                return Err(SensorError::Malformed(format!(
                    "{name} concentration out of range: {value}"
                )));
            }
        }

        Ok(Measurement {
            timestamp,
            pm2_5: reading.pm2_5,
            pm10: reading.pm10,
            device_id: reading.device_id,
        })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] PM2.5: {:.1} µg/m³, PM10: {:.1} µg/m³",
            self.timestamp.to_rfc3339(),
            self.device_id,
            self.pm2_5,
            self.pm10
        )
    }
}
