use chrono::{DateTime, Local};

use crate::{config::WorkingPeriod, error::SensorError, measurement::Reading};

/// A particulate matter sensor the acquisition loop can poll.
pub trait SensorSource: Send {
    /// Brings the sensor into a state where it reports readings.
    fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    /// Changes the sampling cadence of subsequent reads.
    fn configure(&mut self, period: WorkingPeriod) -> Result<(), SensorError>;

    /// Blocks until the sensor reports the next reading.
    fn read_measurement(&mut self) -> Result<Reading, SensorError>;

    /// Releases the sensor. Called exactly once when acquisition stops.
    fn close(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

pub trait Clock: Send {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
