use std::time::Duration;

use backon::BlockingRetryable;
use chrono::{DateTime, Local, TimeDelta};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{RetryPolicy, WorkingPeriod},
    error::SensorError,
    measurement::Measurement,
    sensor::{Clock, SensorSource},
    sink::Sinks,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Reading,
    Dispatching,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub records: u64,
    pub sink_failures: u64,
}

fn log_retry(e: &SensorError, dur: Duration) {
    log::error!("{e}");
    log::info!("Retrying in {:?}", dur);
}

/// Wakes the sensor and sets its working period, retrying each step.
///
/// The sensor is closed before an error is returned, so a failed start
/// leaves it released just like a finished acquisition.
pub fn start_sensor<S: SensorSource>(
    source: &mut S,
    period: WorkingPeriod,
    retry: RetryPolicy,
) -> Result<(), SensorError> {
    let result = wake(source, period, retry);
    if result.is_err() {
        if let Err(e) = source.close() {
            log::error!("Failed to close sensor: {e}");
        }
    }
    result
}

fn wake<S: SensorSource>(
    source: &mut S,
    period: WorkingPeriod,
    retry: RetryPolicy,
) -> Result<(), SensorError> {
    (|| source.init())
        .retry(retry.builder())
        .when(SensorError::is_retryable)
        .notify(log_retry)
        .call()?;
    (|| source.configure(period))
        .retry(retry.builder())
        .when(SensorError::is_retryable)
        .notify(log_retry)
        .call()
}

/// Polls a sensor and fans every measurement out to its sinks.
///
/// The loop owns the sensor. It stops when `cancel` fires or when a read
/// keeps failing after the retry policy is exhausted, and in both cases
/// closes the sensor before returning. A measurement that has been read is
/// always handed to every sink, even if cancellation arrives meanwhile.
#[derive(Debug)]
pub struct AcquisitionLoop<S: SensorSource, C: Clock> {
    source: S,
    sinks: Sinks,
    retry: RetryPolicy,
    clock: C,
    state: State,
    last_timestamp: Option<DateTime<Local>>,
    summary: Summary,
}

impl<S: SensorSource, C: Clock> AcquisitionLoop<S, C> {
    pub fn new(source: S, sinks: Sinks, retry: RetryPolicy, clock: C) -> Self {
        AcquisitionLoop {
            source,
            sinks,
            retry,
            clock,
            state: State::Idle,
            last_timestamp: None,
            summary: Summary {
                records: 0,
                sink_failures: 0,
            },
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> State {
        self.state
    }

    pub fn run(&mut self, cancel: &CancellationToken) -> Result<Summary, SensorError> {
        if self.state == State::Stopped {
            return Ok(self.summary);
        }

        let result = self.acquire(cancel);

        self.transition(State::Stopped);
        if let Err(e) = self.source.close() {
            log::error!("Failed to close sensor: {e}");
        }

        result.map(|()| self.summary)
    }

    fn acquire(&mut self, cancel: &CancellationToken) -> Result<(), SensorError> {
        while !cancel.is_cancelled() {
            self.transition(State::Reading);
            let measurement = match self.read(cancel) {
                Ok(measurement) => measurement,
                Err(SensorError::Interrupted) => break,
                Err(e) if cancel.is_cancelled() => {
                    log::debug!("Read failed during shutdown: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };

            self.transition(State::Dispatching);
            let measurement = self.ensure_monotonic(measurement);
            let failed = self.sinks.dispatch(&measurement);
            self.summary.records += 1;
            self.summary.sink_failures += failed as u64;
        }

        Ok(())
    }

    fn read(&mut self, cancel: &CancellationToken) -> Result<Measurement, SensorError> {
        let source = &mut self.source;
        let clock = &self.clock;

        (|| {
            let reading = source.read_measurement()?;
            Measurement::new(clock.now(), reading)
        })
        .retry(self.retry.builder())
        .when(|e| e.is_retryable() && !cancel.is_cancelled())
        .notify(log_retry)
        .call()
    }

    fn ensure_monotonic(&mut self, mut measurement: Measurement) -> Measurement {
        if let Some(last) = self.last_timestamp {
            if measurement.timestamp <= last {
                let adjusted = last + TimeDelta::milliseconds(1);
                log::warn!(
                    "Clock went from {} to {}, using {}",
                    last.to_rfc3339(),
                    measurement.timestamp.to_rfc3339(),
                    adjusted.to_rfc3339()
                );
                measurement.timestamp = adjusted;
            }
        }
        self.last_timestamp = Some(measurement.timestamp);
        measurement
    }

    fn transition(&mut self, next: State) {
        log::debug!("Acquisition {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
