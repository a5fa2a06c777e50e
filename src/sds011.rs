use std::time::{Duration, Instant};

use rppal::uart::{Parity, Uart};
use tokio_util::sync::CancellationToken;

use crate::{
    config::WorkingPeriod,
    error::{ConfigError, SensorError},
    measurement::Reading,
    sensor::SensorSource,
};

pub const BAUD_RATE: u32 = 9600;
pub const PARITY: Parity = Parity::None;
pub const DATA_BITS: u8 = 8;
pub const STOP_BITS: u8 = 1;

pub const FRAME_HEAD: u8 = 0xaa;
pub const FRAME_TAIL: u8 = 0xab;
pub const COMMAND_ID: u8 = 0xb4;
pub const DATA_ID: u8 = 0xc0;
pub const REPLY_ID: u8 = 0xc5;

pub const FRAME_LEN: usize = 10;
pub const COMMAND_LEN: usize = 19;
const COMMAND_DATA_LEN: usize = 12;

pub const SET_REPORTING_MODE: u8 = 0x02;
pub const SET_SLEEP: u8 = 0x06;
pub const SET_WORKING_PERIOD: u8 = 0x08;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const CONTINUOUS_TIMEOUT: Duration = Duration::from_secs(10);
const PERIOD_SLACK: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    reply: Duration,
    continuous: Duration,
    period_slack: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            reply: REPLY_TIMEOUT,
            continuous: CONTINUOUS_TIMEOUT,
            period_slack: PERIOD_SLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Data(Reading),
    Reply { command: u8, data: [u8; 3] },
}

pub fn calculate_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Builds a command addressed to every sensor on the line.
pub fn encode_command(command: u8, data: &[u8]) -> [u8; COMMAND_LEN] {
    let len = data.len().min(COMMAND_DATA_LEN);
    let mut frame = [0u8; COMMAND_LEN];
    frame[0] = FRAME_HEAD;
    frame[1] = COMMAND_ID;
    frame[2] = command;
    frame[3..3 + len].copy_from_slice(&data[..len]);
    frame[15] = 0xff;
    frame[16] = 0xff;
    frame[17] = calculate_checksum(&frame[2..17]);
    frame[18] = FRAME_TAIL;
    frame
}

pub fn decode_frame(buffer: &[u8; FRAME_LEN]) -> Result<Frame, SensorError> {
    if buffer[0] != FRAME_HEAD || buffer[9] != FRAME_TAIL {
        return Err(SensorError::Malformed(format!(
            "expected head {:#04x} and tail {:#04x}, got {:#04x} and {:#04x}",
            FRAME_HEAD, FRAME_TAIL, buffer[0], buffer[9]
        )));
    }

    let checksum = calculate_checksum(&buffer[2..8]);
    if buffer[8] != checksum {
        return Err(SensorError::Checksum {
            expected: checksum,
            actual: buffer[8],
        });
    }

    match buffer[1] {
        DATA_ID => Ok(Frame::Data(Reading {
            pm2_5: f32::from(u16::from_le_bytes([buffer[2], buffer[3]])) / 10.0,
            pm10: f32::from(u16::from_le_bytes([buffer[4], buffer[5]])) / 10.0,
            device_id: format!("{:02X}{:02X}", buffer[6], buffer[7]),
        })),
        REPLY_ID => Ok(Frame::Reply {
            command: buffer[2],
            data: [buffer[3], buffer[4], buffer[5]],
        }),
        other => Err(SensorError::Malformed(format!(
            "unknown frame id {other:#04x}"
        ))),
    }
}

/// Reassembles frames from a byte stream, skipping noise until a frame head.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: [u8; FRAME_LEN],
    len: usize,
}

impl FrameReader {
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame, SensorError>> {
        match self.len {
            0 if byte != FRAME_HEAD => return None,
            1 if byte != DATA_ID && byte != REPLY_ID => {
                self.len = usize::from(byte == FRAME_HEAD);
                return None;
            }
            _ => {}
        }

        self.buffer[self.len] = byte;
        self.len += 1;

        if self.len < FRAME_LEN {
            return None;
        }

        self.len = 0;
        Some(decode_frame(&self.buffer))
    }
}

/// Byte transport under the driver.
pub trait Port: Send {
    /// Returns 0 when nothing arrived within one poll interval.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, SensorError>;

    fn write(&mut self, buffer: &[u8]) -> Result<usize, SensorError>;
}

impl Port for Uart {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, SensorError> {
        Ok(Uart::read(self, buffer)?)
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize, SensorError> {
        Ok(Uart::write(self, buffer)?)
    }
}

#[derive(Debug)]
pub struct Sds011<P: Port = Uart> {
    port: P,
    reader: FrameReader,
    period: WorkingPeriod,
    interrupt: CancellationToken,
    timeouts: Timeouts,
}

impl Sds011<Uart> {
    /// Opens the serial port. Blocking reads give up once `interrupt` is cancelled.
    pub fn open(path: &str, interrupt: CancellationToken) -> Result<Self, ConfigError> {
        let unavailable = |source| ConfigError::PortUnavailable {
            path: path.to_string(),
            source,
        };

        let mut uart = Uart::with_path(path, BAUD_RATE, PARITY, DATA_BITS, STOP_BITS)
            .map_err(unavailable)?;
        uart.set_read_mode(0, POLL_INTERVAL).map_err(unavailable)?;
        uart.set_write_mode(true).map_err(unavailable)?;

        Ok(Sds011::with_port(uart, interrupt))
    }
}

impl<P: Port> Sds011<P> {
    pub fn with_port(port: P, interrupt: CancellationToken) -> Self {
        Sds011 {
            port,
            reader: FrameReader::default(),
            period: WorkingPeriod::CONTINUOUS,
            interrupt,
            timeouts: Timeouts::default(),
        }
    }

    fn send_command(&mut self, command: u8, data: &[u8]) -> Result<(), SensorError> {
        let frame = encode_command(command, data);
        let mut written = 0;
        while written < frame.len() {
            written += self.port.write(&frame[written..])?;
        }
        log::debug!("Sent command {command:#04x}: {frame:02x?}");

        Ok(())
    }

    fn await_reply(&mut self, command: u8) -> Result<[u8; 3], SensorError> {
        let timeout = self.timeouts.reply;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_frame(remaining) {
                Ok(Frame::Reply { command: c, data }) if c == command => return Ok(data),
                Ok(frame) => log::debug!("Skipping {frame:?} while waiting for {command:#04x}"),
                Err(SensorError::Timeout(_)) => return Err(SensorError::Timeout(timeout)),
                Err(e) => return Err(e),
            }
        }
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, SensorError> {
        let deadline = Instant::now() + timeout;
        let mut byte = [0u8; 1];
        loop {
            if self.interrupt.is_cancelled() {
                return Err(SensorError::Interrupted);
            }
            if Instant::now() >= deadline {
                return Err(SensorError::Timeout(timeout));
            }
            if self.port.read(&mut byte)? == 0 {
                continue;
            }
            if let Some(frame) = self.reader.push(byte[0]) {
                return frame;
            }
        }
    }

    fn read_timeout(&self) -> Duration {
        if self.period.is_continuous() {
            self.timeouts.continuous
        } else {
            Duration::from_secs(u64::from(self.period.minutes()) * 60) + self.timeouts.period_slack
        }
    }
}

impl<P: Port> SensorSource for Sds011<P> {
    /// Wakes the sensor and switches it to active reporting.
    fn init(&mut self) -> Result<(), SensorError> {
        self.send_command(SET_SLEEP, &[1, 1])?;
        self.await_reply(SET_SLEEP)?;
        self.send_command(SET_REPORTING_MODE, &[1, 0])?;
        self.await_reply(SET_REPORTING_MODE)?;

        Ok(())
    }

    fn configure(&mut self, period: WorkingPeriod) -> Result<(), SensorError> {
        self.send_command(SET_WORKING_PERIOD, &[1, period.minutes()])?;
        let reply = self.await_reply(SET_WORKING_PERIOD)?;
        if reply[1] != period.minutes() {
            return Err(SensorError::Malformed(format!(
                "sensor acknowledged working period {} instead of {}",
                reply[1],
                period.minutes()
            )));
        }
        self.period = period;

        Ok(())
    }

    fn read_measurement(&mut self) -> Result<Reading, SensorError> {
        let timeout = self.read_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_frame(remaining) {
                Ok(Frame::Data(reading)) => return Ok(reading),
                Ok(frame) => log::debug!("Skipping {frame:?}"),
                Err(SensorError::Timeout(_)) => return Err(SensorError::Timeout(timeout)),
                Err(e) => return Err(e),
            }
        }
    }

    fn close(&mut self) -> Result<(), SensorError> {
        self.send_command(SET_SLEEP, &[1, 0])
    }
}
