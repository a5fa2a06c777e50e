use std::io::Write;

use crate::{error::SinkError, measurement::Measurement, sink::Sink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readout {
    pub pm2_5: String,
    pub pm10: String,
}

impl Readout {
    pub fn new(measurement: &Measurement) -> Self {
        Readout {
            pm2_5: format!("{:.1}", measurement.pm2_5),
            pm10: format!("{:.1}", measurement.pm10),
        }
    }
}

/// Two numeric read-outs showing only the most recent measurement.
#[derive(Debug)]
pub struct DisplaySink<W: Write> {
    out: W,
    latest: Option<Readout>,
}

impl<W: Write> DisplaySink<W> {
    pub fn new(out: W) -> Self {
        DisplaySink { out, latest: None }
    }

    #[cfg(test)]
    pub fn readout(&self) -> Option<&Readout> {
        self.latest.as_ref()
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write + Send> Sink for DisplaySink<W> {
    fn name(&self) -> &str {
        "display"
    }

    fn consume(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        let readout = self.latest.insert(Readout::new(measurement));
        writeln!(
            self.out,
            "PM2.5 {:>7} µg/m³    PM10 {:>7} µg/m³",
            readout.pm2_5, readout.pm10
        )?;
        self.out.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::measurement;

    #[test]
    fn test_one_decimal_place() {
        let mut display = DisplaySink::new(Vec::new());

        display.consume(&measurement(0, 12.34, 20.06)).unwrap();
        assert_eq!(display.readout().unwrap().pm2_5, "12.3");
        assert_eq!(display.readout().unwrap().pm10, "20.1");

        display.consume(&measurement(1, 12.0, 7.0)).unwrap();
        assert_eq!(display.readout().unwrap().pm2_5, "12.0");
        assert_eq!(display.readout().unwrap().pm10, "7.0");
    }

    #[test]
    fn test_latest_fully_replaces_previous() {
        let mut display = DisplaySink::new(Vec::new());
        assert!(display.readout().is_none());

        display.consume(&measurement(0, 99.9, 88.8)).unwrap();
        display.consume(&measurement(1, 1.0, 2.0)).unwrap();

        assert_eq!(
            display.readout(),
            Some(&Readout {
                pm2_5: "1.0".to_string(),
                pm10: "2.0".to_string(),
            })
        );
    }

    #[test]
    fn test_renders_one_line_per_update() {
        let mut display = DisplaySink::new(Vec::new());

        display.consume(&measurement(0, 12.34, 20.1)).unwrap();
        display.consume(&measurement(1, 5.0, 6.0)).unwrap();

        let out = String::from_utf8(display.get_ref().clone()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("12.3"));
        assert!(lines[1].contains("5.0") && lines[1].contains("6.0"));
    }
}
