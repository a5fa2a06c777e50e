use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use ::csv::{QuoteStyle, Writer, WriterBuilder};

use crate::{
    config::TimestampFormat,
    error::{ConfigError, SinkError},
    measurement::Measurement,
    sink::Sink,
};

pub const HEADER: [&str; 4] = ["timestamp", "pm2.5", "pm10", "device_id"];

/// Space separated log, one flushed row per measurement.
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: Writer<W>,
    timestamp_format: TimestampFormat,
}

impl CsvSink<File> {
    /// Appends to `path`, writing the header only if the file is empty.
    pub fn open(path: &Path, timestamp_format: TimestampFormat) -> Result<Self, ConfigError> {
        let output_error = |source| ConfigError::Output {
            path: path.display().to_string(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(output_error)?;
        let is_empty = file.metadata().map_err(output_error)?.len() == 0;

        CsvSink::new(file, timestamp_format, is_empty).map_err(|e| match e {
            SinkError::Io(source) => output_error(source),
            other => output_error(std::io::Error::other(other)),
        })
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(
        inner: W,
        timestamp_format: TimestampFormat,
        write_header: bool,
    ) -> Result<Self, SinkError> {
        let mut writer = WriterBuilder::new()
            .delimiter(b' ')
            .quote(b'|')
            .quote_style(QuoteStyle::Necessary)
            .from_writer(inner);

        if write_header {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        Ok(CsvSink {
            writer,
            timestamp_format,
        })
    }

    #[cfg(test)]
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

impl<W: Write + Send> Sink for CsvSink<W> {
    fn name(&self) -> &str {
        "csv"
    }

    fn consume(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        self.writer.write_record([
            self.timestamp_format.format(&measurement.timestamp),
            measurement.pm2_5.to_string(),
            measurement.pm10.to_string(),
            measurement.device_id.clone(),
        ])?;
        self.writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::tests::measurement;

    fn contents(sink: &CsvSink<Vec<u8>>) -> String {
        String::from_utf8(sink.get_ref().clone()).unwrap()
    }

    #[test]
    fn test_writes_header_and_rows_in_order() {
        let mut sink = CsvSink::new(Vec::new(), TimestampFormat::Unix, true).unwrap();

        sink.consume(&measurement(0, 12.3, 20.1)).unwrap();
        sink.consume(&measurement(1, 11.9, 19.8)).unwrap();

        assert_eq!(
            contents(&sink),
            "timestamp pm2.5 pm10 device_id\n0 12.3 20.1 dev1\n1 11.9 19.8 dev1\n"
        );
    }

    #[test]
    fn test_every_row_is_flushed() {
        let mut sink = CsvSink::new(Vec::new(), TimestampFormat::Unix, true).unwrap();

        for i in 0..5 {
            sink.consume(&measurement(i, 1.5, 2.5)).unwrap();
            assert_eq!(contents(&sink).lines().count() as i64, i + 2);
        }
    }

    #[test]
    fn test_quotes_device_id_with_space() {
        let mut sink = CsvSink::new(Vec::new(), TimestampFormat::Unix, false).unwrap();
        let mut m = measurement(7, 1.0, 2.0);
        m.device_id = "dev 1".to_string();

        sink.consume(&m).unwrap();

        assert_eq!(contents(&sink), "7 1 2 |dev 1|\n");
    }

    #[test]
    fn test_open_appends_without_second_header() {
        let path = std::env::temp_dir().join(format!(
            "sds011-logger-test-{}.csv",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let mut sink = CsvSink::open(&path, TimestampFormat::Unix).unwrap();
            sink.consume(&measurement(0, 12.3, 20.1)).unwrap();
        }
        {
            let mut sink = CsvSink::open(&path, TimestampFormat::Unix).unwrap();
            sink.consume(&measurement(1, 11.9, 19.8)).unwrap();
        }

        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            written,
            "timestamp pm2.5 pm10 device_id\n0 12.3 20.1 dev1\n1 11.9 19.8 dev1\n"
        );
    }
}
