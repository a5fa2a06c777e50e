use crate::{error::SinkError, measurement::Measurement, sink::Sink};

#[derive(Debug, Default)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn consume(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        log::info!("{measurement}");
        Ok(())
    }
}
