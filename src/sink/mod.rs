use std::fmt;

use crate::{error::SinkError, measurement::Measurement};

pub mod console;
pub mod csv;
pub mod display;
pub mod mailbox;
pub mod plot;

pub use self::console::ConsoleSink;
pub use self::csv::CsvSink;
pub use self::display::DisplaySink;
pub use self::mailbox::{Mailbox, MailboxSink};
pub use self::plot::{Canvas, PlotSink, TerminalCanvas};

/// A consumer of measurements. Sinks only ever see a shared reference.
pub trait Sink: Send {
    fn name(&self) -> &str;

    fn consume(&mut self, measurement: &Measurement) -> Result<(), SinkError>;
}

/// Sinks in registration order. A failing sink is logged and skipped.
#[derive(Default)]
pub struct Sinks {
    sinks: Vec<Box<dyn Sink>>,
}

impl fmt::Debug for Sinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sinks.iter().map(|sink| sink.name()))
            .finish()
    }
}

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: impl Sink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Returns how many sinks failed.
    pub fn dispatch(&mut self, measurement: &Measurement) -> usize {
        let mut failed = 0;
        for sink in &mut self.sinks {
            if let Err(e) = sink.consume(measurement) {
                log::error!("Sink {} failed: {e}", sink.name());
                failed += 1;
            }
        }
        failed
    }
}
