use tokio::sync::watch;

use crate::{error::SinkError, measurement::Measurement, sink::Sink};

/// Single-slot hand-off to the foreground. A new value replaces an unread one.
pub type Mailbox = watch::Receiver<Option<Measurement>>;

#[derive(Debug)]
pub struct MailboxSink {
    slot: watch::Sender<Option<Measurement>>,
}

impl MailboxSink {
    pub fn new() -> (MailboxSink, Mailbox) {
        let (slot, mailbox) = watch::channel(None);
        (MailboxSink { slot }, mailbox)
    }
}

impl Sink for MailboxSink {
    fn name(&self) -> &str {
        "mailbox"
    }

    fn consume(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        // Keeps working with no receiver so acquisition never depends on the UI.
        self.slot.send_replace(Some(measurement.clone()));
        Ok(())
    }
}
