use tokio_util::sync::CancellationToken;

use crate::sink::{Mailbox, Sinks};

/// Foreground side of the mailbox: renders the latest measurement on every change.
///
/// Values may be skipped if acquisition outpaces rendering. When acquisition
/// stops, the last values stay on screen until `cancel` fires.
pub async fn run(mut mailbox: Mailbox, mut sinks: Sinks, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = mailbox.changed() => {
                if changed.is_err() {
                    log::warn!("No more measurements, press Ctrl+C to exit");
                    cancel.cancelled().await;
                    break;
                }

                let latest = mailbox.borrow_and_update().clone();
                if let Some(measurement) = latest {
                    sinks.dispatch(&measurement);
                }
            }
        }
    }
}
