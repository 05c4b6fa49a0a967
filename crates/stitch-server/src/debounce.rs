//! Coalescing of bursts of change events.

use std::time::Duration;

use tokio::sync::mpsc;

/// Waits for a quiet period after the last event before firing.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    quiet: Duration,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Consume `events` until the channel closes.
    ///
    /// Every event restarts a single timer; when it expires without a new
    /// event, `on_settled` is called once with the number of coalesced events.
    /// Pending events are flushed when the channel closes.
    pub async fn run<T, F>(self, mut events: mpsc::Receiver<T>, mut on_settled: F)
    where
        F: FnMut(usize),
    {
        while events.recv().await.is_some() {
            let mut pending = 1;

            loop {
                tokio::select! {
                    next = events.recv() => match next {
                        Some(_) => pending += 1,
                        None => {
                            on_settled(pending);
                            return;
                        }
                    },
                    _ = tokio::time::sleep(self.quiet) => {
                        on_settled(pending);
                        break;
                    }
                }
            }
        }
    }
}
