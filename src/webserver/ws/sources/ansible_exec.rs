use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::Notify;

use crate::errors::CollectorError;
use crate::logger::{self, LogTag};
use crate::webserver::ws::message::{Event, PlaybookRun};
use crate::webserver::ws::producers::EventSource;

/// Create a connected notifier/source pair
///
/// `capacity` bounds how many finished runs may wait between two polls.
pub fn channel(capacity: usize) -> (PlaybookRunNotifier, PlaybookRunSource) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let wake = Arc::new(Notify::new());
    (
        PlaybookRunNotifier {
            sender,
            wake: Arc::clone(&wake),
        },
        PlaybookRunSource { receiver, wake },
    )
}

/// Handle given to whatever executes playbooks
///
/// Reporting never blocks. When the feed is full the run is dropped from
/// the live stream and a warning is logged.
#[derive(Clone)]
pub struct PlaybookRunNotifier {
    sender: mpsc::Sender<PlaybookRun>,
    wake: Arc<Notify>,
}

impl PlaybookRunNotifier {
    /// Queue a run for broadcast; returns false if it was dropped
    pub fn report(&self, run: PlaybookRun) -> bool {
        match self.sender.try_send(run) {
            Ok(()) => {
                self.wake.notify_one();
                true
            }
            Err(TrySendError::Full(run)) => {
                logger::warning(
                    LogTag::Producer,
                    &format!("Playbook run feed full, dropping {} ({})", run.id, run.playbook),
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                logger::debug(
                    LogTag::Producer,
                    "Playbook run feed closed (producer disabled or stopped)",
                );
                false
            }
        }
    }
}

/// Drains reported runs into `ansible-exec` events
///
/// Woken by every report; the producer interval is only a fallback.
pub struct PlaybookRunSource {
    receiver: mpsc::Receiver<PlaybookRun>,
    wake: Arc<Notify>,
}

#[async_trait]
impl EventSource for PlaybookRunSource {
    fn name(&self) -> &'static str {
        "ansible-exec"
    }

    async fn poll(&mut self) -> Result<Vec<Event>, CollectorError> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(run) => events.push(Event::AnsibleExec(run)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(events)
    }

    fn wake_signal(&self) -> Option<Arc<Notify>> {
        Some(Arc::clone(&self.wake))
    }
}
