use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};

use crate::alerting::domain::alert_event::AlertEvent;

/// Fan-out of [`AlertEvent`]s to any number of channel subscribers.
///
/// Channels are unbounded, so emitting never waits on a slow subscriber.
/// Subscribers that dropped their receiver are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<AlertEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<AlertEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: AlertEvent) {
        // Send outside the lock so a subscriber can subscribe from its
        // receiving thread while we emit.
        let subscribers = self.lock().clone();
        let dead: Vec<&Sender<AlertEvent>> = subscribers
            .iter()
            .filter(|tx| tx.send(event.clone()).is_err())
            .collect();

        if !dead.is_empty() {
            self.lock()
                .retain(|tx| !dead.iter().any(|d| d.same_channel(tx)));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sender<AlertEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}
