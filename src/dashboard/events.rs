use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::Serialize;
use tracing::{trace, warn};

use crate::layout::LayoutKind;
use crate::model::tree::NodeId;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    ObjectsReordered { parent: NodeId },
    NewObjectAdded { node: NodeId },
    LayoutSwitched { owner: NodeId, from: LayoutKind, to: LayoutKind },
    DisambiguationRequested { manager: NodeId, options: Vec<LayoutKind> },
    ConfirmationRequested { title: String, body: String, confirm: String, dismiss: String },
    Warning { message: String },
}

/// Events a subscriber can fall behind by before new ones are dropped for it.
pub const EVENT_BUFFER: usize = 256;

/// Fans events out to every live subscriber. Subscribers whose receiver has
/// been dropped are forgotten on the next publish. Each subscriber has a
/// buffer of [`EVENT_BUFFER`] events; a full one misses events until drained.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<DashboardEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<DashboardEvent> {
        let (tx, rx) = bounded(EVENT_BUFFER);
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: DashboardEvent) {
        trace!(?event, subscribers = self.subscribers.len(), "publishing");
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(event = ?dropped, "subscriber is not draining events, dropping one");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize { self.subscribers.len() }
}
