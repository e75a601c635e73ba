use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::StepEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub with one channel per resource id (equipment or analyst).
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<StepEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a resource. Creates the channel if needed.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<StepEvent> {
        let sender = self
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, channel: &str, event: &StepEvent) {
        if let Some(sender) = self.channels.get(channel) {
            let _ = sender.send(event.clone());
        }
    }

    /// Send `event` on every resource channel it touches.
    pub fn publish(&self, event: &StepEvent) {
        for channel in event.channels() {
            self.send(channel, event);
        }
    }

    /// Drop a channel once its last subscriber is gone.
    pub fn prune(&self, channel: &str) {
        self.channels
            .remove_if(channel, |_, sender| sender.receiver_count() == 0);
    }
}
