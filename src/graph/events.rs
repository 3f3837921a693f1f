use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::Graph;
use crate::core::NodeId;

/// Changes recorded on one node since the last flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedEvent {
    pub node: NodeId,
    /// Changed paths relative to `node`, in write order.
    pub paths: Vec<String>,
}

/// Pending notifications coalesced per node.
pub(crate) struct EventQueue {
    pending: IndexMap<NodeId, Vec<String>>,
    sender: broadcast::Sender<ModifiedEvent>,
}

impl EventQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            pending: IndexMap::new(),
            sender,
        }
    }

    pub(crate) fn record(&mut self, node: NodeId, path: &str) {
        let paths = self.pending.entry(node).or_default();
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }

    fn flush(&mut self) -> Vec<ModifiedEvent> {
        let events: Vec<ModifiedEvent> = self
            .pending
            .drain(..)
            .map(|(node, paths)| ModifiedEvent { node, paths })
            .collect();
        for event in &events {
            // No subscriber is not an error.
            let _ = self.sender.send(event.clone());
        }
        events
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Graph {
    /// Receiver for every [`ModifiedEvent`] delivered by later flushes.
    ///
    /// The channel holds `event_capacity` events. A receiver that falls
    /// further behind gets `RecvError::Lagged` and loses the oldest ones;
    /// the list returned by [`Graph::flush_events`] is always complete.
    pub fn subscribe(&self) -> broadcast::Receiver<ModifiedEvent> {
        self.events.sender.subscribe()
    }

    /// Delivers one event per notified node and returns them.
    pub fn flush_events(&mut self) -> Vec<ModifiedEvent> {
        self.events.flush()
    }

    pub fn pending_events(&self) -> usize {
        self.events.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_coalesces_per_node() {
        let mut queue = EventQueue::new(8);
        let mut receiver = queue.sender.subscribe();
        queue.record(NodeId(1), "name");
        queue.record(NodeId(2), "images.0.name");
        queue.record(NodeId(1), "title");
        queue.record(NodeId(1), "name");

        let events = queue.flush();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].paths, vec!["name".to_string(), "title".to_string()]);
        assert_eq!(receiver.try_recv().unwrap(), events[0]);
        assert_eq!(receiver.try_recv().unwrap(), events[1]);
        assert!(queue.flush().is_empty());
    }

    #[test]
    fn test_lagging_receiver_skips_but_flush_keeps_all() {
        let mut queue = EventQueue::new(1);
        let mut receiver = queue.sender.subscribe();
        queue.record(NodeId(1), "name");
        queue.record(NodeId(2), "name");

        let events = queue.flush();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
        assert_eq!(receiver.try_recv().unwrap(), events[1]);
    }
}
