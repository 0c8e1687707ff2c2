//! Replay-latest subscriptions.

use crossbeam_channel::{Receiver, Sender};

/// Subscribers to one published value.
///
/// A new subscriber receives the current value immediately, then every
/// change. Subscribers whose receiver was dropped are pruned on the next
/// publish.
#[derive(Debug)]
pub struct Watchers<T> {
    senders: Vec<Sender<T>>,
}

impl<T> Default for Watchers<T> {
    fn default() -> Self {
        Self {
            senders: Vec::new(),
        }
    }
}

impl<T: Clone> Watchers<T> {
    pub fn subscribe(&mut self, current: T) -> Receiver<T> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.register(tx, current);
        rx
    }

    /// Register an existing sender, e.g. one created on another thread.
    pub fn register(&mut self, sender: Sender<T>, current: T) {
        if sender.send(current).is_ok() {
            self.senders.push(sender);
        }
    }

    pub fn publish(&mut self, value: &T) {
        self.senders.retain(|sender| sender.send(value.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_subscriber_sees_current_value_first() {
        let mut watchers = Watchers::default();
        let rx = watchers.subscribe(false);
        watchers.publish(&true);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![false, true]);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut watchers = Watchers::default();
        let kept = watchers.subscribe(1u8);
        drop(watchers.subscribe(1u8));
        watchers.publish(&2);
        assert_eq!(watchers.len(), 1);
        assert_eq!(kept.try_iter().last(), Some(2));
    }
}
