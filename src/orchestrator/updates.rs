//! Display update queue.
//!
//! One bounded slot per event type. A newer event of a type overwrites an
//! undrained older one, so the display only ever sees the latest show, hide,
//! and move; events are handed out in the order they were pushed.

use flume::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::Point;
use crate::kind::LookupKind;
use crate::matching::MatchResult;

#[derive(Clone, Debug, PartialEq)]
pub enum DisplayEvent {
    /// Show the overlay for a recognized entity near the cursor.
    Show { result: MatchResult, position: Point },
    /// The trigger key was released.
    Hide { kind: LookupKind },
    /// The cursor moved while a trigger key is held.
    Move { position: Point },
}

impl DisplayEvent {
    fn slot(&self) -> usize {
        match self {
            DisplayEvent::Show { .. } => 0,
            DisplayEvent::Hide { .. } => 1,
            DisplayEvent::Move { .. } => 2,
        }
    }
}

type Sequenced = (u64, DisplayEvent);

/// Producer side. Keeps receiver handles to evict stale events when a slot is full.
#[derive(Clone)]
pub struct UpdateSender {
    slots: [(Sender<Sequenced>, Receiver<Sequenced>); 3],
    sequence: Arc<AtomicU64>,
}

/// Consumer side.
#[derive(Clone)]
pub struct UpdateReceiver {
    slots: [Receiver<Sequenced>; 3],
}

/// Creates a linked sender/receiver pair.
pub fn update_queue() -> (UpdateSender, UpdateReceiver) {
    let (show_tx, show_rx) = flume::bounded(1);
    let (hide_tx, hide_rx) = flume::bounded(1);
    let (move_tx, move_rx) = flume::bounded(1);
    let receiver = UpdateReceiver {
        slots: [show_rx.clone(), hide_rx.clone(), move_rx.clone()],
    };
    let sender = UpdateSender {
        slots: [(show_tx, show_rx), (hide_tx, hide_rx), (move_tx, move_rx)],
        sequence: Arc::new(AtomicU64::new(0)),
    };
    (sender, receiver)
}

impl UpdateSender {
    /// Pushes an event, replacing any undrained event of the same type.
    pub fn push(&self, event: DisplayEvent) {
        let (tx, rx) = &self.slots[event.slot()];
        let mut item = (self.sequence.fetch_add(1, Ordering::SeqCst), event);
        loop {
            match tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    // Evict the stale event and retry
                    let _ = rx.try_recv();
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

impl UpdateReceiver {
    /// Takes every pending event, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<DisplayEvent> {
        let mut pending: Vec<Sequenced> = self
            .slots
            .iter()
            .filter_map(|rx| rx.try_recv().ok())
            .collect();
        pending.sort_by_key(|(seq, _)| *seq);
        pending.into_iter().map(|(_, event)| event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::EntityKind;
    use std::thread;

    fn show(id: &str) -> DisplayEvent {
        DisplayEvent::Show {
            result: MatchResult {
                kind: EntityKind::Monster,
                entity_id: id.to_string(),
                score: 1.0,
            },
            position: Point::new(0, 0),
        }
    }

    #[test]
    fn test_latest_event_per_type_wins() {
        let (tx, rx) = update_queue();
        tx.push(show("狼"));
        tx.push(DisplayEvent::Move { position: Point::new(1, 1) });
        tx.push(show("幽灵船长"));
        tx.push(DisplayEvent::Move { position: Point::new(2, 2) });

        let events = rx.drain();
        assert_eq!(events, vec![show("幽灵船长"), DisplayEvent::Move { position: Point::new(2, 2) }]);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_drain_preserves_push_order_across_types() {
        let (tx, rx) = update_queue();
        tx.push(DisplayEvent::Hide { kind: LookupKind::Monster });
        tx.push(show("狼"));

        let events = rx.drain();
        assert_eq!(events[0], DisplayEvent::Hide { kind: LookupKind::Monster });
        assert_eq!(events[1], show("狼"));
    }

    #[test]
    fn test_push_never_blocks_across_threads() {
        let (tx, rx) = update_queue();
        let producer = thread::spawn(move || {
            for i in 0..1000 {
                tx.push(DisplayEvent::Move { position: Point::new(i, i) });
            }
        });
        producer.join().unwrap();

        let events = rx.drain();
        assert_eq!(events, vec![DisplayEvent::Move { position: Point::new(999, 999) }]);
    }
}
