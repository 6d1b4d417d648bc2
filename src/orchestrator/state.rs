//! Per-trigger-key state.

use std::sync::mpsc::Receiver;
use std::time::Instant;

use super::worker::JobOutcome;
use crate::geometry::Point;
use crate::kind::LookupKind;

/// Lifecycle of one trigger key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerPhase {
    /// Waiting for a press.
    Idle,
    /// A press was accepted; the job is being submitted.
    Pressed,
    /// A recognition is running for this key.
    Dispatched,
}

impl std::fmt::Display for TriggerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerPhase::Idle => write!(f, "Idle"),
            TriggerPhase::Pressed => write!(f, "Pressed"),
            TriggerPhase::Dispatched => write!(f, "Dispatched"),
        }
    }
}

/// A submitted recognition awaiting its outcome.
pub struct InFlight {
    pub outcome: Receiver<JobOutcome>,
    pub started: Instant,
    /// The key was released after submission; the result must not be shown.
    pub released: bool,
}

pub struct TriggerState {
    pub kind: LookupKind,
    pub key: u16,
    pub phase: TriggerPhase,
    /// Key state at the previous poll.
    pub held: bool,
    /// Time of the last dispatch or completion, for debouncing.
    pub last_action: Option<Instant>,
    /// Time and position of the last move event.
    pub last_move: Option<(Instant, Point)>,
    pub in_flight: Option<InFlight>,
}

impl TriggerState {
    pub fn new(kind: LookupKind, key: u16) -> Self {
        Self {
            kind,
            key,
            phase: TriggerPhase::Idle,
            held: false,
            last_action: None,
            last_move: None,
            in_flight: None,
        }
    }

    /// Moves to `phase`, logging the transition.
    pub fn transition(&mut self, phase: TriggerPhase) {
        if self.phase != phase {
            tracing::trace!("{} trigger: {} -> {}", self.kind, self.phase, phase);
            self.phase = phase;
        }
    }

    /// Back to idle after a recognition ended (any outcome); restarts the debounce window.
    pub fn complete(&mut self, now: Instant) {
        self.in_flight = None;
        self.last_action = Some(now);
        self.transition(TriggerPhase::Idle);
    }
}
