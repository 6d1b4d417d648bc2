//! Orchestrator - the trigger polling loop.
//!
//! Polls the trigger keys, dispatches recognitions to the worker, collects
//! their outcomes without blocking, and pushes display updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::TryRecvError;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::state::{InFlight, TriggerPhase, TriggerState};
use super::updates::{DisplayEvent, UpdateSender};
use super::worker::RecognitionWorker;
use crate::capture::RegionLocator;
use crate::config::{KeyConfig, TimingConfig};
use crate::error::RecognitionError;
use crate::geometry::Point;
use crate::input::InputSource;
use crate::kind::LookupKind;

pub struct Orchestrator {
    input: Box<dyn InputSource>,
    locator: Arc<RegionLocator>,
    worker: RecognitionWorker,
    updates: UpdateSender,
    timing: TimingConfig,
    triggers: Vec<TriggerState>,
}

impl Orchestrator {
    pub fn new(
        input: Box<dyn InputSource>,
        locator: Arc<RegionLocator>,
        worker: RecognitionWorker,
        updates: UpdateSender,
        timing: TimingConfig,
        keys: &KeyConfig,
    ) -> Self {
        let triggers = LookupKind::ALL
            .iter()
            .map(|&kind| TriggerState::new(kind, keys.trigger_key(kind)))
            .collect();
        Self {
            input,
            locator,
            worker,
            updates,
            timing,
            triggers,
        }
    }

    pub fn phase(&self, kind: LookupKind) -> TriggerPhase {
        self.triggers
            .iter()
            .find(|t| t.kind == kind)
            .map(|t| t.phase)
            .unwrap_or(TriggerPhase::Idle)
    }

    fn any_in_flight(&self) -> bool {
        self.triggers.iter().any(|t| t.in_flight.is_some())
    }

    /// One polling step. Never blocks.
    pub fn tick(&mut self, now: Instant) {
        let cursor = self.input.cursor_position();

        for idx in 0..self.triggers.len() {
            self.poll_outcome(idx, now);

            let down = self.input.is_key_down(self.triggers[idx].key);
            let was_down = std::mem::replace(&mut self.triggers[idx].held, down);

            if was_down && !down {
                self.on_release(idx);
            }
            if down && !was_down {
                self.on_press(idx, now, cursor);
            }
            if down && let Some(position) = cursor {
                self.maybe_push_move(idx, now, position);
            }
        }
    }

    /// Collects a finished (or overdue) recognition for trigger `idx`.
    fn poll_outcome(&mut self, idx: usize, now: Instant) {
        let timeout = self.timing.recognition_timeout();
        let trigger = &mut self.triggers[idx];
        let Some(in_flight) = trigger.in_flight.as_ref() else {
            return;
        };

        match in_flight.outcome.try_recv() {
            Ok(outcome) => {
                let show = !in_flight.released && trigger.held;
                trigger.complete(now);
                match outcome.result {
                    Ok(result) if show => {
                        tracing::info!(
                            "Recognized {} {} (score {:.2}) in {:?}",
                            result.kind,
                            result.entity_id,
                            result.score,
                            outcome.elapsed
                        );
                        self.updates.push(DisplayEvent::Show {
                            result,
                            position: outcome.cursor,
                        });
                    }
                    Ok(result) => {
                        tracing::debug!(
                            "Dropping {} {}: key released before recognition finished",
                            result.kind,
                            result.entity_id
                        );
                    }
                    Err(e) => tracing::debug!("{} lookup produced nothing: {}", outcome.kind, e),
                }
            }
            Err(TryRecvError::Empty) => {
                if now.saturating_duration_since(in_flight.started) >= timeout {
                    tracing::warn!(
                        "{} lookup abandoned: {}",
                        trigger.kind,
                        RecognitionError::Timeout
                    );
                    trigger.complete(now);
                }
            }
            Err(TryRecvError::Disconnected) => {
                tracing::warn!("Recognition worker went away");
                trigger.complete(now);
            }
        }
    }

    fn on_release(&mut self, idx: usize) {
        let trigger = &mut self.triggers[idx];
        if let Some(in_flight) = trigger.in_flight.as_mut() {
            in_flight.released = true;
        }
        trigger.last_move = None;
        if trigger.phase == TriggerPhase::Pressed {
            trigger.transition(TriggerPhase::Idle);
        }
        self.updates.push(DisplayEvent::Hide { kind: trigger.kind });
    }

    fn on_press(&mut self, idx: usize, now: Instant, cursor: Option<Point>) {
        let kind = self.triggers[idx].kind;

        if self.any_in_flight() {
            tracing::debug!("{kind} press ignored: recognition already in flight");
            return;
        }
        let debounce = self.timing.debounce();
        if self.triggers[idx]
            .last_action
            .is_some_and(|t| now.saturating_duration_since(t) < debounce)
        {
            tracing::debug!("{kind} press ignored: debounce");
            return;
        }
        let Some(cursor) = cursor else {
            tracing::debug!("{kind} press ignored: no cursor position");
            return;
        };
        if !self.locator.is_cursor_over_game(cursor) {
            tracing::debug!("{kind} press ignored: cursor not over the game window");
            return;
        }

        let trigger = &mut self.triggers[idx];
        trigger.transition(TriggerPhase::Pressed);
        match self.worker.try_submit(kind, cursor) {
            Some(outcome) => {
                trigger.in_flight = Some(InFlight {
                    outcome,
                    started: now,
                    released: false,
                });
                trigger.last_action = Some(now);
                trigger.transition(TriggerPhase::Dispatched);
                tracing::debug!("{kind} lookup dispatched at ({}, {})", cursor.x, cursor.y);
            }
            None => {
                tracing::debug!("{kind} press ignored: worker still busy");
                trigger.transition(TriggerPhase::Idle);
            }
        }
    }

    fn maybe_push_move(&mut self, idx: usize, now: Instant, position: Point) {
        let interval = self.timing.move_interval();
        let trigger = &mut self.triggers[idx];
        let due = match trigger.last_move {
            None => true,
            Some((at, last)) => last != position && now.saturating_duration_since(at) >= interval,
        };
        if due {
            trigger.last_move = Some((now, position));
            self.updates.push(DisplayEvent::Move { position });
        }
    }

    /// Polls until `running` is cleared.
    pub fn run(mut self, running: Arc<AtomicBool>) {
        tracing::info!("Orchestrator started");
        let interval = self.timing.poll_interval();
        while running.load(Ordering::SeqCst) {
            self.tick(Instant::now());
            thread::sleep(interval);
        }
        tracing::info!("Orchestrator stopped");
    }

    /// Runs the polling loop on its own thread.
    pub fn spawn(self) -> std::io::Result<OrchestratorHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = thread::Builder::new()
            .name("orchestrator".to_string())
            .spawn(move || self.run(flag))?;
        Ok(OrchestratorHandle {
            running,
            handle: Some(handle),
        })
    }
}

/// Stops the polling thread when dropped.
pub struct OrchestratorHandle {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl OrchestratorHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OrchestratorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
