//! Runtime coordination: trigger polling, the recognition worker, and the
//! display update queue.
//!
//! - `pipeline`: one locate → capture → OCR → match cycle
//! - `worker`: runs cycles off the polling thread, one at a time
//! - `state`: per-trigger-key state machine
//! - `runner`: the polling loop tying them together
//! - `updates`: latest-wins queue feeding the display

pub mod pipeline;
pub mod runner;
pub mod state;
pub mod updates;
pub mod worker;

pub use pipeline::{RecognitionPipeline, Recognizer};
pub use runner::{Orchestrator, OrchestratorHandle};
pub use state::TriggerPhase;
pub use updates::{DisplayEvent, UpdateReceiver, UpdateSender, update_queue};
pub use worker::{JobOutcome, RecognitionWorker};
