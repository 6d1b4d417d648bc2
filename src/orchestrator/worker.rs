//! Single-slot recognition worker.
//!
//! Runs in a separate thread and processes one recognition at a time.
//! Submitting while a recognition is running is refused, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, SyncSender, TrySendError, channel, sync_channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::pipeline::Recognizer;
use crate::error::RecognitionError;
use crate::geometry::Point;
use crate::kind::LookupKind;
use crate::matching::MatchResult;

struct Job {
    kind: LookupKind,
    cursor: Point,
    reply: Sender<JobOutcome>,
}

/// A finished recognition.
#[derive(Debug)]
pub struct JobOutcome {
    pub kind: LookupKind,
    pub cursor: Point,
    pub result: Result<MatchResult, RecognitionError>,
    pub elapsed: Duration,
}

pub struct RecognitionWorker {
    jobs: Option<SyncSender<Job>>,
    busy: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RecognitionWorker {
    /// Spawns the worker thread.
    pub fn spawn(recognizer: Arc<dyn Recognizer>) -> Self {
        let (jobs, receiver) = sync_channel::<Job>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = busy.clone();

        let handle = thread::Builder::new()
            .name("recognition-worker".to_string())
            .spawn(move || run_worker(receiver, recognizer, worker_busy))
            .map_err(|e| tracing::error!("Failed to spawn recognition worker: {}", e))
            .ok();

        Self {
            jobs: handle.as_ref().map(|_| jobs),
            busy,
            handle,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Starts a recognition. Returns the channel its outcome will arrive on,
    /// or `None` if the worker is still busy with an earlier one.
    pub fn try_submit(&self, kind: LookupKind, cursor: Point) -> Option<Receiver<JobOutcome>> {
        let jobs = self.jobs.as_ref()?;
        if self.busy.swap(true, Ordering::SeqCst) {
            return None;
        }

        let (reply, outcome) = channel();
        match jobs.try_send(Job {
            kind,
            cursor,
            reply,
        }) {
            Ok(()) => Some(outcome),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.busy.store(false, Ordering::SeqCst);
                None
            }
        }
    }
}

impl Drop for RecognitionWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after the current job.
        // The thread is detached: a hung OCR call must not block shutdown.
        self.jobs = None;
        if let Some(handle) = self.handle.take()
            && !handle.is_finished()
        {
            tracing::debug!("Recognition still running, detaching worker thread");
        }
    }
}

/// Processes jobs until the channel is closed (sender dropped).
fn run_worker(receiver: Receiver<Job>, recognizer: Arc<dyn Recognizer>, busy: Arc<AtomicBool>) {
    tracing::debug!("Recognition worker started");

    for job in receiver {
        let started = Instant::now();
        let result = recognizer.recognize(job.kind, job.cursor);
        let elapsed = started.elapsed();
        tracing::trace!("Recognition ({}) finished in {:?}", job.kind, elapsed);

        busy.store(false, Ordering::SeqCst);
        // The orchestrator drops the receiver of an abandoned job
        let _ = job.reply.send(JobOutcome {
            kind: job.kind,
            cursor: job.cursor,
            result,
            elapsed,
        });
    }

    tracing::debug!("Recognition worker finished");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::kind::EntityKind;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Recognizer with a scripted result and an optional gate to hold it mid-run.
    pub(crate) struct FakeRecognizer {
        pub result: Mutex<Result<MatchResult, RecognitionError>>,
        pub calls: AtomicUsize,
        pub gate: Mutex<Option<Receiver<()>>>,
    }

    impl FakeRecognizer {
        pub fn returning(result: Result<MatchResult, RecognitionError>) -> Self {
            Self {
                result: Mutex::new(result),
                calls: AtomicUsize::new(0),
                gate: Mutex::new(None),
            }
        }

        /// Blocks every call until the returned sender sends or is dropped.
        pub fn gated(result: Result<MatchResult, RecognitionError>) -> (Self, Sender<()>) {
            let (open, gate) = channel();
            let recognizer = Self::returning(result);
            *recognizer.gate.lock().unwrap() = Some(gate);
            (recognizer, open)
        }
    }

    impl Recognizer for FakeRecognizer {
        fn recognize(&self, _kind: LookupKind, _cursor: Point) -> Result<MatchResult, RecognitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = self.gate.lock().unwrap().as_ref() {
                let _ = gate.recv();
            }
            self.result.lock().unwrap().clone()
        }
    }

    pub(crate) fn wolf() -> MatchResult {
        MatchResult {
            kind: EntityKind::Monster,
            entity_id: "狼".to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_submit_and_receive() {
        let worker = RecognitionWorker::spawn(Arc::new(FakeRecognizer::returning(Ok(wolf()))));
        let outcome = worker
            .try_submit(LookupKind::Monster, Point::new(3, 4))
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(outcome.result, Ok(wolf()));
        assert_eq!(outcome.cursor, Point::new(3, 4));
        assert!(!worker.is_busy());
    }

    #[test]
    fn test_single_slot_refuses_while_busy() {
        let (recognizer, open) = FakeRecognizer::gated(Err(RecognitionError::NoMatch));
        let recognizer = Arc::new(recognizer);
        let worker = RecognitionWorker::spawn(recognizer.clone());

        let first = worker.try_submit(LookupKind::Monster, Point::new(0, 0)).unwrap();
        assert!(worker.try_submit(LookupKind::Item, Point::new(0, 0)).is_none());

        open.send(()).unwrap();
        let outcome = first.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.result, Err(RecognitionError::NoMatch));
        assert!(worker.try_submit(LookupKind::Item, Point::new(0, 0)).is_some());
        drop(open);
    }

    #[test]
    fn test_abandoned_reply_does_not_kill_worker() {
        let worker = RecognitionWorker::spawn(Arc::new(FakeRecognizer::returning(Ok(wolf()))));
        drop(worker.try_submit(LookupKind::Monster, Point::new(0, 0)).unwrap());

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.is_busy() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let outcome = worker
            .try_submit(LookupKind::Monster, Point::new(0, 0))
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert!(outcome.result.is_ok());
    }

    #[test]
    fn test_drop_does_not_wait_for_running_recognition() {
        let (recognizer, open) = FakeRecognizer::gated(Ok(wolf()));
        let recognizer = Arc::new(recognizer);
        let worker = RecognitionWorker::spawn(recognizer.clone());
        let outcome = worker.try_submit(LookupKind::Monster, Point::new(0, 0)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while recognizer.calls.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        let started = Instant::now();
        drop(worker);
        assert!(started.elapsed() < Duration::from_secs(1));

        // The detached thread still finishes its job once the OCR call returns.
        open.send(()).unwrap();
        let outcome = outcome.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.result, Ok(wolf()));
    }
}
