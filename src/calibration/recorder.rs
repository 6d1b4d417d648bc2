//! Interactive recording of the calibration corners.
//!
//! The user hovers a reference card and presses the record key once per
//! corner: for each lookup kind, the four corners of the icon and then the
//! four corners of the name.

use anyhow::Result;
use std::path::Path;
use std::time::Duration;

use super::anchors::{Anchor, CalibrationFile, Quad};
use crate::config::KeyConfig;
use crate::geometry::Point;
use crate::input::{InputSource, KeyEdge};
use crate::kind::LookupKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    Icon,
    Name,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// One corner to record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationStep {
    pub kind: LookupKind,
    pub region: Region,
    pub corner: Corner,
}

impl std::fmt::Display for CalibrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let region = match self.region {
            Region::Icon => "icon",
            Region::Name => "name",
        };
        let corner = match self.corner {
            Corner::TopLeft => "TOP-LEFT",
            Corner::TopRight => "TOP-RIGHT",
            Corner::BottomLeft => "BOTTOM-LEFT",
            Corner::BottomRight => "BOTTOM-RIGHT",
        };
        write!(f, "{} {} - {} corner", self.kind, region, corner)
    }
}

const CORNERS: [Corner; 4] = [
    Corner::TopLeft,
    Corner::TopRight,
    Corner::BottomLeft,
    Corner::BottomRight,
];

/// All steps, in recording order.
pub fn all_steps() -> Vec<CalibrationStep> {
    LookupKind::ALL
        .iter()
        .flat_map(|&kind| {
            [Region::Icon, Region::Name].into_iter().flat_map(move |region| {
                CORNERS
                    .into_iter()
                    .map(move |corner| CalibrationStep { kind, region, corner })
            })
        })
        .collect()
}

/// Step machine collecting one point per step.
pub struct Recorder {
    steps: Vec<CalibrationStep>,
    points: Vec<Point>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            steps: all_steps(),
            points: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<CalibrationStep> {
        self.steps.get(self.points.len()).copied()
    }

    /// Step number (1-based) for display.
    pub fn step_number(&self) -> usize {
        self.points.len() + 1
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == self.steps.len()
    }

    /// Records the point for the current step. Ignored once complete.
    pub fn record(&mut self, point: Point) {
        if !self.is_complete() {
            self.points.push(point);
        }
    }

    /// Builds the calibration file once every step is recorded.
    pub fn finish(&self) -> Option<CalibrationFile> {
        if !self.is_complete() {
            return None;
        }
        let mut file = CalibrationFile::default();
        for (kind_idx, &kind) in LookupKind::ALL.iter().enumerate() {
            let base = kind_idx * 8;
            let quad = |offset: usize| Quad {
                top_left: self.points[base + offset],
                top_right: self.points[base + offset + 1],
                bottom_left: self.points[base + offset + 2],
                bottom_right: self.points[base + offset + 3],
            };
            file.set_anchor(
                kind,
                Anchor {
                    icon: quad(0),
                    name: quad(4),
                },
            );
        }
        Some(file)
    }
}

/// What a poll of the session produced.
#[derive(Debug, PartialEq)]
pub enum SessionEvent {
    Idle,
    Recorded(CalibrationStep, Point),
    Complete(CalibrationFile),
    Aborted,
}

/// A recorder driven by polled key presses.
pub struct CalibrationSession {
    recorder: Recorder,
    record_key: u16,
    abort_key: u16,
    record_edge: KeyEdge,
    abort_edge: KeyEdge,
}

impl CalibrationSession {
    pub fn new(keys: &KeyConfig) -> Self {
        Self {
            recorder: Recorder::new(),
            record_key: keys.calibration_key,
            abort_key: keys.calibration_abort_key,
            record_edge: KeyEdge::default(),
            abort_edge: KeyEdge::default(),
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn poll(&mut self, input: &dyn InputSource) -> SessionEvent {
        if self.abort_edge.pressed(input.is_key_down(self.abort_key)) {
            return SessionEvent::Aborted;
        }
        if !self.record_edge.pressed(input.is_key_down(self.record_key)) {
            return SessionEvent::Idle;
        }

        let (Some(step), Some(point)) = (self.recorder.current(), input.cursor_position()) else {
            tracing::warn!("Could not read cursor position, press again");
            return SessionEvent::Idle;
        };
        self.recorder.record(point);

        match self.recorder.finish() {
            Some(file) => SessionEvent::Complete(file),
            None => SessionEvent::Recorded(step, point),
        }
    }
}

fn print_current_step(recorder: &Recorder) {
    if let Some(step) = recorder.current() {
        tracing::info!(
            "[{}/{}] Hover the {} and press the record key",
            recorder.step_number(),
            recorder.total_steps(),
            step
        );
    }
}

/// Runs a calibration session to completion, saving the result to `path`.
///
/// Returns `Ok(false)` if the user aborted.
pub fn run_calibration(
    input: &dyn InputSource,
    keys: &KeyConfig,
    path: &Path,
    poll_interval: Duration,
) -> Result<bool> {
    let mut session = CalibrationSession::new(keys);

    tracing::info!("=======================================================");
    tracing::info!("           CALIBRATION MODE STARTED");
    tracing::info!("=======================================================");
    tracing::info!(
        "Record key: VK 0x{:02X}, abort key: VK 0x{:02X}",
        keys.calibration_key,
        keys.calibration_abort_key
    );
    print_current_step(session.recorder());

    loop {
        match session.poll(input) {
            SessionEvent::Idle => {}
            SessionEvent::Recorded(step, point) => {
                tracing::info!("Recorded {}: ({}, {})", step, point.x, point.y);
                print_current_step(session.recorder());
            }
            SessionEvent::Complete(mut file) => {
                file.save(path)?;
                tracing::info!("Calibration complete.");
                return Ok(true);
            }
            SessionEvent::Aborted => {
                tracing::info!("Calibration aborted by user.");
                return Ok(false);
            }
        }
        std::thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::tests::FakeInput;

    #[test]
    fn test_sixteen_steps_in_order() {
        let steps = all_steps();
        assert_eq!(steps.len(), 16);
        assert_eq!(
            steps[0],
            CalibrationStep {
                kind: LookupKind::Monster,
                region: Region::Icon,
                corner: Corner::TopLeft
            }
        );
        assert_eq!(steps[4].region, Region::Name);
        assert_eq!(steps[8].kind, LookupKind::Item);
        assert_eq!(steps[15].corner, Corner::BottomRight);
        assert_eq!(steps[0].to_string(), "monster icon - TOP-LEFT corner");
    }

    #[test]
    fn test_recorder_builds_file() {
        let mut recorder = Recorder::new();
        for i in 0..16 {
            assert!(recorder.finish().is_none());
            recorder.record(Point::new(i, i * 10));
        }
        assert!(recorder.is_complete());
        recorder.record(Point::new(99, 99));

        let file = recorder.finish().unwrap();
        let monster = file.anchor(LookupKind::Monster).unwrap();
        assert_eq!(monster.icon.top_left, Point::new(0, 0));
        assert_eq!(monster.name.bottom_right, Point::new(7, 70));
        let item = file.anchor(LookupKind::Item).unwrap();
        assert_eq!(item.icon.top_left, Point::new(8, 80));
        assert_eq!(item.name.bottom_right, Point::new(15, 150));
    }

    #[test]
    fn test_session_records_on_key_edges_only() {
        let keys = KeyConfig::default();
        let input = FakeInput::default();
        input.move_to(10, 20);
        let mut session = CalibrationSession::new(&keys);

        assert_eq!(session.poll(&input), SessionEvent::Idle);
        input.press(keys.calibration_key);
        assert!(matches!(session.poll(&input), SessionEvent::Recorded(_, p) if p == Point::new(10, 20)));
        // Still held: no second record
        assert_eq!(session.poll(&input), SessionEvent::Idle);
        input.release(keys.calibration_key);
        assert_eq!(session.poll(&input), SessionEvent::Idle);
        assert_eq!(session.recorder().step_number(), 2);
    }

    #[test]
    fn test_session_completes_after_all_steps() {
        let keys = KeyConfig::default();
        let input = FakeInput::default();
        input.move_to(1, 1);
        let mut session = CalibrationSession::new(&keys);

        let mut last = SessionEvent::Idle;
        for _ in 0..16 {
            input.press(keys.calibration_key);
            last = session.poll(&input);
            input.release(keys.calibration_key);
            session.poll(&input);
        }
        assert!(matches!(last, SessionEvent::Complete(_)));
    }

    #[test]
    fn test_session_abort() {
        let keys = KeyConfig::default();
        let input = FakeInput::default();
        let mut session = CalibrationSession::new(&keys);

        input.press(keys.calibration_abort_key);
        assert_eq!(session.poll(&input), SessionEvent::Aborted);
    }

    #[test]
    fn test_run_calibration_aborted_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("position.json");
        let keys = KeyConfig::default();
        let input = FakeInput::default();
        input.press(keys.calibration_abort_key);

        let saved = run_calibration(&input, &keys, &path, Duration::from_millis(1)).unwrap();
        assert!(!saved);
        assert!(!path.exists());
    }
}
