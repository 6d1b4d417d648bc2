//! The calibration file: recorded screen corners of the icon and name
//! regions of a reference card, per lookup kind.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::geometry::{Area, Point};
use crate::kind::LookupKind;

/// Four labelled corners of a region, in screen coordinates at recording time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl Quad {
    pub fn corners(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_left, self.bottom_right]
    }

    /// Smallest axis-aligned box holding all four corners.
    pub fn bounds(&self) -> Area {
        let corners = self.corners();
        let xs = corners.iter().map(|p| p.x);
        let ys = corners.iter().map(|p| p.y);
        Area {
            min_x: xs.clone().min().unwrap_or(0) as f64,
            max_x: xs.max().unwrap_or(0) as f64,
            min_y: ys.clone().min().unwrap_or(0) as f64,
            max_y: ys.max().unwrap_or(0) as f64,
        }
    }
}

/// Icon and name regions of one reference card.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub icon: Quad,
    pub name: Quad,
}

/// Offset vector from the icon region to the name region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NameOffsets {
    /// name.top_left - icon.top_left
    pub top_left: (i32, i32),
    /// name.bottom_right - icon.bottom_right
    pub bottom_right: (i32, i32),
}

impl Anchor {
    pub fn name_offsets(&self) -> NameOffsets {
        NameOffsets {
            top_left: (
                self.name.top_left.x - self.icon.top_left.x,
                self.name.top_left.y - self.icon.top_left.y,
            ),
            bottom_right: (
                self.name.bottom_right.x - self.icon.bottom_right.x,
                self.name.bottom_right.y - self.icon.bottom_right.y,
            ),
        }
    }
}

/// Contents of `position.json`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monster: Option<Anchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Anchor>,
}

impl CalibrationFile {
    pub fn anchor(&self, kind: LookupKind) -> Option<&Anchor> {
        match kind {
            LookupKind::Monster => self.monster.as_ref(),
            LookupKind::Item => self.item.as_ref(),
        }
    }

    pub fn set_anchor(&mut self, kind: LookupKind, anchor: Anchor) {
        match kind {
            LookupKind::Monster => self.monster = Some(anchor),
            LookupKind::Item => self.item = Some(anchor),
        }
    }

    /// Loads a calibration file. A missing file is `Ok(None)`; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(file))
    }

    /// Stamps the file with the current local time and writes it as pretty JSON.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Calibration saved to {}", path.display());
        Ok(())
    }
}
