//! Entity database: monsters, events, and items the matcher can recognize.
//!
//! Loaded once from JSON files in the data directory. The database is
//! immutable; a reload builds a new one and swaps it in whole.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::kind::EntityKind;

pub const MONSTERS_FILE: &str = "monsters.json";
pub const EVENTS_FILE: &str = "events.json";
pub const ITEMS_FILE: &str = "items.json";

/// A recognizable entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Stable key reported in match results. The localized name for monsters
    /// and events, the item UUID for items.
    pub id: String,
    /// Source-language (English) name.
    pub canonical_name: String,
    /// In-game (Chinese) name, which is what the OCR usually reads.
    pub localized_name: String,
    pub kind: EntityKind,
}

/// One selectable option of an event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChoice {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
struct MonsterEntry {
    name_zh: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct EventEntry {
    name: String,
    #[serde(default)]
    name_en: String,
    #[serde(default)]
    choices: Vec<EventChoice>,
}

#[derive(Deserialize)]
struct ItemEntry {
    #[serde(default)]
    name_zh: String,
    #[serde(default)]
    name: String,
}

#[derive(Clone, Debug, Default)]
pub struct EntityDatabase {
    monsters: Vec<EntityRecord>,
    events: Vec<EntityRecord>,
    items: Vec<EntityRecord>,
    event_choices: HashMap<String, Vec<EventChoice>>,
    by_id: HashMap<(EntityKind, String), usize>,
}

impl EntityDatabase {
    /// Builds a database from already-constructed records.
    pub fn from_records(records: impl IntoIterator<Item = EntityRecord>) -> Self {
        let mut db = EntityDatabase::default();
        for record in records {
            db.insert(record);
        }
        db
    }

    fn insert(&mut self, record: EntityRecord) {
        let key = (record.kind, record.id.clone());
        if self.by_id.contains_key(&key) {
            tracing::debug!("Duplicate {} '{}' ignored", record.kind, record.id);
            return;
        }
        self.by_id.insert(key, self.records(record.kind).len());
        self.list_mut(record.kind).push(record);
    }

    fn list_mut(&mut self, kind: EntityKind) -> &mut Vec<EntityRecord> {
        match kind {
            EntityKind::Monster => &mut self.monsters,
            EntityKind::Event => &mut self.events,
            EntityKind::Item => &mut self.items,
        }
    }

    /// Loads `monsters.json`, `events.json`, and `items.json` from `data_dir`.
    ///
    /// A missing file yields an empty collection for that kind; a malformed one is an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut db = EntityDatabase::default();

        let monsters_path = data_dir.join(MONSTERS_FILE);
        if monsters_path.exists() {
            let contents = fs::read_to_string(&monsters_path)
                .with_context(|| format!("Failed to read {}", monsters_path.display()))?;
            let entries: Vec<MonsterEntry> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", monsters_path.display()))?;
            for entry in entries {
                db.insert(EntityRecord {
                    id: entry.name_zh.clone(),
                    canonical_name: entry.name,
                    localized_name: entry.name_zh,
                    kind: EntityKind::Monster,
                });
            }
        } else {
            tracing::warn!("{} not found, no monsters loaded", monsters_path.display());
        }

        let events_path = data_dir.join(EVENTS_FILE);
        if events_path.exists() {
            let contents = fs::read_to_string(&events_path)
                .with_context(|| format!("Failed to read {}", events_path.display()))?;
            let entries: Vec<EventEntry> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", events_path.display()))?;
            for entry in entries {
                db.event_choices.insert(entry.name.clone(), entry.choices);
                db.insert(EntityRecord {
                    id: entry.name.clone(),
                    canonical_name: entry.name_en,
                    localized_name: entry.name,
                    kind: EntityKind::Event,
                });
            }
        } else {
            tracing::warn!("{} not found, no events loaded", events_path.display());
        }

        let items_path = data_dir.join(ITEMS_FILE);
        if items_path.exists() {
            let contents = fs::read_to_string(&items_path)
                .with_context(|| format!("Failed to read {}", items_path.display()))?;
            // Keyed by UUID. BTreeMap keeps iteration order stable between runs.
            let entries: BTreeMap<String, ItemEntry> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", items_path.display()))?;
            for (uuid, entry) in entries {
                if entry.name_zh.is_empty() && entry.name.is_empty() {
                    continue;
                }
                db.insert(EntityRecord {
                    id: uuid,
                    canonical_name: entry.name,
                    localized_name: entry.name_zh,
                    kind: EntityKind::Item,
                });
            }
        } else {
            tracing::warn!("{} not found, no items loaded", items_path.display());
        }

        tracing::info!(
            "Entity database loaded: {} monsters, {} events, {} items",
            db.monsters.len(),
            db.events.len(),
            db.items.len()
        );
        Ok(db)
    }

    /// All records of one kind, in load order.
    pub fn records(&self, kind: EntityKind) -> &[EntityRecord] {
        match kind {
            EntityKind::Monster => &self.monsters,
            EntityKind::Event => &self.events,
            EntityKind::Item => &self.items,
        }
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&EntityRecord> {
        self.by_id
            .get(&(kind, id.to_string()))
            .map(|&idx| &self.records(kind)[idx])
    }

    pub fn event_choices(&self, id: &str) -> &[EventChoice] {
        self.event_choices
            .get(id)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.monsters.len() + self.events.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
