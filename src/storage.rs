//! JSON save store.
//!
//! All slots live in one document, `{"saves": [...]}`. Every write reads the whole
//! document, edits one slot and writes it back through [`write_atomic`]. Slots stay raw
//! JSON until one is addressed, so damage in one slot never reaches another. The on-disk
//! shape of a slot is described by the `*Record` types, whose fields are optional so
//! damage can be detected; [`SlotRecord::restore`] turns a record into a fully valid
//! [`SaveSlot`] or the documented fallback.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::write_atomic;
use crate::error::StoreError;
use crate::inventory::{Inventory, ItemRecord};
use crate::model::{Pet, Stat, StatKind, Stats, Variant};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Keys of a slot object that `SlotRecord` tracks; everything else rides along in `extra`.
const SLOT_KEYS: [&str; 5] = ["save_id", "username", "pet", "inventory", "game_progress"];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SaveDocument {
    pub saves: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub save_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet: Option<PetRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<ItemRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_progress: Option<ProgressRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PetRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hunger: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fun: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grooming: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played: Option<String>,
}

impl StatsRecord {
    fn get(&self, kind: StatKind) -> Option<i64> {
        match kind {
            StatKind::Hunger => self.hunger,
            StatKind::Fun => self.fun,
            StatKind::Sleep => self.sleep,
            StatKind::Grooming => self.grooming,
        }
    }

    fn to_stats(&self) -> Result<Stats, String> {
        let mut stats = Stats::default();
        for kind in StatKind::ALL {
            let value = self
                .get(kind)
                .ok_or_else(|| format!("missing pet.stats.{kind}"))?;
            let stat = Stat::new(value);
            match kind {
                StatKind::Hunger => stats.hunger = stat,
                StatKind::Fun => stats.fun = stat,
                StatKind::Sleep => stats.sleep = stat,
                StatKind::Grooming => stats.grooming = stat,
            }
        }
        Ok(stats)
    }
}

impl From<Stats> for StatsRecord {
    fn from(s: Stats) -> Self {
        Self {
            hunger: Some(s.hunger.value() as i64),
            fun: Some(s.fun.value() as i64),
            sleep: Some(s.sleep.value() as i64),
            grooming: Some(s.grooming.value() as i64),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameProgress {
    pub level: u32,
    pub last_played: Option<NaiveDateTime>,
}

impl Default for GameProgress {
    fn default() -> Self {
        Self {
            level: 1,
            last_played: None,
        }
    }
}

/// A fully validated save slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveSlot {
    pub save_id: u32,
    pub username: String,
    pub pet: Pet,
    pub inventory: Inventory,
    pub progress: GameProgress,
}

/// Result of restoring a slot. `degraded` names what was wrong when the fallback pet
/// and level were substituted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoredSlot {
    pub slot: SaveSlot,
    pub degraded: Option<String>,
}

impl RestoredSlot {
    /// Fallback pet at level 1 with nothing else known.
    pub fn fallback(save_id: u32, reason: impl Into<String>) -> Self {
        Self {
            slot: SaveSlot {
                save_id,
                username: String::new(),
                pet: Pet::fallback(None),
                inventory: Inventory::new(),
                progress: GameProgress::default(),
            },
            degraded: Some(reason.into()),
        }
    }
}

/// One line of a load-game listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotSummary {
    pub save_id: u32,
    pub username: String,
    pub pet_name: String,
    pub pet_type: String,
    pub level: u32,
    pub last_played: Option<String>,
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>().ok()
}

fn format_timestamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

fn level_from(raw: Option<i64>) -> u32 {
    raw.map(|l| l.clamp(1, u32::MAX as i64) as u32).unwrap_or(1)
}

/// The `save_id` of a raw slot, if it has a usable one.
pub fn slot_id(slot: &Value) -> Option<u32> {
    slot.get("save_id")?
        .as_u64()
        .and_then(|id| u32::try_from(id).ok())
}

impl SlotRecord {
    /// Reads one raw slot. A slot whose fields have the wrong JSON types keeps what can
    /// still be read (username, pet name, progress, well-formed inventory entries) and
    /// returns the parse error alongside.
    pub fn from_value(save_id: u32, slot: &Value) -> (Self, Option<String>) {
        match serde_json::from_value::<SlotRecord>(slot.clone()) {
            Ok(record) => (record, None),
            Err(e) => (Self::salvage(save_id, slot), Some(e.to_string())),
        }
    }

    fn salvage(save_id: u32, slot: &Value) -> Self {
        let text = |pointer: &str| {
            slot.pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let inventory = slot.get("inventory").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<ItemRecord>(item.clone()).ok())
                .collect()
        });
        let game_progress = slot
            .get("game_progress")
            .filter(|p| p.is_object())
            .map(|_| ProgressRecord {
                level: slot.pointer("/game_progress/level").and_then(Value::as_i64),
                last_played: text("/game_progress/last_played"),
            });
        let extra = slot
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(k, _)| !SLOT_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            save_id,
            username: text("/username"),
            pet: Some(PetRecord {
                name: text("/pet/name"),
                kind: None,
                stats: None,
            }),
            inventory,
            game_progress,
            extra,
        }
    }

    /// A fresh slot: empty pet name and type until a pet is chosen, full stats, the
    /// starter inventory and level 1.
    pub fn new_game(save_id: u32, username: &str, now: NaiveDateTime) -> Self {
        Self {
            save_id,
            username: Some(username.to_string()),
            pet: Some(PetRecord {
                name: Some(String::new()),
                kind: Some(String::new()),
                stats: Some(Stats::default().into()),
            }),
            inventory: Some(Inventory::starter().to_records()),
            game_progress: Some(ProgressRecord {
                level: Some(1),
                last_played: Some(format_timestamp(now)),
            }),
            extra: Map::new(),
        }
    }

    fn strict_pet(&self) -> Result<Pet, String> {
        let pet = self.pet.as_ref().ok_or("missing pet")?;
        let name = pet.name.as_deref().ok_or("missing pet.name")?;
        let kind = pet.kind.as_deref().ok_or("missing pet.type")?;
        let variant = kind.parse::<Variant>().map_err(|e| e.to_string())?;
        let stats = pet
            .stats
            .as_ref()
            .ok_or("missing pet.stats")?
            .to_stats()?;
        Ok(Pet::with_stats(name, variant, stats))
    }

    /// Validates this record. Any problem with the username, pet or progress section
    /// swaps in the fallback pet (Pegasus, every stat 5) at level 1; the inventory keeps
    /// whatever entries are intact.
    pub fn restore(&self) -> RestoredSlot {
        let inventory = self
            .inventory
            .clone()
            .map(Inventory::from_records)
            .unwrap_or_default();
        let progress = self.game_progress.as_ref();
        let last_played = progress
            .and_then(|p| p.last_played.as_deref())
            .and_then(parse_timestamp);

        let checked = self
            .username
            .clone()
            .ok_or_else(|| "missing username".to_string())
            .and_then(|username| self.strict_pet().map(|pet| (username, pet)))
            .and_then(|(username, pet)| {
                progress
                    .map(|p| (username, pet, level_from(p.level)))
                    .ok_or_else(|| "missing game_progress".to_string())
            });

        match checked {
            Ok((username, pet, level)) => RestoredSlot {
                slot: SaveSlot {
                    save_id: self.save_id,
                    username,
                    pet,
                    inventory,
                    progress: GameProgress { level, last_played },
                },
                degraded: None,
            },
            Err(reason) => {
                let name = self.pet.as_ref().and_then(|p| p.name.as_deref());
                RestoredSlot {
                    slot: SaveSlot {
                        save_id: self.save_id,
                        username: self.username.clone().unwrap_or_default(),
                        pet: Pet::fallback(name),
                        inventory,
                        progress: GameProgress {
                            level: 1,
                            last_played,
                        },
                    },
                    degraded: Some(reason),
                }
            }
        }
    }

    /// Overwrites the tracked fields with `slot`, leaving unknown keys alone.
    pub fn write_slot(&mut self, slot: &SaveSlot) {
        self.username = Some(slot.username.clone());
        let pet = self.pet.get_or_insert_with(PetRecord::default);
        pet.name = Some(slot.pet.name().to_string());
        pet.kind = Some(slot.pet.variant().tag().to_string());
        pet.stats = Some(slot.pet.stats().into());
        self.inventory = Some(slot.inventory.to_records());
        let progress = self.game_progress.get_or_insert_with(ProgressRecord::default);
        progress.level = Some(slot.progress.level as i64);
        if let Some(t) = slot.progress.last_played {
            progress.last_played = Some(format_timestamp(t));
        }
    }

    fn summary(&self) -> SlotSummary {
        let pet = self.pet.clone().unwrap_or_default();
        let progress = self.game_progress.clone().unwrap_or_default();
        SlotSummary {
            save_id: self.save_id,
            username: self.username.clone().unwrap_or_default(),
            pet_name: pet.name.unwrap_or_default(),
            pet_type: pet.kind.unwrap_or_default(),
            level: level_from(progress.level),
            last_played: progress.last_played,
        }
    }
}

/// Highest existing id plus one. Gaps are never reused.
pub fn next_save_id(saves: &[Value]) -> u32 {
    saves
        .iter()
        .filter_map(slot_id)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

#[derive(Clone, Debug)]
pub struct SaveStore {
    path: PathBuf,
}

impl SaveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// A missing file reads as an empty document.
    pub fn read_document(&self) -> Result<SaveDocument, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no save file yet");
                return Ok(SaveDocument::default());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_str(&text).map_err(|e| StoreError::Malformed(e.to_string()))
    }

    fn write_document(&self, doc: &SaveDocument) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(doc)?;
        write_atomic(&self.path, &data).map_err(|e| self.io_err(e))
    }

    /// Read-modify-write of the slot with `save_id`. A damaged slot is rebuilt from what
    /// can be salvaged before `edit` runs.
    fn edit_slot(
        &self,
        save_id: u32,
        edit: impl FnOnce(&mut SlotRecord),
    ) -> Result<(), StoreError> {
        let mut doc = self.read_document()?;
        let slot = doc
            .saves
            .iter_mut()
            .find(|s| slot_id(s) == Some(save_id))
            .ok_or(StoreError::SlotNotFound(save_id))?;
        let (mut record, damage) = SlotRecord::from_value(save_id, slot);
        if let Some(reason) = damage {
            warn!(save_id, reason = %reason, "rewriting damaged save slot");
        }
        edit(&mut record);
        *slot = serde_json::to_value(&record)?;
        self.write_document(&doc)
    }

    pub fn create(&self, username: &str, now: NaiveDateTime) -> Result<u32, StoreError> {
        let mut doc = self.read_document()?;
        let save_id = next_save_id(&doc.saves);
        doc.saves
            .push(serde_json::to_value(SlotRecord::new_game(save_id, username, now))?);
        self.write_document(&doc)?;
        info!(save_id, username, "new save added");
        Ok(save_id)
    }

    pub fn find(&self, save_id: u32) -> Result<RestoredSlot, StoreError> {
        let doc = self.read_document()?;
        let slot = doc
            .saves
            .iter()
            .find(|s| slot_id(s) == Some(save_id))
            .ok_or(StoreError::SlotNotFound(save_id))?;
        let (record, damage) = SlotRecord::from_value(save_id, slot);
        let mut restored = record.restore();
        if damage.is_some() {
            restored.degraded = damage;
        }
        if let Some(reason) = &restored.degraded {
            warn!(save_id, reason = %reason, "save slot incomplete");
        }
        Ok(restored)
    }

    pub fn update(&self, slot: &SaveSlot) -> Result<(), StoreError> {
        self.edit_slot(slot.save_id, |record| record.write_slot(slot))?;
        debug!(save_id = slot.save_id, level = slot.progress.level, "save slot updated");
        Ok(())
    }

    /// Records the chosen pet's name and type. Stored stats are left as they are.
    pub fn assign_pet(&self, save_id: u32, name: &str, variant: Variant) -> Result<(), StoreError> {
        self.edit_slot(save_id, |record| {
            let pet = record.pet.get_or_insert_with(PetRecord::default);
            pet.name = Some(name.to_string());
            pet.kind = Some(variant.tag().to_string());
            if pet.stats.is_none() {
                pet.stats = Some(Stats::default().into());
            }
        })?;
        info!(save_id, name, pet_type = %variant, "pet chosen");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<SlotSummary>, StoreError> {
        Ok(self
            .read_document()?
            .saves
            .iter()
            .filter_map(|slot| match slot_id(slot) {
                Some(id) => Some(SlotRecord::from_value(id, slot).0.summary()),
                None => {
                    warn!("skipping save slot without a usable save_id");
                    None
                }
            })
            .collect())
    }
}
