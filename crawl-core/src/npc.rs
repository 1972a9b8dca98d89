//! NPC registry and spawn derivation.
//!
//! NPCs live for the lifetime of their session. Removal from a fight is
//! tracked by the combat engine through the disposition, never by deleting
//! the record.

use crate::error::EngineError;
use crate::tile::TileEntity;
use crate::world::{humanize, Disposition, NpcId, Position};
use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Kinds picked when a spawn does not name one.
pub const SPAWN_KINDS: [&str; 5] = ["goblin", "skeleton", "kobold", "bandit", "slime"];

/// Inclusive armor class range for spawned creatures.
pub const ARMOR_CLASS_RANGE: std::ops::RangeInclusive<u8> = 10..=15;

/// A spawned creature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    pub id: NpcId,
    pub name: String,
    pub kind: String,
    pub armor_class: u8,
    /// Where it was spawned.
    pub position: Position,
    pub disposition: Disposition,
}

impl Npc {
    /// The entry this NPC occupies in its tile's entity list.
    pub fn tile_entity(&self) -> TileEntity {
        TileEntity {
            id: self.id.clone(),
            kind: self.kind.clone(),
            disposition: self.disposition,
            name: Some(self.name.clone()),
        }
    }

    /// Flavor line returned to the caller after a spawn.
    pub fn arrival_message(&self) -> String {
        format!(
            "{} stands before you, watching your every move. Armor Class: {}.",
            self.name, self.armor_class
        )
    }
}

/// Per-session NPC storage.
#[derive(Debug, Clone, Default)]
pub struct NpcRegistry {
    npcs: HashMap<NpcId, Npc>,
}

impl NpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, npc: Npc) {
        self.npcs.insert(npc.id.clone(), npc);
    }

    pub fn get(&self, id: &NpcId) -> Result<&Npc, EngineError> {
        self.npcs
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("Unknown npc_id '{id}'")))
    }

    /// Change a registered NPC's disposition. Unknown ids are ignored.
    pub fn set_disposition(&mut self, id: &NpcId, disposition: Disposition) -> Option<&Npc> {
        let npc = self.npcs.get_mut(id)?;
        npc.disposition = disposition;
        Some(npc)
    }

    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Npc> {
        self.npcs.values()
    }
}

/// Random source for a spawn: the tile seed mixed with wall-clock
/// nanoseconds, so repeated spawns on one tile differ from each other and
/// from the tile's own generated content.
pub fn spawn_rng(tile_seed: u64) -> ChaCha8Rng {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
    ChaCha8Rng::seed_from_u64(tile_seed ^ nanos)
}

/// Build a new hostile NPC. Blank `name`/`kind` count as absent: the kind
/// is then drawn from `SPAWN_KINDS` and the name synthesized from the kind
/// plus a short random tag.
pub fn derive_npc<R: Rng>(
    rng: &mut R,
    name: Option<&str>,
    kind: Option<&str>,
    position: Position,
) -> Npc {
    let kind = kind
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| SPAWN_KINDS[rng.gen_range(0..SPAWN_KINDS.len())].to_string());

    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let tag = Uuid::new_v4().simple().to_string();
            format!("{} {}", humanize(&kind), &tag[..4])
        });

    let armor_class = rng.gen_range(ARMOR_CLASS_RANGE);

    Npc {
        id: NpcId::for_name(&name),
        name,
        kind,
        armor_class,
        position,
        disposition: Disposition::Hostile,
    }
}
