//! Per-session world state.
//!
//! A `Session` holds everything one player's world remembers: position,
//! heading, turn counter, the lazily grown tile cache, the event log and
//! journal, spawned NPCs and the current fight. The engine keeps each
//! session behind its own mutex; every method here runs with that lock held
//! and validates its inputs before touching any state, so a rejected call
//! leaves the session exactly as it was.

use crate::combat::{AttackOutcome, CombatEndReason, CombatState, CombatStatus, Enemy};
use crate::config::{EngineConfig, SessionSettings};
use crate::dice::{Advantage, DiceExpression};
use crate::error::{EngineError, Result};
use crate::journal::{narrative_line, rollup_line, Event, EventKind, EventLog, EventSequence, Journal};
use crate::npc::{derive_npc, Npc, NpcRegistry};
use crate::tile::{generate_tile, Tile, TileRecord};
use crate::world::{resolve_move, Disposition, EventId, Heading, NpcId, Position, SessionId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Largest number of enemies an unnamed encounter rolls.
const MAX_ENCOUNTER_SIZE: usize = 3;

// ============================================================================
// Public records
// ============================================================================

/// The public view of a session, built fresh for every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: SessionId,
    pub turn: u64,
    pub position: Position,
    pub heading: Heading,
    pub tile: Tile,
    pub salient_facts: Vec<String>,
    pub exits: Vec<Heading>,
    pub max_narrative_words: u32,
    pub theme: String,
    pub tone: String,
    pub combat: Option<CombatState>,
}

/// Result of a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReport {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub event_id: EventId,
}

/// Result of a spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnReport {
    pub npc: Npc,
    pub message: String,
    pub event_id: EventId,
}

/// Acknowledgement for narration logged against an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeAck {
    pub ok: bool,
    /// The event the narration describes.
    pub event_id: EventId,
    /// The `narrative` event recording it.
    pub logged_event_id: EventId,
    pub journal_entry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalView {
    pub session_id: SessionId,
    pub turn: u64,
    pub summary: Vec<String>,
}

/// Session metadata for get/set/list operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub turn: u64,
    pub position: Position,
    pub heading: Heading,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterReport {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// Enemies that joined with this encounter.
    pub enemies: Vec<Enemy>,
    pub message: String,
    pub event_id: EventId,
}

/// What the caller wants to hit, and with what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub weapon: String,
    /// Damage dice notation, e.g. `1d8+3`.
    pub damage: String,
    #[serde(default)]
    pub advantage: Advantage,
    #[serde(default)]
    pub target: Option<NpcId>,
}

impl AttackRequest {
    pub fn new(weapon: impl Into<String>, damage: impl Into<String>) -> Self {
        Self {
            weapon: weapon.into(),
            damage: damage.into(),
            advantage: Advantage::Normal,
            target: None,
        }
    }

    pub fn with_advantage(mut self, advantage: Advantage) -> Self {
        self.advantage = advantage;
        self
    }

    pub fn with_target(mut self, target: impl Into<NpcId>) -> Self {
        self.target = Some(target.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackReport {
    pub message: String,
    pub outcome: AttackOutcome,
    /// Combat after the attack. Inactive when this attack won the fight.
    pub combat: CombatState,
    pub event_id: EventId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEndReport {
    pub ended: bool,
    pub message: String,
    pub event_id: Option<EventId>,
}

// ============================================================================
// Session
// ============================================================================

/// Mutable world state for one session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    settings: SessionSettings,
    position: Position,
    heading: Heading,
    turn: u64,
    tiles: HashMap<Position, TileRecord>,
    events: EventLog,
    journal: Journal,
    npcs: NpcRegistry,
    combat: Option<CombatState>,
    rollup_interval: u64,
    snippet_chars: usize,
    started: EventId,
}

impl Session {
    /// A new session at the origin facing north, with its `session_start`
    /// event already logged.
    pub(crate) fn start(
        id: SessionId,
        settings: SessionSettings,
        config: &EngineConfig,
        sequence: &EventSequence,
    ) -> Self {
        let started = sequence.next_id();
        let mut session = Self {
            id,
            settings,
            position: Position::ORIGIN,
            heading: Heading::North,
            turn: 0,
            tiles: HashMap::new(),
            events: EventLog::new(config.event_log_ceiling, config.event_log_retain),
            journal: Journal::new(config.journal_max_entries),
            npcs: NpcRegistry::new(),
            combat: None,
            rollup_interval: config.journal_rollup_interval.max(1),
            snippet_chars: config.narrative_snippet_chars,
            started,
        };
        session.ensure_tile(Position::ORIGIN);
        session.events.append(
            started,
            EventKind::SessionStart {
                position: Position::ORIGIN,
            },
        );
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Id of the `session_start` event; orders sessions by creation.
    pub fn started(&self) -> EventId {
        self.started
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn journal_lines(&self) -> Vec<String> {
        self.journal.lines()
    }

    pub fn npcs(&self) -> &NpcRegistry {
        &self.npcs
    }

    pub fn combat(&self) -> Option<&CombatState> {
        self.combat.as_ref()
    }

    /// A cached tile, without generating it.
    pub fn cached_tile(&self, pos: Position) -> Option<&TileRecord> {
        self.tiles.get(&pos)
    }

    pub fn cached_tile_count(&self) -> usize {
        self.tiles.len()
    }

    fn ensure_tile(&mut self, pos: Position) -> &mut TileRecord {
        let id = &self.id;
        self.tiles.entry(pos).or_insert_with(|| {
            tracing::debug!(session_id = %id, position = %pos, "generating tile");
            generate_tile(id, pos)
        })
    }

    /// Seed of the tile under the player.
    pub(crate) fn current_tile_seed(&mut self) -> u64 {
        let pos = self.position;
        self.ensure_tile(pos).seed
    }

    fn record(&mut self, sequence: &EventSequence, kind: EventKind) -> EventId {
        let id = sequence.next_id();
        self.events.append(id, kind);
        id
    }

    pub(crate) fn snapshot(&mut self) -> Snapshot {
        let position = self.position;
        let record = self.ensure_tile(position).clone();
        Snapshot {
            session_id: self.id.clone(),
            turn: self.turn,
            position,
            heading: self.heading,
            exits: record.tile.exits.clone(),
            salient_facts: record.salient_facts,
            tile: record.tile,
            max_narrative_words: self.settings.max_narrative_words,
            theme: self.settings.theme.clone(),
            tone: self.settings.tone.clone(),
            combat: self.combat.clone(),
        }
    }

    pub(crate) fn summary(&self, active: bool) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            turn: self.turn,
            position: self.position,
            heading: self.heading,
            active,
        }
    }

    // ------------------------------------------------------------------------
    // Exploration
    // ------------------------------------------------------------------------

    pub(crate) fn move_toward(&mut self, token: &str, sequence: &EventSequence) -> Result<MoveReport> {
        let resolved = resolve_move(token, self.heading)?;

        let from = self.position;
        let to = from.step(resolved.direction);
        self.position = to;
        self.heading = resolved.heading;
        self.turn += 1;
        self.ensure_tile(to);

        let event_id = self.record(
            sequence,
            EventKind::Move {
                from,
                to,
                direction: resolved.direction,
                heading: resolved.heading,
            },
        );

        if self.turn % self.rollup_interval == 0 {
            self.rollup();
        }

        Ok(MoveReport {
            snapshot: self.snapshot(),
            event_id,
        })
    }

    fn rollup(&mut self) {
        let (turn, position) = (self.turn, self.position);
        let facts = self.ensure_tile(position).salient_facts.clone();
        let line = rollup_line(turn, position, &facts);
        tracing::debug!(session_id = %self.id, turn, "journal rollup");
        self.journal.push(line);
    }

    pub(crate) fn spawn_npc<R: Rng>(
        &mut self,
        name: Option<&str>,
        kind: Option<&str>,
        sequence: &EventSequence,
        rng: &mut R,
    ) -> SpawnReport {
        let position = self.position;
        let npc = derive_npc(rng, name, kind, position);
        self.ensure_tile(position).tile.upsert_entity(npc.tile_entity());
        self.npcs.insert(npc.clone());
        let event_id = self.record(sequence, EventKind::SpawnNpc { npc: npc.clone() });
        SpawnReport {
            message: npc.arrival_message(),
            npc,
            event_id,
        }
    }

    pub(crate) fn get_npc(&self, id: &NpcId) -> Result<Npc> {
        self.npcs.get(id).cloned()
    }

    /// Record narration for an earlier event. Its first non-blank line
    /// becomes a journal entry.
    pub(crate) fn log_narrative(
        &mut self,
        event_id: EventId,
        text: &str,
        sequence: &EventSequence,
    ) -> Result<NarrativeAck> {
        if !sequence.was_issued(event_id) {
            return Err(EngineError::InvalidArgument(format!(
                "event_id {} does not refer to a logged event",
                event_id.0
            )));
        }

        let logged_event_id = self.record(
            sequence,
            EventKind::Narrative {
                event_id,
                text: text.to_string(),
            },
        );
        let journal_entry = narrative_line(self.turn, text, self.snippet_chars);
        if let Some(line) = &journal_entry {
            self.journal.push(line.clone());
        }
        Ok(NarrativeAck {
            ok: true,
            event_id,
            logged_event_id,
            journal_entry,
        })
    }

    pub(crate) fn journal(&self) -> JournalView {
        JournalView {
            session_id: self.id.clone(),
            turn: self.turn,
            summary: self.journal.lines(),
        }
    }

    // ------------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------------

    /// Install enemies in the current tile and the fight. An active fight
    /// gains them as reinforcements; otherwise a new one starts at round 1.
    pub(crate) fn generate_encounter<R: Rng>(
        &mut self,
        name: Option<&str>,
        kind: Option<&str>,
        sequence: &EventSequence,
        rng: &mut R,
    ) -> Result<EncounterReport> {
        let named = [name, kind]
            .iter()
            .flatten()
            .any(|s| !s.trim().is_empty());
        let count = if named {
            1
        } else {
            rng.gen_range(1..=MAX_ENCOUNTER_SIZE)
        };

        let position = self.position;
        let mut recruits = Vec::with_capacity(count);
        for _ in 0..count {
            let npc = derive_npc(rng, name, kind, position);
            let enemy = Enemy::from_npc(&npc, rng)?;
            recruits.push((npc, enemy));
        }

        let tile = &mut self.ensure_tile(position).tile;
        for (npc, _) in &recruits {
            tile.upsert_entity(npc.tile_entity());
        }
        let (npcs, enemies): (Vec<Npc>, Vec<Enemy>) = recruits.into_iter().unzip();
        for npc in npcs {
            self.npcs.insert(npc);
        }

        let round = match self.combat.as_mut() {
            Some(combat) => {
                combat.add_enemies(enemies.iter().cloned());
                combat.round
            }
            None => {
                let combat = CombatState::new(enemies.clone());
                let round = combat.round;
                self.combat = Some(combat);
                round
            }
        };

        let event_id = self.record(
            sequence,
            EventKind::Encounter {
                enemies: enemies.iter().map(|e| e.id.clone()).collect(),
                round,
            },
        );

        let roster: Vec<String> = enemies
            .iter()
            .map(|e| format!("{} (AC {}, HP {})", e.name, e.armor_class, e.hp))
            .collect();
        let message = format!("Hostiles appear: {}. Round {round}.", roster.join(", "));

        Ok(EncounterReport {
            snapshot: self.snapshot(),
            enemies,
            message,
            event_id,
        })
    }

    pub(crate) fn attack<R: Rng>(
        &mut self,
        request: &AttackRequest,
        sequence: &EventSequence,
        rng: &mut R,
    ) -> Result<AttackReport> {
        let combat = self
            .combat
            .as_mut()
            .filter(|c| c.active)
            .ok_or_else(|| {
                EngineError::InvalidState(
                    "No active combat. Generate an encounter first.".to_string(),
                )
            })?;
        let damage = DiceExpression::parse(&request.damage)?;

        let outcome = combat.resolve_attack(
            &request.weapon,
            &damage,
            request.advantage,
            request.target.as_ref(),
            rng,
        )?;
        let round = combat.round;
        let snapshot = combat.clone();

        if outcome.defeated {
            if let Some(npc) = self.npcs.set_disposition(&outcome.target_id, Disposition::Defeated) {
                let (entity, at) = (npc.tile_entity(), npc.position);
                if let Some(record) = self.tiles.get_mut(&at) {
                    record.tile.upsert_entity(entity);
                }
            }
        }

        let event_id = self.record(
            sequence,
            EventKind::Attack {
                weapon: outcome.weapon.clone(),
                target: outcome.target_id.clone(),
                attack_roll: outcome.attack_roll.total,
                hit: outcome.hit,
                critical: outcome.critical,
                damage: outcome.damage,
                target_hp: outcome.target_hp,
            },
        );

        if outcome.resolved {
            self.combat = None;
            self.record(
                sequence,
                EventKind::CombatEnd {
                    reason: CombatEndReason::Victory,
                    round,
                },
            );
        }

        Ok(AttackReport {
            message: outcome.message.clone(),
            outcome,
            combat: snapshot,
            event_id,
        })
    }

    /// Current fight, with fallen enemies dropped from the roster.
    pub(crate) fn combat_status(&mut self) -> CombatStatus {
        let Some(combat) = self.combat.as_mut() else {
            return CombatStatus::idle();
        };
        combat.prune_defeated();
        if !combat.active || combat.enemies.is_empty() {
            self.combat = None;
            return CombatStatus::idle();
        }
        CombatStatus::Active {
            combat: combat.clone(),
        }
    }

    /// Leave combat regardless of enemy HP.
    pub(crate) fn end_combat(&mut self, sequence: &EventSequence) -> CombatEndReport {
        let Some(combat) = self.combat.take() else {
            return CombatEndReport {
                ended: false,
                message: "No battle to end.".to_string(),
                event_id: None,
            };
        };
        let reason = if combat.all_defeated() {
            CombatEndReason::Victory
        } else {
            CombatEndReason::Ended
        };
        let event_id = self.record(
            sequence,
            EventKind::CombatEnd {
                reason,
                round: combat.round,
            },
        );
        let standing = combat.alive().count();
        let message = match standing {
            0 => format!("The battle ends after {} round(s).", combat.round),
            n => format!(
                "You disengage after {} round(s); {n} foe(s) still standing.",
                combat.round
            ),
        };
        CombatEndReport {
            ended: true,
            message,
            event_id: Some(event_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fresh() -> (Session, EventSequence) {
        let config = EngineConfig::default().with_rollup_interval(2);
        let sequence = EventSequence::new();
        let settings = crate::config::SessionOptions::new().resolve(&config);
        let session = Session::start(SessionId::from("s_0123456789ab"), settings, &config, &sequence);
        (session, sequence)
    }

    #[test]
    fn test_start_state() {
        let (mut session, sequence) = fresh();
        assert_eq!(session.started(), EventId(1));
        assert_eq!(session.events().len(), 1);
        assert_eq!(session.events()[0].kind.type_tag(), "session_start");
        assert_eq!(sequence.last_issued(), Some(EventId(1)));

        let snap = session.snapshot();
        assert_eq!(snap.turn, 0);
        assert_eq!(snap.position, Position::ORIGIN);
        assert_eq!(snap.heading, Heading::North);
        assert!(!snap.exits.is_empty());
        assert_eq!(snap.max_narrative_words, 80);
        assert!(snap.combat.is_none());
    }

    #[test]
    fn test_bad_direction_leaves_state_alone() {
        let (mut session, sequence) = fresh();
        let err = session.move_toward("sideways", &sequence).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert_eq!(session.turn(), 0);
        assert_eq!(session.events().len(), 1);
        assert_eq!(sequence.last_issued(), Some(EventId(1)));
    }

    #[test]
    fn test_rollup_every_interval() {
        let (mut session, sequence) = fresh();
        session.move_toward("north", &sequence).unwrap();
        assert!(session.journal_lines().is_empty());
        session.move_toward("forward", &sequence).unwrap();
        let lines = session.journal_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Turn 2: at 0,2,0 - "));
    }

    #[test]
    fn test_spawn_is_idempotent_in_tile() {
        let (mut session, sequence) = fresh();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let report = session.spawn_npc(Some("Gruk"), Some("goblin"), &sequence, &mut rng);
        let before = session.snapshot().tile.entities.len();

        session.ensure_tile(Position::ORIGIN).tile.upsert_entity(report.npc.tile_entity());
        assert_eq!(session.snapshot().tile.entities.len(), before);
        assert_eq!(session.get_npc(&report.npc.id).unwrap(), report.npc);
    }

    #[test]
    fn test_log_narrative_rejects_unknown_event() {
        let (mut session, sequence) = fresh();
        let err = session
            .log_narrative(EventId(42), "text", &sequence)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(session.journal_lines().is_empty());

        let ack = session
            .log_narrative(EventId(1), "The door groans.\nmore", &sequence)
            .unwrap();
        assert_eq!(ack.logged_event_id, EventId(2));
        assert_eq!(session.journal_lines(), vec!["Turn 0: The door groans."]);
    }

    #[test]
    fn test_encounter_then_end() {
        let (mut session, sequence) = fresh();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let report = session
            .generate_encounter(None, Some("skeleton"), &sequence, &mut rng)
            .unwrap();
        assert_eq!(report.enemies.len(), 1);
        let enemy = &report.enemies[0];
        assert!(session.npcs().get(&enemy.id).is_ok());
        assert!(report.snapshot.tile.entity(&enemy.id).is_some());
        assert_eq!(report.snapshot.combat.as_ref().map(|c| c.round), Some(1));

        let end = session.end_combat(&sequence);
        assert!(end.ended);
        assert!(session.combat().is_none());
        assert!(!session.combat_status().is_active());

        let again = session.end_combat(&sequence);
        assert!(!again.ended);
        assert_eq!(again.event_id, None);
    }

    #[test]
    fn test_encounter_reinforces_active_fight() {
        let (mut session, sequence) = fresh();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        session
            .generate_encounter(Some("Ada"), None, &sequence, &mut rng)
            .unwrap();
        session
            .generate_encounter(Some("Bo"), None, &sequence, &mut rng)
            .unwrap();
        let combat = session.combat().unwrap();
        assert_eq!(combat.enemies.len(), 2);
        assert_eq!(combat.round, 1);
    }

    #[test]
    fn test_attack_without_combat_is_invalid_state() {
        let (mut session, sequence) = fresh();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let err = session
            .attack(&AttackRequest::new("sword", "1d8"), &sequence, &mut rng)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn test_attack_bad_notation_is_rejected_before_rolling() {
        let (mut session, sequence) = fresh();
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        session
            .generate_encounter(None, Some("goblin"), &sequence, &mut rng)
            .unwrap();
        let events_before = session.events().len();
        let err = session
            .attack(&AttackRequest::new("sword", "banana"), &sequence, &mut rng)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert_eq!(session.events().len(), events_before);
        assert_eq!(session.combat().map(|c| c.round), Some(1));
    }

    #[test]
    fn test_fight_to_victory() {
        let (mut session, sequence) = fresh();
        let mut rng = ChaCha8Rng::seed_from_u64(15);
        let report = session
            .generate_encounter(None, Some("bat"), &sequence, &mut rng)
            .unwrap();
        let bat = report.enemies[0].id.clone();

        let mut last = None;
        for _ in 0..200 {
            let r = session
                .attack(&AttackRequest::new("club", "1d4+20"), &sequence, &mut rng)
                .unwrap();
            let done = r.outcome.resolved;
            last = Some(r);
            if done {
                break;
            }
        }
        let last = last.unwrap();
        assert!(last.outcome.resolved);
        assert!(!last.combat.active);
        assert!(session.combat().is_none());
        assert_eq!(session.npcs().get(&bat).unwrap().disposition, Disposition::Defeated);
        assert_eq!(
            session.events().last().map(|e| e.kind.type_tag()),
            Some("combat_end")
        );
        assert_eq!(session.combat_status(), CombatStatus::idle());
    }
}
