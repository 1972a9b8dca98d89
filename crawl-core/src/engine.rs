//! The world engine: every session, the active-session pointer and the
//! event-id sequence, owned by one explicitly constructed value.
//!
//! Each session sits behind its own mutex, so operations on different
//! sessions never wait on each other. The session map and the active
//! pointer share one registry lock, so the pointer only ever names a
//! session present in the map. No operation holds more than one lock at a
//! time.

use crate::combat::CombatStatus;
use crate::config::{EngineConfig, SessionOptions};
use crate::error::{EngineError, Result};
use crate::journal::EventSequence;
use crate::npc::{spawn_rng, Npc};
use crate::session::{
    AttackReport, AttackRequest, CombatEndReport, EncounterReport, JournalView, MoveReport,
    NarrativeAck, Session, SessionSummary, Snapshot, SpawnReport,
};
use crate::world::{EventId, NpcId, SessionId};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

type SessionHandle = Arc<Mutex<Session>>;

/// Session map plus the active pointer. Both change under the same write
/// lock: `active`, when set, is a key of `sessions`.
#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<SessionId, SessionHandle>,
    active: Option<SessionId>,
}

impl Registry {
    fn handle(&self, id: &SessionId) -> Result<SessionHandle> {
        self.sessions
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Unknown session_id '{id}'")))
    }
}

/// Confirmation for `end_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnded {
    pub ok: bool,
    pub session_id: SessionId,
    /// The ended session was the active one.
    pub was_active: bool,
}

/// Confirmation for `reset_all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    pub ok: bool,
    pub sessions_cleared: usize,
}

/// Owns all world state. Construct one per process (or per test).
#[derive(Debug, Default)]
pub struct WorldEngine {
    config: EngineConfig,
    registry: RwLock<Registry>,
    sequence: EventSequence,
}

impl WorldEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(Registry::default()),
            sequence: EventSequence::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Most recently issued event id across every session.
    pub fn last_event_id(&self) -> Option<EventId> {
        self.sequence.last_issued()
    }

    /// Find the session an operation addresses: the explicit id, or the
    /// active session when none is given.
    fn resolve(&self, session: Option<&SessionId>) -> Result<SessionHandle> {
        let registry = self.registry.read();
        match session.or(registry.active.as_ref()) {
            Some(id) => registry.handle(id),
            None => Err(EngineError::no_active_session()),
        }
    }

    /// Run `f` against a session's state under its lock.
    pub fn inspect<T>(&self, session: Option<&SessionId>, f: impl FnOnce(&Session) -> T) -> Result<T> {
        let handle = self.resolve(session)?;
        let guard = handle.lock();
        Ok(f(&guard))
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Create a session at the origin and make it active.
    pub fn start_session(&self, options: SessionOptions) -> Snapshot {
        let id = SessionId::new();
        let settings = options.resolve(&self.config);
        let mut session = Session::start(id.clone(), settings, &self.config, &self.sequence);
        let snapshot = session.snapshot();

        {
            let mut registry = self.registry.write();
            registry
                .sessions
                .insert(id.clone(), Arc::new(Mutex::new(session)));
            registry.active = Some(id.clone());
        }

        info!(
            session_id = %id,
            theme = %snapshot.theme,
            tone = %snapshot.tone,
            "session started"
        );
        snapshot
    }

    pub fn end_session(&self, session_id: &SessionId) -> Result<SessionEnded> {
        let was_active = {
            let mut registry = self.registry.write();
            if registry.sessions.remove(session_id).is_none() {
                return Err(EngineError::NotFound(format!(
                    "Unknown session_id '{session_id}'"
                )));
            }
            let was_active = registry.active.as_ref() == Some(session_id);
            if was_active {
                registry.active = None;
            }
            was_active
        };

        info!(session_id = %session_id, was_active, "session ended");
        Ok(SessionEnded {
            ok: true,
            session_id: session_id.clone(),
            was_active,
        })
    }

    /// Drop every session and clear the active pointer. Event ids keep
    /// counting from where they were.
    pub fn reset_all(&self) -> ResetReport {
        let sessions_cleared = {
            let mut registry = self.registry.write();
            let n = registry.sessions.len();
            registry.sessions.clear();
            registry.active = None;
            n
        };

        info!(sessions_cleared, "all sessions reset");
        ResetReport {
            ok: true,
            sessions_cleared,
        }
    }

    /// Summary of the active session, if one is set and still exists.
    pub fn get_active_session(&self) -> Option<SessionSummary> {
        let handle = self.resolve(None).ok()?;
        let summary = handle.lock().summary(true);
        Some(summary)
    }

    /// Id the active pointer names, if any.
    pub fn active_session_id(&self) -> Option<SessionId> {
        self.registry.read().active.clone()
    }

    pub fn set_active_session(&self, session_id: &SessionId) -> Result<SessionSummary> {
        let handle = {
            let mut registry = self.registry.write();
            let handle = registry.handle(session_id)?;
            registry.active = Some(session_id.clone());
            handle
        };
        info!(session_id = %session_id, "active session set");
        let summary = handle.lock().summary(true);
        Ok(summary)
    }

    /// Every session in creation order.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let (active, handles) = {
            let registry = self.registry.read();
            let handles: Vec<SessionHandle> = registry.sessions.values().cloned().collect();
            (registry.active.clone(), handles)
        };

        let mut rows: Vec<(EventId, SessionSummary)> = handles
            .iter()
            .map(|handle| {
                let session = handle.lock();
                let is_active = active.as_ref() == Some(session.id());
                (session.started(), session.summary(is_active))
            })
            .collect();
        rows.sort_by_key(|(started, _)| *started);
        rows.into_iter().map(|(_, summary)| summary).collect()
    }

    // ------------------------------------------------------------------------
    // Exploration
    // ------------------------------------------------------------------------

    /// Move one step. `direction` is an absolute direction, a single-letter
    /// alias or a heading-relative word.
    pub fn move_dir(&self, direction: &str, session: Option<&SessionId>) -> Result<MoveReport> {
        let handle = self.resolve(session)?;
        let mut session = handle.lock();
        let report = session.move_toward(direction, &self.sequence)?;
        info!(
            session_id = %report.snapshot.session_id,
            direction,
            position = %report.snapshot.position,
            turn = report.snapshot.turn,
            event_id = report.event_id.0,
            "move"
        );
        Ok(report)
    }

    pub fn look(&self, session: Option<&SessionId>) -> Result<Snapshot> {
        let handle = self.resolve(session)?;
        let snapshot = handle.lock().snapshot();
        info!(session_id = %snapshot.session_id, position = %snapshot.position, "look");
        Ok(snapshot)
    }

    /// Spawn a hostile NPC on the current tile.
    pub fn spawn_npc(
        &self,
        name: Option<&str>,
        kind: Option<&str>,
        session: Option<&SessionId>,
    ) -> Result<SpawnReport> {
        let handle = self.resolve(session)?;
        let mut session = handle.lock();
        let mut rng = spawn_rng(session.current_tile_seed());
        let report = session.spawn_npc(name, kind, &self.sequence, &mut rng);
        info!(
            session_id = %session.id(),
            npc_id = %report.npc.id,
            kind = %report.npc.kind,
            armor_class = report.npc.armor_class,
            "npc spawned"
        );
        Ok(report)
    }

    pub fn get_npc(&self, npc_id: &NpcId, session: Option<&SessionId>) -> Result<Npc> {
        let handle = self.resolve(session)?;
        let npc = handle.lock().get_npc(npc_id)?;
        debug!(npc_id = %npc_id, "npc lookup");
        Ok(npc)
    }

    /// Attach narration to an earlier event.
    pub fn log_narrative(
        &self,
        text: &str,
        event_id: EventId,
        session: Option<&SessionId>,
    ) -> Result<NarrativeAck> {
        let handle = self.resolve(session)?;
        let mut session = handle.lock();
        let ack = session.log_narrative(event_id, text, &self.sequence)?;
        info!(
            session_id = %session.id(),
            event_id = event_id.0,
            chars = text.chars().count(),
            "narrative logged"
        );
        Ok(ack)
    }

    pub fn journal(&self, session: Option<&SessionId>) -> Result<JournalView> {
        let handle = self.resolve(session)?;
        let view = handle.lock().journal();
        info!(session_id = %view.session_id, entries = view.summary.len(), "journal");
        Ok(view)
    }

    // ------------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------------

    /// Start a fight on the current tile, or reinforce the one in progress.
    pub fn generate_encounter(
        &self,
        name: Option<&str>,
        kind: Option<&str>,
        session: Option<&SessionId>,
    ) -> Result<EncounterReport> {
        let handle = self.resolve(session)?;
        let mut session = handle.lock();
        let mut rng = spawn_rng(session.current_tile_seed());
        let report = session.generate_encounter(name, kind, &self.sequence, &mut rng)?;
        info!(
            session_id = %session.id(),
            enemies = report.enemies.len(),
            event_id = report.event_id.0,
            "encounter"
        );
        Ok(report)
    }

    pub fn attack(&self, request: &AttackRequest, session: Option<&SessionId>) -> Result<AttackReport> {
        self.attack_with_rng(request, session, &mut rand::thread_rng())
    }

    /// `attack` with a caller-supplied random source.
    pub fn attack_with_rng<R: Rng>(
        &self,
        request: &AttackRequest,
        session: Option<&SessionId>,
        rng: &mut R,
    ) -> Result<AttackReport> {
        let handle = self.resolve(session)?;
        let mut session = handle.lock();
        let report = session.attack(request, &self.sequence, rng)?;
        info!(
            session_id = %session.id(),
            weapon = %report.outcome.weapon,
            target = %report.outcome.target_id,
            roll = report.outcome.attack_roll.total,
            hit = report.outcome.hit,
            critical = report.outcome.critical,
            damage = report.outcome.damage,
            "attack"
        );
        Ok(report)
    }

    pub fn combat_status(&self, session: Option<&SessionId>) -> Result<CombatStatus> {
        let handle = self.resolve(session)?;
        let mut session = handle.lock();
        let status = session.combat_status();
        info!(session_id = %session.id(), active = status.is_active(), "combat status");
        Ok(status)
    }

    /// End the fight regardless of enemy HP.
    pub fn combat_end(&self, session: Option<&SessionId>) -> Result<CombatEndReport> {
        let handle = self.resolve(session)?;
        let mut session = handle.lock();
        let report = session.end_combat(&self.sequence);
        info!(session_id = %session.id(), ended = report.ended, "combat end");
        Ok(report)
    }
}
