//! Testing utilities.
//!
//! `TestHarness` wraps a fresh `WorldEngine` with one started session and
//! offers scripted steps plus assertion helpers for scenario tests.

use crate::combat::{CombatState, CombatStatus};
use crate::config::{EngineConfig, SessionOptions};
use crate::engine::WorldEngine;
use crate::session::{AttackReport, AttackRequest, EncounterReport, MoveReport, Snapshot, SpawnReport};
use crate::world::{EventId, Heading, Position, SessionId};

/// A fresh engine plus one started session.
pub struct TestHarness {
    pub engine: WorldEngine,
    pub session_id: SessionId,
    /// Event ids returned by the harness's steps, in order.
    pub event_ids: Vec<EventId>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Default configuration and session options.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let engine = WorldEngine::new(config);
        let snapshot = engine.start_session(SessionOptions::new());
        Self {
            engine,
            session_id: snapshot.session_id,
            event_ids: Vec::new(),
        }
    }

    fn session(&self) -> Option<&SessionId> {
        Some(&self.session_id)
    }

    /// Move one step; panics if the engine rejects the direction.
    pub fn step(&mut self, direction: &str) -> MoveReport {
        let report = self
            .engine
            .move_dir(direction, self.session())
            .unwrap_or_else(|err| panic!("move {direction:?} failed: {err}"));
        self.event_ids.push(report.event_id);
        report
    }

    /// Several steps in sequence; returns the last report.
    pub fn walk(&mut self, directions: &[&str]) -> Option<MoveReport> {
        directions.iter().map(|d| self.step(d)).last()
    }

    pub fn look(&self) -> Snapshot {
        self.engine
            .look(self.session())
            .unwrap_or_else(|err| panic!("look failed: {err}"))
    }

    pub fn spawn(&mut self, name: Option<&str>, kind: Option<&str>) -> SpawnReport {
        let report = self
            .engine
            .spawn_npc(name, kind, self.session())
            .unwrap_or_else(|err| panic!("spawn failed: {err}"));
        self.event_ids.push(report.event_id);
        report
    }

    pub fn encounter(&mut self, name: Option<&str>, kind: Option<&str>) -> EncounterReport {
        let report = self
            .engine
            .generate_encounter(name, kind, self.session())
            .unwrap_or_else(|err| panic!("encounter failed: {err}"));
        self.event_ids.push(report.event_id);
        report
    }

    pub fn attack(&mut self, weapon: &str, damage: &str) -> AttackReport {
        let report = self
            .engine
            .attack(&AttackRequest::new(weapon, damage), self.session())
            .unwrap_or_else(|err| panic!("attack failed: {err}"));
        self.event_ids.push(report.event_id);
        report
    }

    pub fn position(&self) -> Position {
        self.look().position
    }

    pub fn heading(&self) -> Heading {
        self.look().heading
    }

    pub fn turn(&self) -> u64 {
        self.look().turn
    }

    pub fn journal(&self) -> Vec<String> {
        self.engine
            .journal(self.session())
            .map(|view| view.summary)
            .unwrap_or_default()
    }

    /// Active combat, if any, after pruning fallen enemies.
    pub fn combat(&self) -> Option<CombatState> {
        match self.engine.combat_status(self.session()) {
            Ok(CombatStatus::Active { combat }) => Some(combat),
            _ => None,
        }
    }

    pub fn in_combat(&self) -> bool {
        self.combat().is_some()
    }

    pub fn is_cached(&self, pos: Position) -> bool {
        self.engine
            .inspect(self.session(), |s| s.cached_tile(pos).is_some())
            .unwrap_or(false)
    }

    /// Assert the player stands at `pos`.
    pub fn assert_at(&self, pos: Position) {
        assert_eq!(self.position(), pos, "player position");
    }

    /// Assert event ids returned so far are strictly increasing.
    pub fn assert_events_increasing(&self) {
        for pair in self.event_ids.windows(2) {
            assert!(pair[0] < pair[1], "event ids out of order: {pair:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_walk() {
        let mut harness = TestHarness::new();
        harness.walk(&["north", "east", "south", "west"]);
        harness.assert_at(Position::ORIGIN);
        assert_eq!(harness.turn(), 4);
        assert_eq!(harness.heading(), Heading::West);
        harness.assert_events_increasing();
    }

    #[test]
    fn test_harness_starts_idle() {
        let harness = TestHarness::new();
        assert!(!harness.in_combat());
        assert!(harness.journal().is_empty());
        assert!(harness.is_cached(Position::ORIGIN));
    }
}
