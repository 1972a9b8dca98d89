//! Event log and journal.
//!
//! The event log is the append-only record of everything that changed a
//! session. It is capped: once it grows past its ceiling, only the most
//! recent window is kept. The journal is a short, bounded list of
//! human-readable lines derived from the log (periodic rollups and the
//! first line of submitted narration).

use crate::combat::CombatEndReason;
use crate::npc::Npc;
use crate::world::{Direction, EventId, Heading, NpcId, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of tile facts quoted in a rollup line.
const ROLLUP_FACTS: usize = 3;

/// A world-affecting occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Typed event payloads, serialized as `{"type": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    SessionStart {
        position: Position,
    },
    Move {
        from: Position,
        to: Position,
        direction: Direction,
        heading: Heading,
    },
    SpawnNpc {
        npc: Npc,
    },
    Narrative {
        event_id: EventId,
        text: String,
    },
    Encounter {
        enemies: Vec<NpcId>,
        round: u32,
    },
    Attack {
        weapon: String,
        target: NpcId,
        attack_roll: i32,
        hit: bool,
        critical: bool,
        damage: i32,
        target_hp: i32,
    },
    CombatEnd {
        reason: CombatEndReason,
        round: u32,
    },
}

impl EventKind {
    /// The serialized `type` tag.
    pub fn type_tag(&self) -> &'static str {
        match self {
            EventKind::SessionStart { .. } => "session_start",
            EventKind::Move { .. } => "move",
            EventKind::SpawnNpc { .. } => "spawn_npc",
            EventKind::Narrative { .. } => "narrative",
            EventKind::Encounter { .. } => "encounter",
            EventKind::Attack { .. } => "attack",
            EventKind::CombatEnd { .. } => "combat_end",
        }
    }
}

/// Issues event ids for one engine: strictly increasing from 1, shared by
/// all of its sessions, never reused.
#[derive(Debug)]
pub struct EventSequence {
    next: AtomicU64,
}

impl Default for EventSequence {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl EventSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> EventId {
        EventId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Most recently issued id, if any.
    pub fn last_issued(&self) -> Option<EventId> {
        match self.next.load(Ordering::SeqCst) {
            1 => None,
            n => Some(EventId(n - 1)),
        }
    }

    /// Whether `id` names an event this sequence has handed out.
    pub fn was_issued(&self, id: EventId) -> bool {
        self.last_issued().is_some_and(|last| id.0 >= 1 && id <= last)
    }
}

/// Append-only, capped event history for one session.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    ceiling: usize,
    retain: usize,
}

impl EventLog {
    pub fn new(ceiling: usize, retain: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            events: Vec::new(),
            ceiling,
            retain: retain.clamp(1, ceiling),
        }
    }

    /// Append an event. When the log exceeds its ceiling the oldest entries
    /// are dropped, keeping the most recent `retain`.
    pub fn append(&mut self, event_id: EventId, kind: EventKind) {
        self.events.push(Event {
            event_id,
            ts: Utc::now(),
            kind,
        });
        if self.events.len() > self.ceiling {
            let excess = self.events.len() - self.retain;
            self.events.drain(..excess);
            tracing::debug!(dropped = excess, kept = self.retain, "event log truncated");
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Bounded list of summary lines, oldest evicted first.
#[derive(Debug, Clone)]
pub struct Journal {
    entries: VecDeque<String>,
    max_entries: usize,
}

impl Journal {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
        }
    }

    pub fn push(&mut self, line: String) {
        self.entries.push_back(line);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    /// Entries in chronological order.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Periodic summary: turn, coordinate, and up to three tile facts.
pub fn rollup_line(turn: u64, position: Position, facts: &[String]) -> String {
    let quoted: Vec<&str> = facts.iter().take(ROLLUP_FACTS).map(String::as_str).collect();
    format!("Turn {turn}: at {position} - {}", quoted.join(", "))
}

/// Journal line for submitted narration: the first non-blank line, trimmed
/// and cut to `max_chars` characters. `None` for blank text.
pub fn narrative_line(turn: u64, text: &str, max_chars: usize) -> Option<String> {
    let first = text.lines().map(str::trim).find(|line| !line.is_empty())?;
    let snippet: String = first.chars().take(max_chars).collect();
    Some(format!("Turn {turn}: {snippet}"))
}
