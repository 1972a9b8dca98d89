//! Core world types.
//!
//! Identifiers, coordinates, compass directions, and the movement-token
//! grammar shared by the session store and the tile generator.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Opaque session identity, e.g. `s_3f9a0c12be47`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("s_{}", &hex[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// NPC identity, unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NpcId(String);

impl NpcId {
    /// Derive a fresh id from a display name: `npc_<slug>_<6 hex>`.
    pub fn for_name(name: &str) -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("npc_{}_{}", slugify(name), &hex[..6]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NpcId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NpcId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event identity. Issued by the engine, strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase, underscore-separated form of a name. Falls back to `foe`.
pub fn slugify(name: &str) -> String {
    let base: String = name
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let slug = base
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        "foe".to_string()
    } else {
        slug
    }
}

/// Capitalize the first letter and turn underscores into spaces:
/// `rusty_blade` -> `Rusty blade`.
pub fn humanize(tag: &str) -> String {
    let spaced = tag.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Coordinates
// ============================================================================

/// Integer world coordinate. `z` is the dungeon level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0, z: 0 };

    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// One step in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

// ============================================================================
// Directions
// ============================================================================

/// The way the player faces. Compass order is north, east, south, west.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heading {
    #[default]
    North,
    East,
    South,
    West,
}

impl Heading {
    /// Clockwise compass order.
    pub const COMPASS: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    fn index(self) -> usize {
        match self {
            Heading::North => 0,
            Heading::East => 1,
            Heading::South => 2,
            Heading::West => 3,
        }
    }

    /// Rotate by `quarter_turns` clockwise (negative turns counter-clockwise).
    pub fn rotate(self, quarter_turns: i32) -> Heading {
        let idx = (self.index() as i32 + quarter_turns).rem_euclid(4) as usize;
        Self::COMPASS[idx]
    }

    pub fn name(self) -> &'static str {
        match self {
            Heading::North => "north",
            Heading::East => "east",
            Heading::South => "south",
            Heading::West => "west",
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Heading> for Direction {
    fn from(heading: Heading) -> Self {
        match heading {
            Heading::North => Direction::North,
            Heading::East => Direction::East,
            Heading::South => Direction::South,
            Heading::West => Direction::West,
        }
    }
}

/// An absolute movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    /// Unit delta as (dx, dy, dz). North is +y, east is +x, up is +z.
    pub fn delta(self) -> (i64, i64, i64) {
        match self {
            Direction::North => (0, 1, 0),
            Direction::South => (0, -1, 0),
            Direction::East => (1, 0, 0),
            Direction::West => (-1, 0, 0),
            Direction::Up => (0, 0, 1),
            Direction::Down => (0, 0, -1),
        }
    }

    /// Cardinal directions map to a heading; vertical ones do not.
    pub fn heading(self) -> Option<Heading> {
        match self {
            Direction::North => Some(Heading::North),
            Direction::East => Some(Heading::East),
            Direction::South => Some(Heading::South),
            Direction::West => Some(Heading::West),
            Direction::Up | Direction::Down => None,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved move: where to step and which way to face afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMove {
    pub direction: Direction,
    pub heading: Heading,
}

/// Resolve a movement token against the current heading.
///
/// Accepts absolute directions (`north`, `up`, ...), single-letter aliases
/// (`n`, `s`, `e`, `w`, `u`, `d`) and heading-relative words (`forward`/
/// `ahead`, `back`/`backward`/`reverse`, `left`, `right`). Cardinal and
/// relative moves turn the player to face the way they moved; vertical
/// moves keep the heading.
pub fn resolve_move(token: &str, heading: Heading) -> Result<ResolvedMove, EngineError> {
    let token = token.trim().to_lowercase();
    let absolute = match token.as_str() {
        "north" | "n" => Some(Direction::North),
        "south" | "s" => Some(Direction::South),
        "east" | "e" => Some(Direction::East),
        "west" | "w" => Some(Direction::West),
        "up" | "u" => Some(Direction::Up),
        "down" | "d" => Some(Direction::Down),
        _ => None,
    };
    if let Some(direction) = absolute {
        return Ok(ResolvedMove {
            direction,
            heading: direction.heading().unwrap_or(heading),
        });
    }

    let turns = match token.as_str() {
        "forward" | "ahead" => 0,
        "right" => 1,
        "back" | "backward" | "reverse" => 2,
        "left" => -1,
        _ => {
            return Err(EngineError::InvalidArgument(format!(
                "Unknown direction '{token}'. Use north/south/east/west/up/down or forward/back/left/right."
            )))
        }
    };
    let new_heading = heading.rotate(turns);
    Ok(ResolvedMove {
        direction: new_heading.into(),
        heading: new_heading,
    })
}

// ============================================================================
// Dispositions
// ============================================================================

/// How a creature regards the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Hostile,
    Wary,
    Indifferent,
    /// Reduced to zero hit points in combat.
    Defeated,
}

impl Disposition {
    pub fn name(self) -> &'static str {
        match self {
            Disposition::Hostile => "hostile",
            Disposition::Wary => "wary",
            Disposition::Indifferent => "indifferent",
            Disposition::Defeated => "defeated",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_shape() {
        let id = SessionId::new();
        assert!(id.as_str().starts_with("s_"));
        assert_eq!(id.as_str().len(), 14);
        assert_ne!(id, SessionId::new());
    }

    #[test]
    fn test_npc_id_from_name() {
        let id = NpcId::for_name("Gruk the Bold!");
        assert!(id.as_str().starts_with("npc_gruk_the_bold_"));
        assert_eq!(id.as_str().len(), "npc_gruk_the_bold_".len() + 6);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Goblin 3f2a"), "goblin_3f2a");
        assert_eq!(slugify("  --  "), "foe");
        assert_eq!(slugify("Old   Mag"), "old_mag");
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("underground_river"), "Underground river");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn test_absolute_moves() {
        let m = resolve_move("north", Heading::West).unwrap();
        assert_eq!(m.direction, Direction::North);
        assert_eq!(m.heading, Heading::North);

        let m = resolve_move("E", Heading::North).unwrap();
        assert_eq!(m.direction, Direction::East);
        assert_eq!(m.heading, Heading::East);
    }

    #[test]
    fn test_vertical_moves_keep_heading() {
        let m = resolve_move("down", Heading::East).unwrap();
        assert_eq!(m.direction, Direction::Down);
        assert_eq!(m.heading, Heading::East);

        let m = resolve_move("u", Heading::South).unwrap();
        assert_eq!(m.direction, Direction::Up);
        assert_eq!(m.heading, Heading::South);
    }

    #[test]
    fn test_relative_moves() {
        let cases = [
            ("forward", Heading::North, Direction::North),
            ("ahead", Heading::East, Direction::East),
            ("right", Heading::North, Direction::East),
            ("right", Heading::West, Direction::North),
            ("left", Heading::North, Direction::West),
            ("left", Heading::East, Direction::North),
            ("back", Heading::North, Direction::South),
            ("reverse", Heading::East, Direction::West),
        ];
        for (token, heading, expected) in cases {
            let m = resolve_move(token, heading).unwrap();
            assert_eq!(m.direction, expected, "{token} from {heading}");
            assert_eq!(Some(m.heading), expected.heading());
        }
    }

    #[test]
    fn test_unknown_direction() {
        let err = resolve_move("sideways", Heading::North).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_step_and_opposite_round_trip() {
        let start = Position::new(3, -2, 1);
        for dir in [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
            Direction::Up,
            Direction::Down,
        ] {
            assert_eq!(start.step(dir).step(dir.opposite()), start);
        }
    }
}
