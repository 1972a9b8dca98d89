//! Procedural dungeon-crawl world engine.
//!
//! This crate provides:
//! - Deterministic tile generation keyed by session and coordinate
//! - Concurrent sessions with position, heading, journal and event log
//! - NPC spawning and a d20 combat engine
//! - A JSON tool facade for narration services and UIs
//!
//! # Quick Start
//!
//! ```
//! use crawl_core::{AttackRequest, EngineConfig, SessionOptions, WorldEngine};
//!
//! let engine = WorldEngine::new(EngineConfig::default());
//! let start = engine.start_session(SessionOptions::new().with_theme("crypt"));
//! assert_eq!(start.turn, 0);
//!
//! let step = engine.move_dir("north", None)?;
//! println!("{:?}", step.snapshot.salient_facts);
//!
//! engine.generate_encounter(None, Some("goblin"), None)?;
//! let hit = engine.attack(&AttackRequest::new("longsword", "1d8+3"), None)?;
//! println!("{}", hit.message);
//! # Ok::<(), crawl_core::EngineError>(())
//! ```

pub mod combat;
pub mod config;
pub mod dice;
pub mod engine;
pub mod error;
pub mod journal;
pub mod npc;
pub mod session;
pub mod testing;
pub mod tile;
pub mod tools;
pub mod world;

// Re-export for convenience
pub use crawl_macros::Tool;

// Primary public API
pub use combat::{AttackOutcome, CombatState, CombatStatus, Enemy};
pub use config::{EngineConfig, SessionOptions, SessionSettings};
pub use engine::WorldEngine;
pub use error::EngineError;
pub use session::{AttackRequest, Snapshot};
pub use testing::TestHarness;
pub use tile::{generate_tile, Tile, TileRecord};
pub use tools::{call_tool, ToolDefinition, ToolError, ToolInput};
pub use world::{Direction, EventId, Heading, NpcId, Position, SessionId};
