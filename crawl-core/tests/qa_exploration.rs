//! QA tests for exploration: sessions, movement, tiles, NPCs and the journal.
//!
//! Run with: `cargo test -p crawl-core --test qa_exploration -- --nocapture`

use crawl_core::config::SessionOptions;
use crawl_core::tile::generate_tile;
use crawl_core::{EngineConfig, EngineError, EventId, Heading, Position, SessionId, TestHarness, WorldEngine};

// =============================================================================
// SCENARIO A: Starting a session
// =============================================================================

#[test]
fn test_start_session_initial_state() {
    let engine = WorldEngine::new(EngineConfig::default());
    let snap = engine.start_session(SessionOptions::new());

    assert_eq!(snap.position, Position::new(0, 0, 0));
    assert_eq!(snap.heading, Heading::North);
    assert_eq!(snap.turn, 0);
    assert!(!snap.exits.is_empty(), "start tile must list an exit");
    assert_eq!(snap.theme, "dungeon");
    assert_eq!(snap.tone, "moody");
    assert_eq!(snap.max_narrative_words, 80);

    let json = serde_json::to_value(&snap).unwrap();
    for key in ["turn", "position", "tile", "salient_facts", "exits", "heading", "session_id", "max_narrative_words"] {
        assert!(json.get(key).is_some(), "snapshot missing {key}");
    }
}

// =============================================================================
// SCENARIO B: Moving north
// =============================================================================

#[test]
fn test_move_north() {
    let mut harness = TestHarness::new();
    let before = harness.engine.last_event_id().unwrap();
    assert!(!harness.is_cached(Position::new(0, 1, 0)));

    let report = harness.step("north");

    assert_eq!(report.snapshot.position, Position::new(0, 1, 0));
    assert_eq!(report.snapshot.heading, Heading::North);
    assert_eq!(report.snapshot.turn, 1);
    assert!(report.event_id > before);
    assert!(harness.is_cached(Position::new(0, 1, 0)));
}

#[test]
fn test_relative_and_alias_moves() {
    let mut harness = TestHarness::new();

    harness.step("right");
    harness.assert_at(Position::new(1, 0, 0));
    assert_eq!(harness.heading(), Heading::East);

    harness.step("left");
    harness.assert_at(Position::new(1, 1, 0));
    assert_eq!(harness.heading(), Heading::North);

    harness.step("back");
    harness.assert_at(Position::new(1, 0, 0));
    assert_eq!(harness.heading(), Heading::South);

    harness.step("u");
    harness.assert_at(Position::new(1, 0, 1));
    assert_eq!(harness.heading(), Heading::South, "vertical moves keep heading");

    harness.step("W");
    harness.assert_at(Position::new(0, 0, 1));
    assert_eq!(harness.heading(), Heading::West);
}

#[test]
fn test_unknown_direction_rejected() {
    let harness = TestHarness::new();
    let err = harness
        .engine
        .move_dir("diagonally", Some(&harness.session_id))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
    assert_eq!(harness.turn(), 0);
    harness.assert_at(Position::ORIGIN);
}

#[test]
fn test_round_trip_returns_to_start() {
    for (there, back) in [("north", "south"), ("east", "west"), ("up", "down")] {
        let mut harness = TestHarness::new();
        harness.step("east");
        let start = harness.position();
        let turn = harness.turn();

        harness.step(there);
        harness.step(back);

        harness.assert_at(start);
        assert_eq!(harness.turn(), turn + 2);
    }
}

// =============================================================================
// Tile determinism
// =============================================================================

#[test]
fn test_tiles_are_deterministic_across_engines() {
    let session = SessionId::from("s_abcdefabcdef");
    for x in -3..=3 {
        for y in -3..=3 {
            let pos = Position::new(x, y, 0);
            let a = generate_tile(&session, pos);
            let b = generate_tile(&session, pos);
            assert_eq!(a, b);
            assert!(!a.tile.exits.is_empty());
            assert!(a.salient_facts.len() <= 4);
        }
    }
}

#[test]
fn test_revisited_tile_is_served_from_cache() {
    let mut harness = TestHarness::new();
    let first = harness.step("north").snapshot;
    harness.step("south");
    let again = harness.step("north").snapshot;
    assert_eq!(first.tile, again.tile);
    assert_eq!(first.salient_facts, again.salient_facts);
}

// =============================================================================
// SCENARIO C: Spawning an NPC
// =============================================================================

#[test]
fn test_spawn_goblin_appears_in_look() {
    let mut harness = TestHarness::new();
    let report = harness.spawn(None, Some("goblin"));

    assert!((10..=15).contains(&report.npc.armor_class));
    assert_eq!(report.npc.kind, "goblin");
    assert!(report.message.contains(&report.npc.name));

    let look = harness.look();
    let entity = look
        .tile
        .entity(&report.npc.id)
        .expect("spawned npc listed in tile");
    assert_eq!(entity.kind, "goblin");

    let fetched = harness
        .engine
        .get_npc(&report.npc.id, Some(&harness.session_id))
        .unwrap();
    assert_eq!(fetched, report.npc);
}

#[test]
fn test_spawned_npc_persists_after_leaving() {
    let mut harness = TestHarness::new();
    let report = harness.spawn(Some("Mag"), Some("kobold"));
    harness.walk(&["north", "south"]);
    assert!(harness.look().tile.entity(&report.npc.id).is_some());
}

#[test]
fn test_get_unknown_npc() {
    let harness = TestHarness::new();
    let err = harness
        .engine
        .get_npc(&"npc_ghost_000000".into(), None)
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

// =============================================================================
// Narrative and journal
// =============================================================================

#[test]
fn test_log_narrative_against_move_event() {
    let mut harness = TestHarness::new();
    let report = harness.step("north");

    let ack = harness
        .engine
        .log_narrative("  \nCold air spills from the stairwell.\nIt smells of rust.", report.event_id, None)
        .unwrap();
    assert!(ack.ok);
    assert_eq!(ack.event_id, report.event_id);
    assert!(ack.logged_event_id > report.event_id);

    assert_eq!(harness.journal(), vec!["Turn 1: Cold air spills from the stairwell."]);
}

#[test]
fn test_log_narrative_bad_event_id() {
    let harness = TestHarness::new();
    let future = EventId(harness.engine.last_event_id().unwrap().0 + 100);
    for bad in [EventId(0), future] {
        let err = harness.engine.log_narrative("text", bad, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
    assert!(harness.journal().is_empty());
}

#[test]
fn test_rollup_every_eight_turns() {
    let mut harness = TestHarness::new();
    for _ in 0..7 {
        harness.step("forward");
    }
    assert!(harness.journal().is_empty());

    harness.step("forward");
    let journal = harness.journal();
    assert_eq!(journal.len(), 1);
    assert!(journal[0].starts_with("Turn 8: at 0,8,0 - "), "{}", journal[0]);
}

#[test]
fn test_journal_bound_evicts_oldest() {
    let config = EngineConfig::default()
        .with_journal_max_entries(4)
        .with_rollup_interval(1);
    let mut harness = TestHarness::with_config(config);

    for _ in 0..10 {
        harness.step("east");
        assert!(harness.journal().len() <= 4);
    }
    let journal = harness.journal();
    assert_eq!(journal.len(), 4);
    assert!(journal[0].starts_with("Turn 7:"));
    assert!(journal[3].starts_with("Turn 10:"));
}

#[test]
fn test_event_log_is_capped() {
    let config = EngineConfig::default().with_event_log_bounds(20, 10);
    let mut harness = TestHarness::with_config(config);
    for i in 0..30 {
        harness.step(if i % 2 == 0 { "north" } else { "south" });
    }
    let events = harness
        .engine
        .inspect(None, |s| s.events().to_vec())
        .unwrap();
    assert!(events.len() <= 20);
    assert_eq!(events.last().map(|e| e.event_id), harness.event_ids.last().copied());
}

// =============================================================================
// Session metadata
// =============================================================================

#[test]
fn test_session_metadata() {
    let engine = WorldEngine::new(EngineConfig::default());
    let a = engine.start_session(SessionOptions::new()).session_id;
    let b = engine.start_session(SessionOptions::new().with_tone("grim")).session_id;

    assert_eq!(engine.get_active_session().unwrap().session_id, b);
    engine.set_active_session(&a).unwrap();
    engine.move_dir("n", None).unwrap();

    let sessions = engine.list_sessions();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_id, a);
    assert!(sessions[0].active);
    assert_eq!(sessions[0].turn, 1);
    assert!(!sessions[1].active);

    engine.end_session(&a).unwrap();
    assert!(engine.get_active_session().is_none());
    assert!(matches!(engine.look(None), Err(EngineError::NotFound(_))));
    assert_eq!(engine.look(Some(&b)).unwrap().tone, "grim");
}
