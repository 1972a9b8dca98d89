//! Scripted tour of the world engine through the tool facade.
//!
//! Run with: `RUST_LOG=crawl_core=debug cargo run -p crawl-core --example walkthrough`

use crawl_core::{call_tool, EngineConfig, WorldEngine};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn show(title: &str, value: &Value) {
    println!("\n=== {title} ===");
    match value {
        Value::String(text) => println!("{text}"),
        other => println!("{}", serde_json::to_string_pretty(other).unwrap_or_default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let engine = WorldEngine::new(EngineConfig::from_env());

    let start = call_tool(&engine, "startSession", &json!({"theme": "crypt", "maxNarrativeWords": 60}))?;
    show("start_session", &start);

    let mut last_event = 0;
    for direction in ["north", "forward", "right", "up", "back"] {
        let step = call_tool(&engine, "moveDir", &json!({ "direction": direction }))?;
        println!(
            "\n{direction:>8} -> {} facing {} (turn {})",
            step["position"], step["heading"], step["turn"]
        );
        for fact in step["salient_facts"].as_array().into_iter().flatten() {
            println!("         * {}", fact.as_str().unwrap_or_default());
        }
        last_event = step["event_id"].as_u64().unwrap_or_default();
    }

    let ack = call_tool(
        &engine,
        "logNarrative",
        &json!({"text": "Dust sifts from the ceiling as you climb.", "eventId": last_event}),
    )?;
    show("log_narrative", &ack);

    let spawn = call_tool(&engine, "spawnNpc", &json!({"name": "Gruk", "kind": "goblin"}))?;
    show("spawn_npc", &spawn);

    let encounter = call_tool(&engine, "generate_encounter", &json!({"kind": "skeleton"}))?;
    show("generate_encounter", &json!({"message": encounter["message"], "enemies": encounter["enemies"]}));

    for _ in 0..10 {
        let status = call_tool(&engine, "combat_status", &json!({}))?;
        if status["status"] != "active" {
            break;
        }
        let attack = call_tool(
            &engine,
            "attack",
            &json!({"weapon": "longsword", "damage": "1d8+3", "advantage": true}),
        )?;
        show("attack", &attack["message"]);
    }
    show("combat_end", &call_tool(&engine, "combat_end", &json!({}))?);

    show("journal", &call_tool(&engine, "journalSummary", &json!({}))?);
    show("roll_with_advantage", &call_tool(&engine, "roll_with_advantage", &json!({"notation": "d20"}))?);
    show("list_sessions", &call_tool(&engine, "listSessions", &Value::Null)?);
    Ok(())
}
