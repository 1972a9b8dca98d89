//! Tool facade: named JSON-in/JSON-out calls onto a `WorldEngine`.
//!
//! Each tool has an input struct deriving `Tool` (name, description and
//! input schema) and `Deserialize`. `call_tool` looks the tool up by name or
//! camelCase alias, decodes the input, runs the engine operation and encodes
//! the result.

use crate::config::SessionOptions;
use crate::dice::{self, Advantage};
use crate::engine::WorldEngine;
use crate::error::EngineError;
use crate::session::AttackRequest;
use crate::world::{EventId, NpcId, SessionId};
use crate::Tool;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Implemented by `#[derive(Tool)]`.
pub trait ToolInput: DeserializeOwned {
    fn tool_name() -> &'static str;
    fn tool_description() -> &'static str;
    fn input_schema() -> Value;
}

/// A tool as advertised to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn of<T: ToolInput>() -> Self {
        Self {
            name: T::tool_name().to_string(),
            description: T::tool_description().to_string(),
            input_schema: T::input_schema(),
        }
    }
}

/// Errors from the tool facade.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid input for {tool}: {message}")]
    BadInput { tool: &'static str, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Error class reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Engine(err) => err.kind(),
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::BadInput { .. } => "invalid_argument",
            ToolError::Serialization(_) => "internal",
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Start a new session at the origin and make it the active session.
#[derive(Tool, Deserialize, Debug)]
pub struct StartSessionInput {
    /// Theme tag for narration (default "dungeon")
    pub theme: Option<String>,
    /// Tone tag for narration (default "moody")
    pub tone: Option<String>,
    /// Word cap for narration of each step (default 80)
    #[serde(alias = "maxNarrativeWords")]
    pub max_narrative_words: Option<u32>,
}

/// End a session and discard its state.
#[derive(Tool, Deserialize, Debug)]
pub struct EndSessionInput {
    /// Session to end
    #[serde(alias = "sessionId")]
    pub session_id: String,
}

/// Discard every session.
#[derive(Tool, Deserialize, Debug)]
pub struct ResetAllInput {}

/// Take one step. Turns the player to face the way they moved.
#[derive(Tool, Deserialize, Debug)]
#[tool(name = "move")]
pub struct MoveInput {
    /// north/south/east/west/up/down, n/s/e/w/u/d, or forward/back/left/right
    #[serde(alias = "dir")]
    pub direction: String,
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// Describe the current tile without moving.
#[derive(Tool, Deserialize, Debug)]
pub struct LookInput {
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// Attach narration text to an event returned by an earlier call.
#[derive(Tool, Deserialize, Debug)]
pub struct LogNarrativeInput {
    /// Narration shown to the player
    pub text: String,
    /// Event the narration describes
    #[serde(alias = "eventId")]
    pub event_id: u64,
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// Current turn and the recent journal lines.
#[derive(Tool, Deserialize, Debug)]
pub struct JournalInput {
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// The active session's id and a brief status.
#[derive(Tool, Deserialize, Debug)]
pub struct GetActiveSessionInput {}

/// Make a session the default target for calls without a session id.
#[derive(Tool, Deserialize, Debug)]
pub struct SetActiveSessionInput {
    /// Session to activate
    #[serde(alias = "sessionId")]
    pub session_id: String,
}

/// Every session with a brief status.
#[derive(Tool, Deserialize, Debug)]
pub struct ListSessionsInput {}

/// Spawn a hostile creature on the current tile.
#[derive(Tool, Deserialize, Debug)]
pub struct SpawnNpcInput {
    /// Display name (synthesized when absent)
    pub name: Option<String>,
    /// Creature kind such as goblin or skeleton (random when absent)
    pub kind: Option<String>,
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// Look up a spawned creature.
#[derive(Tool, Deserialize, Debug)]
pub struct GetNpcInput {
    /// Id returned by spawn_npc
    #[serde(alias = "npcId")]
    pub npc_id: String,
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// Start a fight on the current tile (or add foes to the current one).
#[derive(Tool, Deserialize, Debug)]
pub struct GenerateEncounterInput {
    /// Name of a single foe
    pub name: Option<String>,
    /// Kind of a single foe
    pub kind: Option<String>,
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// Attack an enemy in the current fight with a d20 roll against its armor class.
#[derive(Tool, Deserialize, Debug)]
pub struct AttackInput {
    /// Weapon label for the log
    pub weapon: String,
    /// Damage dice such as "1d8+3"
    pub damage: String,
    /// Roll the attack twice and keep the higher
    #[serde(default)]
    #[tool(optional)]
    pub advantage: bool,
    /// Roll the attack twice and keep the lower
    #[serde(default)]
    #[tool(optional)]
    pub disadvantage: bool,
    /// Enemy id (defaults to the first enemy still standing)
    pub target: Option<String>,
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// The current fight, or an idle status.
#[derive(Tool, Deserialize, Debug)]
pub struct CombatStatusInput {
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// End the current fight regardless of enemy HP.
#[derive(Tool, Deserialize, Debug)]
pub struct CombatEndInput {
    /// Session to act on (defaults to the active session)
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
}

/// Roll dice using NdM notation (e.g. "2d20", "4d6kh3", "1d8+2").
#[derive(Tool, Deserialize, Debug)]
pub struct RollDiceInput {
    /// Dice notation
    pub notation: String,
}

/// Roll a single die twice and keep the higher (e.g. "d20").
#[derive(Tool, Deserialize, Debug)]
pub struct RollWithAdvantageInput {
    /// Single-die notation
    pub notation: String,
}

/// Status payload confirming the engine is responsive.
#[derive(Tool, Deserialize, Debug)]
pub struct HealthInput {}

/// Liveness check. Returns "pong".
#[derive(Tool, Deserialize, Debug)]
pub struct PingInput {}

/// Human-readable list of tools and aliases with examples.
#[derive(Tool, Deserialize, Debug)]
pub struct ToolsHelpInput {}

// ============================================================================
// Registry
// ============================================================================

/// camelCase and legacy names accepted in place of the canonical ones.
pub const TOOL_ALIASES: [(&str, &str); 12] = [
    ("startSession", "start_session"),
    ("moveDir", "move"),
    ("lookAround", "look"),
    ("logNarrative", "log_narrative"),
    ("journalSummary", "journal"),
    ("getActiveSession", "get_active_session"),
    ("setActiveSession", "set_active_session"),
    ("listSessions", "list_sessions"),
    ("spawnNpc", "spawn_npc"),
    ("getNpc", "get_npc"),
    ("roll_dice_tool", "roll_dice"),
    ("roll_with_advantage_tool", "roll_with_advantage"),
];

/// Every tool, canonical names only.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::of::<StartSessionInput>(),
        ToolDefinition::of::<EndSessionInput>(),
        ToolDefinition::of::<ResetAllInput>(),
        ToolDefinition::of::<MoveInput>(),
        ToolDefinition::of::<LookInput>(),
        ToolDefinition::of::<LogNarrativeInput>(),
        ToolDefinition::of::<JournalInput>(),
        ToolDefinition::of::<GetActiveSessionInput>(),
        ToolDefinition::of::<SetActiveSessionInput>(),
        ToolDefinition::of::<ListSessionsInput>(),
        ToolDefinition::of::<SpawnNpcInput>(),
        ToolDefinition::of::<GetNpcInput>(),
        ToolDefinition::of::<GenerateEncounterInput>(),
        ToolDefinition::of::<AttackInput>(),
        ToolDefinition::of::<CombatStatusInput>(),
        ToolDefinition::of::<CombatEndInput>(),
        ToolDefinition::of::<RollDiceInput>(),
        ToolDefinition::of::<RollWithAdvantageInput>(),
        ToolDefinition::of::<HealthInput>(),
        ToolDefinition::of::<PingInput>(),
        ToolDefinition::of::<ToolsHelpInput>(),
    ]
}

/// Canonical name for `name`, following aliases.
pub fn canonical_tool_name(name: &str) -> &str {
    TOOL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Canonical names followed by aliases.
pub fn tool_names() -> Vec<String> {
    tool_definitions()
        .into_iter()
        .map(|d| d.name)
        .chain(TOOL_ALIASES.iter().map(|(alias, _)| alias.to_string()))
        .collect()
}

pub fn tools_help() -> String {
    [
        "Available tools:",
        "- start_session(theme?, tone?, max_narrative_words?) -> snapshot",
        "- end_session(session_id) / reset_all()",
        "- move(direction, session_id?) -> snapshot + event_id",
        "- look(session_id?) -> snapshot",
        "- log_narrative(text, event_id, session_id?) -> {ok}",
        "- journal(session_id?) -> {turn, summary[]}",
        "- spawn_npc(name?, kind?, session_id?) -> {npc, message, event_id}",
        "- get_npc(npc_id, session_id?) -> {npc}",
        "- get_active_session() / set_active_session(session_id) / list_sessions()",
        "- generate_encounter(name?, kind?) / attack(weapon, damage, advantage?, disadvantage?, target?)",
        "- combat_status() / combat_end()",
        "- roll_dice('2d20'), roll_with_advantage('d20')",
        "- health(), ping(), tools_help()",
        "Aliases:",
        "- startSession, moveDir, lookAround, logNarrative, journalSummary, getActiveSession, setActiveSession, listSessions, spawnNpc, getNpc",
        "Examples:",
        "- startSession()",
        "- moveDir('north')",
        "- spawnNpc('Gruk', 'goblin')",
        "- attack('longsword', '1d8+3', advantage=true)",
        "- logNarrative('Your boots crunch mortar...', 42)",
    ]
    .join("\n")
}

fn parse<T: ToolInput>(input: &Value) -> Result<T, ToolError> {
    // Tools without arguments accept a missing or null input.
    let input = if input.is_null() { json!({}) } else { input.clone() };
    serde_json::from_value(input).map_err(|err| ToolError::BadInput {
        tool: T::tool_name(),
        message: err.to_string(),
    })
}

fn session_ref(raw: &Option<String>) -> Option<SessionId> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SessionId::from)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    Ok(serde_json::to_value(value)?)
}

/// Run the tool called `name` (canonical or alias) with JSON `input`.
pub fn call_tool(engine: &WorldEngine, name: &str, input: &Value) -> Result<Value, ToolError> {
    let canonical = canonical_tool_name(name);
    tracing::debug!(tool = canonical, requested = name, "tool call");

    match canonical {
        "start_session" => {
            let args: StartSessionInput = parse(input)?;
            let mut options = SessionOptions::new();
            options.theme = args.theme;
            options.tone = args.tone;
            options.max_narrative_words = args.max_narrative_words;
            encode(&engine.start_session(options))
        }
        "end_session" => {
            let args: EndSessionInput = parse(input)?;
            encode(&engine.end_session(&SessionId::from(args.session_id))?)
        }
        "reset_all" => {
            let _: ResetAllInput = parse(input)?;
            encode(&engine.reset_all())
        }
        "move" => {
            let args: MoveInput = parse(input)?;
            let session = session_ref(&args.session_id);
            encode(&engine.move_dir(&args.direction, session.as_ref())?)
        }
        "look" => {
            let args: LookInput = parse(input)?;
            encode(&engine.look(session_ref(&args.session_id).as_ref())?)
        }
        "log_narrative" => {
            let args: LogNarrativeInput = parse(input)?;
            let session = session_ref(&args.session_id);
            encode(&engine.log_narrative(&args.text, EventId(args.event_id), session.as_ref())?)
        }
        "journal" => {
            let args: JournalInput = parse(input)?;
            encode(&engine.journal(session_ref(&args.session_id).as_ref())?)
        }
        "get_active_session" => {
            let _: GetActiveSessionInput = parse(input)?;
            match engine.get_active_session() {
                Some(summary) => encode(&summary),
                None => Ok(json!({ "session_id": null, "status": "no_active_session" })),
            }
        }
        "set_active_session" => {
            let args: SetActiveSessionInput = parse(input)?;
            encode(&engine.set_active_session(&SessionId::from(args.session_id))?)
        }
        "list_sessions" => {
            let _: ListSessionsInput = parse(input)?;
            Ok(json!({ "sessions": engine.list_sessions() }))
        }
        "spawn_npc" => {
            let args: SpawnNpcInput = parse(input)?;
            let session = session_ref(&args.session_id);
            encode(&engine.spawn_npc(args.name.as_deref(), args.kind.as_deref(), session.as_ref())?)
        }
        "get_npc" => {
            let args: GetNpcInput = parse(input)?;
            let session = session_ref(&args.session_id);
            let npc = engine.get_npc(&NpcId::from(args.npc_id), session.as_ref())?;
            Ok(json!({ "npc": npc }))
        }
        "generate_encounter" => {
            let args: GenerateEncounterInput = parse(input)?;
            let session = session_ref(&args.session_id);
            encode(&engine.generate_encounter(
                args.name.as_deref(),
                args.kind.as_deref(),
                session.as_ref(),
            )?)
        }
        "attack" => {
            let args: AttackInput = parse(input)?;
            let advantage = Advantage::from_flags(args.advantage, args.disadvantage).ok_or_else(|| {
                EngineError::InvalidArgument(
                    "advantage and disadvantage are mutually exclusive".to_string(),
                )
            })?;
            let mut request = AttackRequest::new(args.weapon, args.damage).with_advantage(advantage);
            request.target = args.target.filter(|t| !t.trim().is_empty()).map(NpcId::from);
            let session = session_ref(&args.session_id);
            encode(&engine.attack(&request, session.as_ref())?)
        }
        "combat_status" => {
            let args: CombatStatusInput = parse(input)?;
            encode(&engine.combat_status(session_ref(&args.session_id).as_ref())?)
        }
        "combat_end" => {
            let args: CombatEndInput = parse(input)?;
            encode(&engine.combat_end(session_ref(&args.session_id).as_ref())?)
        }
        "roll_dice" => {
            let args: RollDiceInput = parse(input)?;
            let roll = dice::roll(&args.notation).map_err(EngineError::from)?;
            encode(&roll)
        }
        "roll_with_advantage" => {
            let args: RollWithAdvantageInput = parse(input)?;
            let roll = dice::roll_with_advantage(&args.notation).map_err(EngineError::from)?;
            encode(&roll)
        }
        "health" => {
            let _: HealthInput = parse(input)?;
            Ok(json!({
                "status": "ok",
                "server": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "pid": std::process::id(),
                "sessions": engine.list_sessions().len(),
                "tools": tool_names(),
            }))
        }
        "ping" => {
            let _: PingInput = parse(input)?;
            Ok(json!("pong"))
        }
        "tools_help" => {
            let _: ToolsHelpInput = parse(input)?;
            Ok(Value::String(tools_help()))
        }
        _ => Err(ToolError::UnknownTool(name.to_string())),
    }
}
