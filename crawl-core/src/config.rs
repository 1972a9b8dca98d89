//! Engine and session configuration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Process-level tuning for a `WorldEngine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum journal lines kept per session; oldest are evicted first.
    pub journal_max_entries: usize,

    /// A journal rollup is written every this many turns.
    pub journal_rollup_interval: u64,

    /// Once a session's event log grows past this many entries it is cut
    /// back to `event_log_retain`.
    pub event_log_ceiling: usize,

    /// Number of most-recent events kept after a cut.
    pub event_log_retain: usize,

    /// Longest narrative line (in characters) copied into the journal.
    pub narrative_snippet_chars: usize,

    pub default_theme: String,
    pub default_tone: String,
    pub default_max_narrative_words: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            journal_max_entries: 32,
            journal_rollup_interval: 8,
            event_log_ceiling: 5000,
            event_log_retain: 4000,
            narrative_snippet_chars: 120,
            default_theme: "dungeon".to_string(),
            default_tone: "moody".to_string(),
            default_max_narrative_words: 80,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by any `CRAWL_*` environment variables.
    ///
    /// Recognized: `CRAWL_JOURNAL_MAX`, `CRAWL_ROLLUP_INTERVAL`,
    /// `CRAWL_EVENT_CEILING`, `CRAWL_EVENT_RETAIN`, `CRAWL_SNIPPET_CHARS`,
    /// `CRAWL_THEME`, `CRAWL_TONE`, `CRAWL_MAX_NARRATIVE_WORDS`.
    /// Unparseable values are skipped with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        env_override("CRAWL_JOURNAL_MAX", &mut config.journal_max_entries);
        env_override("CRAWL_ROLLUP_INTERVAL", &mut config.journal_rollup_interval);
        env_override("CRAWL_EVENT_CEILING", &mut config.event_log_ceiling);
        env_override("CRAWL_EVENT_RETAIN", &mut config.event_log_retain);
        env_override("CRAWL_SNIPPET_CHARS", &mut config.narrative_snippet_chars);
        env_override("CRAWL_THEME", &mut config.default_theme);
        env_override("CRAWL_TONE", &mut config.default_tone);
        env_override(
            "CRAWL_MAX_NARRATIVE_WORDS",
            &mut config.default_max_narrative_words,
        );
        config.normalized()
    }

    /// Set the journal capacity.
    pub fn with_journal_max_entries(mut self, max: usize) -> Self {
        self.journal_max_entries = max;
        self.normalized()
    }

    /// Set how many turns pass between journal rollups.
    pub fn with_rollup_interval(mut self, turns: u64) -> Self {
        self.journal_rollup_interval = turns;
        self.normalized()
    }

    /// Set the event log ceiling and the window kept after truncation.
    pub fn with_event_log_bounds(mut self, ceiling: usize, retain: usize) -> Self {
        self.event_log_ceiling = ceiling;
        self.event_log_retain = retain;
        self.normalized()
    }

    /// Set the default narrative length cap for new sessions.
    pub fn with_default_max_narrative_words(mut self, words: u32) -> Self {
        self.default_max_narrative_words = words;
        self.normalized()
    }

    /// Clamp values into a usable range: every bound at least 1, the
    /// retained window no larger than the ceiling.
    fn normalized(mut self) -> Self {
        self.journal_max_entries = self.journal_max_entries.max(1);
        self.journal_rollup_interval = self.journal_rollup_interval.max(1);
        self.event_log_ceiling = self.event_log_ceiling.max(1);
        self.event_log_retain = self.event_log_retain.clamp(1, self.event_log_ceiling);
        self.narrative_snippet_chars = self.narrative_snippet_chars.max(1);
        self.default_max_narrative_words = self.default_max_narrative_words.max(1);
        self
    }
}

fn env_override<T: FromStr>(key: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config value"),
    }
}

/// Per-session settings chosen at `start_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub theme: String,
    pub tone: String,
    pub max_narrative_words: u32,
}

/// Caller options for `start_session`; unset fields take the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub theme: Option<String>,
    pub tone: Option<String>,
    pub max_narrative_words: Option<u32>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    pub fn with_max_narrative_words(mut self, words: u32) -> Self {
        self.max_narrative_words = Some(words);
        self
    }

    /// Resolve against engine defaults. Blank strings and a zero cap count
    /// as unset.
    pub(crate) fn resolve(self, config: &EngineConfig) -> SessionSettings {
        let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        SessionSettings {
            theme: non_blank(self.theme).unwrap_or_else(|| config.default_theme.clone()),
            tone: non_blank(self.tone).unwrap_or_else(|| config.default_tone.clone()),
            max_narrative_words: self
                .max_narrative_words
                .filter(|w| *w > 0)
                .unwrap_or(config.default_max_narrative_words),
        }
    }
}
