//! Tunable election parameters
//!
//! The engine only consumes these values; loading them from files or the
//! environment is the host's job.

use chrono::Duration;
use election_types::parse_duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Runoff extension applied when a regular election ends in a tie
pub const RUNOFF_EXTENSION_HOURS: i64 = 24;

/// Election rules and message overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Nomination limits
    #[serde(default)]
    pub nomination: NominationConfig,

    /// Ballot eligibility and change limits
    #[serde(default)]
    pub voting: VotingConfig,

    /// Recall (no-confidence) rules
    #[serde(default)]
    pub recall: RecallConfig,

    /// Directives dispatched once when a regular election is won.
    /// Placeholders: `%winner%`, `%role%`.
    #[serde(default)]
    pub commands_on_win: Vec<String>,

    /// Message template overrides keyed by message name
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

/// Nomination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NominationConfig {
    /// Nominations each non-privileged member may make per election
    #[serde(default = "default_max_per_actor")]
    pub max_per_actor: u32,
}

impl Default for NominationConfig {
    fn default() -> Self {
        Self {
            max_per_actor: default_max_per_actor(),
        }
    }
}

impl NominationConfig {
    /// Cap actually enforced; never below one
    pub fn effective_max(&self) -> u32 {
        self.max_per_actor.max(1)
    }
}

/// Voting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Whole hours of recorded activity required before voting
    #[serde(default = "default_required_activity_hours")]
    pub required_activity_hours: u64,

    /// Times a voter may switch candidates after the first ballot
    #[serde(default = "default_max_changes")]
    pub max_changes: u32,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            required_activity_hours: default_required_activity_hours(),
            max_changes: default_max_changes(),
        }
    }
}

/// Recall configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Recall length as a compact duration string
    #[serde(default = "default_recall_duration")]
    pub duration: String,

    /// Ballots needed for a recall to pass
    #[serde(default = "default_required_votes")]
    pub required_votes: u64,

    /// Directives dispatched once when a recall passes.
    /// Placeholders: `%target%`, `%role%`.
    #[serde(default)]
    pub commands_on_pass: Vec<String>,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            duration: default_recall_duration(),
            required_votes: default_required_votes(),
            commands_on_pass: Vec::new(),
        }
    }
}

impl RecallConfig {
    /// Parsed recall length, falling back to 24 hours
    pub fn duration(&self) -> Duration {
        parse_duration(&self.duration)
            .filter(|d| *d > Duration::zero())
            .unwrap_or_else(|| Duration::hours(24))
    }

    /// Pass threshold actually enforced; never below one
    pub fn effective_required_votes(&self) -> u64 {
        self.required_votes.max(1)
    }
}

/// Periodic task cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Election evaluation interval in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Activity accumulation interval in milliseconds
    #[serde(default = "default_activity_interval")]
    pub activity_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            activity_interval_ms: default_activity_interval(),
        }
    }
}

// Default value helpers
fn default_max_per_actor() -> u32 {
    1
}

fn default_required_activity_hours() -> u64 {
    12
}

fn default_max_changes() -> u32 {
    2
}

fn default_recall_duration() -> String {
    "24h".to_string()
}

fn default_required_votes() -> u64 {
    6
}

fn default_tick_interval() -> u64 {
    1_000
}

fn default_activity_interval() -> u64 {
    1_000
}
