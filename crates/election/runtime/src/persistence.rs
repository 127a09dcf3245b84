//! State persistence - save and load election state across restarts.
//!
//! The state document holds the last winner memory, the current election
//! record and the activity totals:
//!
//! ```json
//! {
//!   "last": { "winner": "<id>", "role": "Mayor" },
//!   "current": { "role": "Mayor", "type": "REGULAR", "status": "ACTIVE", ... },
//!   "activitySeconds": { "<id>": 43200 }
//! }
//! ```
//!
//! Decoding is tolerant: absent scalars take defaults, absent collections
//! are empty, and malformed entries are skipped one at a time.

use crate::error::{StateError, StateResult};
use chrono::{DateTime, TimeZone, Utc};
use election_types::{ActorId, Election, ElectionParts, ElectionStatus, ElectionType};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Everything the manager persists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDocument {
    pub last_winner: Option<ActorId>,
    pub last_role: Option<String>,
    pub current: Option<Election>,
    pub activity_seconds: BTreeMap<ActorId, u64>,
}

/// Storage backend for the state document
pub trait StateStore: Send + Sync {
    /// Read the stored document; `None` when nothing has been saved yet
    fn load(&self) -> StateResult<Option<Value>>;

    /// Replace the stored document
    fn save(&self, document: &Value) -> StateResult<()>;
}

/// JSON file store.
///
/// Writes go to a `.tmp` sibling and are renamed into place so an
/// interrupted save never leaves a truncated document.
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self) -> StateResult<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, document: &Value) -> StateResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory store (for testing)
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    document: Mutex<Option<Value>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a raw document
    pub fn with_document(document: Value) -> Self {
        Self {
            document: Mutex::new(Some(document)),
        }
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self) -> StateResult<Option<Value>> {
        let document = self.document.lock().map_err(|_| StateError::LockPoisoned)?;
        Ok(document.clone())
    }

    fn save(&self, document: &Value) -> StateResult<()> {
        let mut slot = self.document.lock().map_err(|_| StateError::LockPoisoned)?;
        *slot = Some(document.clone());
        Ok(())
    }
}

// --- Encoding ---

/// Encode the state document
pub fn encode_state(state: &StateDocument) -> Value {
    let mut root = Map::new();

    let mut last = Map::new();
    if let Some(winner) = state.last_winner {
        last.insert("winner".into(), json!(winner.to_string()));
    }
    if let Some(role) = &state.last_role {
        last.insert("role".into(), json!(role));
    }
    if !last.is_empty() {
        root.insert("last".into(), Value::Object(last));
    }

    if let Some(election) = &state.current {
        root.insert("current".into(), encode_election(election));
    }

    let activity: Map<String, Value> = state
        .activity_seconds
        .iter()
        .map(|(id, secs)| (id.to_string(), json!(secs)))
        .collect();
    root.insert("activitySeconds".into(), Value::Object(activity));

    Value::Object(root)
}

fn encode_election(election: &Election) -> Value {
    let id_map = |m: &BTreeMap<ActorId, ActorId>| -> Map<String, Value> {
        m.iter()
            .map(|(k, v)| (k.to_string(), json!(v.to_string())))
            .collect()
    };

    let mut current = Map::new();
    current.insert("role".into(), json!(election.role()));
    current.insert("type".into(), json!(election.election_type().as_str()));
    current.insert("status".into(), json!(election.status().as_str()));
    current.insert(
        "startedAt".into(),
        json!(election.started_at().timestamp_millis()),
    );
    current.insert("endsAt".into(), json!(election.ends_at().timestamp_millis()));
    current.insert(
        "nominees".into(),
        json!(election
            .nominees()
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()),
    );
    current.insert("votes".into(), Value::Object(id_map(election.votes())));
    current.insert(
        "platforms".into(),
        Value::Object(
            election
                .platforms()
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect(),
        ),
    );
    current.insert(
        "voteChanges".into(),
        Value::Object(
            election
                .vote_changes()
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect(),
        ),
    );
    current.insert(
        "nominations".into(),
        Value::Object(
            election
                .nominations_by()
                .iter()
                .map(|(k, targets)| {
                    (
                        k.to_string(),
                        json!(targets.iter().map(|t| t.to_string()).collect::<Vec<_>>()),
                    )
                })
                .collect(),
        ),
    );
    if let Some(winner) = election.winner() {
        current.insert("winner".into(), json!(winner.to_string()));
    }
    current.insert("commandsRan".into(), json!(election.commands_ran()));
    current.insert(
        "announcedFinished".into(),
        json!(election.announced_finished()),
    );

    Value::Object(current)
}

// --- Decoding ---

/// Decode a state document.
///
/// Only a non-object root is an error; everything below it degrades to
/// defaults. `now` fills in missing timestamps.
pub fn decode_state(document: &Value, now: DateTime<Utc>) -> StateResult<StateDocument> {
    let root = document
        .as_object()
        .ok_or_else(|| StateError::Malformed("root is not an object".into()))?;

    let mut state = StateDocument::default();

    if let Some(last) = root.get("last").and_then(Value::as_object) {
        state.last_winner = last
            .get("winner")
            .and_then(Value::as_str)
            .and_then(|s| parse_id(s, "last.winner"));
        state.last_role = last
            .get("role")
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    if let Some(current) = root.get("current").and_then(Value::as_object) {
        state.current = Some(decode_election(current, now));
    }

    if let Some(activity) = root.get("activitySeconds").and_then(Value::as_object) {
        for (key, value) in activity {
            let Some(id) = parse_id(key, "activitySeconds") else {
                continue;
            };
            match value.as_u64() {
                Some(secs) => {
                    state.activity_seconds.insert(id, secs);
                }
                None => warn!(actor = %id, "Skipping non-numeric activity total"),
            }
        }
    }

    Ok(state)
}

fn decode_election(current: &Map<String, Value>, now: DateTime<Utc>) -> Election {
    let role = current
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let election_type = current
        .get("type")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<ElectionType>().ok())
        .unwrap_or_default();

    let status = current
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<ElectionStatus>().ok())
        .unwrap_or_default();

    let started_at = timestamp(current.get("startedAt")).unwrap_or(now);
    let ends_at = timestamp(current.get("endsAt")).unwrap_or(now);

    let nominees = current
        .get("nominees")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .filter_map(|s| parse_id(s, "current.nominees"))
                .collect()
        })
        .unwrap_or_default();

    let mut votes = BTreeMap::new();
    for (voter, candidate) in entries(current, "votes") {
        let candidate = candidate.as_str().and_then(|s| parse_id(s, "current.votes"));
        if let (Some(voter), Some(candidate)) = (parse_id(voter, "current.votes"), candidate) {
            votes.insert(voter, candidate);
        }
    }

    let mut platforms = BTreeMap::new();
    for (nominee, text) in entries(current, "platforms") {
        if let (Some(nominee), Some(text)) = (parse_id(nominee, "current.platforms"), text.as_str())
        {
            platforms.insert(nominee, text.to_string());
        }
    }

    let mut vote_changes = BTreeMap::new();
    for (voter, count) in entries(current, "voteChanges") {
        let count = count.as_u64().and_then(|c| u32::try_from(c).ok());
        if let (Some(voter), Some(count)) = (parse_id(voter, "current.voteChanges"), count) {
            vote_changes.insert(voter, count);
        }
    }

    let mut nominations_by: BTreeMap<ActorId, BTreeSet<ActorId>> = BTreeMap::new();
    for (nominator, targets) in entries(current, "nominations") {
        let Some(nominator) = parse_id(nominator, "current.nominations") else {
            continue;
        };
        let targets: BTreeSet<ActorId> = targets
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| parse_id(s, "current.nominations"))
                    .collect()
            })
            .unwrap_or_default();
        nominations_by.insert(nominator, targets);
    }

    let winner = current
        .get("winner")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| parse_id(s, "current.winner"));

    Election::from_parts(ElectionParts {
        role,
        election_type,
        status,
        started_at,
        ends_at,
        nominees,
        votes,
        platforms,
        vote_changes,
        nominations_by,
        winner,
        commands_ran: flag(current, "commandsRan"),
        announced_finished: flag(current, "announcedFinished"),
    })
}

fn entries<'a>(
    section: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = (&'a String, &'a Value)> {
    section
        .get(key)
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|m| m.iter())
}

fn flag(section: &Map<String, Value>, key: &str) -> bool {
    section.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let millis = value?.as_i64()?;
    Utc.timestamp_millis_opt(millis).single()
}

fn parse_id(raw: &str, section: &str) -> Option<ActorId> {
    match raw.parse::<ActorId>() {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(section = section, error = %e, "Skipping malformed state entry");
            None
        }
    }
}
