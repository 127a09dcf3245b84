//! Host collaborators
//!
//! The engine does not know how members connect, how directives are
//! executed, or what time it is. The host supplies these through the traits
//! below and receives announcements and state snapshots as [`ElectionEvent`]s.

use chrono::{DateTime, Duration, Utc};
use election_types::{ActorId, Election};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Who is connected and what they are called
pub trait Presence: Send + Sync {
    /// Whether the actor is currently connected
    fn is_online(&self, actor: &ActorId) -> bool;

    /// All currently connected actors
    fn online_actors(&self) -> Vec<ActorId>;

    /// Human-readable name, if the host knows one
    fn display_name(&self, actor: &ActorId) -> Option<String>;

    /// Name to show in messages, falling back to a short identity
    fn name_of(&self, actor: &ActorId) -> String {
        self.display_name(actor).unwrap_or_else(|| actor.short())
    }
}

/// Executes post-conclusion directives
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, directive: &str);
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Notifications for the presentation and chat layers
#[derive(Debug, Clone, PartialEq)]
pub enum ElectionEvent {
    /// Public message for every connected member
    Announcement { message: String },
    /// Election state changed; `None` once the election is cleared
    StateChanged { snapshot: Option<Box<Election>> },
}

/// Fixed roster presence, useful for tests and headless hosts
#[derive(Debug, Default)]
pub struct StaticPresence {
    online: Mutex<BTreeSet<ActorId>>,
    names: Mutex<BTreeMap<ActorId, String>>,
}

impl StaticPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an actor connected under a display name
    pub fn connect(&self, actor: ActorId, name: impl Into<String>) {
        self.online
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(actor);
        self.names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(actor, name.into());
    }

    /// Mark an actor disconnected; the name stays known
    pub fn disconnect(&self, actor: &ActorId) {
        self.online
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(actor);
    }
}

impl Presence for StaticPresence {
    fn is_online(&self, actor: &ActorId) -> bool {
        self.online
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(actor)
    }

    fn online_actors(&self) -> Vec<ActorId> {
        self.online
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    fn display_name(&self, actor: &ActorId) -> Option<String> {
        self.names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(actor)
            .cloned()
    }
}

/// Dispatcher that records directives instead of executing them
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    dispatched: Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CommandDispatcher for RecordingDispatcher {
    fn dispatch(&self, directive: &str) {
        tracing::info!(directive = directive, "Dispatching election directive");
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(directive.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_static_presence() {
        let presence = StaticPresence::new();
        let alice = ActorId::generate();
        let stranger = ActorId::generate();
        presence.connect(alice, "alice");

        assert!(presence.is_online(&alice));
        assert_eq!(presence.name_of(&alice), "alice");
        assert_eq!(presence.name_of(&stranger), stranger.short());

        presence.disconnect(&alice);
        assert!(!presence.is_online(&alice));
        assert!(presence.online_actors().is_empty());
        assert_eq!(presence.name_of(&alice), "alice");
    }

    #[test]
    fn test_recording_dispatcher() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.dispatch("say hello");
        assert_eq!(dispatcher.dispatched(), vec!["say hello".to_string()]);
    }
}
