//! Election runtime
//!
//! Drives the lifecycle of the single running election: nominations,
//! ballots, runoffs, recalls, activity-gated voting and persistence.
//!
//! The [`ElectionManager`] owns all state and is driven by the
//! [`ElectionScheduler`], which runs the evaluation and activity ticks.
//! Hosts plug in through the traits in [`collaborators`].

#![deny(unsafe_code)]

pub mod activity;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod manager;
pub mod messages;
pub mod persistence;
pub mod scheduler;

pub use activity::ActivityTracker;
pub use collaborators::{
    Clock, CommandDispatcher, ElectionEvent, ManualClock, Presence, RecordingDispatcher,
    StaticPresence, SystemClock,
};
pub use config::{ElectionConfig, NominationConfig, RecallConfig, SchedulerConfig, VotingConfig};
pub use error::{StateError, StateResult};
pub use manager::{ElectionManager, StatusView};
pub use messages::{fill_placeholders, MessageKey, Messages};
pub use persistence::{
    decode_state, encode_state, InMemoryStateStore, JsonFileStateStore, StateDocument, StateStore,
};
pub use scheduler::ElectionScheduler;
