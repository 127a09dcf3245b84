//! Election Domain Types
//!
//! This crate defines the data model for timed community elections: the
//! actors who nominate and vote, the election record that tracks one
//! contest from creation to conclusion, and the compact duration codec
//! used for election lengths and countdowns.
//!
//! # Key Concepts
//!
//! - **Election Record**: one contest for a role. Regular elections are
//!   decided by plurality; recall elections challenge the most recent
//!   winner and pass on an absolute ballot count.
//! - **Nominee**: an actor who may receive ballots. Nomination order is
//!   preserved and decides runoff survivors on a tie.
//! - **Ballot**: a voter's current choice. One live ballot per voter;
//!   switching candidates is counted and capped.
//! - **One-shot guards**: `announced_finished` and `commands_ran` make
//!   conclusion side effects fire at most once.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. Time is always
//! passed in by the caller so every transition is deterministic.

#![deny(unsafe_code)]

mod actor;
mod duration;
mod election;
mod errors;
mod outcome;

pub use actor::*;
pub use duration::*;
pub use election::*;
pub use errors::*;
pub use outcome::*;
