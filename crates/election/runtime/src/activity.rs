//! Activity Tracker - measures participation for voting eligibility
//!
//! Each activity tick credits one second to every connected member who is
//! not away. Totals survive restarts and are never reset by elections.

use election_types::ActorId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const SECONDS_PER_HOUR: u64 = 3_600;

/// Accumulated active seconds per member plus the cached away flags
#[derive(Debug, Clone, Default)]
pub struct ActivityTracker {
    seconds: BTreeMap<ActorId, u64>,
    away: BTreeSet<ActorId>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted totals; away flags start clear
    pub fn from_seconds(seconds: BTreeMap<ActorId, u64>) -> Self {
        Self {
            seconds,
            away: BTreeSet::new(),
        }
    }

    /// Update the cached away flag for a member
    pub fn set_away(&mut self, actor: ActorId, away: bool) {
        if away {
            self.away.insert(actor);
        } else {
            self.away.remove(&actor);
        }
    }

    pub fn is_away(&self, actor: &ActorId) -> bool {
        self.away.contains(actor)
    }

    /// Credit one second to each connected member who is not away.
    ///
    /// Returns how many members were credited.
    pub fn accumulate<'a>(&mut self, online: impl IntoIterator<Item = &'a ActorId>) -> usize {
        let mut credited = 0;
        for actor in online {
            if self.away.contains(actor) {
                continue;
            }
            let total = self.seconds.entry(*actor).or_insert(0);
            *total = total.saturating_add(1);
            credited += 1;
        }
        if credited > 0 {
            debug!(credited = credited, "Activity accumulated");
        }
        credited
    }

    pub fn seconds(&self, actor: &ActorId) -> u64 {
        self.seconds.get(actor).copied().unwrap_or(0)
    }

    /// Whole hours of activity
    pub fn hours(&self, actor: &ActorId) -> u64 {
        self.seconds(actor) / SECONDS_PER_HOUR
    }

    /// All recorded totals
    pub fn all_seconds(&self) -> &BTreeMap<ActorId, u64> {
        &self.seconds
    }

    /// Overwrite a member's total
    pub fn set_seconds(&mut self, actor: ActorId, seconds: u64) {
        self.seconds.insert(actor, seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_skips_away() {
        let mut tracker = ActivityTracker::new();
        let active = ActorId::generate();
        let idle = ActorId::generate();
        tracker.set_away(idle, true);

        for _ in 0..3 {
            tracker.accumulate(&[active, idle]);
        }

        assert_eq!(tracker.seconds(&active), 3);
        assert_eq!(tracker.seconds(&idle), 0);

        tracker.set_away(idle, false);
        assert_eq!(tracker.accumulate(&[idle]), 1);
        assert_eq!(tracker.seconds(&idle), 1);
    }

    #[test]
    fn test_hours_round_down() {
        let mut tracker = ActivityTracker::new();
        let actor = ActorId::generate();
        tracker.set_seconds(actor, 2 * 3_600 + 3_599);
        assert_eq!(tracker.hours(&actor), 2);
        assert_eq!(tracker.hours(&ActorId::generate()), 0);
    }

    #[test]
    fn test_restore_keeps_totals() {
        let actor = ActorId::generate();
        let mut seconds = BTreeMap::new();
        seconds.insert(actor, 42);
        let mut tracker = ActivityTracker::from_seconds(seconds);
        tracker.accumulate(&[actor]);
        assert_eq!(tracker.seconds(&actor), 43);
        assert!(!tracker.is_away(&actor));
    }
}
