//! Election record: one contest from creation to conclusion
//!
//! The record owns nominees, ballots and platforms and keeps them
//! consistent: every ballot and platform refers to a current nominee after
//! each mutation, and status only ever moves from active to finished.

use crate::{ActorId, ElectionTypesError, ElectionTypesResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Maximum stored platform length, in characters
pub const MAX_PLATFORM_CHARS: usize = 256;

/// Kind of contest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ElectionType {
    /// Plurality election for a role
    #[default]
    Regular,
    /// No-confidence vote against the most recent winner
    Recall,
}

impl ElectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionType::Regular => "REGULAR",
            ElectionType::Recall => "RECALL",
        }
    }

    pub fn is_recall(&self) -> bool {
        matches!(self, ElectionType::Recall)
    }
}

impl FromStr for ElectionType {
    type Err = ElectionTypesError;

    fn from_str(s: &str) -> ElectionTypesResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REGULAR" => Ok(ElectionType::Regular),
            // Older documents name recalls after the no-confidence motion
            "RECALL" | "NO_CONFIDENCE" => Ok(ElectionType::Recall),
            _ => Err(ElectionTypesError::UnknownElectionType(s.to_string())),
        }
    }
}

/// Lifecycle status of an election
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ElectionStatus {
    /// Accepting nominations and ballots
    #[default]
    Active,
    /// Concluded; results are on display until the election is cleared
    Finished,
}

impl ElectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionStatus::Active => "ACTIVE",
            ElectionStatus::Finished => "FINISHED",
        }
    }
}

impl FromStr for ElectionStatus {
    type Err = ElectionTypesError;

    fn from_str(s: &str) -> ElectionTypesResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ElectionStatus::Active),
            "FINISHED" => Ok(ElectionStatus::Finished),
            _ => Err(ElectionTypesError::UnknownElectionStatus(s.to_string())),
        }
    }
}

/// Result of casting a ballot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BallotOutcome {
    /// First ballot from this voter
    Cast,
    /// Voter re-cast the candidate they already chose
    Unchanged,
    /// Voter switched candidates
    Changed { previous: ActorId, changes_used: u32 },
    /// Switch refused; the previous ballot stands
    ChangeLimitReached { previous: ActorId },
    /// Candidate is not on the ballot
    NotNominee,
}

impl BallotOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            BallotOutcome::Cast | BallotOutcome::Unchanged | BallotOutcome::Changed { .. }
        )
    }
}

/// Raw field values used to rebuild a record from storage
#[derive(Clone, Debug, Deserialize)]
pub struct ElectionParts {
    pub role: String,
    pub election_type: ElectionType,
    pub status: ElectionStatus,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub nominees: Vec<ActorId>,
    pub votes: BTreeMap<ActorId, ActorId>,
    pub platforms: BTreeMap<ActorId, String>,
    pub vote_changes: BTreeMap<ActorId, u32>,
    pub nominations_by: BTreeMap<ActorId, BTreeSet<ActorId>>,
    pub winner: Option<ActorId>,
    pub commands_ran: bool,
    pub announced_finished: bool,
}

/// One election in progress or awaiting clearance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ElectionParts")]
pub struct Election {
    role: String,
    election_type: ElectionType,
    started_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    status: ElectionStatus,
    /// Nomination order is significant
    nominees: Vec<ActorId>,
    /// voter -> candidate
    votes: BTreeMap<ActorId, ActorId>,
    platforms: BTreeMap<ActorId, String>,
    /// voter -> number of switches after the first ballot
    vote_changes: BTreeMap<ActorId, u32>,
    /// nominator -> targets they nominated
    nominations_by: BTreeMap<ActorId, BTreeSet<ActorId>>,
    winner: Option<ActorId>,
    commands_ran: bool,
    announced_finished: bool,
}

impl Election {
    /// Create a new active election
    pub fn new(
        role: impl Into<String>,
        election_type: ElectionType,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            role: role.into(),
            election_type,
            started_at,
            ends_at,
            status: ElectionStatus::Active,
            nominees: Vec::new(),
            votes: BTreeMap::new(),
            platforms: BTreeMap::new(),
            vote_changes: BTreeMap::new(),
            nominations_by: BTreeMap::new(),
            winner: None,
            commands_ran: false,
            announced_finished: false,
        }
    }

    /// Rebuild a record from stored parts.
    ///
    /// Duplicate nominees are collapsed and ballots or platforms that do not
    /// refer to a nominee are dropped.
    pub fn from_parts(parts: ElectionParts) -> Self {
        let mut nominees = Vec::with_capacity(parts.nominees.len());
        for nominee in parts.nominees {
            if !nominees.contains(&nominee) {
                nominees.push(nominee);
            }
        }

        let mut election = Self {
            role: parts.role,
            election_type: parts.election_type,
            started_at: parts.started_at,
            ends_at: parts.ends_at,
            status: parts.status,
            nominees,
            votes: parts.votes,
            platforms: parts.platforms,
            vote_changes: parts.vote_changes,
            nominations_by: parts.nominations_by,
            winner: parts.winner,
            commands_ran: parts.commands_ran,
            announced_finished: parts.announced_finished,
        };
        election.prune_non_nominees();
        election
    }

    // --- Accessors ---

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn election_type(&self) -> ElectionType {
        self.election_type
    }

    pub fn is_recall(&self) -> bool {
        self.election_type.is_recall()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    pub fn status(&self) -> ElectionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ElectionStatus::Active
    }

    pub fn winner(&self) -> Option<ActorId> {
        self.winner
    }

    pub fn commands_ran(&self) -> bool {
        self.commands_ran
    }

    pub fn announced_finished(&self) -> bool {
        self.announced_finished
    }

    pub fn nominees(&self) -> &[ActorId] {
        &self.nominees
    }

    pub fn votes(&self) -> &BTreeMap<ActorId, ActorId> {
        &self.votes
    }

    pub fn platforms(&self) -> &BTreeMap<ActorId, String> {
        &self.platforms
    }

    pub fn vote_changes(&self) -> &BTreeMap<ActorId, u32> {
        &self.vote_changes
    }

    pub fn nominations_by(&self) -> &BTreeMap<ActorId, BTreeSet<ActorId>> {
        &self.nominations_by
    }

    /// Time left before the deadline; zero once finished or overdue
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        if !self.is_active() || now > self.ends_at {
            return Duration::zero();
        }
        self.ends_at - now
    }

    /// Whether the deadline has passed
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.ends_at
    }

    // --- Nominees ---

    pub fn is_nominee(&self, actor: &ActorId) -> bool {
        self.nominees.contains(actor)
    }

    /// Append a nominee; returns false if already nominated
    pub fn add_nominee(&mut self, nominee: ActorId) -> bool {
        if self.is_nominee(&nominee) {
            return false;
        }
        self.nominees.push(nominee);
        true
    }

    /// Remove a nominee along with their ballots and platform
    pub fn remove_nominee(&mut self, nominee: &ActorId) -> bool {
        let before = self.nominees.len();
        self.nominees.retain(|n| n != nominee);
        if self.nominees.len() == before {
            return false;
        }
        self.prune_non_nominees();
        true
    }

    /// Keep only the given nominees, in their current nomination order
    pub fn retain_nominees(&mut self, keep: &[ActorId]) {
        self.nominees.retain(|n| keep.contains(n));
        self.prune_non_nominees();
    }

    pub fn record_nomination(&mut self, nominator: ActorId, target: ActorId) {
        self.nominations_by
            .entry(nominator)
            .or_default()
            .insert(target);
    }

    pub fn nomination_count(&self, nominator: &ActorId) -> usize {
        self.nominations_by
            .get(nominator)
            .map(|targets| targets.len())
            .unwrap_or(0)
    }

    fn prune_non_nominees(&mut self) {
        let nominees = &self.nominees;
        self.votes.retain(|_, candidate| nominees.contains(candidate));
        self.platforms.retain(|nominee, _| nominees.contains(nominee));
    }

    // --- Platforms ---

    pub fn platform(&self, nominee: &ActorId) -> Option<&str> {
        self.platforms.get(nominee).map(String::as_str)
    }

    /// Store a platform for a nominee.
    ///
    /// Text is trimmed and truncated to [`MAX_PLATFORM_CHARS`]. Returns the
    /// stored text, or `None` if the text is blank or the actor is not a
    /// nominee.
    pub fn set_platform(&mut self, nominee: ActorId, text: &str) -> Option<&str> {
        if !self.is_nominee(&nominee) {
            return None;
        }
        let normalized = normalize_platform(text)?;
        self.platforms.insert(nominee, normalized);
        self.platform(&nominee)
    }

    // --- Ballots ---

    pub fn ballot(&self, voter: &ActorId) -> Option<ActorId> {
        self.votes.get(voter).copied()
    }

    pub fn vote_change_count(&self, voter: &ActorId) -> u32 {
        self.vote_changes.get(voter).copied().unwrap_or(0)
    }

    /// Cast or change a ballot.
    ///
    /// A switch to a different candidate is refused once the voter has used
    /// `max_changes` switches; the existing ballot is left untouched.
    pub fn cast_ballot(
        &mut self,
        voter: ActorId,
        candidate: ActorId,
        max_changes: u32,
    ) -> BallotOutcome {
        if !self.is_nominee(&candidate) {
            return BallotOutcome::NotNominee;
        }

        match self.ballot(&voter) {
            None => {
                self.votes.insert(voter, candidate);
                BallotOutcome::Cast
            }
            Some(previous) if previous == candidate => BallotOutcome::Unchanged,
            Some(previous) => {
                let used = self.vote_change_count(&voter);
                if used >= max_changes {
                    return BallotOutcome::ChangeLimitReached { previous };
                }
                self.votes.insert(voter, candidate);
                let changes_used = used + 1;
                self.vote_changes.insert(voter, changes_used);
                BallotOutcome::Changed {
                    previous,
                    changes_used,
                }
            }
        }
    }

    /// Point every existing ballot at `target`, nominating it if needed.
    ///
    /// Returns the number of ballots redirected.
    pub fn redirect_ballots(&mut self, target: ActorId) -> usize {
        self.add_nominee(target);
        for candidate in self.votes.values_mut() {
            *candidate = target;
        }
        self.votes.len()
    }

    pub fn total_ballots(&self) -> u64 {
        self.votes.len() as u64
    }

    /// Ballot counts for nominees with at least one ballot, in nomination order
    pub fn ballot_counts(&self) -> Vec<(ActorId, u64)> {
        let mut tally: BTreeMap<ActorId, u64> = BTreeMap::new();
        for candidate in self.votes.values() {
            *tally.entry(*candidate).or_insert(0) += 1;
        }
        self.nominees
            .iter()
            .filter_map(|n| tally.get(n).map(|count| (*n, *count)))
            .collect()
    }

    /// Ballots for one nominee
    pub fn ballots_for(&self, nominee: &ActorId) -> u64 {
        self.votes.values().filter(|c| *c == nominee).count() as u64
    }

    /// Nominees tied for the highest ballot count, in nomination order.
    ///
    /// Empty when no ballots have been cast.
    pub fn leaders(&self) -> Vec<ActorId> {
        let counts = self.ballot_counts();
        let Some(max) = counts.iter().map(|(_, c)| *c).max() else {
            return Vec::new();
        };
        counts
            .into_iter()
            .filter(|(_, c)| *c == max)
            .map(|(n, _)| n)
            .collect()
    }

    /// Nominee with the most ballots, earliest nomination winning ties.
    ///
    /// With no ballots at all a sole nominee wins with zero votes.
    pub fn plurality_winner(&self) -> Option<(ActorId, u64)> {
        let mut best: Option<(ActorId, u64)> = None;
        for (nominee, count) in self.ballot_counts() {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((nominee, count));
            }
        }
        if best.is_none() && self.nominees.len() == 1 {
            best = Some((self.nominees[0], 0));
        }
        best
    }

    // --- Lifecycle ---

    /// Narrow the field to the first two leaders in nomination order and
    /// push the deadline back.
    ///
    /// Returns the surviving nominees.
    pub fn start_runoff(&mut self, leaders: &[ActorId], extension: Duration) -> Vec<ActorId> {
        let survivors: Vec<ActorId> = self
            .nominees
            .iter()
            .filter(|n| leaders.contains(n))
            .take(2)
            .copied()
            .collect();
        self.retain_nominees(&survivors);
        self.extend(extension);
        survivors
    }

    pub fn extend(&mut self, extension: Duration) {
        self.ends_at += extension;
    }

    /// Mark the election finished with the given winner.
    ///
    /// Returns false and changes nothing if it was already finished.
    pub fn finish(&mut self, winner: Option<ActorId>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = ElectionStatus::Finished;
        self.winner = winner;
        true
    }

    /// Claim the result announcement; true only the first time
    pub fn claim_announcement(&mut self) -> bool {
        !std::mem::replace(&mut self.announced_finished, true)
    }

    /// Claim the post-conclusion commands; true only the first time
    pub fn claim_commands(&mut self) -> bool {
        !std::mem::replace(&mut self.commands_ran, true)
    }
}

impl From<ElectionParts> for Election {
    fn from(parts: ElectionParts) -> Self {
        Self::from_parts(parts)
    }
}

/// Trim and truncate platform text; `None` if nothing remains
pub fn normalize_platform(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_PLATFORM_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ActorId> {
        (0..n).map(|_| ActorId::generate()).collect()
    }

    fn election_with(nominees: &[ActorId]) -> Election {
        let now = Utc::now();
        let mut election = Election::new("Mayor", ElectionType::Regular, now, now + Duration::hours(1));
        for n in nominees {
            election.add_nominee(*n);
        }
        election
    }

    fn cast(election: &mut Election, candidate: ActorId, ballots: usize) {
        for _ in 0..ballots {
            election.cast_ballot(ActorId::generate(), candidate, 2);
        }
    }

    #[test]
    fn test_nominees_are_unique_and_ordered() {
        let n = ids(3);
        let mut election = election_with(&n);
        assert!(!election.add_nominee(n[0]));
        assert_eq!(election.nominees(), n.as_slice());
    }

    #[test]
    fn test_remove_nominee_cascades() {
        let n = ids(2);
        let mut election = election_with(&n);
        let voter = ActorId::generate();
        election.cast_ballot(voter, n[0], 2);
        election.set_platform(n[0], "Lower taxes");

        assert!(election.remove_nominee(&n[0]));
        assert!(!election.remove_nominee(&n[0]));
        assert!(election.ballot(&voter).is_none());
        assert!(election.platform(&n[0]).is_none());
        assert!(election.votes().values().all(|c| *c != n[0]));
    }

    #[test]
    fn test_ballot_changes_are_counted_and_capped() {
        let n = ids(3);
        let mut election = election_with(&n);
        let voter = ActorId::generate();

        assert_eq!(election.cast_ballot(voter, n[0], 1), BallotOutcome::Cast);
        assert_eq!(election.vote_change_count(&voter), 0);

        assert_eq!(election.cast_ballot(voter, n[0], 1), BallotOutcome::Unchanged);
        assert_eq!(election.vote_change_count(&voter), 0);

        assert_eq!(
            election.cast_ballot(voter, n[1], 1),
            BallotOutcome::Changed {
                previous: n[0],
                changes_used: 1
            }
        );
        assert_eq!(election.vote_change_count(&voter), 1);

        let before = election.votes().clone();
        assert_eq!(
            election.cast_ballot(voter, n[2], 1),
            BallotOutcome::ChangeLimitReached { previous: n[1] }
        );
        assert_eq!(election.votes(), &before);
        assert_eq!(election.vote_change_count(&voter), 1);
    }

    #[test]
    fn test_ballot_for_non_nominee_is_refused() {
        let n = ids(1);
        let mut election = election_with(&n);
        let outcome = election.cast_ballot(ActorId::generate(), ActorId::generate(), 2);
        assert_eq!(outcome, BallotOutcome::NotNominee);
        assert_eq!(election.total_ballots(), 0);
    }

    #[test]
    fn test_leaders_and_runoff() {
        let n = ids(3);
        let mut election = election_with(&n);
        cast(&mut election, n[0], 3);
        cast(&mut election, n[1], 3);
        cast(&mut election, n[2], 1);

        let leaders = election.leaders();
        assert_eq!(leaders, vec![n[0], n[1]]);

        let ends_at = election.ends_at();
        let survivors = election.start_runoff(&leaders, Duration::hours(24));
        assert_eq!(survivors, vec![n[0], n[1]]);
        assert_eq!(election.nominees(), &[n[0], n[1]]);
        assert_eq!(election.ends_at(), ends_at + Duration::hours(24));
        assert_eq!(election.total_ballots(), 6);
    }

    #[test]
    fn test_three_way_tie_keeps_first_two() {
        let n = ids(3);
        let mut election = election_with(&n);
        cast(&mut election, n[2], 2);
        cast(&mut election, n[0], 2);
        cast(&mut election, n[1], 2);

        let leaders = election.leaders();
        assert_eq!(leaders.len(), 3);
        let survivors = election.start_runoff(&leaders, Duration::hours(24));
        assert_eq!(survivors, vec![n[0], n[1]]);
        assert_eq!(election.total_ballots(), 4);
    }

    #[test]
    fn test_plurality_winner() {
        let n = ids(2);
        let mut election = election_with(&n);
        assert!(election.plurality_winner().is_none());

        cast(&mut election, n[1], 2);
        cast(&mut election, n[0], 1);
        assert_eq!(election.plurality_winner(), Some((n[1], 2)));
    }

    #[test]
    fn test_sole_nominee_wins_by_default() {
        let n = ids(1);
        let election = election_with(&n);
        assert!(election.leaders().is_empty());
        assert_eq!(election.plurality_winner(), Some((n[0], 0)));
    }

    #[test]
    fn test_redirect_ballots() {
        let n = ids(2);
        let outsider = ActorId::generate();
        let mut election = election_with(&n);
        cast(&mut election, n[0], 2);
        cast(&mut election, n[1], 1);

        let voters: Vec<ActorId> = election.votes().keys().copied().collect();
        assert_eq!(election.redirect_ballots(outsider), 3);
        assert!(election.is_nominee(&outsider));
        assert_eq!(election.votes().keys().copied().collect::<Vec<_>>(), voters);
        assert_eq!(election.ballots_for(&outsider), 3);
    }

    #[test]
    fn test_finish_is_one_way() {
        let n = ids(2);
        let mut election = election_with(&n);
        assert!(election.finish(Some(n[0])));
        assert!(!election.finish(Some(n[1])));
        assert_eq!(election.winner(), Some(n[0]));
        assert_eq!(election.status(), ElectionStatus::Finished);
        assert_eq!(election.remaining(Utc::now()), Duration::zero());
    }

    #[test]
    fn test_one_shot_claims() {
        let mut election = election_with(&ids(1));
        assert!(election.claim_announcement());
        assert!(!election.claim_announcement());
        assert!(election.claim_commands());
        assert!(!election.claim_commands());
    }

    #[test]
    fn test_deserialize_restores_invariants() {
        let n = ids(2);
        let stray = ActorId::generate();
        let voter = ActorId::generate();
        let mut election = election_with(&n);
        election.cast_ballot(voter, n[0], 2);

        let mut value = serde_json::to_value(&election).unwrap();
        value["nominees"] = serde_json::json!([n[0].to_string(), n[1].to_string(), n[0].to_string()]);
        value["votes"][stray.to_string()] = serde_json::json!(stray.to_string());
        value["platforms"][stray.to_string()] = serde_json::json!("orphan");

        let restored: Election = serde_json::from_value(value).unwrap();
        assert_eq!(restored.nominees(), &[n[0], n[1]]);
        assert_eq!(restored.ballot(&voter), Some(n[0]));
        assert_eq!(restored.ballot(&stray), None);
        assert!(restored.platform(&stray).is_none());
    }

    #[test]
    fn test_platform_normalization() {
        let n = ids(1);
        let mut election = election_with(&n);
        assert!(election.set_platform(n[0], "   ").is_none());
        assert!(election.set_platform(ActorId::generate(), "hi").is_none());

        let long = "x".repeat(300);
        let stored = election.set_platform(n[0], &format!("  {}  ", long)).unwrap();
        assert_eq!(stored.chars().count(), MAX_PLATFORM_CHARS);
    }

    #[test]
    fn test_from_parts_restores_invariants() {
        let n = ids(2);
        let stray = ActorId::generate();
        let now = Utc::now();
        let mut votes = BTreeMap::new();
        votes.insert(ActorId::generate(), n[0]);
        votes.insert(ActorId::generate(), stray);
        let mut platforms = BTreeMap::new();
        platforms.insert(stray, "ghost".to_string());

        let election = Election::from_parts(ElectionParts {
            role: "Judge".into(),
            election_type: ElectionType::Regular,
            status: ElectionStatus::Active,
            started_at: now,
            ends_at: now,
            nominees: vec![n[0], n[1], n[0]],
            votes,
            platforms,
            vote_changes: BTreeMap::new(),
            nominations_by: BTreeMap::new(),
            winner: None,
            commands_ran: false,
            announced_finished: false,
        });

        assert_eq!(election.nominees(), n.as_slice());
        assert_eq!(election.total_ballots(), 1);
        assert!(election.platforms().is_empty());
    }

    #[test]
    fn test_type_and_status_parse() {
        assert_eq!("recall".parse::<ElectionType>().unwrap(), ElectionType::Recall);
        assert_eq!("NO_CONFIDENCE".parse::<ElectionType>().unwrap(), ElectionType::Recall);
        assert!("weird".parse::<ElectionType>().is_err());
        assert_eq!("finished".parse::<ElectionStatus>().unwrap(), ElectionStatus::Finished);
    }
}
