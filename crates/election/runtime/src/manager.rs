//! Election Manager - owns the current election and drives its lifecycle
//!
//! The manager coordinates every state change of the single running
//! election: creation, nominations, ballots, platforms, recalls and the
//! periodic evaluation that concludes an election or sends it to a runoff.
//! It also owns the activity totals that gate voting and the memory of the
//! most recent winner that a recall can target.
//!
//! All operations are synchronous and return an [`ActionResult`]. Checks run
//! before any mutation, so a rejected operation leaves state untouched.

use crate::activity::ActivityTracker;
use crate::collaborators::{Clock, CommandDispatcher, ElectionEvent, Presence, SystemClock};
use crate::config::{ElectionConfig, RUNOFF_EXTENSION_HOURS};
use crate::error::StateResult;
use crate::messages::{fill_placeholders, MessageKey, Messages};
use crate::persistence::{decode_state, encode_state, StateDocument, StateStore};
use chrono::Duration;
use election_types::{
    format_duration, normalize_platform, ActionResult, Actor, ActorId, BallotOutcome, Election,
    ElectionType,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Internal result: `Err` carries the rejection returned to the caller
type Outcome = Result<ActionResult, ActionResult>;

fn settle(outcome: Outcome) -> ActionResult {
    outcome.unwrap_or_else(|rejected| rejected)
}

/// Read-only projection of the current election
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusView {
    pub role: String,
    pub election_type: ElectionType,
    pub active: bool,
    pub remaining: Duration,
    pub nominee_count: usize,
}

/// What the evaluation tick decided to do
enum TickAction {
    Idle,
    RecallPassed,
    RecallFailed,
    Expired,
}

/// The Election Manager - single owner of election state
pub struct ElectionManager {
    config: ElectionConfig,
    messages: Messages,
    current: Option<Election>,
    last_winner: Option<ActorId>,
    last_role: Option<String>,
    activity: ActivityTracker,
    presence: Arc<dyn Presence>,
    dispatcher: Arc<dyn CommandDispatcher>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<ElectionEvent>,
}

impl ElectionManager {
    pub fn new(
        config: ElectionConfig,
        presence: Arc<dyn Presence>,
        dispatcher: Arc<dyn CommandDispatcher>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            messages: Messages::new(config.messages.clone()),
            config,
            current: None,
            last_winner: None,
            last_role: None,
            activity: ActivityTracker::new(),
            presence,
            dispatcher,
            store,
            clock: Arc::new(SystemClock),
            events,
        }
    }

    /// Use a specific time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Receive announcements and state snapshots
    pub fn subscribe(&self) -> broadcast::Receiver<ElectionEvent> {
        self.events.subscribe()
    }

    // --- Query methods ---

    pub fn current_election(&self) -> Option<&Election> {
        self.current.as_ref()
    }

    /// Winner of the most recent regular election, if still in office
    pub fn last_winner(&self) -> Option<ActorId> {
        self.last_winner
    }

    pub fn last_role(&self) -> Option<&str> {
        self.last_role.as_deref()
    }

    pub fn active_seconds(&self, actor: &ActorId) -> u64 {
        self.activity.seconds(actor)
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    /// Structured status, `None` when no election exists
    pub fn status_view(&self) -> Option<StatusView> {
        let now = self.clock.now();
        self.current.as_ref().map(|e| StatusView {
            role: e.role().to_string(),
            election_type: e.election_type(),
            active: e.is_active(),
            remaining: e.remaining(now),
            nominee_count: e.nominees().len(),
        })
    }

    /// Human-readable status report
    pub fn status(&self) -> ActionResult {
        let Some(view) = self.status_view() else {
            return ActionResult::ok(self.render(MessageKey::StatusIdle, &[]));
        };

        let kind = match view.election_type {
            ElectionType::Regular => "Election",
            ElectionType::Recall => "Recall",
        };
        let (state, remaining) = if view.active {
            ("Active", format_duration(view.remaining))
        } else {
            ("Finished", "Finished".to_string())
        };
        let nominees = view.nominee_count.to_string();

        ActionResult::ok(self.render(
            MessageKey::StatusReport,
            &[
                ("role", &view.role),
                ("type", kind),
                ("state", state),
                ("remaining", &remaining),
                ("nominees", &nominees),
            ],
        ))
    }

    // --- Operations ---

    /// Start a regular election for `role` lasting `duration`
    pub fn create_election(&mut self, role: &str, duration: Duration) -> ActionResult {
        settle(self.try_create_election(role, duration))
    }

    fn try_create_election(&mut self, role: &str, duration: Duration) -> Outcome {
        if duration <= Duration::zero() {
            return Err(self.reject(MessageKey::InvalidDuration, &[]));
        }
        if self.current.is_some() {
            return Err(self.reject(MessageKey::ElectionExists, &[]));
        }

        let now = self.clock.now();
        self.current = Some(Election::new(role, ElectionType::Regular, now, now + duration));

        let formatted = format_duration(duration);
        info!(role = role, duration = %formatted, "Election created");
        self.announce(MessageKey::Created, &[("role", role), ("duration", &formatted)]);
        self.notify();

        Ok(ActionResult::ok(
            self.render(MessageKey::CreatedConfirm, &[("role", role)]),
        ))
    }

    /// Nominate `target` on behalf of `actor`
    pub fn nominate(&mut self, actor: &Actor, target: ActorId) -> ActionResult {
        settle(self.try_nominate(actor, target))
    }

    fn try_nominate(&mut self, actor: &Actor, target: ActorId) -> Outcome {
        let election = self.require_active(MessageKey::ElectionClosed)?;

        if actor.is(&target) {
            return Err(self.reject(MessageKey::CannotSelfNominate, &[]));
        }
        if election.is_nominee(&target) {
            return Err(self.reject(MessageKey::AlreadyNominated, &[]));
        }
        if !self.presence.is_online(&target) {
            return Err(self.reject(MessageKey::NominationOffline, &[]));
        }
        if let (Some(nominator), false) = (actor.id(), actor.is_privileged()) {
            let max = self.config.nomination.effective_max();
            if election.nomination_count(&nominator) >= max as usize {
                let max = max.to_string();
                return Err(self.reject(MessageKey::NominationLimit, &[("max", &max)]));
            }
        }

        let role = election.role().to_string();
        if let Some(election) = self.current.as_mut() {
            election.add_nominee(target);
            if let Some(nominator) = actor.id() {
                election.record_nomination(nominator, target);
            }
        }

        let name = self.presence.name_of(&target);
        info!(role = %role, nominee = %target, "Nominee added");
        self.announce(
            MessageKey::NominationSuccess,
            &[("target", &name), ("role", &role)],
        );
        self.notify();

        Ok(ActionResult::ok(
            self.render(MessageKey::NominationConfirm, &[("target", &name)]),
        ))
    }

    /// Withdraw a nomination, discarding its ballots and platform
    pub fn unnominate(&mut self, actor: &Actor, target: ActorId) -> ActionResult {
        settle(self.try_unnominate(actor, target))
    }

    fn try_unnominate(&mut self, actor: &Actor, target: ActorId) -> Outcome {
        let election = self.require_active(MessageKey::ElectionClosed)?;
        if !election.is_nominee(&target) {
            return Err(self.reject(MessageKey::UnnominateMissing, &[]));
        }

        if let Some(election) = self.current.as_mut() {
            election.remove_nominee(&target);
        }

        info!(nominee = %target, by = ?actor.id(), "Nominee withdrawn");
        self.notify();

        let name = self.presence.name_of(&target);
        Ok(ActionResult::ok(
            self.render(MessageKey::UnnominateSuccess, &[("target", &name)]),
        ))
    }

    /// Store a nominee's platform statement
    pub fn set_platform(&mut self, actor: &Actor, nominee: ActorId, text: &str) -> ActionResult {
        settle(self.try_set_platform(actor, nominee, text))
    }

    fn try_set_platform(&mut self, actor: &Actor, nominee: ActorId, text: &str) -> Outcome {
        let election = self.require_election()?;
        if election.is_recall() {
            return Err(self.reject(MessageKey::RecallPlatform, &[]));
        }
        if !election.is_nominee(&nominee) {
            return Err(self.reject(MessageKey::NotNominee, &[]));
        }
        if !election.is_active() {
            return Err(self.reject(MessageKey::ElectionClosed, &[]));
        }
        if !actor.is(&nominee) && !actor.is_privileged() {
            return Err(self.reject(MessageKey::NotNominee, &[]));
        }
        let Some(platform) = normalize_platform(text) else {
            return Err(self.reject(MessageKey::PlatformEmpty, &[]));
        };

        if let Some(election) = self.current.as_mut() {
            election.set_platform(nominee, &platform);
        }

        debug!(nominee = %nominee, "Platform updated");
        self.notify();

        Ok(ActionResult::ok(
            self.render(MessageKey::PlatformSet, &[("platform", &platform)]),
        ))
    }

    /// Show a nominee's platform
    pub fn view_platform(&self, nominee: ActorId) -> ActionResult {
        settle(self.try_view_platform(nominee))
    }

    fn try_view_platform(&self, nominee: ActorId) -> Outcome {
        let election = self.require_election()?;
        if election.is_recall() {
            return Err(self.reject(MessageKey::RecallPlatform, &[]));
        }
        if !election.is_nominee(&nominee) {
            return Err(self.reject(MessageKey::NotNominee, &[]));
        }
        let Some(platform) = election.platform(&nominee) else {
            return Err(self.reject(MessageKey::PlatformMissing, &[]));
        };

        let name = self.presence.name_of(&nominee);
        Ok(ActionResult::ok(self.render(
            MessageKey::PlatformView,
            &[("target", &name), ("platform", platform)],
        )))
    }

    /// Cast or change a ballot
    pub fn vote(&mut self, voter: ActorId, target: ActorId) -> ActionResult {
        settle(self.try_vote(voter, target))
    }

    fn try_vote(&mut self, voter: ActorId, target: ActorId) -> Outcome {
        let election = self.require_active(MessageKey::VotingClosed)?;

        let needed = self.config.voting.required_activity_hours;
        let have = self.activity.hours(&voter);
        if have < needed {
            let (needed, have) = (needed.to_string(), have.to_string());
            return Err(self.reject(
                MessageKey::VoteActivity,
                &[("needed", &needed), ("have", &have)],
            ));
        }
        if !election.is_nominee(&target) {
            return Err(self.reject(MessageKey::NotNominated, &[]));
        }

        let max_changes = self.config.voting.max_changes;
        let outcome = match self.current.as_mut() {
            Some(election) => election.cast_ballot(voter, target, max_changes),
            None => BallotOutcome::NotNominee,
        };

        if outcome.is_accepted() {
            self.notify();
        }

        let name = self.presence.name_of(&target);
        match outcome {
            BallotOutcome::Cast => {
                debug!(voter = %voter, candidate = %target, "Ballot cast");
                Ok(ActionResult::ok(
                    self.render(MessageKey::VoteAccepted, &[("candidate", &name)]),
                ))
            }
            BallotOutcome::Unchanged => Ok(ActionResult::ok(
                self.render(MessageKey::VoteUnchanged, &[("candidate", &name)]),
            )),
            BallotOutcome::Changed {
                previous,
                changes_used,
            } => {
                debug!(
                    voter = %voter,
                    from = %previous,
                    to = %target,
                    changes_used = changes_used,
                    "Ballot changed"
                );
                Ok(ActionResult::ok(
                    self.render(MessageKey::VoteUpdated, &[("candidate", &name)]),
                ))
            }
            BallotOutcome::ChangeLimitReached { previous } => {
                debug!(voter = %voter, kept = %previous, "Ballot change refused");
                let max = max_changes.to_string();
                Err(self.reject(MessageKey::VoteChangeLimit, &[("max", &max)]))
            }
            BallotOutcome::NotNominee => Err(self.reject(MessageKey::NotNominated, &[])),
        }
    }

    /// Administrative override: every existing ballot now counts for `target`
    pub fn force_result(&mut self, target: ActorId) -> ActionResult {
        settle(self.try_force_result(target))
    }

    fn try_force_result(&mut self, target: ActorId) -> Outcome {
        self.require_election()?;

        let redirected = self
            .current
            .as_mut()
            .map(|e| e.redirect_ballots(target))
            .unwrap_or(0);

        warn!(target = %target, ballots = redirected, "Ballots forced to a single candidate");
        self.notify();

        let name = self.presence.name_of(&target);
        Ok(ActionResult::ok(
            self.render(MessageKey::Rigged, &[("winner", &name)]),
        ))
    }

    /// Start a recall against the most recent winner
    pub fn start_recall(&mut self, actor: &Actor, target: ActorId) -> ActionResult {
        settle(self.try_start_recall(actor, target))
    }

    fn try_start_recall(&mut self, actor: &Actor, target: ActorId) -> Outcome {
        if self.current.is_some() {
            return Err(self.reject(MessageKey::ElectionExists, &[]));
        }
        let (Some(incumbent), Some(role)) = (self.last_winner, self.last_role.clone()) else {
            return Err(self.reject(MessageKey::RecallUnavailable, &[]));
        };
        if target != incumbent {
            let name = self.presence.name_of(&incumbent);
            return Err(self.reject(MessageKey::RecallTarget, &[("winner", &name)]));
        }

        let duration = self.config.recall.duration();
        let now = self.clock.now();
        let mut election = Election::new(role.clone(), ElectionType::Recall, now, now + duration);
        election.add_nominee(target);
        self.current = Some(election);

        let name = self.presence.name_of(&target);
        let formatted = format_duration(duration);
        info!(role = %role, target = %target, by = ?actor.id(), "Recall started");
        self.announce(
            MessageKey::RecallStarted,
            &[("role", &role), ("target", &name), ("duration", &formatted)],
        );
        self.notify();

        Ok(ActionResult::ok(
            self.render(MessageKey::RecallConfirm, &[("target", &name)]),
        ))
    }

    /// Clear the election, quietly concluding it first if still running
    pub fn end_election(&mut self) -> ActionResult {
        settle(self.try_end_election())
    }

    fn try_end_election(&mut self) -> Outcome {
        let election = self.require_election()?;

        if election.is_active() {
            if election.is_recall() {
                // Forced end uses the plurality rule; the sole target wins by default
                let passed = election.plurality_winner().is_some();
                self.conclude_recall(passed, true);
            } else {
                self.conclude_regular(true);
            }
        }

        if let Some(election) = self.current.take() {
            info!(role = %election.role(), winner = ?election.winner(), "Election cleared");
        }
        self.notify();

        Ok(ActionResult::ok(self.render(MessageKey::Ended, &[])))
    }

    // --- Periodic evaluation ---

    /// Re-evaluate the current election against the clock.
    ///
    /// Recalls pass as soon as they reach the ballot threshold and fail at
    /// the deadline. Regular elections conclude or go to a runoff once past
    /// their deadline. Observers are refreshed on every tick while an
    /// election exists.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let action = match self.current.as_ref() {
            None => return,
            Some(e) if !e.is_active() => TickAction::Idle,
            Some(e) if e.is_recall() => {
                if e.total_ballots() >= self.config.recall.effective_required_votes() {
                    TickAction::RecallPassed
                } else if e.is_past_deadline(now) {
                    TickAction::RecallFailed
                } else {
                    TickAction::Idle
                }
            }
            Some(e) if e.is_past_deadline(now) => TickAction::Expired,
            Some(_) => TickAction::Idle,
        };

        match action {
            TickAction::Idle => {}
            TickAction::RecallPassed => self.conclude_recall(true, false),
            TickAction::RecallFailed => self.conclude_recall(false, false),
            TickAction::Expired => self.conclude_or_extend(),
        }

        self.notify();
    }

    /// Credit activity to every connected member who is not away
    pub fn tick_activity(&mut self) {
        let online = self.presence.online_actors();
        self.activity.accumulate(&online);
    }

    /// Update the cached away flag for a member
    pub fn set_away(&mut self, actor: ActorId, away: bool) {
        debug!(actor = %actor, away = away, "Away status changed");
        self.activity.set_away(actor, away);
    }

    fn conclude_or_extend(&mut self) {
        let Some(election) = self.current.as_ref() else {
            return;
        };
        if !election.is_active() {
            return;
        }

        let leaders = election.leaders();
        if leaders.len() >= 2 {
            self.start_runoff(&leaders);
            return;
        }
        if election.total_ballots() == 0 && election.nominees().len() >= 2 {
            // Nobody voted: every nominee is tied at zero
            let everyone = election.nominees().to_vec();
            self.start_runoff(&everyone);
            return;
        }

        self.conclude_regular(false);
    }

    fn start_runoff(&mut self, leaders: &[ActorId]) {
        let extension = Duration::hours(RUNOFF_EXTENSION_HOURS);
        let Some(election) = self.current.as_mut() else {
            return;
        };
        let survivors = election.start_runoff(leaders, extension);
        let role = election.role().to_string();
        let ends_at = election.ends_at();

        let candidates = survivors
            .iter()
            .map(|id| self.presence.name_of(id))
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            role = %role,
            survivors = survivors.len(),
            ends_at = %ends_at,
            "Election tied; runoff extended"
        );
        self.announce(
            MessageKey::TieExtended,
            &[
                ("role", &role),
                ("candidates", &candidates),
                ("duration", &format_duration(extension)),
            ],
        );
    }

    /// Conclude a regular election by plurality.
    ///
    /// `silent` suppresses the public announcement. The announcement and the
    /// win directives are each claimed before they run, so repeating the
    /// conclusion has no further side effects.
    fn conclude_regular(&mut self, silent: bool) {
        let Some(election) = self.current.as_mut() else {
            return;
        };

        let newly_finished = if election.is_active() {
            let winner = election.plurality_winner().map(|(id, _)| id);
            election.finish(winner)
        } else {
            false
        };
        let winner = election.winner();
        let votes = winner.map(|w| election.ballots_for(&w)).unwrap_or(0);
        let role = election.role().to_string();
        let announce = !silent && election.claim_announcement();
        let run_commands = winner.is_some() && election.claim_commands();

        if newly_finished {
            info!(role = %role, winner = ?winner, votes = votes, "Election concluded");
            self.last_winner = winner;
            self.last_role = Some(role.clone());
        }

        if announce {
            match winner {
                Some(w) => {
                    let name = self.presence.name_of(&w);
                    let votes = votes.to_string();
                    self.announce(
                        MessageKey::Winner,
                        &[("role", &role), ("winner", &name), ("votes", &votes)],
                    );
                }
                None => self.announce(MessageKey::NoWinner, &[("role", &role)]),
            }
        }

        if let (true, Some(w)) = (run_commands, winner) {
            let name = self.presence.name_of(&w);
            self.run_directives(
                &self.config.commands_on_win,
                &[("winner", &name), ("role", &role)],
            );
        }
    }

    /// Conclude a recall as passed or failed.
    ///
    /// A pass vacates the seat: the last-winner memory is cleared so the
    /// same incumbent cannot be recalled twice.
    fn conclude_recall(&mut self, passed: bool, silent: bool) {
        let required = self.config.recall.effective_required_votes();
        let Some(election) = self.current.as_mut() else {
            return;
        };
        if !election.is_recall() {
            return;
        }

        let target = election.nominees().first().copied();
        let votes = election.total_ballots();
        let newly_finished = election.finish(if passed { target } else { None });
        let passed = election.winner().is_some();
        let role = election.role().to_string();
        let announce = !silent && election.claim_announcement();
        let run_commands = passed && election.claim_commands();

        if newly_finished {
            info!(role = %role, target = ?target, votes = votes, passed = passed, "Recall concluded");
            if passed {
                self.last_winner = None;
            }
        }

        let name = target
            .map(|t| self.presence.name_of(&t))
            .unwrap_or_else(|| "Unknown".to_string());
        let votes = votes.to_string();

        if announce {
            if passed {
                self.announce(
                    MessageKey::RecallPassed,
                    &[("target", &name), ("role", &role), ("votes", &votes)],
                );
            } else {
                let needed = required.to_string();
                self.announce(
                    MessageKey::RecallFailed,
                    &[("role", &role), ("votes", &votes), ("needed", &needed)],
                );
            }
        }

        if run_commands {
            self.run_directives(
                &self.config.recall.commands_on_pass,
                &[("target", &name), ("role", &role)],
            );
        }
    }

    fn run_directives(&self, directives: &[String], vars: &[(&str, &str)]) {
        for directive in directives {
            self.dispatcher.dispatch(&fill_placeholders(directive, vars));
        }
    }

    // --- Persistence ---

    /// Snapshot of everything that is persisted
    pub fn state_document(&self) -> StateDocument {
        StateDocument {
            last_winner: self.last_winner,
            last_role: self.last_role.clone(),
            current: self.current.clone(),
            activity_seconds: self.activity.all_seconds().clone(),
        }
    }

    /// Write the state document to the store
    pub fn save_state(&self) -> StateResult<()> {
        let document = encode_state(&self.state_document());
        self.store.save(&document)?;
        debug!("Election state saved");
        Ok(())
    }

    /// Restore state from the store.
    ///
    /// An unreadable or malformed document is logged and ignored, leaving
    /// the manager as if nothing had been saved. Returns whether a document
    /// was applied.
    pub fn load_state(&mut self) -> bool {
        let document = match self.store.load() {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!("No saved election state");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load election state");
                return false;
            }
        };

        let state = match decode_state(&document, self.clock.now()) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Failed to decode election state");
                return false;
            }
        };

        self.apply_state(state);
        true
    }

    fn apply_state(&mut self, state: StateDocument) {
        self.last_winner = state.last_winner;
        self.last_role = state.last_role;
        self.current = state.current;
        self.activity = ActivityTracker::from_seconds(state.activity_seconds);

        info!(
            election = ?self.current.as_ref().map(|e| e.role()),
            tracked_actors = self.activity.all_seconds().len(),
            "Election state restored"
        );
        if self.current.is_some() {
            self.notify();
        }
    }

    // --- Helpers ---

    fn require_election(&self) -> Result<&Election, ActionResult> {
        self.current
            .as_ref()
            .ok_or_else(|| self.reject(MessageKey::NoElection, &[]))
    }

    fn require_active(&self, closed: MessageKey) -> Result<&Election, ActionResult> {
        let election = self.require_election()?;
        if !election.is_active() {
            return Err(self.reject(closed, &[]));
        }
        Ok(election)
    }

    fn render(&self, key: MessageKey, vars: &[(&str, &str)]) -> String {
        self.messages.render(key, vars)
    }

    fn reject(&self, key: MessageKey, vars: &[(&str, &str)]) -> ActionResult {
        debug!(reason = %key, "Operation rejected");
        ActionResult::fail(self.render(key, vars))
    }

    fn announce(&self, key: MessageKey, vars: &[(&str, &str)]) {
        let message = self.render(key, vars);
        info!(message = %message, "Announcement");
        // No subscribers is fine
        let _ = self.events.send(ElectionEvent::Announcement { message });
    }

    fn notify(&self) {
        let snapshot = self.current.clone().map(Box::new);
        let _ = self.events.send(ElectionEvent::StateChanged { snapshot });
    }
}
