//! Message templates
//!
//! Every caller-facing or broadcast message has a key and a default
//! template. Configured overrides replace the default for their key.
//! Placeholders are written `%name%`.

use std::collections::BTreeMap;

/// Identifies a message template
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKey {
    NoElection,
    ElectionExists,
    InvalidDuration,
    Created,
    CreatedConfirm,
    ElectionClosed,
    CannotSelfNominate,
    AlreadyNominated,
    NominationOffline,
    NominationLimit,
    NominationSuccess,
    NominationConfirm,
    UnnominateMissing,
    UnnominateSuccess,
    NotNominee,
    RecallPlatform,
    PlatformEmpty,
    PlatformSet,
    PlatformView,
    PlatformMissing,
    VotingClosed,
    VoteActivity,
    NotNominated,
    VoteAccepted,
    VoteUpdated,
    VoteUnchanged,
    VoteChangeLimit,
    Rigged,
    RecallStarted,
    RecallConfirm,
    RecallUnavailable,
    RecallTarget,
    RecallPassed,
    RecallFailed,
    TieExtended,
    Winner,
    NoWinner,
    Ended,
    StatusIdle,
    StatusReport,
}

impl MessageKey {
    pub const ALL: [MessageKey; 40] = [
        MessageKey::NoElection,
        MessageKey::ElectionExists,
        MessageKey::InvalidDuration,
        MessageKey::Created,
        MessageKey::CreatedConfirm,
        MessageKey::ElectionClosed,
        MessageKey::CannotSelfNominate,
        MessageKey::AlreadyNominated,
        MessageKey::NominationOffline,
        MessageKey::NominationLimit,
        MessageKey::NominationSuccess,
        MessageKey::NominationConfirm,
        MessageKey::UnnominateMissing,
        MessageKey::UnnominateSuccess,
        MessageKey::NotNominee,
        MessageKey::RecallPlatform,
        MessageKey::PlatformEmpty,
        MessageKey::PlatformSet,
        MessageKey::PlatformView,
        MessageKey::PlatformMissing,
        MessageKey::VotingClosed,
        MessageKey::VoteActivity,
        MessageKey::NotNominated,
        MessageKey::VoteAccepted,
        MessageKey::VoteUpdated,
        MessageKey::VoteUnchanged,
        MessageKey::VoteChangeLimit,
        MessageKey::Rigged,
        MessageKey::RecallStarted,
        MessageKey::RecallConfirm,
        MessageKey::RecallUnavailable,
        MessageKey::RecallTarget,
        MessageKey::RecallPassed,
        MessageKey::RecallFailed,
        MessageKey::TieExtended,
        MessageKey::Winner,
        MessageKey::NoWinner,
        MessageKey::Ended,
        MessageKey::StatusIdle,
        MessageKey::StatusReport,
    ];

    /// Configuration name of this message
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::NoElection => "no-election",
            MessageKey::ElectionExists => "election-exists",
            MessageKey::InvalidDuration => "invalid-duration",
            MessageKey::Created => "created",
            MessageKey::CreatedConfirm => "created-confirm",
            MessageKey::ElectionClosed => "election-closed",
            MessageKey::CannotSelfNominate => "cannot-self-nominate",
            MessageKey::AlreadyNominated => "already-nominated",
            MessageKey::NominationOffline => "nomination-offline",
            MessageKey::NominationLimit => "nomination-limit",
            MessageKey::NominationSuccess => "nomination-success",
            MessageKey::NominationConfirm => "nomination-confirm",
            MessageKey::UnnominateMissing => "unnominate-missing",
            MessageKey::UnnominateSuccess => "unnominate-success",
            MessageKey::NotNominee => "not-nominee",
            MessageKey::RecallPlatform => "recall-platform",
            MessageKey::PlatformEmpty => "platform-empty",
            MessageKey::PlatformSet => "platform-set",
            MessageKey::PlatformView => "platform-view",
            MessageKey::PlatformMissing => "platform-missing",
            MessageKey::VotingClosed => "voting-closed",
            MessageKey::VoteActivity => "vote-activity",
            MessageKey::NotNominated => "not-nominated",
            MessageKey::VoteAccepted => "vote-accepted",
            MessageKey::VoteUpdated => "vote-updated",
            MessageKey::VoteUnchanged => "vote-unchanged",
            MessageKey::VoteChangeLimit => "vote-change-limit",
            MessageKey::Rigged => "rigged",
            MessageKey::RecallStarted => "recall-started",
            MessageKey::RecallConfirm => "recall-confirm",
            MessageKey::RecallUnavailable => "recall-unavailable",
            MessageKey::RecallTarget => "recall-target",
            MessageKey::RecallPassed => "recall-passed",
            MessageKey::RecallFailed => "recall-failed",
            MessageKey::TieExtended => "tie-extended",
            MessageKey::Winner => "winner",
            MessageKey::NoWinner => "no-winner",
            MessageKey::Ended => "ended",
            MessageKey::StatusIdle => "status-idle",
            MessageKey::StatusReport => "status-report",
        }
    }

    /// Built-in template used when no override is configured
    pub fn default_template(&self) -> &'static str {
        match self {
            MessageKey::NoElection => "There is no active election right now.",
            MessageKey::ElectionExists => "An election already exists. End it first.",
            MessageKey::InvalidDuration => "Duration must be greater than zero.",
            MessageKey::Created => "An election for %role% has begun! Voting closes in %duration%.",
            MessageKey::CreatedConfirm => "Election created for %role%.",
            MessageKey::ElectionClosed => "This election already ended. End it to clear the results.",
            MessageKey::CannotSelfNominate => "You cannot nominate yourself.",
            MessageKey::AlreadyNominated => "That member is already nominated.",
            MessageKey::NominationOffline => "You can only nominate members who are online.",
            MessageKey::NominationLimit => "You have reached the nomination limit (%max%).",
            MessageKey::NominationSuccess => "%target% has been nominated for %role%!",
            MessageKey::NominationConfirm => "Nominated %target%.",
            MessageKey::UnnominateMissing => "That member is not nominated.",
            MessageKey::UnnominateSuccess => "%target% is no longer a nominee.",
            MessageKey::NotNominee => "You must be a nominee to do that.",
            MessageKey::RecallPlatform => "Platforms are disabled for recall votes.",
            MessageKey::PlatformEmpty => "Platform cannot be empty.",
            MessageKey::PlatformSet => "Updated your platform: %platform%",
            MessageKey::PlatformView => "Platform for %target%: %platform%",
            MessageKey::PlatformMissing => "That nominee has not set a platform yet.",
            MessageKey::VotingClosed => "Voting is closed. Results are being displayed.",
            MessageKey::VoteActivity => {
                "You need %needed% hours of activity to vote. You have %have% hours."
            }
            MessageKey::NotNominated => "That member is not a nominee.",
            MessageKey::VoteAccepted => "Your vote for %candidate% has been recorded.",
            MessageKey::VoteUpdated => "Your vote has been changed to %candidate%.",
            MessageKey::VoteUnchanged => "You already voted for %candidate%.",
            MessageKey::VoteChangeLimit => "You have reached the vote change limit (%max%).",
            MessageKey::Rigged => "All ballots now count for %winner%.",
            MessageKey::RecallStarted => {
                "A recall vote against %target% for %role% has begun (%duration%)."
            }
            MessageKey::RecallConfirm => "Recall vote started against %target%.",
            MessageKey::RecallUnavailable => "No winner is currently in office to challenge.",
            MessageKey::RecallTarget => {
                "Only the current office holder (%winner%) can face a recall right now."
            }
            MessageKey::RecallPassed => {
                "The recall of %target% as %role% passed with %votes% votes."
            }
            MessageKey::RecallFailed => "The recall for %role% failed (%votes%/%needed% votes).",
            MessageKey::TieExtended => {
                "The election for %role% is tied! Runoff between %candidates% for another %duration%."
            }
            MessageKey::Winner => {
                "The election for %role% has ended. Winner: %winner% (%votes% votes)"
            }
            MessageKey::NoWinner => "The election for %role% finished with no winner.",
            MessageKey::Ended => "The election has been cleared.",
            MessageKey::StatusIdle => "No election is running.",
            MessageKey::StatusReport => {
                "Role: %role%\nType: %type%\nStatus: %state%\nEnds in: %remaining%\nNominees: %nominees%"
            }
        }
    }
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Template catalogue with configured overrides
#[derive(Debug, Clone, Default)]
pub struct Messages {
    overrides: BTreeMap<String, String>,
}

impl Messages {
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Template for a key, override first
    pub fn template(&self, key: MessageKey) -> &str {
        self.overrides
            .get(key.as_str())
            .map(String::as_str)
            .unwrap_or_else(|| key.default_template())
    }

    /// Render a template, replacing each `%name%` with its value
    pub fn render(&self, key: MessageKey, vars: &[(&str, &str)]) -> String {
        fill_placeholders(self.template(key), vars)
    }
}

/// Substitute placeholders in a free-form directive
pub fn fill_placeholders(template: &str, vars: &[(&str, &str)]) -> String {
    let mut text = template.to_string();
    for (name, value) in vars {
        text = text.replace(&format!("%{}%", name), value);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique() {
        let names: HashSet<&str> = MessageKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), MessageKey::ALL.len());
    }

    #[test]
    fn test_render_default() {
        let messages = Messages::default();
        let text = messages.render(
            MessageKey::NominationSuccess,
            &[("target", "alice"), ("role", "Mayor")],
        );
        assert_eq!(text, "alice has been nominated for Mayor!");
    }

    #[test]
    fn test_override_wins() {
        let mut overrides = BTreeMap::new();
        overrides.insert("no-election".to_string(), "Nothing to see.".to_string());
        let messages = Messages::new(overrides);
        assert_eq!(messages.render(MessageKey::NoElection, &[]), "Nothing to see.");
        assert_eq!(
            messages.render(MessageKey::Ended, &[]),
            MessageKey::Ended.default_template()
        );
    }

    #[test]
    fn test_fill_placeholders() {
        assert_eq!(
            fill_placeholders("lp user %winner% parent add %role%", &[("winner", "bob"), ("role", "mayor")]),
            "lp user bob parent add mayor"
        );
    }
}
