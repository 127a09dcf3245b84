use chrono::{Duration, TimeZone, Utc};
use election_runtime::{
    ElectionConfig, ElectionEvent, ElectionManager, JsonFileStateStore, ManualClock,
    RecordingDispatcher, StateStore, StaticPresence,
};
use election_types::{Actor, ActorId, ElectionType};
use std::sync::Arc;

struct Host {
    presence: Arc<StaticPresence>,
    dispatcher: Arc<RecordingDispatcher>,
    clock: Arc<ManualClock>,
    store: Arc<dyn StateStore>,
}

impl Host {
    fn new(store: Arc<dyn StateStore>) -> Self {
        let start = Utc
            .timestamp_millis_opt(1_767_225_600_000)
            .single()
            .expect("valid start");
        Self {
            presence: Arc::new(StaticPresence::new()),
            dispatcher: Arc::new(RecordingDispatcher::new()),
            clock: Arc::new(ManualClock::new(start)),
            store,
        }
    }

    fn manager(&self, config: ElectionConfig) -> ElectionManager {
        ElectionManager::new(
            config,
            self.presence.clone(),
            self.dispatcher.clone(),
            self.store.clone(),
        )
        .with_clock(self.clock.clone())
    }

    fn member(&self, name: &str) -> ActorId {
        let id = ActorId::generate();
        self.presence.connect(id, name);
        id
    }
}

fn open_config() -> ElectionConfig {
    let mut config = ElectionConfig::default();
    config.voting.required_activity_hours = 0;
    config.commands_on_win = vec!["grant %winner% %role%".to_string()];
    config.recall.required_votes = 2;
    config.recall.commands_on_pass = vec!["revoke %target% %role%".to_string()];
    config
}

fn memory_host() -> Host {
    Host::new(Arc::new(election_runtime::InMemoryStateStore::new()))
}

#[test]
fn election_then_recall_full_cycle() {
    let host = memory_host();
    let mut manager = host.manager(open_config());
    let mut events = manager.subscribe();

    let alice = host.member("alice");
    let bob = host.member("bob");
    let voters: Vec<ActorId> = (0..3).map(|i| host.member(&format!("v{}", i))).collect();

    assert!(manager.create_election("Mayor", Duration::hours(1)).is_ok());
    assert!(manager.nominate(&Actor::member(voters[0]), alice).is_ok());
    assert!(manager.nominate(&Actor::member(voters[1]), bob).is_ok());
    assert!(manager.vote(voters[0], alice).is_ok());
    assert!(manager.vote(voters[1], alice).is_ok());
    assert!(manager.vote(voters[2], bob).is_ok());

    host.clock.advance(Duration::hours(1) + Duration::seconds(1));
    manager.tick();

    let election = manager.current_election().expect("election kept until cleared");
    assert!(!election.is_active());
    assert_eq!(election.winner(), Some(alice));
    assert_eq!(host.dispatcher.dispatched(), vec!["grant alice Mayor".to_string()]);

    assert!(manager.end_election().is_ok());
    assert!(manager.current_election().is_none());
    assert_eq!(manager.last_winner(), Some(alice));

    // Recall the winner
    assert!(manager.start_recall(&Actor::member(bob), alice).is_ok());
    let recall = manager.current_election().expect("recall running");
    assert_eq!(recall.election_type(), ElectionType::Recall);
    assert_eq!(recall.nominees(), &[alice]);

    assert!(manager.vote(voters[0], alice).is_ok());
    assert!(manager.vote(voters[1], alice).is_ok());
    manager.tick();

    assert!(!manager.current_election().expect("finished recall").is_active());
    assert!(manager.last_winner().is_none());
    assert!(host
        .dispatcher
        .dispatched()
        .contains(&"revoke alice Mayor".to_string()));

    let mut announcements = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ElectionEvent::Announcement { message } = event {
            announcements.push(message);
        }
    }
    assert_eq!(
        announcements.last().map(String::as_str),
        Some("The recall of alice as Mayor passed with 2 votes.")
    );
    assert!(announcements
        .iter()
        .any(|m| m == "The election for Mayor has ended. Winner: alice (2 votes)"));
}

#[test]
fn runoff_then_single_winner() {
    let host = memory_host();
    let mut manager = host.manager(open_config());
    let a = host.member("a");
    let b = host.member("b");
    let c = host.member("c");
    let voters: Vec<ActorId> = (0..5).map(|i| host.member(&format!("v{}", i))).collect();

    manager.create_election("Judge", Duration::minutes(10));
    for nominee in [a, b, c] {
        assert!(manager.nominate(&Actor::Console, nominee).is_ok());
    }
    manager.vote(voters[0], a);
    manager.vote(voters[1], b);
    manager.vote(voters[2], c);

    host.clock.advance(Duration::minutes(11));
    manager.tick();

    let election = manager.current_election().expect("runoff");
    assert!(election.is_active());
    assert_eq!(election.nominees(), &[a, b]);
    assert_eq!(election.ballot(&voters[2]), None);

    // The dropped candidate's voter may vote again
    assert!(manager.vote(voters[2], b).is_ok());
    host.clock.advance(Duration::hours(25));
    manager.tick();

    let election = manager.current_election().expect("finished");
    assert_eq!(election.winner(), Some(b));
}

#[test]
fn activity_gate_opens_after_enough_ticks() {
    let host = memory_host();
    let mut config = open_config();
    config.voting.required_activity_hours = 1;
    let mut manager = host.manager(config);
    let nominee = host.member("nominee");
    let voter = host.member("voter");

    manager.create_election("Clerk", Duration::hours(2));
    manager.nominate(&Actor::Console, nominee);

    for _ in 0..3_599 {
        manager.tick_activity();
    }
    assert!(!manager.vote(voter, nominee).is_ok());

    manager.tick_activity();
    assert_eq!(manager.active_seconds(&voter), 3_600);
    assert!(manager.vote(voter, nominee).is_ok());
}

#[test]
fn state_survives_restart_through_json_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("state.json");
    let host = Host::new(Arc::new(JsonFileStateStore::new(&path)));

    let alice = host.member("alice");
    let bob = host.member("bob");
    let voter = host.member("voter");

    let mut first = host.manager(open_config());
    first.create_election("Mayor", Duration::hours(3));
    first.nominate(&Actor::member(voter), alice);
    first.nominate(&Actor::admin(voter), bob);
    first.vote(voter, alice);
    first.vote(voter, bob);
    first.set_platform(&Actor::member(alice), alice, "Trains on time");
    first.tick_activity();
    first.save_state().expect("save");
    assert!(path.exists());

    let mut second = host.manager(open_config());
    assert!(second.load_state());
    assert_eq!(second.current_election(), first.current_election());
    assert_eq!(second.active_seconds(&voter), 1);

    let restored = second.current_election().expect("restored");
    assert_eq!(restored.vote_change_count(&voter), 1);
    assert_eq!(restored.platform(&alice), Some("Trains on time"));
    assert_eq!(restored.nomination_count(&voter), 2);
}

#[test]
fn missing_or_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");

    let host = Host::new(Arc::new(JsonFileStateStore::new(&path)));
    let mut manager = host.manager(open_config());
    assert!(!manager.load_state());

    std::fs::write(&path, b"{ not json").expect("write");
    assert!(!manager.load_state());
    assert!(manager.current_election().is_none());
    assert!(manager.status().is_ok());
}
