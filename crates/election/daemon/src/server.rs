//! Daemon lifecycle: restore, run the tickers, autosave, save on shutdown

use crate::config::DaemonConfig;
use crate::error::DaemonResult;
use election_runtime::{
    CommandDispatcher, ElectionEvent, ElectionManager, ElectionScheduler, JsonFileStateStore,
    Presence, StateStore, StaticPresence,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Dispatcher for headless hosts: directives are written to the log
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl CommandDispatcher for LogDispatcher {
    fn dispatch(&self, directive: &str) {
        tracing::info!(directive = directive, "Election directive");
    }
}

/// Election daemon server
pub struct Server {
    config: DaemonConfig,
    manager: Arc<Mutex<ElectionManager>>,
    scheduler: ElectionScheduler,
}

impl Server {
    /// Create a server backed by the configured state file
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        if let Some(parent) = config.storage.state_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Arc::new(JsonFileStateStore::new(&config.storage.state_path));
        Ok(Self::with_collaborators(
            config,
            Arc::new(StaticPresence::new()),
            Arc::new(LogDispatcher),
            store,
        ))
    }

    /// Create a server with explicit collaborators
    pub fn with_collaborators(
        config: DaemonConfig,
        presence: Arc<dyn Presence>,
        dispatcher: Arc<dyn CommandDispatcher>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let manager = ElectionManager::new(config.election.clone(), presence, dispatcher, store);
        let manager = Arc::new(Mutex::new(manager));
        let scheduler = ElectionScheduler::new(config.scheduler.clone(), manager.clone());
        Self {
            config,
            manager,
            scheduler,
        }
    }

    /// Shared handle to the election manager
    pub fn manager(&self) -> Arc<Mutex<ElectionManager>> {
        self.manager.clone()
    }

    /// Run until Ctrl+C or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` completes, then stop the tickers and save
    pub async fn run_until<F>(mut self, shutdown: F) -> DaemonResult<()>
    where
        F: Future<Output = ()>,
    {
        let events = {
            let mut manager = self.manager.lock().await;
            let restored = manager.load_state();
            tracing::info!(
                restored = restored,
                state_path = %self.config.storage.state_path.display(),
                "Election daemon starting"
            );
            manager.subscribe()
        };

        let relay = tokio::spawn(relay_announcements(events));
        self.scheduler.start();

        let autosave_secs = self.config.storage.autosave_interval_secs;
        let autosave = autosave_loop(self.manager.clone(), autosave_secs);

        tokio::select! {
            _ = shutdown => {}
            _ = autosave => {}
        }

        tracing::info!("Election daemon shutting down");
        self.scheduler.stop();
        relay.abort();

        let manager = self.manager.lock().await;
        match manager.save_state() {
            Ok(()) => tracing::info!("Election state saved on shutdown"),
            Err(e) => tracing::warn!(error = %e, "Failed to save election state on shutdown"),
        }
        Ok(())
    }
}

/// Save periodically; never completes
async fn autosave_loop(manager: Arc<Mutex<ElectionManager>>, every_secs: u64) {
    if every_secs == 0 {
        std::future::pending::<()>().await;
        return;
    }

    let mut ticker = interval(Duration::from_secs(every_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = manager.lock().await.save_state() {
            tracing::warn!(error = %e, "Autosave failed");
        }
    }
}

/// Write public announcements to the log
async fn relay_announcements(mut events: broadcast::Receiver<ElectionEvent>) {
    loop {
        match events.recv().await {
            Ok(ElectionEvent::Announcement { message }) => {
                tracing::info!(message = %message, "Announcement");
            }
            Ok(ElectionEvent::StateChanged { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped = skipped, "Announcement relay lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use election_runtime::{InMemoryStateStore, RecordingDispatcher};
    use election_types::{Actor, ActorId};

    fn file_config(dir: &tempfile::TempDir) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.storage.state_path = dir.path().join("data").join("state.json");
        config
    }

    #[tokio::test]
    async fn test_new_creates_state_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        let _server = Server::new(config).unwrap();
        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn test_shutdown_saves_and_restart_restores() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        let path = config.storage.state_path.clone();

        let server = Server::new(config.clone()).unwrap();
        {
            let handle = server.manager();
            let mut manager = handle.lock().await;
            assert!(manager.create_election("Mayor", chrono::Duration::hours(1)).is_ok());
        }
        server.run_until(async {}).await.unwrap();
        assert!(path.exists());

        let restarted = Server::new(config).unwrap();
        let manager = restarted.manager();
        restarted.run_until(async {}).await.unwrap();

        let manager = manager.lock().await;
        let election = manager.current_election().unwrap();
        assert_eq!(election.role(), "Mayor");
        assert!(election.is_active());
    }

    #[tokio::test]
    async fn test_failed_shutdown_save_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = Arc::new(JsonFileStateStore::new(blocker.join("state.json")));

        let server = Server::with_collaborators(
            DaemonConfig::default(),
            Arc::new(StaticPresence::new()),
            Arc::new(RecordingDispatcher::new()),
            store.clone(),
        );
        {
            let handle = server.manager();
            let mut manager = handle.lock().await;
            assert!(manager.create_election("Mayor", chrono::Duration::hours(1)).is_ok());
            assert!(manager.save_state().is_err());
        }

        assert!(server.run_until(async {}).await.is_ok());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tickers_run_while_serving() {
        let presence = Arc::new(StaticPresence::new());
        let member = ActorId::generate();
        presence.connect(member, "member");
        let store = Arc::new(InMemoryStateStore::new());

        let server = Server::with_collaborators(
            DaemonConfig::default(),
            presence,
            Arc::new(RecordingDispatcher::new()),
            store.clone(),
        );
        let manager = server.manager();
        {
            let mut m = manager.lock().await;
            m.create_election("Mayor", chrono::Duration::hours(1));
            assert!(m.nominate(&Actor::Console, member).is_ok());
        }

        server
            .run_until(tokio::time::sleep(Duration::from_millis(3_500)))
            .await
            .unwrap();

        assert!(manager.lock().await.active_seconds(&member) >= 3);
        assert!(store.load().unwrap().is_some());
    }
}
