//! Background loops that drive the election manager

use crate::config::SchedulerConfig;
use crate::manager::ElectionManager;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Runs the evaluation tick and the activity tick on fixed intervals.
///
/// Both loops share the manager through an async mutex, so every operation
/// observes a consistent state. Must be started from within a Tokio runtime.
pub struct ElectionScheduler {
    config: SchedulerConfig,
    manager: Arc<Mutex<ElectionManager>>,
    handles: Vec<JoinHandle<()>>,
}

impl ElectionScheduler {
    pub fn new(config: SchedulerConfig, manager: Arc<Mutex<ElectionManager>>) -> Self {
        Self {
            config,
            manager,
            handles: Vec::new(),
        }
    }

    /// Shared handle to the manager
    pub fn manager(&self) -> Arc<Mutex<ElectionManager>> {
        self.manager.clone()
    }

    /// Start both loops, replacing any that are already running
    pub fn start(&mut self) {
        self.stop();

        let manager = self.manager.clone();
        let period = Duration::from_millis(self.config.tick_interval_ms.max(1));
        self.handles.push(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                manager.lock().await.tick();
            }
        }));

        let manager = self.manager.clone();
        let period = Duration::from_millis(self.config.activity_interval_ms.max(1));
        self.handles.push(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                manager.lock().await.tick_activity();
            }
        }));

        tracing::info!(
            tick_interval_ms = self.config.tick_interval_ms,
            activity_interval_ms = self.config.activity_interval_ms,
            "Election scheduler started"
        );
    }

    /// Cancel both loops. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        tracing::info!("Election scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }
}

impl Drop for ElectionScheduler {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}
