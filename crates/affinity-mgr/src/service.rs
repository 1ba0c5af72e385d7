// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Background lifecycle loop.
//!
//! The loop does no work of its own: it wakes up every interval, or
//! immediately when a stop is requested, and exits once stopped. It shares
//! no state with rule creation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

/// Lifecycle state of the service loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// The loop is (or will be) running.
    Running,
    /// A stop was requested; the loop exits at its next wake-up.
    StopRequested,
    /// The loop has exited.
    Stopped,
}

/// Cloneable handle used to stop the service and observe its state.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    state_tx: Arc<watch::Sender<LifecycleState>>,
}

impl ServiceHandle {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    /// Requests the loop to stop. Has no effect once a stop is under way.
    pub fn shutdown(&self) {
        let requested = self.state_tx.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::StopRequested;
                true
            } else {
                false
            }
        });
        if requested {
            info!("Stopping");
        }
    }

    /// Waits until the loop has exited.
    pub async fn wait_stopped(&self) {
        let mut state_rx = self.state_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = state_rx.wait_for(|state| *state == LifecycleState::Stopped).await;
    }
}

/// Idle service loop with an explicit stop protocol.
#[derive(Debug)]
pub struct Service {
    interval: Duration,
    handle: ServiceHandle,
}

impl Service {
    /// Creates a service waking up every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Running);
        Self { interval, handle: ServiceHandle { state_tx: Arc::new(state_tx) } }
    }

    /// Returns a handle for stopping the service from elsewhere.
    #[must_use]
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.handle.state()
    }

    /// Requests the loop to stop.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Runs until a stop is requested.
    pub async fn serve(&self) {
        info!(interval_secs = self.interval.as_secs(), "Starting");
        let mut state_rx = self.handle.state_tx.subscribe();

        while *state_rx.borrow_and_update() == LifecycleState::Running {
            debug!(interval_secs = self.interval.as_secs(), "Sleeping");
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.handle.state_tx.send_replace(LifecycleState::Stopped);
        info!("Stopped");
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_wakes_loop_promptly() {
        let service = Arc::new(Service::default());
        let handle = service.handle();

        let task = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.serve().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.state(), LifecycleState::Running);

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(service.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_loop_keeps_running_across_intervals() {
        let service = Arc::new(Service::new(Duration::from_millis(5)));
        let task = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.serve().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.state(), LifecycleState::Running);

        service.shutdown();
        tokio::time::timeout(Duration::from_secs(1), service.handle().wait_stopped())
            .await
            .unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let service = Service::default();
        service.shutdown();
        assert_eq!(service.state(), LifecycleState::StopRequested);

        tokio::time::timeout(Duration::from_secs(1), service.serve()).await.unwrap();
        assert_eq!(service.state(), LifecycleState::Stopped);

        // Repeated stops are ignored.
        service.shutdown();
        assert_eq!(service.state(), LifecycleState::Stopped);
    }
}
