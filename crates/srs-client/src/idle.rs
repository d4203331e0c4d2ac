//! Idle watchdog.
//!
//! The server drops clients that stop talking; we do the same on our side
//! so a silently dead link does not linger forever. Activity is measured
//! on the outbound side only.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use srs_session::SharedSession;

pub struct IdleWatchdog {
    session: SharedSession,
    timeout: Duration,
    check_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl IdleWatchdog {
    pub fn new(
        session: SharedSession,
        timeout: Duration,
        check_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            timeout,
            check_interval,
            shutdown,
        }
    }

    /// Run until shutdown or expiry. Returns true if the session went idle.
    pub async fn run(mut self) -> bool {
        let mut interval = tokio::time::interval(self.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_signalled(&mut self.shutdown) => {
                    tracing::debug!("idle watchdog stopping");
                    return false;
                }

                _ = interval.tick() => {
                    let idle = self.session.idle_for();
                    if idle > self.timeout {
                        tracing::warn!(
                            idle_secs = idle.as_secs(),
                            timeout_secs = self.timeout.as_secs(),
                            "no outbound traffic, disconnecting"
                        );
                        return true;
                    }
                }
            }
        }
    }
}

/// Resolves once the shutdown flag is set or its sender is gone.
pub(crate) async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
