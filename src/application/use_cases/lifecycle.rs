use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Drives process shutdown from two independent sources (spec §4.10
/// "lifecycle"): an OS signal (SIGINT/SIGTERM) and an idle timer that fires
/// when no activity has been recorded for `idle_timeout`.
pub struct Lifecycle {
    shutdown: CancellationToken,
    last_activity: Arc<Mutex<Instant>>,
    idle_timeout: Duration,
    idle_poll_interval: Duration,
}

impl Lifecycle {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            shutdown: CancellationToken::new(),
            last_activity: Arc::new(Mutex::new(Instant::now())),
            idle_timeout,
            idle_poll_interval: Duration::from_secs(5).min(idle_timeout),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Resets the idle clock. Call on every request, search, or indexing
    /// event so the process doesn't exit mid-use.
    pub fn touch(&self) {
        *self.last_activity.lock().expect("lifecycle mutex poisoned") = Instant::now();
    }

    /// Blocks until a SIGINT/SIGTERM is received or the idle timeout
    /// elapses, then cancels the shared shutdown token. Callers that need
    /// to react to shutdown from other tasks should clone [`Self::token`]
    /// and await `cancelled()` on it rather than calling this twice.
    pub async fn run_until_shutdown(&self) {
        let idle = self.run_idle_monitor();
        let signals = Self::wait_for_termination_signal();

        tokio::select! {
            _ = idle => info!("shutting down: idle timeout elapsed"),
            _ = signals => info!("shutting down: termination signal received"),
        }
        self.shutdown.cancel();
    }

    async fn run_idle_monitor(&self) {
        loop {
            tokio::time::sleep(self.idle_poll_interval).await;
            let idle_for = {
                let last = *self.last_activity.lock().expect("lifecycle mutex poisoned");
                last.elapsed()
            };
            if idle_for >= self.idle_timeout {
                return;
            }
        }
    }

    #[cfg(unix)]
    async fn wait_for_termination_signal() {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_termination_signal() {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_timeout_triggers_shutdown_without_a_signal() {
        let lifecycle = Lifecycle::new(Duration::from_millis(50));
        let token = lifecycle.token();
        let deadline = tokio::time::timeout(Duration::from_secs(2), async {
            lifecycle.run_until_shutdown().await;
        });
        deadline.await.expect("lifecycle should shut down on idle timeout");
        assert!(token.is_cancelled());
    }

    #[test]
    fn touch_resets_the_idle_clock() {
        let lifecycle = Lifecycle::new(Duration::from_secs(60));
        let before = *lifecycle.last_activity.lock().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        lifecycle.touch();
        let after = *lifecycle.last_activity.lock().unwrap();
        assert!(after > before);
    }
}
