//! The outer poll loop: sleep, window, pipeline, checkpoint, repeat.
//!
//! The checkpoint only advances after a whole window succeeded, so a
//! crash or a failed window re-delivers events on the next pass —
//! at-least-once into the dispatcher, which is why the dispatch layer
//! must tolerate redelivery. The inner retry stays fixed-interval to
//! bound staleness; only the restart path backs off exponentially.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::chain::{BlockRange, ChainError};
use crate::store::StateStore;

/// One watched source's pipeline, driven by a `Supervisor`.
pub trait Watcher: Send {
    fn source_key(&self) -> &str;

    /// Whether a fresh checkpoint starts at genesis (replay history) or
    /// at the current head (no announcements for the backlog).
    fn backfill(&self) -> bool;

    async fn head(&self) -> Result<u64, ChainError>;

    /// Process `[from, to]`. An error means the window must be retried;
    /// per-event skips are handled inside.
    async fn process_window(&mut self, range: BlockRange) -> anyhow::Result<()>;
}

/// Exponential backoff for bot restarts, capped.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl RestartPolicy {
    pub fn backoff(&self, failures: u32) -> Duration {
        let exp = failures.min(6).saturating_sub(1);
        let mult = 2u32.saturating_pow(exp);
        (self.base * mult).min(self.max)
    }

    /// A run that stayed up past the cap counts as recovered, so the
    /// next incident backs off from the base again instead of starting
    /// at the ceiling.
    pub fn next_failure_count(&self, failures: u32, ran_for: Duration) -> u32 {
        if ran_for >= self.max {
            1
        } else {
            failures.saturating_add(1)
        }
    }
}

pub struct Supervisor<W, S> {
    watcher: W,
    store: S,
    poll_interval: Duration,
}

impl<W: Watcher, S: StateStore> Supervisor<W, S> {
    pub fn new(watcher: W, store: S, poll_interval: Duration) -> Self {
        Self {
            watcher,
            store,
            poll_interval,
        }
    }

    /// Poll forever. Returns only when the checkpoint store itself
    /// fails; the caller restarts us with backoff.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.tick().await?;
        }
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        sleep(self.poll_interval).await;

        let head = match self.watcher.head().await {
            Ok(head) => head,
            Err(e) => {
                warn!(source = self.watcher.source_key(), error = %e, "head read failed");
                return Ok(());
            }
        };

        let key = self.watcher.source_key().to_string();
        let from = match self.store.checkpoint(&key).await? {
            Some(block) => block,
            None => {
                let init = if self.watcher.backfill() { 0 } else { head };
                self.store.set_checkpoint(&key, init).await?;
                debug!(source = %key, block = init, "checkpoint initialized");
                init
            }
        };

        if head < from {
            return Ok(());
        }

        let range = BlockRange::window(from, head);
        match self.watcher.process_window(range).await {
            Ok(()) => {
                self.store.set_checkpoint(&key, head + 1).await?;
                debug!(source = %key, range = %range, "window processed");
            }
            Err(e) => {
                warn!(source = %key, range = %range, error = %e, "window failed, will retry");
            }
        }
        Ok(())
    }

    /// Run with restart-on-failure, backing off exponentially.
    pub async fn supervise(mut self, restart: RestartPolicy) {
        let mut failures: u32 = 0;
        loop {
            let started = Instant::now();
            if let Err(e) = self.run().await {
                error!(source = self.watcher.source_key(), error = %e, "bot stopped");
            }
            failures = restart.next_failure_count(failures, started.elapsed());
            let backoff = restart.backoff(failures);
            error!(
                source = self.watcher.source_key(),
                backoff_secs = backoff.as_secs(),
                failures,
                "restarting bot"
            );
            sleep(backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    struct Scripted {
        head: u64,
        backfill: bool,
        fail_first: AtomicBool,
        windows: Arc<Mutex<Vec<BlockRange>>>,
    }

    impl Watcher for Scripted {
        fn source_key(&self) -> &str {
            "src"
        }

        fn backfill(&self) -> bool {
            self.backfill
        }

        async fn head(&self) -> Result<u64, ChainError> {
            Ok(self.head)
        }

        async fn process_window(&mut self, range: BlockRange) -> anyhow::Result<()> {
            self.windows.lock().unwrap().push(range);
            if self.fail_first.swap(false, Ordering::SeqCst) {
                anyhow::bail!("transient failure");
            }
            Ok(())
        }
    }

    async fn wait_for_checkpoint(store: &MemoryStore, want: u64) {
        for _ in 0..500 {
            if store.checkpoint_of("src") == Some(want) {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("checkpoint never reached {want}");
    }

    #[tokio::test]
    async fn failed_window_is_retried_before_advancing() {
        let windows = Arc::new(Mutex::new(Vec::new()));
        let watcher = Scripted {
            head: 42,
            backfill: true,
            fail_first: AtomicBool::new(true),
            windows: windows.clone(),
        };
        let store = MemoryStore::new();
        let mut sup = Supervisor::new(watcher, store.clone(), Duration::from_millis(2));
        let handle = tokio::spawn(async move { sup.run().await });

        wait_for_checkpoint(&store, 43).await;
        handle.abort();

        let windows = windows.lock().unwrap();
        assert!(windows.len() >= 2, "first window must be retried");
        // The same window again, checkpoint untouched in between.
        assert_eq!(windows[0], BlockRange::window(0, 42));
        assert_eq!(windows[1], BlockRange::window(0, 42));
    }

    #[tokio::test]
    async fn no_backfill_starts_at_head() {
        let windows = Arc::new(Mutex::new(Vec::new()));
        let watcher = Scripted {
            head: 42,
            backfill: false,
            fail_first: AtomicBool::new(false),
            windows: windows.clone(),
        };
        let store = MemoryStore::new();
        let mut sup = Supervisor::new(watcher, store.clone(), Duration::from_millis(2));
        let handle = tokio::spawn(async move { sup.run().await });

        wait_for_checkpoint(&store, 43).await;
        handle.abort();

        assert_eq!(windows.lock().unwrap()[0], BlockRange::window(42, 42));
    }

    #[test]
    fn restart_backoff_grows_and_caps() {
        let policy = RestartPolicy {
            base: Duration::from_secs(10),
            max: Duration::from_secs(120),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(10));
        assert_eq!(policy.backoff(2), Duration::from_secs(20));
        assert_eq!(policy.backoff(4), Duration::from_secs(80));
        assert_eq!(policy.backoff(5), Duration::from_secs(120));
        assert_eq!(policy.backoff(50), Duration::from_secs(120));
    }

    #[test]
    fn long_run_resets_the_backoff() {
        let policy = RestartPolicy {
            base: Duration::from_secs(10),
            max: Duration::from_secs(120),
        };
        // Crashed again quickly: keep climbing.
        assert_eq!(policy.next_failure_count(5, Duration::from_secs(3)), 6);
        // Ran healthy past the cap: the next incident starts over.
        assert_eq!(policy.next_failure_count(5, Duration::from_secs(3600)), 1);
        assert_eq!(policy.backoff(1), Duration::from_secs(10));
    }
}
