//! Progress indicator for the import stage.
//!
//! The percentage is not reported by the server. `SyntheticProgress` advances
//! on a timer while the request is in flight; the controller publishes 100
//! once the response arrives. Anything implementing `ProgressSource` can
//! replace it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ProgressConfig;

/// Snapshot of the progress bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    /// 0 to 100.
    pub percent: u8,
}

impl ImportProgress {
    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProgressPublisher
// ─────────────────────────────────────────────────────────────────────────────

/// Write side of the progress channel. Values only move forward between
/// resets.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    tx: Arc<watch::Sender<ImportProgress>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ImportProgress::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ImportProgress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ImportProgress {
        *self.tx.borrow()
    }

    /// Raises the value to `percent` (clamped to 100). Lower values are ignored.
    pub fn advance(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|progress| {
            if percent > progress.percent {
                progress.percent = percent;
                true
            } else {
                false
            }
        });
    }

    pub fn complete(&self) {
        self.advance(100);
    }

    pub fn reset(&self) {
        self.tx.send_replace(ImportProgress::default());
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProgressSource
// ─────────────────────────────────────────────────────────────────────────────

/// Drives the progress bar while an import request is in flight.
///
/// The returned future runs until `cancel` fires and must never publish 100;
/// completion is signalled by the controller.
pub trait ProgressSource: Send + Sync {
    fn run(
        &self,
        publisher: ProgressPublisher,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
}

/// Fixed-interval ticker capped below 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticProgress {
    config: ProgressConfig,
}

impl SyntheticProgress {
    pub fn new(config: ProgressConfig) -> Self {
        Self { config }
    }
}

impl ProgressSource for SyntheticProgress {
    fn run(
        &self,
        publisher: ProgressPublisher,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        let ProgressConfig {
            interval,
            step,
            cap,
        } = self.config;
        let cap = cap.min(99);

        Box::pin(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let next = publisher.current().percent.saturating_add(step).min(cap);
                        publisher.advance(next);
                        if next >= cap {
                            break;
                        }
                    }
                }
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProgressTask
// ─────────────────────────────────────────────────────────────────────────────

/// A running progress source.
pub struct ProgressTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressTask {
    pub fn spawn(source: &dyn ProgressSource, publisher: ProgressPublisher) -> Self {
        Self::spawn_scoped(source, publisher, &CancellationToken::new())
    }

    /// Like `spawn`, but the task also stops when `parent` is cancelled.
    pub fn spawn_scoped(
        source: &dyn ProgressSource,
        publisher: ProgressPublisher,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let handle = tokio::spawn(source.run(publisher, cancel.clone()));
        Self { cancel, handle }
    }

    /// Cancels the source and waits for it, so nothing it publishes can land
    /// after this returns.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn publisher_never_moves_backwards() {
        let publisher = ProgressPublisher::new();

        publisher.advance(40);
        publisher.advance(20);
        assert_eq!(publisher.current().percent, 40);

        publisher.advance(250);
        assert!(publisher.current().is_complete());
        assert_eq!(publisher.current().percent, 100);

        publisher.reset();
        assert_eq!(publisher.current().percent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn synthetic_progress_ticks_every_interval() {
        let publisher = ProgressPublisher::new();
        let task = ProgressTask::spawn(&SyntheticProgress::default(), publisher.clone());

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        assert_eq!(publisher.current().percent, 30);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn synthetic_progress_stops_at_cap() {
        let publisher = ProgressPublisher::new();
        let task = ProgressTask::spawn(&SyntheticProgress::default(), publisher.clone());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(publisher.current().percent, 90);

        task.stop().await;
        publisher.complete();
        assert_eq!(publisher.current().percent, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_the_value() {
        let publisher = ProgressPublisher::new();
        let task = ProgressTask::spawn(&SyntheticProgress::default(), publisher.clone());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        task.stop().await;
        let frozen = publisher.current().percent;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(frozen, 20);
        assert_eq!(publisher.current().percent, frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_parent_stops_the_ticker() {
        let publisher = ProgressPublisher::new();
        let parent = CancellationToken::new();
        let task =
            ProgressTask::spawn_scoped(&SyntheticProgress::default(), publisher.clone(), &parent);

        tokio::time::sleep(Duration::from_millis(600)).await;
        parent.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(publisher.current().percent, 10);
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_updates() {
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe();
        let config = ProgressConfig {
            interval: Duration::from_millis(100),
            step: 25,
            cap: 90,
        };
        let task = ProgressTask::spawn(&SyntheticProgress::new(config), publisher.clone());

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().percent, 25);

        task.stop().await;
    }
}
