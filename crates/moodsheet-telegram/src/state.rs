//! Shared state for the Telegram bot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use moodsheet_core::{Clock, SystemClock, TrackerConfig};
use moodsheet_notion::{BlockApi, NotionClient, TrackerSheet};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::conversation::{ConversationController, PendingConfirmations, DEFAULT_PENDING_CAPACITY};
use crate::scheduler::DailyScheduler;

/// How long a handler may stay busy before the watchdog warns.
pub const HANGING_THRESHOLD: Duration = Duration::from_secs(15);

/// Tracks which handlers are currently running.
#[derive(Debug, Default)]
pub struct Watchdog {
    next_id: AtomicU64,
    busy: StdMutex<HashMap<u64, (&'static str, Instant)>>,
}

/// Marks a handler busy until dropped.
pub struct BusyGuard<'a> {
    watchdog: &'a Watchdog,
    id: u64,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, label: &'static str) -> BusyGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut busy) = self.busy.lock() {
            busy.insert(id, (label, Instant::now()));
        }
        BusyGuard { watchdog: self, id }
    }

    pub fn busy_count(&self) -> usize {
        self.busy.lock().map(|b| b.len()).unwrap_or_default()
    }

    /// Handlers busy for longer than `threshold`, longest first.
    pub fn hanging(&self, threshold: Duration) -> Vec<(&'static str, Duration)> {
        let now = Instant::now();
        let mut hanging: Vec<_> = self
            .busy
            .lock()
            .map(|busy| {
                busy.values()
                    .map(|(label, since)| (*label, now.duration_since(*since)))
                    .filter(|(_, elapsed)| *elapsed > threshold)
                    .collect()
            })
            .unwrap_or_default();
        hanging.sort_by(|a, b| b.1.cmp(&a.1));
        hanging
    }

    /// Log a warning for every handler stuck longer than the threshold.
    pub fn check(&self) {
        for (label, elapsed) in self.hanging(HANGING_THRESHOLD) {
            warn!(
                handler = label,
                busy_ms = elapsed.as_millis() as u64,
                "Handler appears to be hanging"
            );
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.watchdog.busy.lock() {
            busy.remove(&self.id);
        }
    }
}

/// Shared state for the Telegram bot.
pub struct BotState {
    pub config: TrackerConfig,
    pub sheet: Arc<TrackerSheet>,
    pub controller: ConversationController,
    pub scheduler: Mutex<DailyScheduler>,
    pub watchdog: Watchdog,
    pub clock: Arc<dyn Clock>,
}

impl BotState {
    /// State backed by the Notion API and the system clock.
    pub fn new(config: TrackerConfig) -> Self {
        let api: Arc<dyn BlockApi> = Arc::new(NotionClient::new(&config.notion_token));
        Self::with_api(config, api, Arc::new(SystemClock))
    }

    /// State over any block store and clock.
    pub fn with_api(config: TrackerConfig, api: Arc<dyn BlockApi>, clock: Arc<dyn Clock>) -> Self {
        let sheet = Arc::new(TrackerSheet::with_shared_api(
            api,
            config.page_id.clone(),
            Arc::clone(&clock),
        ));
        let pending =
            PendingConfirmations::new(config.confirm_ttl, DEFAULT_PENDING_CAPACITY, Arc::clone(&clock));
        let controller = ConversationController::new(Arc::clone(&sheet), pending);
        let scheduler = Mutex::new(DailyScheduler::new(config.prompt_time));

        Self {
            config,
            sheet,
            controller,
            scheduler,
            watchdog: Watchdog::new(),
            clock,
        }
    }
}

/// Create shared state for use across handlers.
pub fn create_shared_state(config: TrackerConfig) -> Arc<BotState> {
    Arc::new(BotState::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_reports_hanging_handler() {
        let watchdog = Watchdog::new();
        let guard = watchdog.begin("callback");
        assert_eq!(watchdog.busy_count(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(watchdog.hanging(HANGING_THRESHOLD).is_empty());

        tokio::time::advance(Duration::from_secs(6)).await;
        let hanging = watchdog.hanging(HANGING_THRESHOLD);
        assert_eq!(hanging.len(), 1);
        assert_eq!(hanging[0].0, "callback");

        drop(guard);
        assert_eq!(watchdog.busy_count(), 0);
        assert!(watchdog.hanging(HANGING_THRESHOLD).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_guards_are_independent() {
        let watchdog = Watchdog::new();
        let first = watchdog.begin("scheduler");
        tokio::time::advance(Duration::from_secs(20)).await;
        let second = watchdog.begin("message");

        drop(second);
        let hanging = watchdog.hanging(HANGING_THRESHOLD);
        assert_eq!(hanging.len(), 1);
        assert_eq!(hanging[0].0, "scheduler");
        drop(first);
    }
}
