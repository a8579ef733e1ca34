//! Adaptive queue and backpressure
//!
//! Holds files awaiting a name, smallest first with images behind other files of
//! equal size, and keeps rolling error statistics. Callers poll [`AdaptiveQueueManager::should_pause`]
//! and [`AdaptiveQueueManager::get_processing_strategy`] to pace their worker loop; the
//! queue never enforces pacing itself.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use crate::ai::naming::RenameTask;
use crate::ai::providers::ErrorClass;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Rate-limited failures before the strategy drops to a single worker
const RATE_LIMIT_THROTTLE_THRESHOLD: u32 = 5;
/// Timeouts before the strategy sheds one worker
const TIMEOUT_THROTTLE_THRESHOLD: u32 = 3;
/// Consecutive failures before images are forced onto the OCR path
const SKIP_IMAGES_THRESHOLD: u32 = 3;

const THROTTLED_DELAY: Duration = Duration::from_millis(5000);
const TIMEOUT_MIN_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    /// Re-enqueues allowed per file
    pub max_retries: u32,
    pub pause_after_consecutive_errors: u32,
    pub pause_per_error_ms: u64,
    pub max_pause_ms: u64,
    /// Rate-limit count above which the queue pauses for `rate_limit_pause_ms`
    pub rate_limit_pause_threshold: u32,
    pub rate_limit_pause_ms: u64,
    pub baseline_concurrency: usize,
    pub baseline_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            pause_after_consecutive_errors: 5,
            pause_per_error_ms: 2000,
            max_pause_ms: 30_000,
            rate_limit_pause_threshold: 10,
            rate_limit_pause_ms: 60_000,
            baseline_concurrency: 3,
            baseline_delay_ms: 1000,
        }
    }
}

/// Error counters since creation or the last [`AdaptiveQueueManager::clear`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub timeout_count: u32,
    pub rate_limit_count: u32,
    pub server_error_count: u32,
    pub other_count: u32,
    pub consecutive_errors: u32,
    #[serde(skip)]
    pub last_error_at: Option<Instant>,
}

impl ErrorStats {
    fn count(&mut self, class: ErrorClass) {
        match class {
            ErrorClass::Timeout => self.timeout_count += 1,
            ErrorClass::RateLimit => self.rate_limit_count += 1,
            ErrorClass::ServerError => self.server_error_count += 1,
            ErrorClass::AuthError | ErrorClass::BadRequest | ErrorClass::Unknown => {
                self.other_count += 1
            }
        }
    }

    pub fn total(&self) -> u32 {
        self.timeout_count + self.rate_limit_count + self.server_error_count + self.other_count
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub task: RenameTask,
    pub retry_count: u32,
    pub enqueued_at: Instant,
}

impl QueueItem {
    /// Smaller first; at equal size, images after everything else
    fn order_key(&self) -> (u64, bool) {
        (self.task.size_bytes, self.task.file_kind.is_image())
    }
}

/// Pacing advice for the caller's processing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStrategy {
    pub concurrency: usize,
    pub delay: Duration,
    pub use_ocr_fallback: bool,
    pub skip_images: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<QueueItem>,
    in_flight: HashMap<String, QueueItem>,
    stats: ErrorStats,
}

impl QueueState {
    fn contains(&self, file_id: &str) -> bool {
        self.in_flight.contains_key(file_id) || self.queue.iter().any(|q| q.task.file_id == file_id)
    }
}

pub struct AdaptiveQueueManager {
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

impl AdaptiveQueueManager {
    pub fn new(config: QueueConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue files in priority order. Files already queued or in flight are skipped.
    /// Returns how many were added.
    pub fn add_files(&self, tasks: Vec<RenameTask>) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let mut added = 0;

        for task in tasks {
            if state.contains(&task.file_id) {
                debug!(file = %task.file_id, "[AdaptiveQueue] Already queued, skipping");
                continue;
            }
            let item = QueueItem {
                task,
                retry_count: 0,
                enqueued_at: now,
            };
            // Retried items stay at the tail; fresh items are ordered among themselves
            let key = item.order_key();
            match state
                .queue
                .iter()
                .position(|q| q.retry_count > 0 || q.order_key() > key)
            {
                Some(idx) => state.queue.insert(idx, item),
                None => state.queue.push_back(item),
            }
            added += 1;
        }

        debug!(added, queued = state.queue.len(), "[AdaptiveQueue] Files added");
        added
    }

    /// Next file to process, or `None` while paused, when empty, or when the head item
    /// is over the retry cap (it is dropped).
    pub fn get_next_file(&self) -> Option<QueueItem> {
        let now = self.clock.now();
        let mut state = self.lock();

        if self.pause_window(&state.stats, now).is_some() {
            return None;
        }

        let item = state.queue.pop_front()?;
        if item.retry_count > self.config.max_retries {
            warn!(
                file = %item.task.file_id,
                retries = item.retry_count,
                "[AdaptiveQueue] Dropping file over retry cap"
            );
            return None;
        }

        state
            .in_flight
            .insert(item.task.file_id.clone(), item.clone());
        Some(item)
    }

    pub fn mark_success(&self, file_id: &str) {
        let mut state = self.lock();
        state.in_flight.remove(file_id);
        state.stats.consecutive_errors = 0;
    }

    /// Record a failed file. Returns `true` when it was re-enqueued at the tail.
    pub fn mark_failure(&self, file_id: &str, class: ErrorClass, retryable: bool) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        let item = state.in_flight.remove(file_id);

        state.stats.count(class);
        state.stats.consecutive_errors += 1;
        state.stats.last_error_at = Some(now);

        let consecutive = state.stats.consecutive_errors;
        let requeued = match item {
            Some(item) if retryable && item.retry_count < self.config.max_retries => {
                state.queue.push_back(QueueItem {
                    task: item.task,
                    retry_count: item.retry_count + 1,
                    enqueued_at: now,
                });
                true
            }
            _ => false,
        };

        warn!(
            file = file_id,
            class = %class,
            consecutive,
            requeued,
            "[AdaptiveQueue] File failed"
        );
        requeued
    }

    /// Record a file that got a name only by degrading past a provider error. The
    /// error class is counted; the consecutive-error streak is left alone.
    pub fn mark_degraded(&self, file_id: &str, class: ErrorClass) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.in_flight.remove(file_id);
        state.stats.count(class);
        state.stats.last_error_at = Some(now);
        debug!(file = file_id, class = %class, "[AdaptiveQueue] Degraded success");
    }

    pub fn should_pause(&self) -> bool {
        self.pause_remaining().is_some()
    }

    /// Time left in the current pause window, if paused
    pub fn pause_remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        let state = self.lock();
        self.pause_window(&state.stats, now)
    }

    fn pause_window(&self, stats: &ErrorStats, now: Instant) -> Option<Duration> {
        let last = stats.last_error_at?;
        let mut window = Duration::ZERO;

        if stats.consecutive_errors >= self.config.pause_after_consecutive_errors {
            let ms = self
                .config
                .pause_per_error_ms
                .saturating_mul(u64::from(stats.consecutive_errors))
                .min(self.config.max_pause_ms);
            window = Duration::from_millis(ms);
        }
        if stats.rate_limit_count > self.config.rate_limit_pause_threshold {
            window = window.max(Duration::from_millis(self.config.rate_limit_pause_ms));
        }

        let elapsed = now.saturating_duration_since(last);
        (elapsed < window).then(|| window - elapsed)
    }

    pub fn get_processing_strategy(&self) -> ProcessingStrategy {
        let stats = self.stats();
        let mut strategy = ProcessingStrategy {
            concurrency: self.config.baseline_concurrency.max(1),
            delay: Duration::from_millis(self.config.baseline_delay_ms),
            use_ocr_fallback: false,
            skip_images: false,
        };

        if stats.rate_limit_count > RATE_LIMIT_THROTTLE_THRESHOLD {
            strategy.concurrency = 1;
            strategy.delay = THROTTLED_DELAY;
            strategy.use_ocr_fallback = true;
        }
        if stats.timeout_count > TIMEOUT_THROTTLE_THRESHOLD {
            strategy.concurrency = strategy.concurrency.saturating_sub(1).max(1);
            strategy.delay = strategy.delay.max(TIMEOUT_MIN_DELAY);
        }
        if stats.consecutive_errors > SKIP_IMAGES_THRESHOLD {
            strategy.skip_images = true;
            strategy.use_ocr_fallback = true;
        }

        strategy
    }

    /// Drop all queued and in-flight files and reset statistics
    pub fn clear(&self) {
        let mut state = self.lock();
        let dropped = state.queue.len() + state.in_flight.len();
        *state = QueueState::default();
        info!(dropped, "[AdaptiveQueue] Cleared");
    }

    pub fn stats(&self) -> ErrorStats {
        self.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Nothing queued and nothing in flight
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.queue.is_empty() && state.in_flight.is_empty()
    }
}

impl Default for AdaptiveQueueManager {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}
