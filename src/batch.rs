//! Batch processing
//!
//! Feeds a batch through the adaptive queue and the fallback orchestrator with a
//! bounded set of spawned workers. The queue's strategy is re-read before every
//! release, so concurrency, inter-release delay and the image path all follow the
//! error rate as it develops.

use crate::ai::naming::{FallbackOrchestrator, FileKind, RenameOptions, RenameOutcome, RenameTask};
use crate::ai::providers::ErrorClass;
use crate::queue::{AdaptiveQueueManager, ProcessingStrategy};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One file in a batch manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFile {
    pub id: String,
    pub kind: FileKind,
    /// Current file name; derived from `image_ref` or `id` when absent
    #[serde(default, alias = "originalName")]
    pub name: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub options: RenameOptions,
}

impl From<BatchFile> for RenameTask {
    fn from(file: BatchFile) -> Self {
        let original_name = file
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                file.image_ref
                    .as_deref()
                    .filter(|r| !r.starts_with("data:") && !r.contains("://"))
                    .and_then(|r| Path::new(r).file_name())
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| file.id.clone());

        RenameTask {
            file_id: file.id,
            file_kind: file.kind,
            original_name,
            extracted_text: file.extracted_text.unwrap_or_default(),
            image_ref: file.image_ref,
            size_bytes: file.size_bytes,
            options: file.options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchOptions {
    /// Upper bound on concurrent files; the queue strategy may lower it further
    pub max_concurrency: Option<usize>,
    /// Sleep the strategy delay between releases
    pub pace_releases: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            pace_releases: true,
        }
    }
}

/// Emitted once per file, after its final outcome is known
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub percentage: f32,
    pub file_id: String,
    pub outcome: RenameOutcome,
}

/// Progress callback that forwards into a channel. Never blocks.
pub fn channel_progress(sender: UnboundedSender<BatchProgress>) -> impl Fn(BatchProgress) + Send + Sync {
    move |progress| {
        let _ = sender.send(progress);
    }
}

pub struct BatchProcessor {
    orchestrator: Arc<FallbackOrchestrator>,
    queue: Arc<AdaptiveQueueManager>,
}

impl BatchProcessor {
    pub fn new(orchestrator: Arc<FallbackOrchestrator>, queue: Arc<AdaptiveQueueManager>) -> Self {
        Self {
            orchestrator,
            queue,
        }
    }

    pub fn queue(&self) -> &AdaptiveQueueManager {
        &self.queue
    }

    /// Name every file in the batch. Returns one outcome per submitted file, in
    /// submission order; files sharing an id share an outcome.
    pub async fn process_batch<F>(
        &self,
        files: Vec<BatchFile>,
        options: &BatchOptions,
        progress_callback: F,
    ) -> Vec<RenameOutcome>
    where
        F: Fn(BatchProgress) + Send + Sync,
    {
        let batch_id = Uuid::new_v4();
        let tasks: Vec<RenameTask> = files.into_iter().map(RenameTask::from).collect();
        let order: Vec<String> = tasks.iter().map(|t| t.file_id.clone()).collect();

        let mut by_id: HashMap<String, RenameTask> = HashMap::new();
        for task in &tasks {
            by_id.entry(task.file_id.clone()).or_insert_with(|| task.clone());
        }
        let total = by_id.len();
        let submitted: HashSet<String> = by_id.keys().cloned().collect();

        let added = self.queue.add_files(tasks);
        info!(batch = %batch_id, files = total, queued = added, "[Batch] Starting");

        let mut results: HashMap<String, RenameOutcome> = HashMap::new();
        let mut running = FuturesUnordered::new();
        let mut next_release = Instant::now();

        loop {
            let strategy = self.queue.get_processing_strategy();
            let limit = options
                .max_concurrency
                .map_or(strategy.concurrency, |max| strategy.concurrency.min(max.max(1)));
            let now = Instant::now();

            if running.len() < limit && now >= next_release {
                if let Some(item) = self.queue.get_next_file() {
                    let task = apply_strategy(item.task, &strategy);
                    debug!(
                        batch = %batch_id,
                        file = %task.file_id,
                        retry = item.retry_count,
                        concurrency = limit,
                        "[Batch] Releasing file"
                    );

                    let orchestrator = Arc::clone(&self.orchestrator);
                    let file_id = task.file_id.clone();
                    let handle = tokio::spawn(async move { orchestrator.generate_name(&task).await });
                    running.push(async move { (file_id, handle.await) });

                    if options.pace_releases {
                        next_release = now + strategy.delay;
                    }
                    continue;
                }
            }

            if running.is_empty() {
                if self.queue.is_empty() {
                    break;
                }
                // Paused, pacing, or a dropped head item
                let wait = self
                    .queue
                    .pause_remaining()
                    .unwrap_or(Duration::ZERO)
                    .max(next_release.saturating_duration_since(now));
                if !wait.is_zero() {
                    debug!(batch = %batch_id, wait_ms = wait.as_millis() as u64, "[Batch] Waiting");
                    tokio::time::sleep(wait).await;
                }
                continue;
            }

            let can_release = running.len() < limit && !self.queue.is_empty();
            let wake = next_release.max(now + self.queue.pause_remaining().unwrap_or(Duration::ZERO));

            tokio::select! {
                Some((file_id, joined)) = running.next() => {
                    let outcome = match joined {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(batch = %batch_id, file = %file_id, "[Batch] Worker task failed: {}", e);
                            self.queue.mark_failure(&file_id, ErrorClass::Unknown, false);
                            let outcome = match by_id.get(&file_id) {
                                Some(task) => self
                                    .orchestrator
                                    .fallback_outcome(task, &format!("worker task failed: {}", e)),
                                None => continue,
                            };
                            self.finish(&mut results, outcome, total, &progress_callback);
                            continue;
                        }
                    };

                    if self.report(&outcome) {
                        continue;
                    }
                    if submitted.contains(&outcome.file_id) {
                        self.finish(&mut results, outcome, total, &progress_callback);
                    }
                }
                _ = tokio::time::sleep_until(wake), if can_release => {}
            }
        }

        let outcomes: Vec<RenameOutcome> = order
            .iter()
            .map(|id| match results.get(id) {
                Some(outcome) => outcome.clone(),
                None => {
                    warn!(batch = %batch_id, file = %id, "[Batch] No outcome; using fallback name");
                    let task = &by_id[id];
                    self.orchestrator
                        .fallback_outcome(task, "file was dropped from the queue")
                }
            })
            .collect();

        let named = outcomes.iter().filter(|o| o.success).count();
        info!(
            batch = %batch_id,
            files = outcomes.len(),
            named,
            failed = outcomes.len() - named,
            "[Batch] Complete"
        );
        outcomes
    }

    /// Report an outcome to the queue. Returns `true` when the file was re-enqueued.
    fn report(&self, outcome: &RenameOutcome) -> bool {
        let file_id = &outcome.file_id;
        if outcome.success {
            match outcome.error_class() {
                Some(class) => self.queue.mark_degraded(file_id, class),
                None => self.queue.mark_success(file_id),
            }
            return false;
        }

        let class = outcome.error_class().unwrap_or(ErrorClass::Unknown);
        let requeued = self
            .queue
            .mark_failure(file_id, class, outcome.is_retryable());
        if requeued {
            debug!(file = %file_id, class = %class, "[Batch] Re-enqueued");
        }
        requeued
    }

    fn finish<F>(
        &self,
        results: &mut HashMap<String, RenameOutcome>,
        outcome: RenameOutcome,
        total: usize,
        progress_callback: &F,
    ) where
        F: Fn(BatchProgress) + Send + Sync,
    {
        if results.contains_key(&outcome.file_id) {
            return;
        }
        results.insert(outcome.file_id.clone(), outcome.clone());

        let current = results.len();
        progress_callback(BatchProgress {
            current,
            total,
            percentage: if total == 0 {
                100.0
            } else {
                current as f32 / total as f32 * 100.0
            },
            file_id: outcome.file_id.clone(),
            outcome,
        });
    }
}

/// Push image tasks onto the cheaper path when the queue says so
fn apply_strategy(mut task: RenameTask, strategy: &ProcessingStrategy) -> RenameTask {
    if task.file_kind.is_image() {
        if strategy.skip_images {
            task.options.skip_vision = true;
            task.options.force_ocr_fallback = true;
        } else if strategy.use_ocr_fallback {
            task.options.force_ocr_fallback = true;
        }
    }
    task
}
