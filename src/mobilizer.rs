//! Background full-text ("mobilization") worker.
//!
//! Requests are persisted in the `tasks` table so they survive restarts;
//! the worker only needs a wake-up signal to go and drain the queue.
//! Completion is never reported directly: observers see the entry's
//! `mobilized_html` appear and the task row disappear through the store's
//! change channel.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::content::FullTextFetcher;
use crate::storage::{Database, EntryId, JobId, MobilizeTask};

/// Failed fetches are retried until a task has been attempted this often.
pub const MAX_ATTEMPTS: i64 = 3;

const BATCH_SIZE: i64 = 64;

/// Idle delay before pending failures are retried without a new submit.
const RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
enum MobilizerMessage {
    Wake,
    Shutdown,
}

/// Outcome counts of one pass over the queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    pub failed: usize,
    pub dropped: usize,
}

/// Cloneable front door to the job queue.
#[derive(Clone)]
pub struct MobilizerHandle {
    db: Database,
    tx: mpsc::Sender<MobilizerMessage>,
}

impl MobilizerHandle {
    /// Queue full-text fetches and wake the worker.
    ///
    /// Fire-and-forget: returns once the tasks are persisted. Ids already
    /// queued or unknown to the store are skipped.
    pub async fn submit(&self, entry_ids: &[EntryId]) -> Result<usize> {
        let added = self.db.add_mobilize_tasks(entry_ids).await?;
        tracing::debug!(requested = entry_ids.len(), added, "Queued mobilization tasks");
        self.wake();
        Ok(added)
    }

    /// The queued job for an entry, if any.
    pub async fn pending_job_for(&self, entry_id: EntryId) -> Result<Option<JobId>> {
        self.db.mobilize_task_for(entry_id).await
    }

    fn wake(&self) {
        // A full channel already holds a wake-up
        if let Err(mpsc::error::TrySendError::Closed(_)) = self.tx.try_send(MobilizerMessage::Wake) {
            tracing::debug!("Mobilizer worker not running; task stays queued");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(MobilizerMessage::Shutdown).await;
    }
}

pub struct Mobilizer {
    db: Database,
    fetcher: FullTextFetcher,
    rx: mpsc::Receiver<MobilizerMessage>,
}

impl Mobilizer {
    pub fn new(db: Database, fetcher: FullTextFetcher) -> (Self, MobilizerHandle) {
        let (tx, rx) = mpsc::channel(1);
        let handle = MobilizerHandle { db: db.clone(), tx };
        (Self { db, fetcher, rx }, handle)
    }

    /// Worker loop. Drains once at startup, then on every wake-up.
    pub async fn run(mut self) {
        tracing::info!("Mobilizer started");
        loop {
            let has_pending = match self.drain_queue().await {
                Ok(report) => {
                    if report != DrainReport::default() {
                        tracing::info!(
                            completed = report.completed,
                            failed = report.failed,
                            dropped = report.dropped,
                            "Mobilization pass finished"
                        );
                    }
                    self.has_pending().await
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Mobilization pass failed");
                    true
                }
            };

            let msg = if has_pending {
                match tokio::time::timeout(RETRY_INTERVAL, self.rx.recv()).await {
                    Ok(msg) => msg,
                    Err(_) => Some(MobilizerMessage::Wake),
                }
            } else {
                self.rx.recv().await
            };

            match msg {
                Some(MobilizerMessage::Wake) => continue,
                Some(MobilizerMessage::Shutdown) | None => break,
            }
        }
        tracing::info!("Mobilizer stopped");
    }

    /// Run passes until the queue is empty or every task has used up its
    /// attempts.
    pub async fn run_to_completion(&self) -> Result<DrainReport> {
        let mut total = DrainReport::default();
        for _ in 0..MAX_ATTEMPTS {
            let report = self.drain_queue().await?;
            total.completed += report.completed;
            total.failed += report.failed;
            total.dropped += report.dropped;
            if !self.has_pending().await {
                break;
            }
        }
        Ok(total)
    }

    /// One attempt for every task currently queued, oldest first.
    pub async fn drain_queue(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        let mut attempted = HashSet::new();

        loop {
            let batch: Vec<MobilizeTask> = self
                .db
                .pending_mobilize_tasks(BATCH_SIZE + attempted.len() as i64)
                .await?
                .into_iter()
                .filter(|task| !attempted.contains(&task.id))
                .collect();
            if batch.is_empty() {
                return Ok(report);
            }

            for task in batch {
                attempted.insert(task.id);
                match self.process(&task).await {
                    Ok(TaskOutcome::Completed) => report.completed += 1,
                    Ok(TaskOutcome::Failed) => report.failed += 1,
                    Ok(TaskOutcome::Dropped) => report.dropped += 1,
                    Err(e) => {
                        tracing::warn!(task_id = task.id, entry_id = task.entry_id, error = %e, "Mobilization task errored");
                        report.failed += 1;
                    }
                }
            }
        }
    }

    async fn has_pending(&self) -> bool {
        self.db
            .pending_mobilize_tasks(1)
            .await
            .map(|tasks| !tasks.is_empty())
            .unwrap_or(false)
    }

    async fn process(&self, task: &MobilizeTask) -> Result<TaskOutcome> {
        let link = match self.db.get_entry(task.entry_id).await? {
            Some(entry) => entry.link.filter(|l| !l.trim().is_empty()),
            None => {
                tracing::debug!(entry_id = task.entry_id, "Entry vanished, dropping task");
                self.db.drop_mobilize_task(task.id).await?;
                return Ok(TaskOutcome::Dropped);
            }
        };
        let Some(link) = link else {
            tracing::info!(entry_id = task.entry_id, "Entry has no link, dropping task");
            self.db.drop_mobilize_task(task.id).await?;
            return Ok(TaskOutcome::Dropped);
        };

        match self.fetcher.fetch(&link).await {
            Ok(html) => {
                self.db.complete_mobilize_task(task, &html).await?;
                tracing::info!(entry_id = task.entry_id, bytes = html.len(), "Fetched full text");
                Ok(TaskOutcome::Completed)
            }
            Err(e) => {
                let dropped = self.db.fail_mobilize_task(task, MAX_ATTEMPTS).await?;
                tracing::warn!(
                    entry_id = task.entry_id,
                    attempt = task.attempts + 1,
                    dropped,
                    error = %e,
                    "Full-text fetch failed"
                );
                Ok(if dropped { TaskOutcome::Dropped } else { TaskOutcome::Failed })
            }
        }
    }
}

enum TaskOutcome {
    Completed,
    Failed,
    Dropped,
}

/// Spawn the worker on the current runtime.
pub fn spawn_mobilizer(db: Database, fetcher: FullTextFetcher) -> (MobilizerHandle, JoinHandle<()>) {
    let (worker, handle) = Mobilizer::new(db, fetcher);
    (handle, tokio::spawn(worker.run()))
}
