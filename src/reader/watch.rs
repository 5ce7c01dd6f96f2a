//! Throttled observation of a mobilization job.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::command::ReaderEvent;
use crate::storage::{EntryId, StoreChange};

/// Watches the store for changes relevant to one entry's job and posts
/// [`ReaderEvent::JobStatusChanged`] at most once per interval.
///
/// The first relevant change opens a window of `interval`; everything else
/// arriving inside it is folded into a single event sent when it closes.
/// Dropping the watch stops it.
pub struct JobWatch {
    entry_id: EntryId,
    generation: u64,
    task: JoinHandle<()>,
}

impl JobWatch {
    pub fn spawn(
        mut changes: broadcast::Receiver<StoreChange>,
        entry_id: EntryId,
        generation: u64,
        interval: Duration,
        events: mpsc::Sender<ReaderEvent>,
    ) -> Self {
        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) if is_relevant(change, entry_id) => {}
                    Ok(_) => continue,
                    // Missed messages may have included ours
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                tokio::time::sleep(interval).await;
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                        Err(_) => break,
                    }
                }

                tracing::trace!(entry_id, generation, "Job watch firing");
                if events
                    .send(ReaderEvent::JobStatusChanged {
                        entry_id,
                        generation,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        Self {
            entry_id,
            generation,
            task,
        }
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for JobWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_relevant(change: StoreChange, entry_id: EntryId) -> bool {
    match change {
        StoreChange::Tasks => true,
        StoreChange::Entry { entry_id: id, .. } => id == entry_id,
        StoreChange::Feeds => false,
    }
}
