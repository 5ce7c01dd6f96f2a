use anyhow::Result;

use super::schema::Database;
use super::types::{EntryId, JobId, MobilizeTask, StoreChange};

impl Database {
    // ========================================================================
    // Mobilization Task Queue
    // ========================================================================

    /// Queue full-text fetches. Ids already queued are ignored.
    ///
    /// Returns the number of tasks actually added.
    pub async fn add_mobilize_tasks(&self, entry_ids: &[EntryId]) -> Result<usize> {
        if entry_ids.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        let mut added = 0;
        for entry_id in entry_ids {
            // The sub-select keeps tasks for vanished entries out of the queue
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO tasks (entry_id, created_at)
                SELECT id, ? FROM entries WHERE id = ?
            "#,
            )
            .bind(now)
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
            added += result.rows_affected() as usize;
        }
        tx.commit().await?;

        if added > 0 {
            self.notify(StoreChange::Tasks);
        }
        Ok(added)
    }

    /// Id of the pending fetch task for an entry, if one is queued.
    pub async fn mobilize_task_for(&self, entry_id: EntryId) -> Result<Option<JobId>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM tasks WHERE entry_id = ?")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Oldest pending tasks first.
    pub async fn pending_mobilize_tasks(&self, limit: i64) -> Result<Vec<MobilizeTask>> {
        let tasks = sqlx::query_as::<_, MobilizeTask>(
            "SELECT id, entry_id, attempts FROM tasks ORDER BY created_at, id LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    /// Store the fetched HTML and drop the task in one transaction.
    pub async fn complete_mobilize_task(&self, task: &MobilizeTask, html: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE entries SET mobilized_html = ? WHERE id = ?")
            .bind(html)
            .bind(task.entry_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.notify(StoreChange::Entry {
            entry_id: task.entry_id,
            counts_changed: false,
        });
        self.notify(StoreChange::Tasks);
        Ok(())
    }

    /// Count a failed attempt. The task is dropped once `max_attempts` is
    /// reached; returns `true` in that case.
    pub async fn fail_mobilize_task(&self, task: &MobilizeTask, max_attempts: i64) -> Result<bool> {
        let dropped = if task.attempts + 1 >= max_attempts {
            sqlx::query("DELETE FROM tasks WHERE id = ?")
                .bind(task.id)
                .execute(&self.pool)
                .await?;
            true
        } else {
            sqlx::query("UPDATE tasks SET attempts = attempts + 1 WHERE id = ?")
                .bind(task.id)
                .execute(&self.pool)
                .await?;
            false
        };

        self.notify(StoreChange::Tasks);
        Ok(dropped)
    }

    /// Remove a task without touching its entry.
    pub async fn drop_mobilize_task(&self, task_id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        self.notify(StoreChange::Tasks);
        Ok(())
    }
}
