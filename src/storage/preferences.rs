use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // User Preferences Operations
    // ========================================================================

    /// Get a single preference value by key.
    ///
    /// Keys use dotted convention, e.g. `session.reader`.
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a preference value (UPSERT).
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a preference. Missing keys are not an error.
    pub async fn delete_preference(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
