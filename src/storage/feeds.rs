use anyhow::Result;

use super::schema::Database;
use super::types::{DrawerCounts, Feed, FeedId, NewFeed, StoreChange};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed or folder, returns its id.
    pub async fn insert_feed(&self, feed: &NewFeed) -> Result<FeedId> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (name, url, icon, is_group, group_id, position)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(&feed.icon)
        .bind(feed.is_group)
        .bind(feed.group_id)
        .bind(feed.position)
        .fetch_one(&self.pool)
        .await?;

        self.notify(StoreChange::Feeds);
        Ok(id)
    }

    /// Record the outcome of the last sync attempt for a feed; this is what
    /// the drawer's update line shows. Called by whatever syncs feeds into
    /// the store.
    ///
    /// `error = None` clears a previous error.
    pub async fn set_feed_update(
        &self,
        feed_id: FeedId,
        last_update: i64,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE feeds SET last_update = ?, error = ? WHERE id = ?")
            .bind(last_update)
            .bind(error)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        self.notify(StoreChange::Feeds);
        Ok(())
    }

    /// Feed name and url for the reader header. `None` when the feed is gone.
    pub async fn get_feed_title(&self, feed_id: FeedId) -> Result<Option<(Option<String>, String)>> {
        let row: Option<(Option<String>, String)> =
            sqlx::query_as("SELECT name, url FROM feeds WHERE id = ?")
                .bind(feed_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// Raw icon bytes for a feed, if any were stored.
    pub async fn get_feed_icon(&self, feed_id: FeedId) -> Result<Option<Vec<u8>>> {
        let row: Option<(Option<Vec<u8>>,)> = sqlx::query_as("SELECT icon FROM feeds WHERE id = ?")
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|(icon,)| icon))
    }

    /// Feeds and folders in drawer order with per-feed unread counts.
    ///
    /// Top-level rows sort by position; a folder's children follow the
    /// folder immediately, sorted by their own position.
    pub async fn get_drawer_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT
                f.id, f.name, f.url, f.icon, f.is_group, f.group_id, f.last_update, f.error,
                (SELECT COUNT(*) FROM entries e WHERE e.feed_id = f.id AND e.is_read = 0)
                    AS unread_count
            FROM feeds f
            LEFT JOIN feeds g ON f.group_id = g.id
            ORDER BY
                COALESCE(g.position, f.position),
                COALESCE(g.id, f.id),
                f.group_id IS NOT NULL,
                f.position,
                f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }

    /// Unread totals for the "All" and "Favorites" drawer rows.
    pub async fn get_drawer_counts(&self) -> Result<DrawerCounts> {
        let (all_unread, favorites_unread): (Option<i64>, Option<i64>) = sqlx::query_as(
            r#"
            SELECT
                SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END),
                SUM(CASE WHEN is_read = 0 AND is_favorite = 1 THEN 1 ELSE 0 END)
            FROM entries
        "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DrawerCounts {
            all_unread: all_unread.unwrap_or(0),
            favorites_unread: favorites_unread.unwrap_or(0),
        })
    }
}
