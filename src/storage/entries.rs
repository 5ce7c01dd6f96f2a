use anyhow::Result;

use super::schema::Database;
use super::types::{Entry, EntryDbRow, EntryId, NewEntry, Scope, StoreChange};

/// Maximum number of ids returned for one navigation scope (OOM protection)
const MAX_SCOPE_IDS: i64 = 10_000;

const ENTRY_COLUMNS: &str = "id, feed_id, title, link, abstract_html, mobilized_html, author, \
                             published_at, is_read, is_favorite, enclosure";

impl Database {
    // ========================================================================
    // Entry Inserts
    // ========================================================================

    /// Insert an entry and return its id.
    pub async fn insert_entry(&self, entry: &NewEntry) -> Result<EntryId> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO entries (feed_id, title, link, abstract_html, author, published_at, enclosure)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(entry.feed_id)
        .bind(&entry.title)
        .bind(&entry.link)
        .bind(&entry.abstract_html)
        .bind(&entry.author)
        .bind(entry.published_at)
        .bind(&entry.enclosure)
        .fetch_one(&self.pool)
        .await?;

        self.notify(StoreChange::Entry {
            entry_id: id,
            counts_changed: true,
        });
        Ok(id)
    }

    // ========================================================================
    // Entry Queries
    // ========================================================================

    /// Point read of one entry. `None` when the id is gone.
    pub async fn get_entry(&self, entry_id: EntryId) -> Result<Option<Entry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?");
        let row = sqlx::query_as::<_, EntryDbRow>(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(EntryDbRow::into_entry))
    }

    /// Ordered ids of every entry in `scope`, most recent first.
    ///
    /// Ties on `published_at` fall back to id descending so the order is
    /// total. With `include_read == false` only unread entries are returned.
    pub async fn entry_ids_for_scope(&self, scope: Scope, include_read: bool) -> Result<Vec<EntryId>> {
        let (filter, param) = match scope {
            Scope::All => ("1 = 1", None),
            Scope::Favorites => ("e.is_favorite = 1", None),
            Scope::Feed(feed_id) => ("e.feed_id = ?", Some(feed_id)),
            Scope::Group(group_id) => (
                "e.feed_id IN (SELECT id FROM feeds WHERE group_id = ?)",
                Some(group_id),
            ),
        };
        let read_filter = if include_read { "" } else { " AND e.is_read = 0" };
        let sql = format!(
            "SELECT e.id FROM entries e WHERE {filter}{read_filter} \
             ORDER BY e.published_at DESC, e.id DESC LIMIT ?"
        );

        let mut query = sqlx::query_as::<_, (i64,)>(&sql);
        if let Some(id) = param {
            query = query.bind(id);
        }
        let rows = query.bind(MAX_SCOPE_IDS).fetch_all(&self.pool).await?;

        tracing::debug!(?scope, include_read, count = rows.len(), "Loaded scope entry ids");
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // ========================================================================
    // Entry Mutations
    // ========================================================================

    /// Mark an entry read (idempotent), returns whether a row changed.
    ///
    /// Observers are notified only when the row actually changed.
    pub async fn mark_entry_read(&self, entry_id: EntryId) -> Result<bool> {
        self.set_read_flag(entry_id, true).await
    }

    /// Mark an entry unread (idempotent), returns whether a row changed.
    pub async fn mark_entry_unread(&self, entry_id: EntryId) -> Result<bool> {
        self.set_read_flag(entry_id, false).await
    }

    async fn set_read_flag(&self, entry_id: EntryId, read: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE entries SET is_read = ? WHERE id = ? AND is_read = ?")
            .bind(read)
            .bind(entry_id)
            .bind(!read)
            .execute(&self.pool)
            .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            self.notify(StoreChange::Entry {
                entry_id,
                counts_changed: true,
            });
        }
        Ok(changed)
    }

    /// Set the favorite flag, returns whether a row changed.
    pub async fn set_entry_favorite(&self, entry_id: EntryId, favorite: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE entries SET is_favorite = ? WHERE id = ? AND is_favorite = ?")
                .bind(favorite)
                .bind(entry_id)
                .bind(!favorite)
                .execute(&self.pool)
                .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            self.notify(StoreChange::Entry {
                entry_id,
                counts_changed: true,
            });
        }
        Ok(changed)
    }

    /// Store fetched full text for an entry.
    pub async fn set_mobilized_html(&self, entry_id: EntryId, html: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE entries SET mobilized_html = ? WHERE id = ?")
            .bind(html)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;

        let changed = result.rows_affected() > 0;
        if changed {
            self.notify(StoreChange::Entry {
                entry_id,
                counts_changed: false,
            });
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewEntry, NewFeed, Scope, StoreChange};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn seed_feed(db: &Database, url: &str) -> i64 {
        db.insert_feed(&NewFeed {
            name: Some("Feed".to_string()),
            url: url.to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    fn test_entry(feed_id: i64, title: &str, published_at: i64) -> NewEntry {
        NewEntry {
            feed_id,
            title: title.to_string(),
            link: Some(format!("https://example.com/{title}")),
            abstract_html: Some(format!("<p>{title}</p>")),
            published_at,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_entry() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, "https://a.example.com/rss").await;
        let id = db.insert_entry(&test_entry(feed_id, "one", 1000)).await.unwrap();

        let entry = db.get_entry(id).await.unwrap().unwrap();
        assert_eq!(entry.title, "one");
        assert_eq!(entry.abstract_html.as_deref(), Some("<p>one</p>"));
        assert!(entry.mobilized_html.is_none());
        assert!(!entry.is_read);
        assert!(!entry.is_favorite);
    }

    #[tokio::test]
    async fn test_get_missing_entry_is_none() {
        let db = test_db().await;
        assert!(db.get_entry(4242).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scope_ids_ordered_by_date_desc() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, "https://a.example.com/rss").await;
        let old = db.insert_entry(&test_entry(feed_id, "old", 1000)).await.unwrap();
        let new = db.insert_entry(&test_entry(feed_id, "new", 3000)).await.unwrap();
        let mid = db.insert_entry(&test_entry(feed_id, "mid", 2000)).await.unwrap();

        let ids = db.entry_ids_for_scope(Scope::All, true).await.unwrap();
        assert_eq!(ids, vec![new, mid, old]);
    }

    #[tokio::test]
    async fn test_scope_ids_exclude_read() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, "https://a.example.com/rss").await;
        let a = db.insert_entry(&test_entry(feed_id, "a", 1000)).await.unwrap();
        let b = db.insert_entry(&test_entry(feed_id, "b", 2000)).await.unwrap();
        db.mark_entry_read(b).await.unwrap();

        let ids = db.entry_ids_for_scope(Scope::Feed(feed_id), false).await.unwrap();
        assert_eq!(ids, vec![a]);
    }

    #[tokio::test]
    async fn test_scope_group_spans_child_feeds() {
        let db = test_db().await;
        let group = db
            .insert_feed(&NewFeed {
                name: Some("Tech".to_string()),
                is_group: true,
                ..Default::default()
            })
            .await
            .unwrap();
        let child = db
            .insert_feed(&NewFeed {
                url: "https://child.example.com/rss".to_string(),
                group_id: Some(group),
                ..Default::default()
            })
            .await
            .unwrap();
        let outside = seed_feed(&db, "https://outside.example.com/rss").await;
        let inside = db.insert_entry(&test_entry(child, "in", 1000)).await.unwrap();
        db.insert_entry(&test_entry(outside, "out", 2000)).await.unwrap();

        let ids = db.entry_ids_for_scope(Scope::Group(group), true).await.unwrap();
        assert_eq!(ids, vec![inside]);
    }

    #[tokio::test]
    async fn test_mark_read_idempotent_and_notifies_once() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, "https://a.example.com/rss").await;
        let id = db.insert_entry(&test_entry(feed_id, "a", 1000)).await.unwrap();

        let mut rx = db.subscribe();
        assert!(db.mark_entry_read(id).await.unwrap());
        assert!(!db.mark_entry_read(id).await.unwrap());

        assert_eq!(
            rx.try_recv().unwrap(),
            StoreChange::Entry {
                entry_id: id,
                counts_changed: true
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_favorite_roundtrip() {
        let db = test_db().await;
        let feed_id = seed_feed(&db, "https://a.example.com/rss").await;
        let id = db.insert_entry(&test_entry(feed_id, "a", 1000)).await.unwrap();

        assert!(db.set_entry_favorite(id, true).await.unwrap());
        let favorites = db.entry_ids_for_scope(Scope::Favorites, true).await.unwrap();
        assert_eq!(favorites, vec![id]);

        assert!(db.set_entry_favorite(id, false).await.unwrap());
        assert!(!db.set_entry_favorite(id, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_mutation_on_missing_entry_reports_no_change() {
        let db = test_db().await;
        assert!(!db.mark_entry_read(99).await.unwrap());
        assert!(!db.set_entry_favorite(99, true).await.unwrap());
        assert!(!db.set_mobilized_html(99, "<p>x</p>").await.unwrap());
    }
}
