use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The entry database is locked by another process. Close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface
/// as one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Identifiers
// ============================================================================

pub type EntryId = i64;
pub type FeedId = i64;
pub type JobId = i64;

// ============================================================================
// Scope
// ============================================================================

/// Browsing context that decides which entries are siblings for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    All,
    Favorites,
    Feed(FeedId),
    Group(FeedId),
}

impl Scope {
    /// Parse the CLI form: `all`, `favorites`, `feed:<id>` or `group:<id>`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "favorites" => Some(Self::Favorites),
            _ => {
                let (kind, id) = s.split_once(':')?;
                let id = id.parse().ok()?;
                match kind {
                    "feed" => Some(Self::Feed(id)),
                    "group" => Some(Self::Group(id)),
                    _ => None,
                }
            }
        }
    }
}

// ============================================================================
// Change Notifications
// ============================================================================

/// Broadcast on every mutation that changes externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// An entry field changed. `counts_changed` is set when unread or
    /// favorite counts moved as a result.
    Entry {
        entry_id: EntryId,
        counts_changed: bool,
    },
    /// The mobilization task queue changed.
    Tasks,
    /// Feed rows were inserted or updated.
    Feeds,
}

// ============================================================================
// Inserts
// ============================================================================

/// A feed or folder to insert.
#[derive(Debug, Clone, Default)]
pub struct NewFeed {
    pub name: Option<String>,
    pub url: String,
    pub icon: Option<Vec<u8>>,
    pub is_group: bool,
    pub group_id: Option<FeedId>,
    pub position: i64,
}

/// An entry to insert, as produced by whatever sync process feeds the store.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub feed_id: FeedId,
    pub title: String,
    pub link: Option<String>,
    pub abstract_html: Option<String>,
    pub author: Option<String>,
    /// Unix milliseconds
    pub published_at: i64,
    pub enclosure: Option<String>,
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub link: Option<String>,
    pub abstract_html: Option<String>,
    pub mobilized_html: Option<String>,
    pub author: Option<String>,
    pub published_at: i64,
    pub is_read: bool,
    pub is_favorite: bool,
    pub enclosure: Option<String>,
}

impl EntryDbRow {
    pub(crate) fn into_entry(self) -> Entry {
        Entry {
            id: self.id,
            feed_id: self.feed_id,
            title: self.title,
            link: self.link,
            abstract_html: self.abstract_html,
            mobilized_html: self.mobilized_html,
            author: self.author,
            published_at: self.published_at,
            is_read: self.is_read,
            is_favorite: self.is_favorite,
            enclosure: self.enclosure,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Entry record as stored.
///
/// `mobilized_html` stays `None` until a full-text fetch succeeds.
/// `enclosure` uses the `uri[@]mime[@]size` encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub feed_id: FeedId,
    pub title: String,
    pub link: Option<String>,
    pub abstract_html: Option<String>,
    pub mobilized_html: Option<String>,
    pub author: Option<String>,
    /// Unix milliseconds
    pub published_at: i64,
    pub is_read: bool,
    pub is_favorite: bool,
    pub enclosure: Option<String>,
}

/// Feed or folder as listed in the drawer.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: FeedId,
    pub name: Option<String>,
    pub url: String,
    pub icon: Option<Vec<u8>>,
    pub is_group: bool,
    pub group_id: Option<FeedId>,
    /// Unix milliseconds, 0 = never updated
    pub last_update: i64,
    pub error: Option<String>,
    pub unread_count: i64,
}

impl Feed {
    /// Display name, falling back to the feed url.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

/// Aggregate counts for the drawer's "All" and "Favorites" rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawerCounts {
    pub all_unread: i64,
    pub favorites_unread: i64,
}

/// Pending full-text fetch.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MobilizeTask {
    pub id: JobId,
    pub entry_id: EntryId,
    pub attempts: i64,
}
