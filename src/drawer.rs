//! Navigation drawer list model.
//!
//! Rows 0 and 1 are the fixed "All" and "Favorites" entries; the feeds and
//! folders from the store follow in drawer order.

use std::fmt;
use std::num::NonZeroUsize;

use anyhow::Result;
use lru::LruCache;

use crate::config::Config;
use crate::storage::{Database, DrawerCounts, Feed, FeedId, Scope};
use crate::util::format_timestamp;

/// Formatted "last update" lines kept around between redraws.
pub const DATE_CACHE_CAPACITY: usize = 100;

const FIXED_ROWS: usize = 2;

pub const LABEL_ALL: &str = "All";
pub const LABEL_FAVORITES: &str = "Favorites";

/// Display data for one drawer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawerItem {
    pub title: String,
    /// "Update: ..." or "Error: ..." line. Folders and fixed rows have none.
    pub state: Option<String>,
    /// Hidden when zero.
    pub unread: Option<i64>,
    pub is_group: bool,
    /// Feed inside a folder.
    pub indented: bool,
    /// Folders draw a separator above their title.
    pub separator: bool,
}

impl fmt::Display for DrawerItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.separator {
            writeln!(f, "{}", "-".repeat(24))?;
        }
        if self.indented {
            write!(f, "    ")?;
        }
        write!(f, "{}", self.title)?;
        if let Some(unread) = self.unread {
            write!(f, " ({unread})")?;
        }
        if let Some(state) = &self.state {
            write!(f, "  [{state}]")?;
        }
        Ok(())
    }
}

pub struct DrawerModel {
    feeds: Vec<Feed>,
    counts: DrawerCounts,
    date_format: String,
    time_format: String,
    date_cache: LruCache<i64, String>,
}

impl DrawerModel {
    pub fn new(config: &Config) -> Self {
        Self::with_formats(&config.date_format, &config.time_format)
    }

    pub fn with_formats(date_format: &str, time_format: &str) -> Self {
        Self {
            feeds: Vec::new(),
            counts: DrawerCounts::default(),
            date_format: date_format.to_string(),
            time_format: time_format.to_string(),
            date_cache: LruCache::new(
                NonZeroUsize::new(DATE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ),
        }
    }

    /// Re-read feeds and counts. Cached date lines survive the refresh.
    pub async fn refresh(&mut self, db: &Database) -> Result<()> {
        self.feeds = db.get_drawer_feeds().await?;
        self.counts = db.get_drawer_counts().await?;
        tracing::debug!(
            feeds = self.feeds.len(),
            all_unread = self.counts.all_unread,
            "Drawer refreshed"
        );
        Ok(())
    }

    /// Replace the rows directly.
    pub fn set_rows(&mut self, feeds: Vec<Feed>, counts: DrawerCounts) {
        self.feeds = feeds;
        self.counts = counts;
    }

    pub fn len(&self) -> usize {
        self.feeds.len() + FIXED_ROWS
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn feed(&self, position: usize) -> Option<&Feed> {
        position
            .checked_sub(FIXED_ROWS)
            .and_then(|i| self.feeds.get(i))
    }

    pub fn item(&mut self, position: usize) -> Option<DrawerItem> {
        match position {
            0 | 1 => {
                let (title, unread) = if position == 0 {
                    (LABEL_ALL, self.counts.all_unread)
                } else {
                    (LABEL_FAVORITES, self.counts.favorites_unread)
                };
                Some(DrawerItem {
                    title: title.to_string(),
                    state: None,
                    unread: (unread != 0).then_some(unread),
                    is_group: false,
                    indented: false,
                    separator: false,
                })
            }
            _ => {
                let feed = self.feed(position)?.clone();
                let indented = feed.group_id.is_some();
                if feed.is_group {
                    return Some(DrawerItem {
                        title: feed.display_name().to_uppercase(),
                        state: None,
                        unread: None,
                        is_group: true,
                        indented,
                        separator: true,
                    });
                }

                let state = match &feed.error {
                    Some(error) => format!("Error: {error}"),
                    None => self.update_line(feed.last_update),
                };
                Some(DrawerItem {
                    title: feed.display_name().to_string(),
                    state: Some(state),
                    unread: (feed.unread_count != 0).then_some(feed.unread_count),
                    is_group: false,
                    indented,
                    separator: false,
                })
            }
        }
    }

    /// Feed id for a row; `None` for the fixed rows.
    pub fn item_id(&self, position: usize) -> Option<FeedId> {
        self.feed(position).map(|f| f.id)
    }

    pub fn item_name(&self, position: usize) -> Option<&str> {
        self.feed(position).map(Feed::display_name)
    }

    pub fn item_icon(&self, position: usize) -> Option<&[u8]> {
        self.feed(position)
            .and_then(|f| f.icon.as_deref())
            .filter(|icon| !icon.is_empty())
    }

    pub fn is_group(&self, position: usize) -> bool {
        self.feed(position).is_some_and(|f| f.is_group)
    }

    /// Browsing scope a row opens.
    pub fn scope(&self, position: usize) -> Option<Scope> {
        match position {
            0 => Some(Scope::All),
            1 => Some(Scope::Favorites),
            _ => self.feed(position).map(|f| {
                if f.is_group {
                    Scope::Group(f.id)
                } else {
                    Scope::Feed(f.id)
                }
            }),
        }
    }

    fn update_line(&mut self, last_update: i64) -> String {
        if let Some(line) = self.date_cache.get(&last_update) {
            return line.clone();
        }
        let line = if last_update == 0 {
            "Update: never".to_string()
        } else {
            format!(
                "Update: {}",
                format_timestamp(last_update, &self.date_format, &self.time_format)
            )
        };
        self.date_cache.put(last_update, line.clone());
        line
    }

    #[cfg(test)]
    fn is_date_cached(&self, timestamp: i64) -> bool {
        self.date_cache.contains(&timestamp)
    }
}
