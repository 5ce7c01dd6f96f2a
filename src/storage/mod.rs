mod entries;
mod feeds;
mod preferences;
mod schema;
mod tasks;
mod types;

pub use schema::Database;
pub use types::{
    DatabaseError, DrawerCounts, Entry, EntryId, Feed, FeedId, JobId, MobilizeTask, NewEntry,
    NewFeed, Scope, StoreChange,
};
