//! Sibling ordering for prev/next paging.
//!
//! The sequence for a scope is read once and then kept: marking entries
//! read while paging does not reshuffle it, so an entry read a moment ago
//! stays reachable until the scope changes.

use anyhow::Result;

use crate::storage::{Database, EntryId, Scope};

#[derive(Debug, Default, Clone)]
pub struct NavigationCursor {
    scope: Option<Scope>,
    ids: Vec<EntryId>,
}

impl NavigationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a saved session without touching the store.
    pub fn restore(scope: Scope, ids: Vec<EntryId>) -> Self {
        Self {
            scope: Some(scope),
            ids,
        }
    }

    /// Ordered ids for `scope`. Computed on the first call for a scope and
    /// cached; a call with a different scope recomputes.
    ///
    /// Favorites always include read entries.
    pub async fn initialize(
        &mut self,
        db: &Database,
        scope: Scope,
        include_read: bool,
    ) -> Result<&[EntryId]> {
        if self.scope != Some(scope) {
            let include_read = include_read || scope == Scope::Favorites;
            self.ids = db.entry_ids_for_scope(scope, include_read).await?;
            self.scope = Some(scope);
            tracing::debug!(?scope, count = self.ids.len(), "Navigation sequence computed");
        }
        Ok(&self.ids)
    }

    pub fn is_initialized_for(&self, scope: Scope) -> bool {
        self.scope == Some(scope)
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub fn sequence(&self) -> &[EntryId] {
        &self.ids
    }

    pub fn neighbours(&self, id: EntryId) -> (Option<EntryId>, Option<EntryId>) {
        locate(&self.ids, id)
    }
}

/// Immediate predecessor and successor of `id` in `sequence`.
///
/// `(None, None)` when `id` is not in the sequence.
pub fn locate(sequence: &[EntryId], id: EntryId) -> (Option<EntryId>, Option<EntryId>) {
    match sequence.iter().position(|&x| x == id) {
        Some(pos) => {
            let previous = pos.checked_sub(1).map(|p| sequence[p]);
            let next = sequence.get(pos + 1).copied();
            (previous, next)
        }
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewEntry, NewFeed};
    use proptest::prelude::*;

    #[test]
    fn test_locate_middle_and_boundaries() {
        let seq = [9, 5, 2];
        assert_eq!(locate(&seq, 5), (Some(9), Some(2)));
        assert_eq!(locate(&seq, 9), (None, Some(5)));
        assert_eq!(locate(&seq, 2), (Some(5), None));
        assert_eq!(locate(&seq, 7), (None, None));
        assert_eq!(locate(&[], 7), (None, None));
    }

    proptest! {
        #[test]
        fn locate_returns_adjacent_elements(
            ids in proptest::collection::hash_set(any::<i64>(), 1..50),
            pick in any::<prop::sample::Index>(),
        ) {
            let seq: Vec<i64> = ids.into_iter().collect();
            let pos = pick.index(seq.len());
            let (prev, next) = locate(&seq, seq[pos]);
            prop_assert_eq!(prev, if pos == 0 { None } else { Some(seq[pos - 1]) });
            prop_assert_eq!(next, seq.get(pos + 1).copied());
        }

        #[test]
        fn locate_absent_is_none(
            ids in proptest::collection::hash_set(0i64..1000, 0..50),
            probe in 1000i64..2000,
        ) {
            let seq: Vec<i64> = ids.into_iter().collect();
            prop_assert_eq!(locate(&seq, probe), (None, None));
        }
    }

    async fn seeded() -> (Database, Vec<i64>) {
        let db = Database::open(":memory:").await.unwrap();
        let feed_id = db
            .insert_feed(&NewFeed {
                url: "https://nav.example.com/rss".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for (i, published_at) in [100, 300, 200].into_iter().enumerate() {
            ids.push(
                db.insert_entry(&NewEntry {
                    feed_id,
                    title: format!("Entry {i}"),
                    published_at,
                    ..Default::default()
                })
                .await
                .unwrap(),
            );
        }
        (db, ids)
    }

    #[tokio::test]
    async fn test_initialize_orders_newest_first() {
        let (db, ids) = seeded().await;
        let mut cursor = NavigationCursor::new();
        let seq = cursor.initialize(&db, Scope::All, true).await.unwrap().to_vec();
        assert_eq!(seq, vec![ids[1], ids[2], ids[0]]);
    }

    #[tokio::test]
    async fn test_sequence_is_a_snapshot() {
        let (db, ids) = seeded().await;
        let mut cursor = NavigationCursor::new();
        cursor.initialize(&db, Scope::All, false).await.unwrap();
        assert_eq!(cursor.sequence().len(), 3);

        db.mark_entry_read(ids[1]).await.unwrap();
        let seq = cursor.initialize(&db, Scope::All, false).await.unwrap();
        assert_eq!(seq.len(), 3, "same scope must not recompute");

        let seq = cursor.initialize(&db, Scope::Favorites, false).await.unwrap();
        assert!(seq.is_empty());
        let seq = cursor.initialize(&db, Scope::All, false).await.unwrap();
        assert_eq!(seq.len(), 2, "scope change recomputes with the read filter");
    }

    #[tokio::test]
    async fn test_favorites_include_read_entries() {
        let (db, ids) = seeded().await;
        db.set_entry_favorite(ids[0], true).await.unwrap();
        db.mark_entry_read(ids[0]).await.unwrap();

        let mut cursor = NavigationCursor::new();
        let seq = cursor.initialize(&db, Scope::Favorites, false).await.unwrap();
        assert_eq!(seq, &[ids[0]]);
    }
}
