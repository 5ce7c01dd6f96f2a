//! Reader state that survives suspension.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::storage::{Database, EntryId, Scope};

/// Preference key holding the serialized [`SessionSnapshot`].
pub const SESSION_KEY: &str = "session.reader";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowsingState {
    pub current_entry_id: Option<EntryId>,
    pub previous_id: Option<EntryId>,
    pub next_id: Option<EntryId>,
    pub prefer_full_text: bool,
    /// Vertical scroll position as a fraction of the document, in [0, 1].
    pub scroll_fraction: f32,
    pub fullscreen: bool,
}

impl BrowsingState {
    pub fn set_scroll_fraction(&mut self, fraction: f32) {
        self.scroll_fraction = clamp_fraction(fraction);
    }
}

fn clamp_fraction(fraction: f32) -> f32 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// Browsing state plus the cached navigation sequence it refers to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    pub state: BrowsingState,
    pub scope: Option<Scope>,
    pub sequence: Vec<EntryId>,
}

impl SessionSnapshot {
    pub async fn save(&self, db: &Database) -> Result<()> {
        let json = serde_json::to_string(self)?;
        db.set_preference(SESSION_KEY, &json).await
    }

    /// Load the saved session. A corrupt value is logged and discarded.
    pub async fn load(db: &Database) -> Result<Option<Self>> {
        let Some(json) = db.get_preference(SESSION_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Self>(&json) {
            Ok(mut snapshot) => {
                snapshot.state.scroll_fraction = clamp_fraction(snapshot.state.scroll_fraction);
                Ok(Some(snapshot))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable reader session");
                db.delete_preference(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }

    pub async fn clear(db: &Database) -> Result<()> {
        db.delete_preference(SESSION_KEY).await
    }
}
