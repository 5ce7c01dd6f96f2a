use crate::render::{LINK_ENCLOSURE, LINK_FULL_TEXT, LINK_ORIGINAL};
use crate::storage::EntryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// User-initiated input to the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderCommand {
    Open(EntryId),
    /// `true` asks for the fetched full text, `false` for the feed abstract.
    ToggleFullText(bool),
    Navigate(Direction),
    ToggleFavorite,
    /// Mark the entry unread and leave the reader.
    MarkUnread,
    OpenEnclosure,
    OpenLink(String),
    ToggleFullscreen,
    ScrollTo(f32),
}

impl ReaderCommand {
    /// Map a link clicked inside a rendered document to a command.
    pub fn from_link(url: &str) -> Self {
        match url {
            LINK_FULL_TEXT => Self::ToggleFullText(true),
            LINK_ORIGINAL => Self::ToggleFullText(false),
            LINK_ENCLOSURE => Self::OpenEnclosure,
            other => Self::OpenLink(other.to_string()),
        }
    }
}

/// Background notifications delivered on the reader's event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEvent {
    /// Job state for `entry_id` may have changed. Events whose
    /// `generation` is not the current watch generation are stale.
    JobStatusChanged { entry_id: EntryId, generation: u64 },
}

/// What the host should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderAction {
    Continue,
    Close,
}
