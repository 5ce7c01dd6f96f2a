//! Entry view controller.
//!
//! Owns everything about the entry currently on screen: which body is
//! shown, the neighbours for paging, the mobilization watch and the two
//! display slots. All transitions run on the caller's task; background
//! work reports back through the [`ReaderEvent`] channel returned by
//! [`EntryReader::new`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use super::command::{Direction, ReaderAction, ReaderCommand, ReaderEvent};
use super::navigation::NavigationCursor;
use super::platform::{Connectivity, Launcher, ProgressIndicator};
use super::session::{BrowsingState, SessionSnapshot};
use super::surface::{DisplaySurface, SurfacePair, Transition};
use super::watch::JobWatch;
use crate::config::Config;
use crate::enclosure::{Enclosure, ENCLOSURE_SEPARATOR};
use crate::mobilizer::MobilizerHandle;
use crate::render::{self, RenderOptions};
use crate::storage::{Database, Entry, EntryId, FeedId, Scope};

pub const NOTICE_NETWORK_ERROR: &str = "network error";
pub const NOTICE_CANT_OPEN_LINK: &str = "can't open link";

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Loading,
    Displaying(EntryId),
    /// Waiting for the full text of this entry.
    Mobilizing(EntryId),
}

/// Reader behaviour taken from the configuration.
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub render: RenderOptions,
    /// Include read entries in the navigation sequence.
    pub show_read: bool,
    pub mark_read_on_open: bool,
    pub watch_interval: Duration,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ReaderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            render: RenderOptions::from_config(config),
            show_read: config.show_read,
            mark_read_on_open: config.mark_read_on_open,
            watch_interval: Duration::from_millis(config.watch_interval_ms),
        }
    }
}

/// Host capabilities injected into the reader.
pub struct ReaderPlatform {
    pub progress: Box<dyn ProgressIndicator>,
    pub connectivity: Arc<dyn Connectivity>,
    pub launcher: Arc<dyn Launcher>,
}

/// Feed name and icon shown above the entry.
#[derive(Debug, Default, Clone)]
struct FeedHeader {
    feed_id: Option<FeedId>,
    title: String,
    icon: Option<Vec<u8>>,
}

pub struct EntryReader<S: DisplaySurface> {
    db: Database,
    mobilizer: MobilizerHandle,
    settings: ReaderSettings,
    platform: ReaderPlatform,
    surfaces: SurfacePair<S>,
    events: mpsc::Sender<ReaderEvent>,

    scope: Scope,
    cursor: NavigationCursor,
    browsing: BrowsingState,
    state: ReaderState,
    entry: Option<Entry>,
    header: FeedHeader,

    watch: Option<JobWatch>,
    watch_generation: u64,
    notice: Option<String>,
}

impl<S: DisplaySurface> EntryReader<S> {
    pub fn new(
        db: Database,
        mobilizer: MobilizerHandle,
        surfaces: SurfacePair<S>,
        platform: ReaderPlatform,
        settings: ReaderSettings,
        scope: Scope,
    ) -> (Self, mpsc::Receiver<ReaderEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader = Self {
            db,
            mobilizer,
            settings,
            platform,
            surfaces,
            events,
            scope,
            cursor: NavigationCursor::new(),
            browsing: BrowsingState::default(),
            state: ReaderState::Idle,
            entry: None,
            header: FeedHeader::default(),
            watch: None,
            watch_generation: 0,
            notice: None,
        };
        (reader, events_rx)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn browsing(&self) -> &BrowsingState {
        &self.browsing
    }

    pub fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn sequence(&self) -> &[EntryId] {
        self.cursor.sequence()
    }

    pub fn feed_title(&self) -> &str {
        &self.header.title
    }

    pub fn feed_icon(&self) -> Option<&[u8]> {
        self.header.icon.as_deref()
    }

    pub fn surfaces(&self) -> &SurfacePair<S> {
        &self.surfaces
    }

    /// Generation of the active job watch, if one is registered.
    pub fn watch_generation(&self) -> Option<u64> {
        self.watch.as_ref().map(JobWatch::generation)
    }

    /// Transient message for the user, cleared on read.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub async fn handle_command(&mut self, command: ReaderCommand) -> ReaderAction {
        tracing::debug!(?command, state = ?self.state, "Reader command");
        match command {
            ReaderCommand::Open(entry_id) => self.open(entry_id).await,
            ReaderCommand::ToggleFullText(want_full) => self.toggle_full_text(want_full).await,
            ReaderCommand::Navigate(direction) => self.navigate(direction).await,
            ReaderCommand::ToggleFavorite => self.toggle_favorite().await,
            ReaderCommand::MarkUnread => return self.mark_unread().await,
            ReaderCommand::OpenEnclosure => self.open_enclosure(),
            ReaderCommand::OpenLink(url) => self.open_link(&url),
            ReaderCommand::ToggleFullscreen => {
                self.browsing.fullscreen = !self.browsing.fullscreen;
            }
            ReaderCommand::ScrollTo(fraction) => self.browsing.set_scroll_fraction(fraction),
        }
        ReaderAction::Continue
    }

    /// Show `entry_id`, picking the full text when it is already stored.
    pub async fn open(&mut self, entry_id: EntryId) {
        if self.load(entry_id, None, Transition::Replace).await {
            self.browsing.scroll_fraction = 0.0;
        }
    }

    pub async fn toggle_full_text(&mut self, want_full: bool) {
        let entry_id = match self.state {
            ReaderState::Displaying(id) => id,
            ReaderState::Mobilizing(id) if !want_full => {
                if self.load(id, Some(false), Transition::Replace).await {
                    tracing::debug!(entry_id = id, "Stopped waiting for full text");
                }
                return;
            }
            _ => return,
        };

        if !want_full {
            self.load(entry_id, Some(false), Transition::Replace).await;
            return;
        }

        let has_full_text = self
            .entry
            .as_ref()
            .is_some_and(|e| e.mobilized_html.is_some());
        if has_full_text {
            self.load(entry_id, Some(true), Transition::Replace).await;
            return;
        }

        match self.mobilizer.pending_job_for(entry_id).await {
            Ok(Some(job_id)) => {
                tracing::debug!(entry_id, job_id, "Full text already queued, waiting");
                self.start_mobilizing(entry_id);
                return;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(entry_id, error = %e, "Failed to check pending job"),
        }

        if !self.platform.connectivity.is_online().await {
            tracing::debug!(entry_id, "Offline, not requesting full text");
            self.notice = Some(NOTICE_NETWORK_ERROR.to_string());
            return;
        }

        // Watch first so the job's completion cannot slip past unobserved
        self.start_mobilizing(entry_id);
        match self.mobilizer.submit(&[entry_id]).await {
            Ok(added) if added > 0 => {
                tracing::debug!(entry_id, "Full text requested");
            }
            Ok(_) => {
                tracing::debug!(entry_id, "Entry vanished before full text request");
                self.abandon_mobilizing(entry_id);
            }
            Err(e) => {
                tracing::warn!(entry_id, error = %e, "Failed to queue full text request");
                self.abandon_mobilizing(entry_id);
            }
        }
    }

    pub async fn navigate(&mut self, direction: Direction) {
        if !matches!(
            self.state,
            ReaderState::Displaying(_) | ReaderState::Mobilizing(_)
        ) {
            return;
        }
        let target = match direction {
            Direction::Previous => self.browsing.previous_id,
            Direction::Next => self.browsing.next_id,
        };
        let Some(target) = target else {
            tracing::debug!(?direction, "No neighbour in that direction");
            return;
        };

        if self.load(target, None, Transition::Slide(direction)).await {
            self.browsing.scroll_fraction = 0.0;
        }
    }

    pub async fn toggle_favorite(&mut self) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        let favorite = !entry.is_favorite;
        match self.db.set_entry_favorite(entry.id, favorite).await {
            Ok(true) => entry.is_favorite = favorite,
            Ok(false) => tracing::debug!(entry_id = entry.id, "Favorite unchanged"),
            Err(e) => tracing::warn!(entry_id = entry.id, error = %e, "Failed to toggle favorite"),
        }
    }

    /// Mark the current entry unread and leave the reader.
    pub async fn mark_unread(&mut self) -> ReaderAction {
        let Some(entry_id) = self.entry.as_ref().map(|e| e.id) else {
            return ReaderAction::Continue;
        };
        if let Err(e) = self.db.mark_entry_unread(entry_id).await {
            tracing::warn!(entry_id, error = %e, "Failed to mark entry unread");
        }
        self.dispose();
        ReaderAction::Close
    }

    pub fn open_enclosure(&mut self) {
        let Some(raw) = self.entry.as_ref().and_then(|e| e.enclosure.clone()) else {
            return;
        };

        let first_try = Enclosure::parse(&raw)
            .map_err(|e| e.to_string())
            .and_then(|enc| {
                self.platform
                    .launcher
                    .open(enc.uri, Some(enc.mime_type))
                    .map_err(|e| e.to_string())
            });
        let Err(first_error) = first_try else {
            return;
        };

        tracing::debug!(error = %first_error, "Enclosure launch failed, trying bare uri");
        let uri = raw
            .split_once(ENCLOSURE_SEPARATOR)
            .map_or(raw.as_str(), |(uri, _)| uri);
        if let Err(e) = self.platform.launcher.open(uri, None) {
            tracing::warn!(error = %e, "Failed to open enclosure");
            self.notice = Some(e.to_string());
        }
    }

    pub fn open_link(&mut self, url: &str) {
        if let Err(e) = self.platform.launcher.open(url, None) {
            tracing::warn!(url, error = %e, "Failed to open link");
            self.notice = Some(NOTICE_CANT_OPEN_LINK.to_string());
        }
    }

    /// Release the watch and the surfaces and return to `Idle`.
    pub fn dispose(&mut self) {
        self.stop_watch();
        // Anything still queued for the old generation is now stale
        self.watch_generation += 1;
        self.surfaces.clear();
        self.entry = None;
        self.state = ReaderState::Idle;
        self.platform.progress.set_loading(false);
        tracing::debug!("Reader disposed");
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub async fn handle_event(&mut self, event: ReaderEvent) {
        let ReaderEvent::JobStatusChanged {
            entry_id,
            generation,
        } = event;

        let current = self.watch.as_ref().map(|w| (w.entry_id(), w.generation()));
        if current != Some((entry_id, generation))
            || self.state != ReaderState::Mobilizing(entry_id)
        {
            tracing::debug!(entry_id, generation, "Ignoring stale job event");
            return;
        }

        match self.mobilizer.pending_job_for(entry_id).await {
            Ok(Some(_)) => tracing::trace!(entry_id, "Full text still pending"),
            Ok(None) => {
                tracing::debug!(entry_id, "Full text job finished");
                self.load(entry_id, Some(true), Transition::Replace).await;
            }
            Err(e) => tracing::warn!(entry_id, error = %e, "Failed to check job status"),
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.browsing.clone(),
            scope: self.cursor.scope(),
            sequence: self.cursor.sequence().to_vec(),
        }
    }

    pub async fn save_session(&self) -> Result<()> {
        self.snapshot().save(&self.db).await
    }

    /// Resume a saved session: the cached sequence, the body choice and
    /// the scroll position all come back as they were.
    pub async fn restore_session(&mut self, snapshot: SessionSnapshot) {
        if let Some(scope) = snapshot.scope {
            self.scope = scope;
            self.cursor = NavigationCursor::restore(scope, snapshot.sequence);
        }
        let saved = snapshot.state;
        self.browsing.fullscreen = saved.fullscreen;
        let Some(entry_id) = saved.current_entry_id else {
            return;
        };
        if self
            .load(entry_id, Some(saved.prefer_full_text), Transition::Replace)
            .await
        {
            self.browsing.scroll_fraction = saved.scroll_fraction;
            self.surfaces.scroll_active(saved.scroll_fraction);
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load `entry_id` and present it. Returns whether it is now shown.
    ///
    /// `request`: `None` shows the full text when stored, `Some(true)` asks
    /// for it (falling back to the abstract when it is missing),
    /// `Some(false)` forces the abstract.
    ///
    /// Browsing state and the job watch only change once the entry was
    /// read; a failed read leaves the reader exactly as it was.
    async fn load(
        &mut self,
        entry_id: EntryId,
        request: Option<bool>,
        transition: Transition,
    ) -> bool {
        let prior = self.state;
        self.state = ReaderState::Loading;
        self.platform.progress.set_loading(true);

        let mut entry = match self.db.get_entry(entry_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!(entry_id, "Entry vanished, nothing to display");
                self.stop_watch();
                self.surfaces.clear();
                self.entry = None;
                self.browsing.current_entry_id = None;
                self.browsing.previous_id = None;
                self.browsing.next_id = None;
                self.state = ReaderState::Idle;
                self.platform.progress.set_loading(false);
                return false;
            }
            Err(e) => {
                tracing::warn!(entry_id, error = %e, "Failed to load entry");
                self.state = prior;
                self.platform
                    .progress
                    .set_loading(matches!(prior, ReaderState::Mobilizing(_)));
                return false;
            }
        };

        self.stop_watch();
        let prefer_full_text = entry.mobilized_html.is_some() && request != Some(false);
        self.browsing.current_entry_id = Some(entry_id);
        self.browsing.prefer_full_text = prefer_full_text;

        // Neighbours come from the sequence as it was before this entry is
        // marked read
        if !self.cursor.is_initialized_for(self.scope) {
            if let Err(e) = self
                .cursor
                .initialize(&self.db, self.scope, self.settings.show_read)
                .await
            {
                tracing::warn!(scope = ?self.scope, error = %e, "Failed to build navigation sequence");
            }
        }
        let (previous, next) = self.cursor.neighbours(entry_id);
        self.browsing.previous_id = previous;
        self.browsing.next_id = next;

        if self.settings.mark_read_on_open && !entry.is_read {
            match self.db.mark_entry_read(entry_id).await {
                Ok(_) => entry.is_read = true,
                Err(e) => tracing::warn!(entry_id, error = %e, "Failed to mark entry read"),
            }
        }

        self.refresh_header(&entry).await;

        let html = render::render(&entry, prefer_full_text, &self.settings.render);
        if let Err(e) = self.surfaces.present(&html, render::BASE_URL, transition) {
            tracing::warn!(entry_id, error = %e, "Display surface rejected document");
        }

        tracing::debug!(
            entry_id,
            feed_id = entry.feed_id,
            prefer_full_text,
            previous = ?previous,
            next = ?next,
            "Entry displayed"
        );
        let has_full_text = entry.mobilized_html.is_some();
        self.entry = Some(entry);
        self.state = ReaderState::Displaying(entry_id);
        self.platform.progress.set_loading(false);

        // A job queued earlier for this entry is still running: keep
        // watching it unless the abstract was asked for explicitly
        if !has_full_text && request != Some(false) {
            match self.mobilizer.pending_job_for(entry_id).await {
                Ok(Some(job_id)) => {
                    tracing::debug!(entry_id, job_id, "Resuming watch on queued full text");
                    self.start_mobilizing(entry_id);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(entry_id, error = %e, "Failed to check pending job"),
            }
        }
        true
    }

    async fn refresh_header(&mut self, entry: &Entry) {
        let feed_changed = self.header.feed_id != Some(entry.feed_id);

        self.header.title = match self.db.get_feed_title(entry.feed_id).await {
            Ok(Some((name, url))) => name.filter(|n| !n.is_empty()).unwrap_or(url),
            Ok(None) => entry.title.clone(),
            Err(e) => {
                tracing::warn!(feed_id = entry.feed_id, error = %e, "Failed to load feed title");
                entry.title.clone()
            }
        };

        if feed_changed {
            self.header.icon = match self.db.get_feed_icon(entry.feed_id).await {
                Ok(icon) => icon,
                Err(e) => {
                    tracing::warn!(feed_id = entry.feed_id, error = %e, "Failed to load feed icon");
                    None
                }
            };
            self.header.feed_id = Some(entry.feed_id);
        }
    }

    // ========================================================================
    // Job watch
    // ========================================================================

    fn start_mobilizing(&mut self, entry_id: EntryId) {
        self.stop_watch();
        self.watch_generation += 1;
        self.watch = Some(JobWatch::spawn(
            self.db.subscribe(),
            entry_id,
            self.watch_generation,
            self.settings.watch_interval,
            self.events.clone(),
        ));
        self.state = ReaderState::Mobilizing(entry_id);
        self.platform.progress.set_loading(true);
        tracing::debug!(entry_id, generation = self.watch_generation, "Waiting for full text");
    }

    fn abandon_mobilizing(&mut self, entry_id: EntryId) {
        self.stop_watch();
        self.state = ReaderState::Displaying(entry_id);
        self.platform.progress.set_loading(false);
    }

    fn stop_watch(&mut self) {
        if let Some(watch) = self.watch.take() {
            tracing::debug!(
                entry_id = watch.entry_id(),
                generation = watch.generation(),
                "Job watch released"
            );
        }
    }
}
