//! End-to-end reader scenarios: open, page, toggle full text, resume.
//!
//! Each test creates its own in-memory SQLite database. Full-text fetches
//! go to a wiremock server standing in for the reader proxy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pageturn::content::FullTextFetcher;
use pageturn::mobilizer::{spawn_mobilizer, Mobilizer, MobilizerHandle};
use pageturn::reader::{
    Connectivity, Direction, EntryReader, HtmlBuffer, LaunchError, Launcher, NoProgress,
    ReaderCommand, ReaderEvent, ReaderPlatform, ReaderSettings, ReaderState, SessionSnapshot,
    SurfacePair,
};
use pageturn::render::{LABEL_FULL_TEXT, LABEL_ORIGINAL};
use pageturn::storage::{Database, EntryId, FeedId, NewEntry, NewFeed, Scope};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

struct AlwaysOnline;

#[async_trait]
impl Connectivity for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

struct NoLauncher;

impl Launcher for NoLauncher {
    fn open(&self, _target: &str, _mime_type: Option<&str>) -> Result<(), LaunchError> {
        Ok(())
    }
}

async fn test_db() -> (Database, FeedId) {
    let db = Database::open(":memory:").await.unwrap();
    let feed_id = db
        .insert_feed(&NewFeed {
            name: Some("Scenario Feed".to_string()),
            url: "https://scenario.example.com/rss".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    (db, feed_id)
}

async fn add_entry(db: &Database, feed_id: FeedId, published_at: i64, mobilized: Option<&str>) -> EntryId {
    let id = db
        .insert_entry(&NewEntry {
            feed_id,
            title: format!("Entry at {published_at}"),
            link: Some(format!("https://scenario.example.com/{published_at}")),
            abstract_html: Some("<p>A</p>".to_string()),
            published_at,
            ..Default::default()
        })
        .await
        .unwrap();
    if let Some(html) = mobilized {
        db.set_mobilized_html(id, html).await.unwrap();
    }
    id
}

fn idle_mobilizer(db: &Database) -> MobilizerHandle {
    let fetcher = FullTextFetcher::new(reqwest::Client::new(), None, None).unwrap();
    let (_worker, handle) = Mobilizer::new(db.clone(), fetcher);
    handle
}

fn reader_with(
    db: &Database,
    mobilizer: MobilizerHandle,
    settings: ReaderSettings,
    scope: Scope,
) -> (EntryReader<HtmlBuffer>, mpsc::Receiver<ReaderEvent>) {
    EntryReader::new(
        db.clone(),
        mobilizer,
        SurfacePair::default(),
        ReaderPlatform {
            progress: Box::new(NoProgress),
            connectivity: Arc::new(AlwaysOnline),
            launcher: Arc::new(NoLauncher),
        },
        settings,
        scope,
    )
}

fn fast_settings() -> ReaderSettings {
    ReaderSettings {
        watch_interval: Duration::from_millis(20),
        ..ReaderSettings::default()
    }
}

fn displayed(reader: &EntryReader<HtmlBuffer>) -> String {
    reader
        .surfaces()
        .active()
        .document()
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Opening
// ============================================================================

#[tokio::test]
async fn test_open_shows_abstract_with_full_text_button() {
    let (db, feed_id) = test_db().await;
    let id = add_entry(&db, feed_id, 100, None).await;
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);

    reader.handle_command(ReaderCommand::Open(id)).await;

    assert_eq!(reader.state(), ReaderState::Displaying(id));
    assert!(!reader.browsing().prefer_full_text);
    let html = displayed(&reader);
    assert!(html.contains("<p>A</p>"));
    assert!(html.contains(LABEL_FULL_TEXT));
}

#[tokio::test]
async fn test_open_prefers_stored_full_text() {
    let (db, feed_id) = test_db().await;
    let id = add_entry(&db, feed_id, 100, Some("<p>Full</p>")).await;
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);

    reader.open(id).await;
    assert!(reader.browsing().prefer_full_text);
    assert!(displayed(&reader).contains("<p>Full</p>"));
    assert!(displayed(&reader).contains(LABEL_ORIGINAL));
}

#[tokio::test]
async fn test_disable_pictures_applies_to_display() {
    let (db, feed_id) = test_db().await;
    let id = db
        .insert_entry(&NewEntry {
            feed_id,
            title: "Pictures".to_string(),
            abstract_html: Some("<img src='x'/>Hello".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut settings = fast_settings();
    settings.render.disable_pictures = true;
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), settings, Scope::All);

    reader.open(id).await;
    let html = displayed(&reader);
    assert!(!html.contains("<img"));
    assert!(html.contains("Hello"));
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_neighbours_follow_publish_order() {
    let (db, feed_id) = test_db().await;
    let oldest = add_entry(&db, feed_id, 100, None).await;
    let newest = add_entry(&db, feed_id, 300, None).await;
    let middle = add_entry(&db, feed_id, 200, None).await;
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);

    reader.open(middle).await;
    assert_eq!(reader.sequence(), &[newest, middle, oldest]);
    assert_eq!(reader.browsing().previous_id, Some(newest));
    assert_eq!(reader.browsing().next_id, Some(oldest));

    reader.handle_command(ReaderCommand::Navigate(Direction::Previous)).await;
    assert_eq!(reader.state(), ReaderState::Displaying(newest));
    assert_eq!(reader.browsing().previous_id, None);
    assert_eq!(reader.browsing().next_id, Some(middle));

    // Boundary: nothing before the newest entry
    reader.handle_command(ReaderCommand::Navigate(Direction::Previous)).await;
    assert_eq!(reader.state(), ReaderState::Displaying(newest));
}

#[tokio::test]
async fn test_unread_scope_keeps_entries_read_while_paging() {
    let (db, feed_id) = test_db().await;
    let first = add_entry(&db, feed_id, 200, None).await;
    let second = add_entry(&db, feed_id, 100, None).await;
    let settings = ReaderSettings {
        show_read: false,
        ..fast_settings()
    };
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), settings, Scope::Feed(feed_id));

    reader.open(first).await;
    reader.navigate(Direction::Next).await;
    assert_eq!(reader.state(), ReaderState::Displaying(second));

    // `first` is read now but still reachable
    assert_eq!(reader.browsing().previous_id, Some(first));
    reader.navigate(Direction::Previous).await;
    assert_eq!(reader.state(), ReaderState::Displaying(first));
}

#[tokio::test]
async fn test_entry_outside_sequence_has_no_neighbours() {
    let (db, feed_id) = test_db().await;
    let other_feed = db
        .insert_feed(&NewFeed {
            url: "https://other.example.com/rss".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    add_entry(&db, feed_id, 100, None).await;
    let stray = add_entry(&db, other_feed, 200, None).await;
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::Feed(feed_id));

    reader.open(stray).await;
    assert_eq!(reader.state(), ReaderState::Displaying(stray));
    assert_eq!(reader.browsing().previous_id, None);
    assert_eq!(reader.browsing().next_id, None);
}

// ============================================================================
// Full text
// ============================================================================

#[tokio::test]
async fn test_toggle_law_with_stored_full_text() {
    let (db, feed_id) = test_db().await;
    let id = add_entry(&db, feed_id, 100, Some("<p>Full</p>")).await;
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);
    reader.open(id).await;

    reader.handle_command(ReaderCommand::ToggleFullText(true)).await;
    let first = displayed(&reader);
    reader.handle_command(ReaderCommand::ToggleFullText(false)).await;
    let original = displayed(&reader);
    reader.handle_command(ReaderCommand::ToggleFullText(true)).await;
    let again = displayed(&reader);

    assert_eq!(first, again);
    assert_ne!(first, original);
    assert!(original.contains("<p>A</p>"));
    assert!(again.contains("<p>Full</p>"));
    assert!(reader.browsing().prefer_full_text);
}

#[tokio::test]
async fn test_full_text_request_submits_job() {
    let (db, feed_id) = test_db().await;
    let id = add_entry(&db, feed_id, 100, None).await;
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);
    reader.open(id).await;

    reader.handle_command(ReaderCommand::ToggleFullText(true)).await;
    assert_eq!(reader.state(), ReaderState::Mobilizing(id));
    assert!(reader.watch_generation().is_some());
    assert!(db.mobilize_task_for(id).await.unwrap().is_some());
    assert_eq!(db.pending_mobilize_tasks(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_completed_job_reloads_with_full_text() {
    let (db, feed_id) = test_db().await;
    let id = add_entry(&db, feed_id, 100, None).await;
    let (mut reader, mut events) =
        reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);
    reader.open(id).await;
    reader.toggle_full_text(true).await;

    // Stand in for the worker
    let task = db.pending_mobilize_tasks(1).await.unwrap().remove(0);
    db.complete_mobilize_task(&task, "<p>Mobilized</p>").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while reader.state() == ReaderState::Mobilizing(id) {
            let event = events.recv().await.unwrap();
            reader.handle_event(event).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(reader.state(), ReaderState::Displaying(id));
    assert!(reader.browsing().prefer_full_text);
    assert!(displayed(&reader).contains("<p>Mobilized</p>"));
    assert!(reader.watch_generation().is_none());
}

#[tokio::test]
async fn test_full_text_end_to_end_with_worker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Fetched *article*"))
        .mount(&server)
        .await;

    let (db, feed_id) = test_db().await;
    let id = add_entry(&db, feed_id, 100, None).await;
    let fetcher = FullTextFetcher::new(reqwest::Client::new(), Some(&server.uri()), None).unwrap();
    let (mobilizer, worker) = spawn_mobilizer(db.clone(), fetcher);
    let (mut reader, mut events) = reader_with(&db, mobilizer.clone(), fast_settings(), Scope::All);

    reader.open(id).await;
    reader.toggle_full_text(true).await;

    tokio::time::timeout(Duration::from_secs(10), async {
        while reader.state() == ReaderState::Mobilizing(id) {
            let event = events.recv().await.unwrap();
            reader.handle_event(event).await;
        }
    })
    .await
    .unwrap();

    assert!(displayed(&reader).contains("<p>Fetched <em>article</em></p>"));
    assert!(displayed(&reader).contains(LABEL_ORIGINAL));

    mobilizer.shutdown().await;
    worker.await.unwrap();
}

#[tokio::test]
async fn test_navigation_abandons_job_watch() {
    let (db, feed_id) = test_db().await;
    let older = add_entry(&db, feed_id, 100, None).await;
    let newer = add_entry(&db, feed_id, 200, None).await;
    let (mut reader, mut events) =
        reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);
    reader.open(newer).await;
    reader.toggle_full_text(true).await;
    assert_eq!(reader.state(), ReaderState::Mobilizing(newer));

    reader.navigate(Direction::Next).await;
    assert_eq!(reader.state(), ReaderState::Displaying(older));
    assert!(reader.watch_generation().is_none());

    // The job still finishes, but nothing reloads the reader
    let task = db.pending_mobilize_tasks(1).await.unwrap().remove(0);
    db.complete_mobilize_task(&task, "<p>late</p>").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    while let Ok(event) = events.try_recv() {
        reader.handle_event(event).await;
    }
    assert_eq!(reader.state(), ReaderState::Displaying(older));
    assert!(!displayed(&reader).contains("late"));
}

#[tokio::test]
async fn test_returning_to_queued_entry_picks_up_full_text() {
    let (db, feed_id) = test_db().await;
    let older = add_entry(&db, feed_id, 100, None).await;
    let newer = add_entry(&db, feed_id, 200, None).await;
    let (mut reader, mut events) =
        reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);
    reader.open(newer).await;
    reader.toggle_full_text(true).await;

    reader.navigate(Direction::Next).await;
    assert_eq!(reader.state(), ReaderState::Displaying(older));
    reader.navigate(Direction::Previous).await;
    assert_eq!(reader.state(), ReaderState::Mobilizing(newer));
    assert!(reader.watch_generation().is_some());

    let task = db.pending_mobilize_tasks(1).await.unwrap().remove(0);
    db.complete_mobilize_task(&task, "<p>Mobilized</p>").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while reader.state() == ReaderState::Mobilizing(newer) {
            let event = events.recv().await.unwrap();
            reader.handle_event(event).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(reader.state(), ReaderState::Displaying(newer));
    assert!(reader.browsing().prefer_full_text);
    assert!(displayed(&reader).contains("<p>Mobilized</p>"));
}

// ============================================================================
// Session
// ============================================================================

#[tokio::test]
async fn test_session_resumes_entry_sequence_and_scroll() {
    let (db, feed_id) = test_db().await;
    let older = add_entry(&db, feed_id, 100, Some("<p>Full</p>")).await;
    let newer = add_entry(&db, feed_id, 200, None).await;

    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);
    reader.open(older).await;
    reader.handle_command(ReaderCommand::ScrollTo(0.4)).await;
    reader.handle_command(ReaderCommand::ToggleFullscreen).await;
    let shown = displayed(&reader);
    reader.save_session().await.unwrap();

    // An entry added later must not reshuffle the resumed sequence
    add_entry(&db, feed_id, 300, None).await;

    let snapshot = SessionSnapshot::load(&db).await.unwrap().unwrap();
    let (mut resumed, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);
    resumed.restore_session(snapshot).await;

    assert_eq!(resumed.state(), ReaderState::Displaying(older));
    assert_eq!(resumed.sequence(), &[newer, older]);
    assert_eq!(resumed.browsing().previous_id, Some(newer));
    assert!(resumed.browsing().fullscreen);
    assert_eq!(resumed.browsing().scroll_fraction, 0.4);
    assert_eq!(resumed.surfaces().active().scroll_fraction(), 0.4);
    assert_eq!(displayed(&resumed), shown);
}

#[tokio::test]
async fn test_dispose_returns_to_idle() {
    let (db, feed_id) = test_db().await;
    let id = add_entry(&db, feed_id, 100, None).await;
    let (mut reader, _events) = reader_with(&db, idle_mobilizer(&db), fast_settings(), Scope::All);
    reader.open(id).await;
    reader.toggle_full_text(true).await;

    reader.dispose();
    assert_eq!(reader.state(), ReaderState::Idle);
    assert!(reader.surfaces().active().document().is_none());
    assert!(reader.watch_generation().is_none());
}
