//! Integration tests for the mobilization queue: submit, fetch, retry, drop.
//!
//! Each test creates its own in-memory SQLite database and a wiremock
//! server standing in for the reader proxy.

use std::time::Duration;

use pageturn::content::FullTextFetcher;
use pageturn::mobilizer::{Mobilizer, MAX_ATTEMPTS};
use pageturn::storage::{Database, EntryId, NewEntry, NewFeed, StoreChange};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

async fn seed_entries(db: &Database, links: &[Option<&str>]) -> Vec<EntryId> {
    let feed_id = db
        .insert_feed(&NewFeed {
            name: Some("Queue Feed".to_string()),
            url: "https://queue.example.com/rss".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut ids = Vec::new();
    for (i, link) in links.iter().enumerate() {
        ids.push(
            db.insert_entry(&NewEntry {
                feed_id,
                title: format!("Queued {i}"),
                link: link.map(str::to_string),
                published_at: i as i64,
                ..Default::default()
            })
            .await
            .unwrap(),
        );
    }
    ids
}

fn worker(db: &Database, server: &MockServer) -> (Mobilizer, pageturn::mobilizer::MobilizerHandle) {
    let fetcher = FullTextFetcher::new(reqwest::Client::new(), Some(&server.uri()), None)
        .unwrap()
        .with_retry_delay(Duration::from_millis(1));
    Mobilizer::new(db.clone(), fetcher)
}

#[tokio::test]
async fn test_mixed_queue_settles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("/good$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Good body"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("/gone$"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let db = test_db().await;
    let ids = seed_entries(
        &db,
        &[
            Some("https://site.example.com/good"),
            Some("https://site.example.com/gone"),
            None,
        ],
    )
    .await;
    let (worker, handle) = worker(&db, &server);

    assert_eq!(handle.submit(&ids).await.unwrap(), 3);
    let report = worker.run_to_completion().await.unwrap();

    assert_eq!(report.completed, 1);
    // The link-less entry is dropped at once, the 410 after its last attempt
    assert_eq!(report.dropped, 2);
    assert_eq!(report.failed, (MAX_ATTEMPTS - 1) as usize);
    assert!(db.pending_mobilize_tasks(10).await.unwrap().is_empty());

    let good = db.get_entry(ids[0]).await.unwrap().unwrap();
    assert_eq!(good.mobilized_html.as_deref(), Some("<p>Good body</p>\n"));
    assert!(db.get_entry(ids[1]).await.unwrap().unwrap().mobilized_html.is_none());
}

#[tokio::test]
async fn test_resubmit_while_pending_is_ignored() {
    let server = MockServer::start().await;
    let db = test_db().await;
    let ids = seed_entries(&db, &[Some("https://site.example.com/a")]).await;
    let (_worker, handle) = worker(&db, &server);

    assert_eq!(handle.submit(&ids).await.unwrap(), 1);
    let job = handle.pending_job_for(ids[0]).await.unwrap();
    assert_eq!(handle.submit(&ids).await.unwrap(), 0);
    assert_eq!(handle.pending_job_for(ids[0]).await.unwrap(), job);
}

#[tokio::test]
async fn test_completion_is_observable_through_changes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Observed"))
        .mount(&server)
        .await;
    let db = test_db().await;
    let ids = seed_entries(&db, &[Some("https://site.example.com/o")]).await;
    let (worker, handle) = worker(&db, &server);
    handle.submit(&ids).await.unwrap();

    let mut changes = db.subscribe();
    worker.drain_queue().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(change) = changes.try_recv() {
        seen.push(change);
    }
    assert!(seen.contains(&StoreChange::Entry {
        entry_id: ids[0],
        counts_changed: false
    }));
    assert!(seen.contains(&StoreChange::Tasks));
    assert!(handle.pending_job_for(ids[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("After restart"))
        .mount(&server)
        .await;
    let db = test_db().await;
    let ids = seed_entries(&db, &[Some("https://site.example.com/r")]).await;

    // Queue with no worker running
    let (first, handle) = worker(&db, &server);
    drop(first);
    handle.submit(&ids).await.unwrap();

    // A fresh worker picks it up on startup
    let (second, second_handle) = worker(&db, &server);
    let join = tokio::spawn(second.run());
    tokio::time::timeout(Duration::from_secs(5), async {
        while second_handle.pending_job_for(ids[0]).await.unwrap().is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert!(db.get_entry(ids[0]).await.unwrap().unwrap().mobilized_html.is_some());
    second_handle.shutdown().await;
    join.await.unwrap();
}
