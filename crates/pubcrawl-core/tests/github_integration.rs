//! Integration tests for the GitHub-backed ledger against a mock contents API.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use indoc::indoc;
use mockito::{Matcher, Server};
use pubcrawl_core::integrations::GitHubBlobStore;
use pubcrawl_core::storage::StoreConfig;
use pubcrawl_core::{Achievement, BlobLedger, Changeset, Ledger, Participant};
use serde_json::json;

const PARTICIPANTS: &str = indoc! {r#"
    Name,CurrentPub,CompletedPubs,Points,Achievements,StartTime
    Mark,2,"Lavery's,The Points",300,first_timer,2024-12-14T18:00:00+00:00
"#};

fn ledger(server: &Server) -> BlobLedger<GitHubBlobStore> {
    let store = GitHubBlobStore::new(
        &server.url(),
        "belfast",
        "crawl",
        "main",
        Some("t0ken".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    BlobLedger::new(store, &StoreConfig::default())
}

#[test]
fn test_load_reads_both_tables() {
    let mut server = Server::new();
    server
        .mock("GET", "/repos/belfast/crawl/contents/participants.csv")
        .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
        .with_status(200)
        .with_body(json!({ "content": STANDARD.encode(PARTICIPANTS), "sha": "p1" }).to_string())
        .create();
    server
        .mock("GET", "/repos/belfast/crawl/contents/punishments.csv")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create();

    let snapshot = ledger(&server).load();
    assert!(snapshot.warnings.is_empty(), "{:?}", snapshot.warnings);
    let mark = snapshot.participants.get("Mark").unwrap();
    assert_eq!(mark.current_stop, 2);
    assert_eq!(mark.points, 300);
    assert!(mark.has(Achievement::FirstTimer));
    assert!(snapshot.punishments.is_empty());
    assert_eq!(snapshot.versions.participants.as_deref(), Some("p1"));
    assert_eq!(snapshot.versions.punishments, None);
}

#[test]
fn test_server_errors_degrade_to_warnings() {
    let mut server = Server::new();
    server
        .mock("GET", Matcher::Regex("^/repos/belfast/crawl/contents/".into()))
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body(r#"{"message":"Server Error"}"#)
        .create();

    let snapshot = ledger(&server).load();
    assert!(snapshot.participants.is_empty());
    assert!(snapshot.punishments.is_empty());
    assert_eq!(snapshot.warnings.len(), 2);
}

#[test]
fn test_commit_creates_missing_table() {
    let mut server = Server::new();
    server
        .mock("GET", "/repos/belfast/crawl/contents/participants.csv")
        .match_query(Matcher::Any)
        .with_status(404)
        .create();
    server
        .mock("GET", "/repos/belfast/crawl/contents/punishments.csv")
        .match_query(Matcher::Any)
        .with_status(404)
        .create();
    let put = server
        .mock("PUT", "/repos/belfast/crawl/contents/participants.csv")
        .match_header("authorization", "Bearer t0ken")
        .match_body(Matcher::PartialJson(json!({
            "message": "Update progress for Aoife",
            "branch": "main",
        })))
        .with_status(201)
        .with_body(r#"{"content":{"sha":"p2"}}"#)
        .expect(1)
        .create();

    let aoife = Participant::new("Aoife", Utc::now()).unwrap();
    ledger(&server)
        .commit(&Changeset {
            participants: vec![aoife],
            punishments: vec![],
        })
        .unwrap();
    put.assert();
}
