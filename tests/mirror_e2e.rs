//! End-to-end orchestrator tests: discovery fetch, candidate generation,
//! batched retrieval, completion marking, and resumption from the durable
//! record.

use std::path::PathBuf;
use std::sync::Arc;

use dse_mirror::{ExamType, Mirror, MirrorConfig, StateStore, SubjectInfo, YearRange};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A two-subject catalog with a tiny candidate space: one exam type, one
/// year, one language, two filename patterns = 2 probes per subject.
fn test_config(server: &MockServer) -> MirrorConfig {
    let mut config = MirrorConfig::default();
    config.base_url = server.uri();
    config.file_base_url = format!("{}/files/", server.uri());
    config.subjects = vec![
        SubjectInfo {
            key: "phy".to_string(),
            name: "Physics".to_string(),
            native_name: "物理".to_string(),
        },
        SubjectInfo {
            key: "geog".to_string(),
            name: "Geography".to_string(),
            native_name: "地理".to_string(),
        },
    ];
    config.languages = vec!["eng".to_string()];
    config.year_ranges = vec![YearRange {
        exam_type: ExamType::Dse,
        years: vec!["2020".to_string()],
    }];
    config.file_patterns = vec!["p1.pdf".to_string(), "p2.pdf".to_string()];
    config.concurrency = 4;
    config.batch_size = 2;
    config.min_delay_ms = 0;
    config.max_delay_ms = 1;
    config.timeout_secs = 1;
    config
}

fn pdf_response(body: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "application/pdf")
        .set_body_bytes(body.to_vec())
}

async fn mount_subject_files(server: &MockServer, subject: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{subject}/eng/2020/p1.pdf")))
        .respond_with(pdf_response(b"%PDF paper"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{subject}/eng/2020/p2.pdf")))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_subject_pass_marks_completed() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let dir = TempDir::new()?;

    Mock::given(method("GET"))
        .and(path("/phy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no links</html>"))
        .mount(&server)
        .await;
    mount_subject_files(&server, "phy").await;

    let state_file = dir.path().join("state.json");
    let mirror = Mirror::new(config, state_file.clone(), dir.path().join("downloads")).await?;
    mirror.run(&["phy".to_string()]).await?;

    let state = StateStore::new(state_file).load().await;
    let p = state.progress.get("phy").expect("progress entry");
    assert!(p.completed);
    assert_eq!(p.total_urls, 2);
    assert_eq!(p.downloaded_total, 1);
    assert_eq!(p.failed_total, 1);
    assert_eq!(p.seen_total, 2);
    // Legacy this-run fields reflect this run.
    assert_eq!(p.downloaded, 1);
    assert_eq!(p.found, 1);

    assert!(dir.path().join("downloads/phy/dse/eng/2020/p1.pdf").exists());
    Ok(())
}

#[tokio::test]
async fn test_discovery_links_seed_non_probe_candidates()
-> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let dir = TempDir::new()?;

    // The page advertises a document outside the enumerated pattern list.
    let page = format!(
        r#"<html><a href="{}phy/eng/2020/special.pdf">special</a></html>"#,
        config.file_base_url
    );
    Mock::given(method("GET"))
        .and(path("/phy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/phy/eng/2020/special.pdf"))
        .respond_with(pdf_response(b"%PDF special"))
        .expect(1)
        .mount(&server)
        .await;
    mount_subject_files(&server, "phy").await;

    let state_file = dir.path().join("state.json");
    let mirror = Mirror::new(config, state_file.clone(), dir.path().join("downloads")).await?;
    mirror.run(&["phy".to_string()]).await?;

    let state = StateStore::new(state_file).load().await;
    let p = state.progress.get("phy").expect("progress entry");
    assert_eq!(p.total_urls, 3); // parsed link + 2 probes
    assert_eq!(p.downloaded_total, 2);
    // The parsed link is not a probe, so only the probe download counts as found.
    assert_eq!(p.found, 1);
    assert!(dir
        .path()
        .join("downloads/phy/dse/eng/2020/special.pdf")
        .exists());
    Ok(())
}

#[tokio::test]
async fn test_discovery_failure_aborts_subject_pass_only()
-> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let dir = TempDir::new()?;

    // geog's discovery page is down; phy's works.
    Mock::given(method("GET"))
        .and(path("/geog"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/phy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    mount_subject_files(&server, "phy").await;

    let state_file = dir.path().join("state.json");
    let mirror = Mirror::new(config, state_file.clone(), dir.path().join("downloads")).await?;
    mirror
        .run(&["geog".to_string(), "phy".to_string()])
        .await?;

    let state = StateStore::new(state_file).load().await;
    // No progress entry was created or updated for geog.
    assert!(state.progress.get("geog").is_none());
    // The run proceeded to the next subject.
    assert!(state.progress.get("phy").is_some_and(|p| p.completed));
    Ok(())
}

#[tokio::test]
async fn test_unknown_subject_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let dir = TempDir::new()?;

    Mock::given(method("GET"))
        .and(path("/phy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    mount_subject_files(&server, "phy").await;

    let state_file = dir.path().join("state.json");
    let mirror = Mirror::new(config, state_file.clone(), dir.path().join("downloads")).await?;
    mirror
        .run(&["underwater-basket-weaving".to_string(), "phy".to_string()])
        .await?;

    let state = StateStore::new(state_file).load().await;
    assert!(state.progress.get("underwater-basket-weaving").is_none());
    assert!(state.progress.get("phy").is_some_and(|p| p.completed));
    Ok(())
}

#[tokio::test]
async fn test_restart_reattempts_nothing_already_settled()
-> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let dir = TempDir::new()?;

    // Discovery page is fetched once per run; candidates at most once ever.
    Mock::given(method("GET"))
        .and(path("/phy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/phy/eng/2020/p1.pdf"))
        .respond_with(pdf_response(b"%PDF paper"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/phy/eng/2020/p2.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let state_file = dir.path().join("state.json");
    let downloads = dir.path().join("downloads");

    let first = Mirror::new(config.clone(), state_file.clone(), downloads.clone()).await?;
    first.run(&["phy".to_string()]).await?;

    // Fresh process: state reloaded from disk.
    let second = Mirror::new(config, state_file.clone(), downloads).await?;
    second.run(&["phy".to_string()]).await?;

    let state = StateStore::new(state_file).load().await;
    let p = state.progress.get("phy").expect("progress entry");
    // Counters did not double.
    assert_eq!(p.downloaded_total, 1);
    assert_eq!(p.failed_total, 1);
    assert_eq!(p.seen_total, 2);
    assert!(p.completed);
    Ok(())
}

#[tokio::test]
async fn test_partial_run_state_bounds_reattempts() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let dir = TempDir::new()?;

    Mock::given(method("GET"))
        .and(path("/phy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    // p1 was settled by the interrupted run's checkpoint: never re-requested.
    Mock::given(method("GET"))
        .and(path("/files/phy/eng/2020/p1.pdf"))
        .respond_with(pdf_response(b"%PDF paper"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/phy/eng/2020/p2.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    // Seed a state record as an interrupted run would have left it: batch 1
    // (p1) checkpointed, batch 2 (p2) lost.
    let state_file = dir.path().join("state.json");
    let seeded = serde_json::json!({
        "downloaded_files": [],
        "failed_urls": {
            (format!("{}phy/eng/2020/p1.pdf", config.file_base_url)): "404"
        },
        "progress": {
            "phy": {
                "total_urls": 2,
                "downloaded_total": 0,
                "failed_total": 1,
                "seen_total": 1,
                "completed": false,
                "timestamp": "2026-01-01T00:00:00+00:00"
            }
        },
        "seen_urls": [format!("{}phy/eng/2020/p1.pdf", config.file_base_url)],
        "last_update": "2026-01-01T00:00:00+00:00"
    });
    tokio::fs::write(&state_file, serde_json::to_vec_pretty(&seeded)?).await?;

    let mirror = Mirror::new(config, state_file.clone(), dir.path().join("downloads")).await?;
    mirror.run(&["phy".to_string()]).await?;

    let state = StateStore::new(state_file).load().await;
    let p = state.progress.get("phy").expect("progress entry");
    assert_eq!(p.seen_total, 2);
    assert_eq!(p.failed_total, 2);
    assert!(p.completed);
    Ok(())
}

#[tokio::test]
async fn test_state_file_path_is_stable() -> Result<(), Box<dyn std::error::Error>> {
    // StateStore keeps the exact path it was given; the orchestrator never
    // relocates the record.
    let store = StateStore::new(PathBuf::from("/var/lib/mirror/state.json"));
    assert_eq!(store.path(), PathBuf::from("/var/lib/mirror/state.json"));
    let _ = Arc::new(store);
    Ok(())
}
