//! Whole runs: ledger flush and browser teardown on success and failure

use serde_json::{json, Value};

use super::*;
use crate::direct::GAME_TAB;
use crate::{run, ClaimConfig, ClaimError, NoPrompt};

fn config(data_dir: &std::path::Path) -> ClaimConfig {
    ClaimConfig {
        timeout: TEST_TIMEOUT,
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    }
}

fn read_ledger(config: &ClaimConfig) -> Value {
    let raw = std::fs::read_to_string(config.ledger_path()).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn successful_run_writes_the_account_bucket() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let driver = signed_in_storefront("Alex");
    driver.with(|s| direct_cards(s, &[("a", "Game A"), ("b", "Game B")]));

    let summary = run(Arc::new(driver.clone()), &config, Arc::new(NoPrompt))
        .await
        .unwrap();

    assert_eq!(summary.account, "Alex");
    assert_eq!(summary.direct_claimed, 2);
    assert_eq!(summary.external_processed, 0);

    let ledger = read_ledger(&config);
    let alex = ledger["Alex"].as_object().unwrap();
    assert_eq!(alex.len(), 2);
    assert_eq!(alex["Game A"]["title"], json!("Game A"));
    assert_eq!(alex["Game A"]["store"], json!("internal"));
    assert!(alex["Game B"]["time"].as_str().unwrap().ends_with('Z'));
    assert!(alex["Game B"].get("code").is_none());
    assert!(alex["Game B"].get("url").is_none());

    driver.with(|s| assert_eq!(s.closed, 1));
    let run_shots = std::fs::read_dir(config.screenshots_dir())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
        .count();
    assert_eq!(run_shots, 1);
}

#[tokio::test]
async fn failed_run_still_flushes_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    std::fs::write(
        config.ledger_path(),
        json!({
            "claimed": [{ "title": "Old Game", "time": "2021-05-01T10:00:00.000Z" }],
            "runs": 7
        })
        .to_string(),
    )
    .unwrap();
    let driver = signed_in_storefront("Alex");
    // The game category never shows up, so the direct engine fails.
    driver.with(|s| s.remove(GAME_TAB, None));

    let result = run(Arc::new(driver.clone()), &config, Arc::new(NoPrompt)).await;

    assert!(matches!(result, Err(ClaimError::ClaimUi(_))), "{result:?}");
    driver.with(|s| assert_eq!(s.closed, 1));
    let ledger = read_ledger(&config);
    assert!(ledger.get("claimed").is_none());
    assert!(ledger.get("runs").is_none());
    assert_eq!(ledger["Alex"]["Old Game"]["store"], json!("internal"));
}

#[tokio::test]
async fn auth_failure_keeps_existing_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let existing = json!({ "Sam": { "Game Z": { "title": "Game Z", "time": "t", "store": "gog.com", "code": "K" } } });
    std::fs::write(config.ledger_path(), existing.to_string()).unwrap();
    let driver = signed_out_storefront();

    let result = run(Arc::new(driver.clone()), &config, Arc::new(NoPrompt)).await;

    assert!(matches!(result, Err(ClaimError::AuthFailure(_))), "{result:?}");
    driver.with(|s| assert_eq!(s.closed, 1));
    assert_eq!(read_ledger(&config), existing);
}

#[tokio::test]
async fn corrupt_ledger_aborts_before_touching_the_browser() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    std::fs::write(config.ledger_path(), "{ not json").unwrap();
    let driver = signed_in_storefront("Alex");

    let result = run(Arc::new(driver.clone()), &config, Arc::new(NoPrompt)).await;

    assert!(matches!(result, Err(ClaimError::Ledger(_))), "{result:?}");
    driver.with(|s| {
        assert!(s.gotos.is_empty());
        assert_eq!(s.closed, 1);
    });
    assert_eq!(std::fs::read_to_string(config.ledger_path()).unwrap(), "{ not json");
}
