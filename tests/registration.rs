mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::{api_path, MockApi};
use moltbook_cli::config::PollSettings;
use moltbook_cli::verification::{AgentState, ClaimStatus, PollOutcome, Sequencer};
use moltbook_cli::{CancelToken, CredentialStore, Error};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const UNSET_ENV: &str = "MOLTBOOK_REGISTRATION_TEST_NEVER_SET";

fn store_in(dir: &TempDir) -> CredentialStore {
    CredentialStore::new(dir.path().join(".config/moltbook/credentials.json"), UNSET_ENV)
}

fn fast_poll() -> PollSettings {
    PollSettings {
        max_attempts: 10,
        interval: Duration::ZERO,
    }
}

fn mount_register_ok(api: &MockApi) {
    api.mount(
        Mock::given(method("POST"))
            .and(path(api_path("/agents/register")))
            .and(body_json(json!({"name": "TestBot", "description": "demo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "agent": {"api_key": "moltbook_abc", "claim_url": "https://x/claim/abc"}
            })))
            .expect(1),
    );
}

fn mount_status(api: &MockApi, status: &str) {
    api.mount(
        Mock::given(method("GET"))
            .and(path(api_path("/agents/status")))
            .and(header("authorization", "Bearer moltbook_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": status}))),
    );
}

#[test]
fn test_register_writes_credential_file() {
    let api = MockApi::start();
    mount_register_ok(&api);
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut seq = Sequencer::new(api.config(), store.clone()).unwrap();
    assert_eq!(seq.state(), AgentState::NoCredentials);

    let registration = seq.register("TestBot", "demo").unwrap();

    assert_eq!(registration.api_key, "moltbook_abc");
    assert_eq!(registration.claim_url.as_deref(), Some("https://x/claim/abc"));
    assert_eq!(seq.state(), AgentState::RegisteredUnverified);

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({"api_key": "moltbook_abc", "agent_name": "TestBot"})
    );
    api.verify();
}

#[test]
fn test_register_without_api_key_keeps_state() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("POST"))
            .and(path(api_path("/agents/register")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"agent": {}}))),
    );
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut seq = Sequencer::new(api.config(), store.clone()).unwrap();
    let err = seq.register("TestBot", "demo").unwrap_err();

    assert!(matches!(err, Error::Registration(_)));
    assert_eq!(seq.state(), AgentState::NoCredentials);
    assert!(!store.path().exists());
}

#[test]
fn test_register_name_conflict_surfaces_http_error() {
    let api = MockApi::start();
    api.mount(
        Mock::given(method("POST"))
            .and(path(api_path("/agents/register")))
            .respond_with(ResponseTemplate::new(409).set_body_string(r#"{"error":"name taken"}"#)),
    );
    let dir = TempDir::new().unwrap();

    let mut seq = Sequencer::new(api.config(), store_in(&dir)).unwrap();
    let err = seq.register("TestBot", "demo").unwrap_err();

    assert_eq!(err.status(), Some(409));
    assert_eq!(seq.state(), AgentState::NoCredentials);
}

#[test]
fn test_check_status_claimed_verifies() {
    let api = MockApi::start();
    mount_register_ok(&api);
    mount_status(&api, "claimed");
    let dir = TempDir::new().unwrap();

    let mut seq = Sequencer::new(api.config(), store_in(&dir)).unwrap();
    seq.register("TestBot", "demo").unwrap();

    assert_eq!(seq.check_status().unwrap(), ClaimStatus::Claimed);
    assert_eq!(seq.state(), AgentState::Verified);
}

#[test]
fn test_polling_gives_up_after_ten_attempts() {
    let api = MockApi::start();
    mount_register_ok(&api);
    api.mount(
        Mock::given(method("GET"))
            .and(path(api_path("/agents/status")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "pending_claim"})))
            .expect(10),
    );
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut seq = Sequencer::new(api.config(), store.clone()).unwrap();
    seq.register("TestBot", "demo").unwrap();

    let mut pending_calls = Vec::new();
    let outcome = seq
        .await_verification(fast_poll(), &CancelToken::new(), |attempt, status| {
            assert_eq!(*status, ClaimStatus::PendingClaim);
            pending_calls.push(attempt);
        })
        .unwrap();

    assert_eq!(outcome, PollOutcome::TimedOut { attempts: 10 });
    assert_eq!(pending_calls, (1..=10).collect::<Vec<u32>>());
    assert_eq!(seq.state(), AgentState::RegisteredUnverified);

    let creds = store.load().unwrap().expect("credentials must survive a timeout");
    assert_eq!(creds.api_key, "moltbook_abc");
    api.verify();
}

#[test]
fn test_polling_stops_once_claimed() {
    let api = MockApi::start();
    mount_register_ok(&api);
    // first two checks are pending, the third sees the claim
    api.mount(
        Mock::given(method("GET"))
            .and(path(api_path("/agents/status")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "pending_claim"})))
            .up_to_n_times(2)
            .expect(2),
    );
    api.mount(
        Mock::given(method("GET"))
            .and(path(api_path("/agents/status")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "claimed"})))
            .expect(1),
    );
    let dir = TempDir::new().unwrap();

    let mut seq = Sequencer::new(api.config(), store_in(&dir)).unwrap();
    seq.register("TestBot", "demo").unwrap();

    let outcome = seq
        .await_verification(fast_poll(), &CancelToken::new(), |_, _| {})
        .unwrap();

    assert_eq!(outcome, PollOutcome::Verified { attempts: 3 });
    assert_eq!(seq.state(), AgentState::Verified);
    assert!(seq.client().is_some());
    api.verify();
}

#[test]
fn test_polling_can_be_cancelled_from_another_thread() {
    let api = MockApi::start();
    mount_register_ok(&api);
    mount_status(&api, "pending_claim");
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut seq = Sequencer::new(api.config(), store.clone()).unwrap();
    seq.register("TestBot", "demo").unwrap();

    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        remote.cancel();
    });

    let slow = PollSettings {
        max_attempts: 10,
        interval: Duration::from_secs(30),
    };
    let start = Instant::now();
    let outcome = seq.await_verification(slow, &cancel, |_, _| {}).unwrap();
    canceller.join().unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled { attempts: 1 });
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(store.load().unwrap().is_some());
}

#[test]
fn test_polling_aborts_on_http_error() {
    let api = MockApi::start();
    mount_register_ok(&api);
    api.mount(
        Mock::given(method("GET"))
            .and(path(api_path("/agents/status")))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .expect(1),
    );
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut seq = Sequencer::new(api.config(), store.clone()).unwrap();
    seq.register("TestBot", "demo").unwrap();

    let err = seq
        .await_verification(fast_poll(), &CancelToken::new(), |_, _| {})
        .unwrap_err();

    match err {
        Error::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream down");
        }
        other => panic!("expected Error::Http, got {:?}", other),
    }
    assert!(store.load().unwrap().is_some());
    api.verify();
}

#[test]
fn test_existing_credentials_are_reused() {
    let api = MockApi::start();
    mount_status(&api, "claimed");
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save("moltbook_abc", "TestBot").unwrap();

    let mut seq = Sequencer::new(api.config(), store).unwrap();
    assert_eq!(seq.state(), AgentState::RegisteredUnverified);

    let outcome = seq
        .await_verification(fast_poll(), &CancelToken::new(), |_, _| {})
        .unwrap();
    assert_eq!(outcome, PollOutcome::Verified { attempts: 1 });
}
