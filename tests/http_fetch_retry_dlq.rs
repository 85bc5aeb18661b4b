//! Integration scenarios for `http_fetch` through the full retry/DLQ path:
//! transient failures that eventually succeed, and permanent failures that
//! exhaust retries and land in the DLQ exactly once.
//!
//! Grounded on the teacher's `agentflow-core/tests/integration_tests.rs`
//! (`Arc<AtomicUsize>`-counted flaky-operation helper, `#[tokio::test]`
//! per scenario) adapted to a real HTTP boundary via `wiremock` in place of
//! an in-process closure, since `http_fetch` is the one action kind that
//! actually performs network I/O.

use mova_core::{
    Action, ActionKind, ActionRetryOverride, DlqFilter, DlqStatus, DlqStore, Envelope, Executor,
    FilesystemDlqStore, Intent, RetryProfile, RunStatus, SecurityConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Wiremock `Respond` wired to an `AtomicUsize`, mirroring the teacher's
/// `flaky_operation` helper: the first `fail_times` requests get a 500, the
/// rest get a 200.
struct FlakyThenOk {
    attempts: Arc<AtomicUsize>,
    fail_times: usize,
}

impl Respond for FlakyThenOk {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            ResponseTemplate::new(500).set_body_string("upstream unavailable")
        } else {
            ResponseTemplate::new(200).set_body_string("ok")
        }
    }
}

/// `SecurityConfig::default()` denies all loopback ranges, which `wiremock`
/// binds to; tests exercising `http_fetch` against a local mock server need
/// the IP-range deny list cleared while keeping every other default.
fn security_allowing_loopback() -> SecurityConfig {
    SecurityConfig { denied_ip_ranges: Vec::new(), denied_hosts: Vec::new(), ..SecurityConfig::default() }
}

fn envelope_fetching(url: String, max_attempts: u32) -> Envelope {
    Envelope {
        version: "1".to_string(),
        intent: Intent {
            name: "fetch-upstream".to_string(),
            version: "1".to_string(),
            description: None,
            tags: vec![],
            timeout: Duration::from_secs(30),
            default_retry_profile: None,
            default_budget: None,
        },
        payload: HashMap::new(),
        actions: vec![Action {
            name: "fetch".to_string(),
            enabled: true,
            timeout: None,
            retry_policy: Some(ActionRetryOverride { profile: None, max_attempts: Some(max_attempts) }),
            kind: ActionKind::HttpFetch {
                url,
                method: "GET".to_string(),
                headers: HashMap::new(),
                body: None,
                timeout_ms: 2000,
            },
        }],
        variables: HashMap::new(),
        secrets: HashMap::new(),
    }
}

#[tokio::test]
async fn scenario_4_transient_failures_then_success_attempts_equals_three() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(FlakyThenOk { attempts: attempts.clone(), fail_times: 2 })
        .mount(&server)
        .await;

    let envelope = envelope_fetching(format!("{}/flaky", server.uri()), 5);
    let executor = Arc::new(
        Executor::new()
            .with_security(security_allowing_loopback())
            .with_default_retry_profile(RetryProfile::aggressive()),
    );
    let context = executor.execute_sync(envelope).await;

    assert_eq!(context.status, RunStatus::Completed);
    let result = context.results.get("fetch").unwrap();
    assert_eq!(result.attempts, 3);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn scenario_5_permanent_failure_exhausts_retries_and_writes_one_dlq_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500).set_body_string("still down"))
        .mount(&server)
        .await;

    let dlq_root = tempfile::tempdir().expect("tempdir");
    let dlq: Arc<dyn DlqStore> = Arc::new(FilesystemDlqStore::new(dlq_root.path()).expect("dlq store"));

    let mut profile = RetryProfile::aggressive();
    profile.max_retries = 4; // max_attempts() == 5, matching the spec scenario
    profile.initial_delay = Duration::from_millis(5);
    profile.max_delay = Duration::from_millis(20);

    let envelope = envelope_fetching(format!("{}/down", server.uri()), 5);
    let executor = Arc::new(
        Executor::new()
            .with_security(security_allowing_loopback())
            .with_default_retry_profile(profile)
            .with_dlq(dlq.clone()),
    );
    let context = executor.execute_sync(envelope).await;

    assert_eq!(context.status, RunStatus::Failed);
    let result = context.results.get("fetch").unwrap();
    assert_eq!(result.attempts, 5);

    let entries = dlq.list(&DlqFilter::default()).await.expect("dlq list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, DlqStatus::Active);
    assert_eq!(entries[0].error_details.error_history.len(), 5);
}
