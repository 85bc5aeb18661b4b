//! Retries an action against a deterministically-failing endpoint until the
//! `aggressive` profile's attempts are exhausted, then inspects the entry
//! the Retry Controller handed to the filesystem-backed DLQ.
//!
//! Run with: cargo run --example retry_and_dlq

use mova_core::{DlqFilter, DlqStore, Envelope, Executor, FilesystemDlqStore, RetryProfile, RunStatus};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    println!("=== MOVA Engine: Retry Exhaustion and DLQ ===\n");

    let dlq_root = std::env::temp_dir().join(format!("mova-demo-dlq-{}", std::process::id()));
    let dlq = Arc::new(FilesystemDlqStore::new(&dlq_root).expect("dlq root is writable"));

    let envelope: Envelope = serde_json::from_value(serde_json::json!({
        "version": "1",
        "intent": {
            "name": "flaky-upstream-call",
            "version": "1"
        },
        "actions": [
            {
                "name": "call_upstream",
                "kind": "http_fetch",
                "url": "https://httpstat.us/500",
                "method": "GET",
                "timeout_ms": 2000
            }
        ]
    }))
    .expect("envelope literal is well-formed");

    // The aggressive profile caps attempts at max_retries+1 with a short
    // initial delay, so exhaustion against an always-failing endpoint
    // happens in well under a second of backoff.
    let executor = Arc::new(
        Executor::new()
            .with_default_retry_profile(RetryProfile::aggressive())
            .with_dlq(dlq.clone() as Arc<dyn DlqStore>),
    );

    let context = executor.execute_sync(envelope).await;
    println!("run {} finished as {:?}", context.run_id, context.status);
    assert_eq!(context.status, RunStatus::Failed);

    let result = context.results.get("call_upstream").expect("action ran");
    println!("call_upstream: {:?} after {} attempt(s): {:?}", result.status, result.attempts, result.error);

    let entries = dlq
        .list(&DlqFilter { workflow_type: Some("flaky-upstream-call".to_string()), ..Default::default() })
        .await
        .expect("dlq is readable");
    for entry in &entries {
        println!(
            "DLQ entry {} for run {}: {} attempt(s), last error: {}",
            entry.id, entry.run_id, entry.error_details.attempts, entry.error_details.last_error
        );
    }

    let stats = dlq.stats().await.expect("dlq stats are readable");
    println!("DLQ stats: {} active, {} total", stats.active, stats.total);

    assert_eq!(entries.len(), 1);
    println!("\nOK");
}
