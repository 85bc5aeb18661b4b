//! A minimal envelope with no retry/DLQ/policy configuration: set a
//! variable, log it, and branch on a condition.
//!
//! Run with: cargo run --example simple_envelope

use mova_core::{Envelope, Executor, RunStatus};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    println!("=== MOVA Engine: Simple Envelope ===\n");

    let envelope: Envelope = serde_json::from_value(serde_json::json!({
        "version": "1",
        "intent": {
            "name": "greet-user",
            "version": "1",
            "description": "Greets a user and logs whether the name was provided"
        },
        "payload": {
            "name": "Ada"
        },
        "actions": [
            {
                "name": "build_greeting",
                "kind": "set",
                "variable": "greeting",
                "value": "Hello, {{payload.name}}!"
            },
            {
                "name": "announce",
                "kind": "log",
                "message": "greeting variable set",
                "level": "info"
            },
            {
                "name": "branch_on_name",
                "kind": "if",
                "condition": "{{payload.name}} == \"Ada\"",
                "then": [
                    {
                        "name": "celebrate",
                        "kind": "log",
                        "message": "Ada says hi back!",
                        "level": "info"
                    }
                ],
                "else": [
                    {
                        "name": "generic_wave",
                        "kind": "log",
                        "message": "Nice to meet you.",
                        "level": "info"
                    }
                ]
            }
        ]
    }))
    .expect("envelope literal is well-formed");

    let executor = Arc::new(Executor::new());
    let context = executor.execute_sync(envelope).await;

    println!("run {} finished as {:?}", context.run_id, context.status);
    if let Some(greeting) = context.variables.get("greeting") {
        println!("  variables.greeting = {greeting}");
    }
    for (name, result) in &context.results {
        println!("  {name}: {:?} ({} attempt(s))", result.status, result.attempts);
    }
    for log in &context.logs {
        println!("  log[{:?}] {}: {}", log.level, log.action, log.message);
    }

    assert_eq!(context.status, RunStatus::Completed);
    println!("\nOK");
}
