//! `sleep` — suspends for a configured number of seconds, respecting
//! cancellation.

use crate::cancellation::CancellationToken;
use crate::envelope::ActionKind;
use crate::error::MovaError;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as i64)
    } else {
        format!("{}", seconds)
    }
}

pub async fn execute(
    cancellation: &CancellationToken,
    kind: &ActionKind,
    timeout: Option<Duration>,
) -> Result<HashMap<String, Value>, MovaError> {
    let seconds = match kind {
        ActionKind::Sleep { seconds } => *seconds,
        _ => unreachable!("sleep::execute called with non-Sleep action"),
    };

    if let Some(timeout) = timeout {
        let timeout_secs = timeout.as_secs_f64();
        if seconds > timeout_secs {
            // A config mismatch discoverable before any suspension happens,
            // not a runtime timeout — terminal, so the Retry Controller
            // never spends attempts retrying it (spec.md §4.7's "no retries
            // are consumed for pure config errors").
            return Err(MovaError::InvalidConfig {
                message: format!(
                    "sleep duration {:.6} seconds exceeds timeout {} seconds",
                    seconds,
                    format_seconds(timeout_secs)
                ),
            });
        }
    }

    let duration = Duration::from_secs_f64(seconds.max(0.0));
    cancellation.sleep(duration).await;
    if cancellation.is_cancelled() {
        return Err(MovaError::Cancelled);
    }

    let mut output = HashMap::new();
    output.insert("seconds".to_string(), Value::from(seconds));
    output.insert("slept".to_string(), Value::Bool(true));
    Ok(output)
}
