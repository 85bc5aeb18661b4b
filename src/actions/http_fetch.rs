//! `http_fetch` — the one network-touching action. Generalizes
//! `agentflow-nodes::nodes::http::HttpNode`'s method dispatch with
//! templating, a Security Gate check, a redirect-disabled client, and a
//! response-size cap.

use crate::actions::template::render;
use crate::envelope::ActionKind;
use crate::error::MovaError;
use crate::security::SecurityConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

const USER_AGENT: &str = "mova-engine/0.1";

pub async fn execute(
    kind: &ActionKind,
    variables: &HashMap<String, Value>,
    security: &SecurityConfig,
) -> Result<HashMap<String, Value>, MovaError> {
    let (url, method, headers, body, timeout_ms) = match kind {
        ActionKind::HttpFetch { url, method, headers, body, timeout_ms } => {
            (url, method, headers, body, *timeout_ms)
        }
        _ => unreachable!("http_fetch::execute called with non-HttpFetch action"),
    };

    let rendered_url = render(url, variables);
    security.validate_url(&rendered_url)?;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| MovaError::Internal { message: format!("failed to build http client: {}", e) })?;

    let mut builder = match method.to_uppercase().as_str() {
        "GET" => client.get(&rendered_url),
        "POST" => client.post(&rendered_url),
        "PUT" => client.put(&rendered_url),
        "DELETE" => client.delete(&rendered_url),
        "PATCH" => client.patch(&rendered_url),
        other => {
            return Err(MovaError::InvalidConfig {
                message: format!("unsupported HTTP method: {}", other),
            })
        }
    };

    for (key, value) in headers {
        builder = builder.header(key, render(value, variables));
    }

    if let Some(body) = body {
        let rendered_body = match body {
            Value::String(s) => render(s, variables),
            other => other.to_string(),
        };
        builder = builder.body(rendered_body);
    }

    let start = std::time::Instant::now();
    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            MovaError::Timeout {
                message: format!("request to {} timed out after {}ms", rendered_url, timeout_ms),
                duration_ms: timeout_ms,
            }
        } else {
            MovaError::Transport { message: e.to_string() }
        }
    })?;

    let status_code = response.status().as_u16();
    let response_headers: HashMap<String, String> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();

    let body_text = response.text().await.map_err(|e| MovaError::Transport { message: e.to_string() })?;
    if body_text.len() > security.max_response_bytes {
        return Err(MovaError::BadResponse {
            status: status_code,
            body: format!("response body exceeds max size of {} bytes", security.max_response_bytes),
        });
    }

    let duration_ms = start.elapsed().as_millis() as u64;

    if !(200..300).contains(&status_code) {
        return Err(MovaError::BadResponse { status: status_code, body: body_text });
    }

    let mut output = HashMap::new();
    output.insert("status_code".to_string(), json!(status_code));
    output.insert("url".to_string(), json!(rendered_url));
    output.insert("method".to_string(), json!(method));
    output.insert("headers".to_string(), json!(response_headers));
    output.insert("body".to_string(), json!(body_text));
    output.insert("duration_ms".to_string(), json!(duration_ms));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn denied_host_fails_before_any_request_is_sent() {
        let security = SecurityConfig::default();
        let variables = HashMap::new();
        let kind = ActionKind::HttpFetch {
            url: "http://169.254.169.254/metadata".to_string(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            timeout_ms: 1000,
        };
        let err = execute(&kind, &variables, &security).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "security validation failed: host 169.254.169.254 is explicitly denied"
        );
    }

    #[tokio::test]
    async fn unsupported_method_is_invalid_config() {
        let security = SecurityConfig::default();
        let variables = HashMap::new();
        let kind = ActionKind::HttpFetch {
            url: "https://example.com".to_string(),
            method: "TRACE".to_string(),
            headers: HashMap::new(),
            body: None,
            timeout_ms: 1000,
        };
        let err = execute(&kind, &variables, &security).await.unwrap_err();
        assert!(matches!(err, MovaError::InvalidConfig { .. }));
    }
}
