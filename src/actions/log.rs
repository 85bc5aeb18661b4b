//! `log` — always-succeeding log append. The actual `ExecutionLog` entry is
//! appended by the Executor (it owns `step`/`action`/`kind`); this handler
//! just validates the level and echoes the message back as output.

use crate::context::LogLevel;
use crate::envelope::ActionKind;
use crate::error::MovaError;
use serde_json::Value;
use std::collections::HashMap;

pub fn parse_level(level: &str) -> Result<LogLevel, MovaError> {
    match level {
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        other => Err(MovaError::InvalidConfig {
            message: format!("unknown log level: {}", other),
        }),
    }
}

pub fn execute(kind: &ActionKind) -> Result<HashMap<String, Value>, MovaError> {
    let (message, level) = match kind {
        ActionKind::Log { message, level } => (message, level),
        _ => unreachable!("log::execute called with non-Log action"),
    };
    parse_level(level)?;

    let mut output = HashMap::new();
    output.insert("message".to_string(), Value::String(message.clone()));
    output.insert("level".to_string(), Value::String(level.clone()));
    Ok(output)
}
