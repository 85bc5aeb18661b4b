//! The Policy Engine: matches runtime error context to a retry profile via
//! scored conditions. Generalizes `retry.rs`'s `ErrorPattern::matches`
//! (single fixed pattern) into `Condition::score_against` (best of several
//! optional predicates), linear-scanning enabled policies for the best
//! `(score, updated_at)` tuple — newer wins ties, per spec.md §4.3.

use crate::error::MovaError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// The runtime facts available when classifying a failed action.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub error_kind: String,
    pub http_status: Option<u16>,
    pub error_message: String,
    pub action_kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Condition {
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub message_regex: Option<String>,
    #[serde(default)]
    pub action_kind: Option<String>,
}

impl Condition {
    /// Best-scoring match, or `None` if any specified field fails to match.
    /// Scoring weights follow spec.md §3: error_kind=10, http_status=8,
    /// action_kind=6, message_regex=4.
    pub fn score_against(&self, ctx: &ErrorContext) -> Option<u32> {
        let mut score = 0u32;
        let mut any_field_specified = false;

        if let Some(ref kind) = self.error_kind {
            any_field_specified = true;
            if kind != &ctx.error_kind {
                return None;
            }
            score += 10;
        }
        if let Some(status) = self.http_status {
            any_field_specified = true;
            if Some(status) != ctx.http_status {
                return None;
            }
            score += 8;
        }
        if let Some(ref kind) = self.action_kind {
            any_field_specified = true;
            if kind != &ctx.action_kind {
                return None;
            }
            score += 6;
        }
        if let Some(ref pattern) = self.message_regex {
            any_field_specified = true;
            let re = Regex::new(pattern).ok()?;
            if !re.is_match(&ctx.error_message) {
                return None;
            }
            score += 4;
        }

        if any_field_specified {
            Some(score)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConstraint {
    pub max_retries_per_workflow: Option<u32>,
    #[serde(default, with = "humantime_serde::option")]
    pub max_total_retry_time: Option<std::time::Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub retry_profile: String,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub budget_constraint: Option<BudgetConstraint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

pub struct PolicyMatch {
    pub policy: Policy,
    pub score: u32,
}

/// Copy-on-write policy set: writers rebuild the vector under the write
/// lock, readers take a cheap clone-of-the-snapshot (grounded on the
/// teacher's own copy-on-write note for its rate-limit/circuit-breaker
/// registries, generalized here to a `Vec<Policy>`).
#[derive(Clone)]
pub struct PolicyEngine {
    policies: Arc<RwLock<Vec<Policy>>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self { policies: Arc::new(RwLock::new(Vec::new())) }
    }

    pub fn add(&self, policy: Policy) {
        let mut guard = self.policies.write().expect("policy lock poisoned");
        guard.push(policy);
    }

    pub fn remove(&self, id: &str) {
        let mut guard = self.policies.write().expect("policy lock poisoned");
        guard.retain(|p| p.id != id);
    }

    pub fn update(&self, policy: Policy) {
        let mut guard = self.policies.write().expect("policy lock poisoned");
        if let Some(slot) = guard.iter_mut().find(|p| p.id == policy.id) {
            *slot = policy;
        } else {
            guard.push(policy);
        }
    }

    pub fn list(&self) -> Vec<Policy> {
        self.policies.read().expect("policy lock poisoned").clone()
    }

    /// Linear scan of enabled policies, keeping the best-scoring matching
    /// condition per policy, then returning the policy with the highest
    /// `(score, updated_at)` tuple.
    pub fn match_error(&self, ctx: &ErrorContext) -> Option<PolicyMatch> {
        let snapshot = self.list();
        let mut best: Option<PolicyMatch> = None;

        for policy in snapshot.into_iter().filter(|p| p.enabled) {
            let best_condition_score = policy
                .conditions
                .iter()
                .filter_map(|c| c.score_against(ctx))
                .max();

            if let Some(score) = best_condition_score {
                let replace = match &best {
                    None => true,
                    Some(current) => {
                        (score, policy.updated_at) > (current.score, current.policy.updated_at)
                    }
                };
                if replace {
                    best = Some(PolicyMatch { policy, score });
                }
            }
        }

        best
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads one `RetryProfile`-referencing `Policy` per YAML/JSON file in
/// `dir`.
pub fn load_policies_from_dir(dir: &std::path::Path) -> Result<Vec<Policy>, MovaError> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str());
        if ext != Some("yaml") && ext != Some("yml") && ext != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let policy: Policy = if ext == Some("json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        out.push(policy);
    }
    Ok(out)
}
