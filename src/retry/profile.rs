//! Named retry profiles. Generalizes `agentflow-core::retry::RetryPolicy`/
//! `RetryStrategy` into a single flat struct with an explicit jitter field
//! (spec.md §9 Open Question 3).

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryProfile {
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub backoff: BackoffKind,
    /// Fraction of the computed delay added as uniform jitter, e.g. `0.1`
    /// means `uniform(0, 0.1 * delay)` is added on top.
    pub jitter_fraction: f64,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl RetryProfile {
    pub fn aggressive() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 1.5,
            backoff: BackoffKind::Exponential,
            jitter_fraction: 0.1,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn balanced() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            backoff: BackoffKind::Exponential,
            jitter_fraction: 0.2,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn conservative() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.5,
            backoff: BackoffKind::Exponential,
            jitter_fraction: 0.3,
            timeout: Duration::from_secs(300),
        }
    }

    /// `max_attempts` counts the first invocation plus every retry.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "aggressive" => Some(Self::aggressive()),
            "balanced" => Some(Self::balanced()),
            "conservative" => Some(Self::conservative()),
            _ => None,
        }
    }

    /// Computes the un-jittered delay before the given attempt (1-indexed,
    /// the attempt that just failed), clamped to `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = match self.backoff {
            BackoffKind::Fixed => base_ms,
            BackoffKind::Linear => base_ms * attempt as f64,
            BackoffKind::Exponential => {
                base_ms * self.backoff_multiplier.powi(attempt as i32 - 1)
            }
        };
        let clamped = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(clamped.max(0.0) as u64)
    }

    /// Adds `uniform(0, jitter_fraction * delay)` on top of the base delay.
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_fraction <= 0.0 {
            return base;
        }
        let jitter_range_ms = (base.as_millis() as f64) * self.jitter_fraction;
        let jitter_ms = rand::random::<f64>() * jitter_range_ms;
        base + Duration::from_millis(jitter_ms as u64)
    }
}

/// Loads one `RetryProfile` per YAML file in `dir`, keyed by file stem.
pub fn load_profiles_from_dir(
    dir: &std::path::Path,
) -> Result<std::collections::HashMap<String, RetryProfile>, crate::error::MovaError> {
    let mut out = std::collections::HashMap::new();
    let entries = std::fs::read_dir(dir)?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml")
            && path.extension().and_then(|e| e.to_str()) != Some("yml")
        {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| crate::error::MovaError::Configuration {
                message: format!("profile file has no stem: {}", path.display()),
            })?
            .to_string();
        let content = std::fs::read_to_string(&path)?;
        let profile: RetryProfile = serde_yaml::from_str(&content)?;
        out.insert(name, profile);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_profiles_match_spec_parameters() {
        let aggressive = RetryProfile::aggressive();
        assert_eq!(aggressive.max_retries, 3);
        assert_eq!(aggressive.initial_delay, Duration::from_millis(100));
        assert_eq!(aggressive.max_delay, Duration::from_secs(1));
        assert_eq!(aggressive.backoff_multiplier, 1.5);
        assert_eq!(aggressive.jitter_fraction, 0.1);
        assert_eq!(aggressive.timeout, Duration::from_secs(5));

        let balanced = RetryProfile::balanced();
        assert_eq!(balanced.max_retries, 5);
        assert_eq!(balanced.initial_delay, Duration::from_millis(500));
        assert_eq!(balanced.max_delay, Duration::from_secs(10));
        assert_eq!(balanced.backoff_multiplier, 2.0);
        assert_eq!(balanced.jitter_fraction, 0.2);
        assert_eq!(balanced.timeout, Duration::from_secs(30));

        let conservative = RetryProfile::conservative();
        assert_eq!(conservative.max_retries, 10);
        assert_eq!(conservative.initial_delay, Duration::from_secs(2));
        assert_eq!(conservative.max_delay, Duration::from_secs(60));
        assert_eq!(conservative.backoff_multiplier, 2.5);
        assert_eq!(conservative.jitter_fraction, 0.3);
        assert_eq!(conservative.timeout, Duration::from_secs(300));
    }

    #[test]
    fn backoff_monotonicity_without_jitter_until_cap() {
        let mut profile = RetryProfile::balanced();
        profile.jitter_fraction = 0.0;
        profile.max_delay = Duration::from_secs(3600);
        let d1 = profile.base_delay(1);
        let d2 = profile.base_delay(2);
        let d3 = profile.base_delay(3);
        assert!(d2 >= d1 * 2);
        assert!(d3 >= d2 * 2);
    }

    #[test]
    fn delay_clamps_to_max_delay() {
        let profile = RetryProfile::aggressive();
        let late = profile.base_delay(20);
        assert_eq!(late, profile.max_delay);
    }
}
