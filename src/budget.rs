//! The Budget Accountant: time-windowed counters per scope.
//!
//! Generalizes `robustness.rs`'s `RateLimiter` (`Arc<Mutex<Vec<Instant>>>`
//! sliding log) into a fixed-window counter pair (`window_start`,
//! `current_count`) per spec.md §3's explicit window-rollover rule, and
//! from a single scope to the multi-scope AND'd check spec.md §4.5
//! describes (global -> organization -> user -> client).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    ApiRequests,
    Executions,
    Tokens,
    Dollars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    Global,
    Organization,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Minute,
    Hour,
    Day,
    Month,
}

impl TimeWindow {
    pub fn duration(&self) -> ChronoDuration {
        match self {
            TimeWindow::Minute => ChronoDuration::minutes(1),
            TimeWindow::Hour => ChronoDuration::hours(1),
            TimeWindow::Day => ChronoDuration::days(1),
            TimeWindow::Month => ChronoDuration::days(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub kind: BudgetKind,
    pub scope: BudgetScope,
    pub scope_id: String,
    pub max_count: u64,
    pub time_window: TimeWindow,
    pub enabled: bool,
}

struct WindowState {
    window_start: DateTime<Utc>,
    current_count: u64,
}

struct TrackedBudget {
    budget: Budget,
    state: Mutex<WindowState>,
}

#[derive(Debug, Clone)]
pub struct BudgetRequest {
    pub kind: BudgetKind,
    pub scope_id: String,
    pub count: u64,
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
}

impl BudgetRequest {
    pub fn new(kind: BudgetKind, scope_id: impl Into<String>) -> Self {
        Self { kind, scope_id: scope_id.into(), count: 1, organization_id: None, user_id: None }
    }
}

#[derive(Debug, Clone)]
pub struct BudgetDecision {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_time: DateTime<Utc>,
    pub violations: Vec<String>,
}

/// The accountant holds every configured budget behind its own lock; a
/// `check`/`record` call evaluates every budget whose kind+scope applies
/// to the request and ANDs their decisions.
#[derive(Clone)]
pub struct BudgetAccountant {
    budgets: Arc<Mutex<Vec<Arc<TrackedBudget>>>>,
}

impl BudgetAccountant {
    pub fn new() -> Self {
        Self { budgets: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn add(&self, budget: Budget) {
        let mut guard = self.budgets.lock().expect("budget registry lock poisoned");
        guard.push(Arc::new(TrackedBudget {
            state: Mutex::new(WindowState { window_start: Utc::now(), current_count: 0 }),
            budget,
        }));
    }

    pub fn remove(&self, id: &str) {
        let mut guard = self.budgets.lock().expect("budget registry lock poisoned");
        guard.retain(|b| b.budget.id != id);
    }

    pub fn list(&self) -> Vec<Budget> {
        self.budgets
            .lock()
            .expect("budget registry lock poisoned")
            .iter()
            .map(|b| b.budget.clone())
            .collect()
    }

    fn applicable(&self, request: &BudgetRequest) -> Vec<Arc<TrackedBudget>> {
        self.budgets
            .lock()
            .expect("budget registry lock poisoned")
            .iter()
            .filter(|b| b.budget.enabled && b.budget.kind == request.kind)
            .filter(|b| match b.budget.scope {
                BudgetScope::Global => true,
                BudgetScope::Organization => {
                    request.organization_id.as_deref() == Some(b.budget.scope_id.as_str())
                }
                BudgetScope::User => request.user_id.as_deref() == Some(b.budget.scope_id.as_str()),
            })
            .cloned()
            .collect()
    }

    /// Advances `state`'s window if it has expired, relative to `now`.
    fn roll_window(state: &mut WindowState, window: TimeWindow, now: DateTime<Utc>) {
        if now >= state.window_start + window.duration() {
            state.window_start = now;
            state.current_count = 0;
        }
    }

    /// Evaluates every applicable budget without mutating any counter.
    pub fn check(&self, request: &BudgetRequest) -> BudgetDecision {
        let now = Utc::now();
        let applicable = self.applicable(request);
        let mut allowed = true;
        let mut min_remaining = i64::MAX;
        let mut reset_time = now;
        let mut violations = Vec::new();

        if applicable.is_empty() {
            return BudgetDecision { allowed: true, remaining: i64::MAX, reset_time: now, violations };
        }

        for tracked in &applicable {
            let mut state = tracked.state.lock().expect("budget state lock poisoned");
            Self::roll_window(&mut state, tracked.budget.time_window, now);
            let would_be = state.current_count + request.count;
            let remaining = tracked.budget.max_count as i64 - would_be as i64;
            let this_reset = state.window_start + tracked.budget.time_window.duration();
            if would_be > tracked.budget.max_count {
                allowed = false;
                violations.push(format!("budget '{}' exceeded", tracked.budget.name));
            }
            min_remaining = min_remaining.min(remaining);
            if this_reset < reset_time || reset_time == now {
                reset_time = this_reset;
            }
        }

        BudgetDecision { allowed, remaining: min_remaining.max(0), reset_time, violations }
    }

    /// Atomically mutates every applicable budget's counter. No counter is
    /// incremented for a rejected request (the caller must `check` first
    /// and only `record` once admission is confirmed, see §4.5's
    /// determinism note).
    pub fn record(&self, request: &BudgetRequest) {
        let now = Utc::now();
        for tracked in self.applicable(request) {
            let mut state = tracked.state.lock().expect("budget state lock poisoned");
            Self::roll_window(&mut state, tracked.budget.time_window, now);
            state.current_count += request.count;
        }
    }

    /// Composes `check` then `record` as a single critical section, giving
    /// strict admission control for callers that need it (e.g. the HTTP
    /// rate-limit surface in §4.8).
    pub fn check_and_record(&self, request: &BudgetRequest) -> BudgetDecision {
        let now = Utc::now();
        let applicable = self.applicable(request);
        let mut allowed = true;
        let mut min_remaining = i64::MAX;
        let mut reset_time = now;
        let mut violations = Vec::new();

        let mut locks: Vec<_> = applicable
            .iter()
            .map(|t| t.state.lock().expect("budget state lock poisoned"))
            .collect();

        for (tracked, state) in applicable.iter().zip(locks.iter_mut()) {
            Self::roll_window(state, tracked.budget.time_window, now);
            let would_be = state.current_count + request.count;
            if would_be > tracked.budget.max_count {
                allowed = false;
                violations.push(format!("budget '{}' exceeded", tracked.budget.name));
            }
        }

        if allowed {
            for (tracked, state) in applicable.iter().zip(locks.iter_mut()) {
                state.current_count += request.count;
                let remaining = tracked.budget.max_count as i64 - state.current_count as i64;
                min_remaining = min_remaining.min(remaining);
                let this_reset = state.window_start + tracked.budget.time_window.duration();
                if this_reset < reset_time || reset_time == now {
                    reset_time = this_reset;
                }
            }
        }

        if applicable.is_empty() {
            return BudgetDecision { allowed: true, remaining: i64::MAX, reset_time: now, violations };
        }

        BudgetDecision { allowed, remaining: min_remaining.max(0).min(i64::MAX), reset_time, violations }
    }
}

impl Default for BudgetAccountant {
    fn default() -> Self {
        Self::new()
    }
}
