use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::models::domain::item::Item;

/// Which provider call an attempt ended in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AttemptPhase {
    Summary,
    Full,
}

/// Classification of a provider error message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Copy)]
pub struct RateLimitInfo {
    pub is_rate_limit: bool,
    pub wait_ms: u64,
    pub is_daily: bool,
}

impl RateLimitInfo {
    pub fn not_rate_limited() -> Self {
        Self {
            is_rate_limit: false,
            wait_ms: 0,
            is_daily: false,
        }
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// The stored item a candidate collided with.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub id: String,
    pub summary: String,
    pub similarity_score: f64,
    pub method: SimilarityMethod,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMethod {
    Lexical,
    Embedding,
}

impl fmt::Display for SimilarityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityMethod::Lexical => write!(f, "lexical"),
            SimilarityMethod::Embedding => write!(f, "embedding"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome {
    Success(Box<Item>),
    Duplicate(DuplicateMatch),
    RateLimited(RateLimitInfo),
    Invalid(String),
    ProviderError(String),
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::Duplicate(_) => "duplicate",
            AttemptOutcome::RateLimited(_) => "rate-limited",
            AttemptOutcome::Invalid(_) => "invalid",
            AttemptOutcome::ProviderError(_) => "provider-error",
        }
    }
}

/// One pass through the two-phase generator. Lives for a single scheduler iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationAttempt {
    pub attempt_number: u32,
    pub phase: AttemptPhase,
    pub outcome: AttemptOutcome,
}

impl GenerationAttempt {
    pub fn new(attempt_number: u32, phase: AttemptPhase, outcome: AttemptOutcome) -> Self {
        Self {
            attempt_number,
            phase,
            outcome,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Copy)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    DailyLimit,
    BudgetExhausted,
}

/// Summary of a generation run, returned to whoever triggered it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunResult {
    pub target: u64,
    pub initial_count: u64,
    pub final_count: u64,
    pub generated: u64,
    pub duplicates: u64,
    pub attempts: u32,
    pub errors: Vec<String>,
    pub rate_limit_waits_ms: Vec<u64>,
    pub daily_limit_hit: bool,
    pub stop_reason: StopReason,
    pub elapsed_ms: u64,
}

impl RunResult {
    pub fn new(target: u64, initial_count: u64) -> Self {
        Self {
            target,
            initial_count,
            final_count: initial_count,
            generated: 0,
            duplicates: 0,
            attempts: 0,
            errors: Vec::new(),
            rate_limit_waits_ms: Vec::new(),
            daily_limit_hit: false,
            stop_reason: StopReason::TargetReached,
            elapsed_ms: 0,
        }
    }

    pub fn needed(&self) -> u64 {
        self.target.saturating_sub(self.initial_count)
    }
}
