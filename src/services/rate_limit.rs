//! Heuristic classification of provider error messages.
//!
//! Providers report throttling as free text, so this is pattern matching over
//! whatever the message happens to say. Misclassification is tolerated; ambiguous
//! messages lean towards the short horizon so a run is not abandoned early.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{config::GenerationConfig, models::domain::generation::RateLimitInfo};

static RATE_LIMIT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b429\b|quota|\brate\b|rate[\s_-]?limit|too many requests|resource[\s_-]?exhausted",
    )
    .expect("RATE_LIMIT_MARKER is a valid regex pattern")
});

static EXPLICIT_WAIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:retry|try again|wait)(?:\s+(?:after|in|for))?\s*:?\s*(\d+(?:\.\d+)?)\s*(milliseconds?|ms|seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h)\b",
    )
    .expect("EXPLICIT_WAIT is a valid regex pattern")
});

// Google-style structured detail: "retryDelay": "37s"
static RETRY_DELAY_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?retry_?delay"?\s*[:=]\s*"?(\d+(?:\.\d+)?)(ms|s)"?"#)
        .expect("RETRY_DELAY_FIELD is a valid regex pattern")
});

static DAILY_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)daily|per[\s_-]?day|\b24\s*h(?:ours?|rs?)?\b|\brpd\b|requests per day")
        .expect("DAILY_MARKER is a valid regex pattern")
});

/// Decides whether an error message is a rate limit and how long it asks us to back off.
pub trait RateLimitClassifier: Send + Sync {
    fn classify(&self, message: &str) -> RateLimitInfo;
}

#[derive(Debug, Clone)]
pub struct HeuristicRateLimitClassifier {
    daily_threshold: Duration,
    default_wait: Duration,
    daily_wait: Duration,
}

fn unit_to_millis(amount: f64, unit: &str) -> u64 {
    let unit = unit.to_ascii_lowercase();
    let factor = if unit.starts_with("ms") || unit.starts_with("milli") {
        1.0
    } else if unit.starts_with('s') {
        1_000.0
    } else if unit.starts_with('m') {
        60_000.0
    } else {
        3_600_000.0
    };

    (amount * factor).round() as u64
}

/// Explicit back-off requested in the message, in milliseconds.
pub fn extract_wait_ms(message: &str) -> Option<u64> {
    let captures = EXPLICIT_WAIT
        .captures(message)
        .or_else(|| RETRY_DELAY_FIELD.captures(message))?;

    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str();

    Some(unit_to_millis(amount, unit))
}

impl HeuristicRateLimitClassifier {
    pub fn new(daily_threshold: Duration, default_wait: Duration, daily_wait: Duration) -> Self {
        Self {
            daily_threshold,
            default_wait,
            daily_wait,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            config.daily_limit_threshold,
            config.default_rate_limit_wait,
            config.daily_rate_limit_wait,
        )
    }
}

impl Default for HeuristicRateLimitClassifier {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

impl RateLimitClassifier for HeuristicRateLimitClassifier {
    fn classify(&self, message: &str) -> RateLimitInfo {
        if !RATE_LIMIT_MARKER.is_match(message) {
            return RateLimitInfo::not_rate_limited();
        }

        let wait_ms = match extract_wait_ms(message) {
            Some(ms) => ms,
            None if DAILY_MARKER.is_match(message) => self.daily_wait.as_millis() as u64,
            None => self.default_wait.as_millis() as u64,
        };

        RateLimitInfo {
            is_rate_limit: true,
            wait_ms,
            is_daily: wait_ms > self.daily_threshold.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> HeuristicRateLimitClassifier {
        HeuristicRateLimitClassifier::default()
    }

    #[test]
    fn non_rate_limit_message_is_ignored() {
        let info = classifier().classify("invalid api key provided");
        assert_eq!(info, RateLimitInfo::not_rate_limited());
    }

    #[test]
    fn generate_is_not_mistaken_for_rate() {
        let info = classifier().classify("failed to generate accurate output");
        assert!(!info.is_rate_limit);
    }

    #[test]
    fn retry_after_seconds_is_short_horizon() {
        let info = classifier().classify("429 Too Many Requests: retry after 42s");
        assert!(info.is_rate_limit);
        assert_eq!(info.wait_ms, 42_000);
        assert!(!info.is_daily);
    }

    #[test]
    fn fractional_seconds_are_converted() {
        let info = classifier().classify(
            "Rate limit reached for gpt-4o-mini on tokens per min. Please try again in 30.8s.",
        );
        assert_eq!(info.wait_ms, 30_800);
        assert!(!info.is_daily);
    }

    #[test]
    fn minutes_are_converted() {
        let info = classifier().classify("quota exceeded, please wait 2 minutes");
        assert_eq!(info.wait_ms, 120_000);
        assert!(!info.is_daily);
    }

    #[test]
    fn hours_exceed_daily_threshold() {
        let info = classifier().classify("rate limited: retry after 3 hours");
        assert_eq!(info.wait_ms, 3 * 3_600_000);
        assert!(info.is_daily);
    }

    #[test]
    fn milliseconds_are_kept() {
        let info = classifier().classify("rate limit hit, retry in 250ms");
        assert_eq!(info.wait_ms, 250);
    }

    #[test]
    fn retry_delay_field_is_parsed() {
        let info = classifier().classify(
            r#"RESOURCE_EXHAUSTED {"@type": "RetryInfo", "retryDelay": "37s"}"#,
        );
        assert!(info.is_rate_limit);
        assert_eq!(info.wait_ms, 37_000);
    }

    #[test]
    fn daily_quota_without_duration_is_long_horizon() {
        let info = classifier().classify("daily quota exceeded");
        assert!(info.is_rate_limit);
        assert!(info.is_daily);
        assert_eq!(info.wait_ms, 24 * 3_600_000);
    }

    #[test]
    fn rpd_keyword_is_long_horizon() {
        let info = classifier().classify("Rate limit reached on requests per day (RPD): Limit 200");
        assert!(info.is_daily);
    }

    #[test]
    fn explicit_short_wait_wins_over_daily_keyword() {
        let info = classifier().classify("per day quota nearly used, retry after 20s");
        assert_eq!(info.wait_ms, 20_000);
        assert!(!info.is_daily);
    }

    #[test]
    fn bare_rate_limit_uses_default_short_wait() {
        let info = classifier().classify("HTTP 429");
        assert!(info.is_rate_limit);
        assert_eq!(info.wait_ms, 60_000);
        assert!(!info.is_daily);
    }

    #[test]
    fn classification_is_deterministic() {
        let message = "Too Many Requests. try again in 5 min";
        let c = classifier();
        assert_eq!(c.classify(message), c.classify(message));
        assert_eq!(c.classify(message).wait_ms, 300_000);
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = HeuristicRateLimitClassifier::new(
            Duration::from_secs(30),
            Duration::from_secs(10),
            Duration::from_secs(3600),
        );
        assert!(!strict.classify("retry after 42s").is_rate_limit);
        assert!(strict.classify("rate limit: retry after 42s").is_daily);
    }
}
