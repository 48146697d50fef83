use std::time::Duration;

use crate::handler::ErrorKind;
use crate::retry::config::RetryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    RetryNow,
    RetryLater { delay: Duration },
    DeadLetter { reason: DeadLetterReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    Permanent,
    RetriesExhausted,
}

impl DeadLetterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadLetterReason::Permanent => "permanent",
            DeadLetterReason::RetriesExhausted => "retries_exhausted",
        }
    }
}

/// Decide what to do after a failed handler invocation.
///
/// - `retry_count`: retries already spent by this unit (0 after the first failure).
/// - `rand_u64`: RNG for full jitter.
pub fn decide_retry(
    cfg: &RetryConfig,
    kind: ErrorKind,
    retry_count: u32,
    rand_u64: impl Fn() -> u64,
) -> RetryDecision {
    if kind == ErrorKind::Permanent {
        return RetryDecision::DeadLetter {
            reason: DeadLetterReason::Permanent,
        };
    }

    if retry_count >= cfg.max_retries {
        return RetryDecision::DeadLetter {
            reason: DeadLetterReason::RetriesExhausted,
        };
    }

    if retry_count < cfg.immediate_retries {
        return RetryDecision::RetryNow;
    }

    // base * factor^n where n counts the backed-off retries only.
    let exp = retry_count.saturating_sub(cfg.immediate_retries).min(i32::MAX as u32) as i32;
    let raw = (cfg.base_delay.as_millis() as f64) * cfg.factor.powi(exp);
    let raw_ms = raw.min(cfg.max_delay.as_millis() as f64).max(0.0) as u64;

    let delay_ms = if !cfg.jitter || raw_ms == 0 {
        raw_ms
    } else {
        rand_u64() % (raw_ms + 1)
    };
    RetryDecision::RetryLater {
        delay: Duration::from_millis(delay_ms),
    }
}
