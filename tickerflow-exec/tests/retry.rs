use std::time::Duration;

use tickerflow_exec::{decide_retry, DeadLetterReason, ErrorKind, RetryConfig, RetryDecision};

fn cfg(max_retries: u32, immediate_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        immediate_retries,
        base_delay: Duration::from_millis(100),
        factor: 2.0,
        max_delay: Duration::from_millis(1_000),
        jitter: false,
    }
}

#[test]
fn permanent_dead_letters_without_spending_budget() {
    let d = decide_retry(&cfg(3, 1), ErrorKind::Permanent, 0, || 0);
    assert_eq!(
        d,
        RetryDecision::DeadLetter { reason: DeadLetterReason::Permanent }
    );
}

#[test]
fn immediate_retries_come_first() {
    let c = cfg(5, 2);
    assert_eq!(decide_retry(&c, ErrorKind::Transient, 0, || 0), RetryDecision::RetryNow);
    assert_eq!(decide_retry(&c, ErrorKind::Timeout, 1, || 0), RetryDecision::RetryNow);
    assert!(matches!(
        decide_retry(&c, ErrorKind::Transient, 2, || 0),
        RetryDecision::RetryLater { .. }
    ));
}

#[test]
fn backoff_grows_and_is_capped() {
    let c = cfg(10, 0);
    let delays: Vec<_> = (0..6)
        .map(|n| match decide_retry(&c, ErrorKind::Transient, n, || 0) {
            RetryDecision::RetryLater { delay } => delay.as_millis(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
}

#[test]
fn exhausted_budget_dead_letters() {
    let d = decide_retry(&cfg(3, 1), ErrorKind::Transient, 3, || 0);
    assert_eq!(
        d,
        RetryDecision::DeadLetter { reason: DeadLetterReason::RetriesExhausted }
    );
}

#[test]
fn zero_retries_dead_letters_transient_immediately() {
    let d = decide_retry(&cfg(0, 1), ErrorKind::Timeout, 0, || 0);
    assert!(matches!(d, RetryDecision::DeadLetter { .. }));
}

#[test]
fn full_jitter_stays_within_raw_delay() {
    let mut c = cfg(10, 0);
    c.jitter = true;
    for seed in [0u64, 7, 99, u64::MAX] {
        match decide_retry(&c, ErrorKind::Transient, 1, || seed) {
            RetryDecision::RetryLater { delay } => assert!(delay <= Duration::from_millis(200)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
