use std::time::Duration;

use tickerflow_exec::{DefaultErrorClassifier, ErrorClassifier, ErrorKind, HandlerError};

#[test]
fn explicit_hint_wins() {
    let c = DefaultErrorClassifier;
    let mut err = HandlerError::new("http_503", "service unavailable");
    err.retryable = Some(false);
    assert_eq!(c.classify(&err), ErrorKind::Permanent);
    assert_eq!(c.classify(&HandlerError::transient("bad symbol")), ErrorKind::Transient);
}

#[test]
fn known_transient_patterns() {
    let c = DefaultErrorClassifier;
    for msg in ["rate limit exceeded", "HTTP 429", "upstream returned 503", "connection reset by peer"] {
        assert_eq!(c.classify(&HandlerError::new("provider", msg)), ErrorKind::Transient, "{msg}");
    }
    assert_eq!(
        c.classify(&HandlerError::new("provider", "symbol not found")),
        ErrorKind::Permanent
    );
}

#[test]
fn timeouts_are_their_own_kind() {
    let err = HandlerError::timeout(Duration::from_millis(50));
    assert!(err.is_timeout());
    assert_eq!(DefaultErrorClassifier.classify(&err), ErrorKind::Timeout);
}
