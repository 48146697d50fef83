use std::sync::LazyLock;

use regex::Regex;

use crate::handler::HandlerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Timeout => "timeout",
        }
    }
}

pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &HandlerError) -> ErrorKind;
}

static TRANSIENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(timed? ?out|timeout|rate[ _-]?limit(ed)?|too many requests|429|5\d\d|connection (reset|refused|closed|aborted)|temporar(y|ily) unavailable|service unavailable|try again)\b",
    )
    .expect("valid")
});

/// Honors the handler's `retryable` hint, otherwise matches well-known
/// transient failure text. Anything unrecognised is permanent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorClassifier;

impl ErrorClassifier for DefaultErrorClassifier {
    fn classify(&self, error: &HandlerError) -> ErrorKind {
        if error.is_timeout() {
            return ErrorKind::Timeout;
        }
        match error.retryable {
            Some(true) => ErrorKind::Transient,
            Some(false) => ErrorKind::Permanent,
            None if TRANSIENT_RE.is_match(&error.error_type) || TRANSIENT_RE.is_match(&error.message) => {
                ErrorKind::Transient
            }
            None => ErrorKind::Permanent,
        }
    }
}
