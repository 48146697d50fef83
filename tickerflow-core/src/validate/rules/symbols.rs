use std::collections::HashSet;

use crate::validate::validator::{Validator, SYMBOL_RE};

pub(crate) fn validate_symbols(v: &mut Validator, symbols: &[String], path: &str) {
    if symbols.is_empty() {
        v.push(path, "must have at least one entry");
    }

    let mut seen = HashSet::<&str>::new();
    for (idx, symbol) in symbols.iter().enumerate() {
        if !SYMBOL_RE.is_match(symbol) {
            v.push(
                format!("{path}[{idx}]"),
                format!("'{symbol}' is not a valid ticker (uppercase A-Z 0-9 . - =, optional leading ^, at most 17 chars)"),
            );
        }
        if !seen.insert(symbol.as_str()) {
            v.push(format!("{path}[{idx}]"), format!("'{symbol}' is listed more than once"));
        }
    }
}
