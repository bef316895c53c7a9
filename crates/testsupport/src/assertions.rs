//! Assertion helpers shared across integration tests.

use types::Value;

/// Assert a sequence is monotone non-decreasing.
pub fn assert_non_decreasing(values: &[i64]) {
    for window in values.windows(2) {
        assert!(
            window[0] <= window[1],
            "sequence decreases: {} then {}",
            window[0],
            window[1]
        );
    }
}

/// Assert a sequence is monotone non-increasing.
pub fn assert_non_increasing(values: &[i64]) {
    for window in values.windows(2) {
        assert!(
            window[0] >= window[1],
            "sequence increases: {} then {}",
            window[0],
            window[1]
        );
    }
}

/// Unwrap an integer value or fail with context.
pub fn as_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Int(i)) => *i,
        other => panic!("expected integer value, got {other:?}"),
    }
}

/// Unwrap a float value or fail with context.
pub fn as_float(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Float(f)) => *f,
        other => panic!("expected float value, got {other:?}"),
    }
}

/// Unwrap a text value or fail with context.
pub fn as_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Text(s)) => s.clone(),
        other => panic!("expected text value, got {other:?}"),
    }
}

/// Assert two unordered collections of text values are equal as sets.
pub fn assert_same_set(mut left: Vec<String>, mut right: Vec<String>) {
    left.sort();
    right.sort();
    assert_eq!(left, right);
}
