/// Asserts that two floating point values are approximately equal
///
/// # Arguments
/// * `a` - First value
/// * `b` - Second value
/// * `epsilon` - Maximum allowed difference
#[cfg(test)]
pub fn assert_close(a: f64, b: f64, epsilon: f64) {
    assert!((a - b).abs() <= epsilon, "{a} and {b} differ by more than {epsilon}");
}

/// Asserts that two per-group rate lists have the same length and
/// approximately equal values
#[cfg(test)]
pub fn assert_rates_close(a: &[f64], b: &[f64], epsilon: f64) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_close(*x, *y, epsilon);
    }
}
