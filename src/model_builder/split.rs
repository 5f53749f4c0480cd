//! Ordered train/test split.
//!
//! The first `floor(n * train_fraction)` rows train, the rest are held out.
//! Rows are never shuffled or stratified, so repeated runs on the same data give
//! the same split. Time-ordered or grouped data is not protected against
//! leakage or class imbalance across the boundary.

/// Number of leading rows assigned to the training segment.
pub fn train_len(n: usize, train_fraction: f64) -> usize {
    let fraction = train_fraction.clamp(0.0, 1.0);
    ((n as f64 * fraction).floor() as usize).min(n)
}

/// Splits `rows` into `(train, test)`, preserving order.
pub fn split<T>(rows: &[T], train_fraction: f64) -> (&[T], &[T]) {
    rows.split_at(train_len(rows.len(), train_fraction))
}
