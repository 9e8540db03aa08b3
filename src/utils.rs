//! Utility functions for pixel geometry and numeric conversions.

pub mod safe_cast;

/// Euclidean distance between two pixel points
#[must_use]
pub fn euclidean_distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = f64::from(a.0) - f64::from(b.0);
    let dy = f64::from(a.1) - f64::from(b.1);
    dx.hypot(dy)
}
