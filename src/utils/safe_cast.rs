//! Saturating float-to-integer conversions for pixel and angle values

/// Clamp and convert f32 to i32 for pixel coordinates
///
/// Non-finite input maps to `min`.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Acceptable for clamping bounds
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f32_to_i32_clamp(value: f32, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.clamp(min as f32, max as f32);

    // f32 cannot represent every i32, re-clamp after the cast
    let result = clamped as i32;
    result.clamp(min, max)
}

/// Clamp and convert f64 to i32, truncating toward zero
///
/// Non-finite input maps to `min`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn f64_to_i32_clamp(value: f64, min: i32, max: i32) -> i32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    value.clamp(f64::from(min), f64::from(max)).trunc() as i32
}

/// Round an f64 to the nearest i32 (half away from zero), saturating at the given bounds
#[must_use]
pub fn f64_round_to_i32(value: f64, min: i32, max: i32) -> i32 {
    f64_to_i32_clamp(value.round(), min, max)
}

/// Scale a normalized [0, 1] coordinate to pixels along an axis of `extent` pixels
///
/// Coordinates slightly outside the frame are kept, bounded to one extent beyond each edge.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Frame extents are far below f32 precision limits
pub fn normalized_to_pixels(value: f32, extent: i32) -> i32 {
    f32_to_i32_clamp(value * extent as f32, -extent, extent.saturating_mul(2))
}
