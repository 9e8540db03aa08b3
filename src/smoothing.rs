use crate::{
    constants::{SERVO_MAX_DEG, SERVO_MIN_DEG},
    utils::safe_cast::f64_round_to_i32,
    Error, Result,
};

/// Exponential smoothing of integer servo angles
///
/// `smoothed = round((1 - alpha) * smoothed + alpha * target)`, kept within the servo range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialSmoother {
    alpha: f64,
}

impl ExponentialSmoother {
    /// # Errors
    ///
    /// Returns `InvalidInput` unless `alpha` is in (0, 1].
    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::InvalidInput(format!("Alpha must be in (0, 1], got {alpha}")));
        }
        Ok(Self { alpha })
    }

    /// One filter step from `current` toward `target`
    #[must_use]
    pub fn step(&self, current: i32, target: i32) -> i32 {
        let blended = (1.0 - self.alpha) * f64::from(current) + self.alpha * f64::from(target);
        f64_round_to_i32(blended, SERVO_MIN_DEG, SERVO_MAX_DEG)
    }

    /// Smooth both axes at once
    #[must_use]
    pub fn step_pair(&self, current: (i32, i32), target: (i32, i32)) -> (i32, i32) {
        (self.step(current.0, target.0), self.step(current.1, target.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_step() {
        let smoother = ExponentialSmoother::new(0.3).unwrap();
        // 0.7 * 90 + 0.3 * 100 = 93
        assert_eq!(smoother.step(90, 100), 93);
        // 0.7 * 93 + 0.3 * 100 = 95.1 -> 95
        assert_eq!(smoother.step(93, 100), 95);
        // 0.7 * 90 + 0.3 * 112 = 96.6 -> 97
        assert_eq!(smoother.step(90, 112), 97);
    }

    #[test]
    fn test_alpha_bounds() {
        assert!(ExponentialSmoother::new(0.0).is_err());
        assert!(ExponentialSmoother::new(1.5).is_err());
        assert!(ExponentialSmoother::new(f64::NAN).is_err());
        assert!(ExponentialSmoother::new(1.0).is_ok());

        // alpha = 1 jumps straight to the target
        let smoother = ExponentialSmoother::new(1.0).unwrap();
        assert_eq!(smoother.step(90, 12), 12);
    }

    #[test]
    fn test_converges_monotonically() {
        let smoother = ExponentialSmoother::new(0.3).unwrap();
        let mut value = 90;
        let mut previous_gap = 90;
        for _ in 0..50 {
            value = smoother.step(value, 0);
            let gap = value.abs();
            assert!(gap <= previous_gap);
            previous_gap = gap;
        }
        // rounding stalls within one degree of the target
        assert!(value <= 1);
    }
}
