//! 16.16 Fixed-Point Arithmetic
//!
//! This module provides deterministic fixed-point math for the simulation.
//! All operations use integer arithmetic only - no floats in the tic loop.
//!
//! ## Format: 16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: 16.16 (32-bit signed integer)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ───┘└──── 16 bits ───┘                   │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 ≈ 0.000015 map units                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Arithmetic wraps and truncates exactly as 32-bit two's complement.
//! Division saturates to the signed extremes instead of trapping when the
//! quotient cannot fit; simulation logic depends on that behavior in some
//! code paths, so it must be preserved bit-exact.

use std::fmt;

/// 16.16 fixed-point number stored as i32.
/// 16 bits integer, 16 bits fractional.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FRACBITS: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FRACUNIT: Fixed = 1 << FRACBITS;

/// 0.5 in fixed-point (32768)
pub const FRACHALF: Fixed = FRACUNIT >> 1;

// =============================================================================
// CORE OPERATIONS (All deterministic, wrapping semantics)
// =============================================================================

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile-time or initialization. NEVER in the tic loop.
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FRACUNIT as f64)) as Fixed
}

/// Convert an integer to fixed-point.
#[inline]
pub const fn from_int(i: i32) -> Fixed {
    i << FRACBITS
}

/// Convert fixed-point to float for display/diagnostics.
///
/// # Warning
/// Only use for output. NEVER use the result in simulation logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FRACUNIT as f32
}

/// Multiply two fixed-point numbers.
///
/// Widens to i64 internally, shifts back, truncates. There is no overflow
/// check: results outside the 32-bit range wrap per two's-complement.
///
/// # Determinism
/// - Truncates toward negative infinity (arithmetic shift)
/// - Wrapping on the final narrowing
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FRACBITS) as Fixed
}

/// Divide two fixed-point numbers, saturating on out-of-range quotients.
///
/// If the dividend shifted right by 14 bits exceeds the divisor in
/// magnitude, the true quotient cannot be represented; the result saturates
/// to the signed extreme matching `sign(a) ^ sign(b)` instead of faulting.
/// Otherwise delegates to [`fixed_div2`].
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if (fixed_abs(a) >> 14) >= fixed_abs(b) {
        return if (a ^ b) < 0 { i32::MIN } else { i32::MAX };
    }
    fixed_div2(a, b)
}

/// Unguarded fixed-point division.
///
/// Computes `(a << 16) / b` in 64-bit arithmetic, truncating toward zero.
///
/// # Panics
/// Panics if the quotient overflows 32 bits (including division by zero).
/// Unreachable through [`fixed_div`], whose saturation guard filters every
/// such input; a panic here means an upstream numeric-range violation.
#[inline]
pub fn fixed_div2(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        panic!("fixed_div2: division by zero");
    }
    let wide = ((a as i64) << FRACBITS) / (b as i64);
    if wide != wide as i32 as i64 {
        panic!("fixed_div2: quotient overflow ({} / {})", a, b);
    }
    wide as Fixed
}

/// Absolute value of a fixed-point number.
///
/// `i32::MIN` wraps to itself, matching two's-complement `abs` on the
/// hardware this format models.
#[inline]
pub fn fixed_abs(x: Fixed) -> Fixed {
    if x < 0 {
        x.wrapping_neg()
    } else {
        x
    }
}

/// Format a fixed-point value for diagnostics.
pub fn display(f: Fixed) -> impl fmt::Display {
    struct D(Fixed);
    impl fmt::Display for D {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:.4}", to_float(self.0))
        }
    }
    D(f)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_constants() {
        assert_eq!(FRACUNIT, 65536);
        assert_eq!(FRACHALF, 32768);
        assert_eq!(FRACBITS, 16);
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1.0), FRACUNIT);
        assert_eq!(to_fixed(0.5), FRACHALF);
        assert_eq!(to_fixed(2.0), FRACUNIT * 2);
        assert_eq!(to_fixed(-1.0), -FRACUNIT);
        assert_eq!(from_int(3), 3 * FRACUNIT);
    }

    #[test]
    fn test_fixed_mul() {
        // 2.0 * 3.0 = 6.0
        assert_eq!(fixed_mul(to_fixed(2.0), to_fixed(3.0)), to_fixed(6.0));

        // 0.5 * 0.5 = 0.25
        assert_eq!(fixed_mul(FRACHALF, FRACHALF), to_fixed(0.25));

        // Negative: -2.0 * 3.0 = -6.0
        assert_eq!(fixed_mul(to_fixed(-2.0), to_fixed(3.0)), to_fixed(-6.0));
    }

    #[test]
    fn test_fixed_mul_wraps() {
        // 30000.0 * 30000.0 overflows 16.16; the result is the truncated
        // low 32 bits of the widened product, not an error.
        let big = from_int(30_000);
        let wide = (big as i64 * big as i64) >> FRACBITS;
        assert_eq!(fixed_mul(big, big), wide as i32);
        assert_ne!(fixed_mul(big, big) as i64, wide);
    }

    #[test]
    fn test_fixed_div() {
        assert_eq!(fixed_div(to_fixed(6.0), to_fixed(2.0)), to_fixed(3.0));
        assert_eq!(fixed_div(FRACUNIT, to_fixed(4.0)), to_fixed(0.25));
        assert_eq!(fixed_div(to_fixed(-6.0), to_fixed(2.0)), to_fixed(-3.0));
    }

    #[test]
    fn test_fixed_div_saturates() {
        // |a| >> 14 >= |b| must saturate, sign from sign(a) ^ sign(b)
        assert_eq!(fixed_div(from_int(20_000), 1), i32::MAX);
        assert_eq!(fixed_div(from_int(-20_000), 1), i32::MIN);
        assert_eq!(fixed_div(from_int(20_000), -1), i32::MIN);
        assert_eq!(fixed_div(from_int(-20_000), -1), i32::MAX);

        // Division by zero takes the saturation path, never the fault path
        assert_eq!(fixed_div(FRACUNIT, 0), i32::MAX);
        assert_eq!(fixed_div(-FRACUNIT, 0), i32::MIN);
    }

    #[test]
    fn test_fixed_div_boundary() {
        // Exactly at the guard: (|a| >> 14) == |b| saturates
        let b = 100;
        let a = b << 14;
        assert_eq!(fixed_div(a, b), i32::MAX);
        // One below the guard divides normally
        assert_eq!(fixed_div(a - (1 << 14), b), fixed_div2(a - (1 << 14), b));
    }

    #[test]
    fn test_fixed_abs() {
        assert_eq!(fixed_abs(to_fixed(-2.5)), to_fixed(2.5));
        assert_eq!(fixed_abs(to_fixed(2.5)), to_fixed(2.5));
        assert_eq!(fixed_abs(0), 0);
        // i32::MIN has no positive counterpart; it wraps to itself
        assert_eq!(fixed_abs(i32::MIN), i32::MIN);
    }

    proptest! {
        /// Saturation triggers iff `(|a| >> 14) >= |b|`.
        ///
        /// `i32::MIN` dividends are excluded: their magnitude is not
        /// representable, which is exactly the documented fatal case.
        #[test]
        fn prop_saturation_boundary(a in any::<i32>(), b in any::<i32>()) {
            prop_assume!(a != i32::MIN);
            let saturates = (fixed_abs(a) >> 14) >= fixed_abs(b);
            let result = fixed_div(a, b);
            if saturates {
                prop_assert!(result == i32::MAX || result == i32::MIN);
                let expected = if (a ^ b) < 0 { i32::MIN } else { i32::MAX };
                prop_assert_eq!(result, expected);
            } else {
                prop_assert_eq!(result, fixed_div2(a, b));
            }
        }

        /// For unsaturated divisions, `(a / b) * b` recovers `a` to within
        /// the truncation error bound: the quotient loses < 1 raw unit, which
        /// the multiply scales by `|b| / 2^16`, plus < 1 raw unit from the
        /// final truncation.
        #[test]
        fn prop_div_mul_roundtrip(a in any::<i32>(), b in any::<i32>()) {
            prop_assume!(b != 0);
            prop_assume!(a != i32::MIN);
            prop_assume!((fixed_abs(a) >> 14) < fixed_abs(b));
            let back = fixed_mul(fixed_div(a, b), b);
            let bound = (fixed_abs(b) as i64 >> FRACBITS) + 2;
            prop_assert!(((back as i64) - (a as i64)).abs() <= bound);
        }

        /// Multiplication agrees with the widened reference computation.
        #[test]
        fn prop_mul_matches_wide(a in any::<i32>(), b in any::<i32>()) {
            let wide = ((a as i64) * (b as i64)) >> FRACBITS;
            prop_assert_eq!(fixed_mul(a, b), wide as i32);
        }
    }
}
