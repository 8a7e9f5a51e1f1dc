//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Get the signed angular distance between two angles in the range of [0, 2pi].
///
/// This function will return the shortest signed distance between a and b accounting for wrapping
/// between 0 and 2pi.
pub fn get_ang_dist_2pi<T>(a: T, b: T) -> T
where
    T: Float,
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let c = rem_euclid(a - b, tau_t);
    let d = rem_euclid(b - a, tau_t);

    if c < d {
        -c
    } else {
        d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
/// Use [`wrap`] where the half-open range must hold exactly.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap a value into `[0, range)`.
///
/// Unlike [`rem_euclid`] the round-off case which would produce `range` is
/// folded back onto zero.
pub fn wrap<T>(value: T, range: T) -> T
where
    T: Float,
{
    let r = rem_euclid(value, range);
    if r >= range.abs() {
        T::zero()
    } else {
        r
    }
}

/// Wrap an angle in radians into `[0, 2pi)`.
pub fn wrap_2pi<T>(value: T) -> T
where
    T: Float,
{
    wrap(value, T::from(std::f64::consts::TAU).unwrap())
}

/// Wrap an angle in degrees into `[0, 360)`.
pub fn wrap_360<T>(value: T) -> T
where
    T: Float,
{
    wrap(value, T::from(360.0).unwrap())
}

/// Map a value in the range [-pi, pi] to [0, 2pi]
pub fn map_pi_to_2pi<T>(value: T) -> T
where
    T: Float,
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    if value < T::zero() {
        tau_t + value
    } else {
        value
    }
}
