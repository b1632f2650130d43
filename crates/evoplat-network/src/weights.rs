//! Weight-level operators shared by every layer of a [`Network`](crate::Network).
//!
//! # Magnitude Bounds
//!
//! Every weight is either exactly `0.0` or has a magnitude in
//! [`W_MIN`]`..=`[`W_MAX`]. Mutation restores this after each perturbation:
//! magnitudes above `W_MAX` are clamped (sign preserved) and magnitudes below
//! `W_MIN` snap to zero. Over many generations the snapping prunes weak
//! connections.
//!
//! # Draw Order
//!
//! [`mutate`] consumes exactly two draws per weight (a uniform coin and a
//! standard normal sample) whether or not the weight is perturbed, so the
//! outcome for one entry never depends on the outcome for another.

use rand::Rng;
use rand_distr::StandardNormal;

/// Smallest non-zero weight magnitude.
pub const W_MIN: f64 = 0.01;
/// Largest weight magnitude.
pub const W_MAX: f64 = 2.00;

/// Pulls `w` back into the allowed magnitude range.
///
/// # Examples
///
/// ```
/// use evoplat_network::weights::{self, W_MAX};
///
/// assert_eq!(weights::clamp_magnitude(3.5), W_MAX);
/// assert_eq!(weights::clamp_magnitude(-3.5), -W_MAX);
/// assert_eq!(weights::clamp_magnitude(0.005), 0.0);
/// assert_eq!(weights::clamp_magnitude(-0.5), -0.5);
/// ```
#[must_use]
pub fn clamp_magnitude(w: f64) -> f64 {
    let magnitude = w.abs();
    if magnitude > W_MAX {
        W_MAX.copysign(w)
    } else if magnitude < W_MIN {
        0.0
    } else {
        w
    }
}

/// Returns `true` if `w` is zero or its magnitude lies in `[W_MIN, W_MAX]`.
#[must_use]
pub fn is_within_bounds(w: f64) -> bool {
    w == 0.0 || (W_MIN..=W_MAX).contains(&w.abs())
}

/// Applies Gaussian mutation in place.
///
/// For each weight, with probability `probability`:
///
/// 1. Add a sample from `N(0, deviation²)`
/// 2. Clamp the result with [`clamp_magnitude`]
///
/// Weights that are not selected are left untouched.
pub fn mutate<'a, I, R>(weights: I, probability: f64, deviation: f64, rng: &mut R)
where
    I: IntoIterator<Item = &'a mut f64>,
    R: Rng + ?Sized,
{
    for w in weights {
        let coin: f64 = rng.random();
        let noise: f64 = rng.sample(StandardNormal);
        if coin < probability {
            *w = clamp_magnitude(*w + noise * deviation);
        }
    }
}
