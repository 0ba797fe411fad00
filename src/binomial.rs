//! Binomial distribution whose mass function is extended to real-valued
//! arguments through the Gamma function.
use crate::NetFloat;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

/// `Binomial(total_count, probs)`.
///
/// Neither parameter is validated: `probs` outside `(0, 1)` or `k` outside
/// `[0, total_count]` produce NaN or degenerate masses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Binomial {
    total_count: NetFloat,
    probs: NetFloat,
}

impl Binomial {
    pub const fn new(total_count: NetFloat, probs: NetFloat) -> Self {
        Self { total_count, probs }
    }

    pub fn mean(&self) -> NetFloat {
        self.total_count * self.probs
    }

    /// `ln(n choose k) = lnΓ(n + 1) - lnΓ(k + 1) - lnΓ(n - k + 1)`
    pub fn ln_binomial_coefficient(&self, k: NetFloat) -> NetFloat {
        let n = self.total_count;
        ln_gamma(n + 1.) - ln_gamma(k + 1.) - ln_gamma(n - k + 1.)
    }

    pub fn log_prob(&self, k: NetFloat) -> NetFloat {
        self.ln_binomial_coefficient(k)
            + k * self.probs.ln()
            + (self.total_count - k) * (-self.probs).ln_1p()
    }

    pub fn prob(&self, k: NetFloat) -> NetFloat {
        self.log_prob(k).exp()
    }
}

/// Evaluation-time dropout scale for a layer of `num_neurons` neurons kept
/// with probability `keep_prob`: `1 - P(X = num_neurons * keep_prob)`.
pub fn binomial_scale(num_neurons: usize, keep_prob: NetFloat) -> NetFloat {
    let dist = Binomial::new(num_neurons as NetFloat, keep_prob);
    1. - dist.prob(dist.mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_integer_mass() {
        let dist = Binomial::new(10., 0.5);
        assert_relative_eq!(dist.prob(5.), 0.246_093_75, max_relative = 1e-12);
        assert_relative_eq!(dist.prob(0.), 0.5_f64.powi(10), max_relative = 1e-12);
    }

    #[test]
    fn test_mass_at_non_integer_mean() {
        // Γ(4) / Γ(2.5)^2 / 8
        let dist = Binomial::new(3., 0.5);
        assert_abs_diff_eq!(dist.prob(dist.mean()), 0.424_413_181_578_387_6, epsilon = 1e-12);

        let dist = Binomial::new(10., 0.35);
        assert_abs_diff_eq!(dist.prob(dist.mean()), 0.257_134_849_654_134_1, epsilon = 1e-12);
    }

    #[test]
    fn test_reference_scale_4900() {
        assert_abs_diff_eq!(binomial_scale(4900, 0.5), 0.988_602_230_665_062_1, epsilon = 1e-5);
        assert_abs_diff_eq!(
            Binomial::new(4900., 0.5).prob(2450.),
            0.011_397_769_334_937_863,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_lenet_layer_scales() {
        assert_abs_diff_eq!(binomial_scale(25088, 0.7), 0.994_503_807_044_600_2, epsilon = 1e-8);
        assert_abs_diff_eq!(binomial_scale(12544, 0.6), 0.992_729_282_243_298_1, epsilon = 1e-8);
        assert_abs_diff_eq!(binomial_scale(1024, 0.5), 0.975_072_194_107_020_5, epsilon = 1e-8);
    }

    #[test]
    fn test_degenerate_probability_is_not_finite() {
        assert!(!binomial_scale(16, 0.).is_finite());
    }

    proptest! {
        #[test]
        fn test_mass_sums_to_one(n in 1usize..60, p in 0.05f64..0.95) {
            let dist = Binomial::new(n as NetFloat, p);
            let total: NetFloat = (0..=n).map(|k| dist.prob(k as NetFloat)).sum();
            prop_assert!((total - 1.).abs() < 1e-9, "total mass {}", total);
        }

        #[test]
        fn test_scale_in_unit_interval(n in 1usize..100_000, p in 0.05f64..0.95) {
            let scale = binomial_scale(n, p);
            prop_assert!(scale > 0. && scale < 1., "scale {}", scale);
        }
    }
}
