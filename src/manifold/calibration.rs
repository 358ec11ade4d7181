use crate::manifold::kernel::exponential_weight;
use std::f64::consts::LN_2;
use tracing::trace;

pub const PERPLEXITY_MAX_ITER: usize = 50;
pub const CONNECTIVITY_MAX_ITER: usize = 64;
pub const CALIBRATION_TOLERANCE: f64 = 1e-5;

const SIGMA_FLOOR: f64 = 1e-20;
const PERPLEXITY_SIGMA_CEILING: f64 = 1e20;
const CONNECTIVITY_SIGMA_CEILING: f64 = 1000.0;

/// Outcome of a per-point bandwidth search.
///
/// `converged` is false when the iteration cap was hit first; `sigma` is
/// then the last candidate, which is still usable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    pub sigma: f64,
    pub entropy: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Bisection bounds for one point. Lives only for the duration of a search.
struct Bisection {
    low: f64,
    high: f64,
    current: f64,
    upper_found: bool,
    ceiling: f64,
}

impl Bisection {
    /// Starts at sigma = 1 and doubles until the entropy overshoots.
    fn open_ended(ceiling: f64) -> Self {
        Self {
            low: SIGMA_FLOOR,
            high: ceiling,
            current: 1.0,
            upper_found: false,
            ceiling,
        }
    }

    fn bounded(ceiling: f64) -> Self {
        Self {
            low: SIGMA_FLOOR,
            high: ceiling,
            current: (SIGMA_FLOOR + ceiling) / 2.0,
            upper_found: true,
            ceiling,
        }
    }

    fn step(&mut self, entropy_too_high: bool) {
        if entropy_too_high {
            self.high = self.current;
            self.upper_found = true;
            self.current = (self.low + self.high) / 2.0;
        } else {
            self.low = self.current;
            self.current = if self.upper_found {
                (self.low + self.high) / 2.0
            } else {
                (self.current * 2.0).min(self.ceiling)
            };
        }
    }
}

fn search<F>(entropy_of: F, target: f64, mut state: Bisection, max_iter: usize) -> Calibration
where
    F: Fn(f64) -> f64,
{
    for iteration in 0..max_iter {
        let entropy = entropy_of(state.current);
        if (entropy - target).abs() < CALIBRATION_TOLERANCE {
            return Calibration {
                sigma: state.current,
                entropy,
                iterations: iteration + 1,
                converged: true,
            };
        }
        // Entropy grows with sigma
        state.step(entropy > target);
    }

    let entropy = entropy_of(state.current);
    trace!(
        sigma = state.current,
        entropy,
        target,
        "bandwidth search hit the iteration cap"
    );

    Calibration {
        sigma: state.current,
        entropy,
        iterations: max_iter,
        converged: false,
    }
}

/// Normalised Gaussian similarities of one point to its neighbours.
///
/// Exponents are shifted by their maximum before exponentiating, which
/// leaves the normalised values unchanged but keeps tiny bandwidths from
/// underflowing every term to zero.
pub fn gaussian_row_probabilities(distances: &[f64], sigma: f64) -> Vec<f64> {
    let exponents = gaussian_exponents(distances, sigma);
    let max = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut probabilities: Vec<f64> = exponents.iter().map(|a| (a - max).exp()).collect();
    let sum: f64 = probabilities.iter().sum();

    if sum > 0.0 && sum.is_finite() {
        for p in probabilities.iter_mut() {
            *p /= sum;
        }
    } else {
        probabilities.iter_mut().for_each(|p| *p = 0.0);
    }

    probabilities
}

/// Shannon entropy (nats) of the normalised Gaussian similarities.
pub fn gaussian_row_entropy(distances: &[f64], sigma: f64) -> f64 {
    let exponents = gaussian_exponents(distances, sigma);
    let max = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    shifted_entropy(&exponents, max)
}

fn gaussian_exponents(distances: &[f64], sigma: f64) -> Vec<f64> {
    let denom = 2.0 * sigma * sigma;
    distances.iter().map(|d| -(d * d) / denom).collect()
}

/// Entropy of exp(a_j) / sum(exp(a_j)), computed from exponents shifted by `shift`.
fn shifted_entropy(exponents: &[f64], shift: f64) -> f64 {
    if exponents.is_empty() || !shift.is_finite() {
        return 0.0;
    }

    let sum: f64 = exponents.iter().map(|a| (a - shift).exp()).sum();
    if sum <= 0.0 || !sum.is_finite() {
        return 0.0;
    }
    let log_sum = sum.ln();

    exponents
        .iter()
        .map(|a| {
            let p = (a - shift).exp() / sum;
            if p > 0.0 { -p * (a - shift - log_sum) } else { 0.0 }
        })
        .sum()
}

/// Entropy of the normalised UMAP membership strengths over the retained
/// neighbour distances.
pub fn connectivity_entropy(distances: &[f64], rho: f64, sigma: f64) -> f64 {
    // Weights are exp(-max(0, d - rho) / sigma), so their log is known exactly
    let exponents: Vec<f64> = distances
        .iter()
        .map(|&d| -(d - rho).max(0.0) / sigma)
        .collect();
    let max = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    shifted_entropy(&exponents, max)
}

/// Finds the Gaussian bandwidth whose similarity distribution has the
/// given perplexity. `distances` excludes the point itself.
pub fn calibrate_perplexity(distances: &[f64], perplexity: f64) -> Calibration {
    let target = perplexity.ln();
    search(
        |sigma| gaussian_row_entropy(distances, sigma),
        target,
        Bisection::open_ended(PERPLEXITY_SIGMA_CEILING),
        PERPLEXITY_MAX_ITER,
    )
}

/// Finds the UMAP kernel bandwidth for one point from its k retained
/// neighbour distances. The target is fixed at ln 2 regardless of k.
pub fn calibrate_connectivity(distances: &[f64], rho: f64) -> Calibration {
    calibrate_connectivity_to(distances, rho, LN_2)
}

pub fn calibrate_connectivity_to(distances: &[f64], rho: f64, target: f64) -> Calibration {
    search(
        |sigma| connectivity_entropy(distances, rho, sigma),
        target,
        Bisection::bounded(CONNECTIVITY_SIGMA_CEILING),
        CONNECTIVITY_MAX_ITER,
    )
}

/// Membership strengths of one point's retained neighbours.
pub(crate) fn connectivity_weights(distances: &[f64], rho: f64, sigma: f64) -> Vec<f64> {
    distances
        .iter()
        .map(|&d| exponential_weight(d, rho, sigma))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DISTANCES: [f64; 8] = [1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 7.0];

    #[test]
    fn test_probabilities_sum_to_one() {
        for &sigma in &[1e-10, 0.1, 1.0, 10.0, 1e10] {
            let p = gaussian_row_probabilities(&DISTANCES, sigma);
            assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert!(p.iter().all(|v| v.is_finite() && *v >= 0.0));
        }
    }

    #[test]
    fn test_tiny_sigma_concentrates_on_nearest() {
        let p = gaussian_row_probabilities(&DISTANCES, 1e-20);
        assert_relative_eq!(p[0], 1.0);
        assert_eq!(gaussian_row_entropy(&DISTANCES, 1e-20), 0.0);
    }

    #[test]
    fn test_entropy_matches_target_perplexity() {
        let perplexity = 4.0;
        let calibration = calibrate_perplexity(&DISTANCES, perplexity);

        assert!(calibration.converged);
        assert!(calibration.iterations <= PERPLEXITY_MAX_ITER);
        assert_relative_eq!(calibration.entropy, perplexity.ln(), epsilon = CALIBRATION_TOLERANCE);

        let p = gaussian_row_probabilities(&DISTANCES, calibration.sigma);
        let entropy: f64 = p.iter().filter(|&&v| v > 0.0).map(|&v| -v * v.ln()).sum();
        assert_relative_eq!(entropy, perplexity.ln(), epsilon = 1e-4);
    }

    #[test]
    fn test_perplexity_calibration_is_monotone() {
        let mut last_sigma = 0.0;
        for &perplexity in &[1.2, 1.5, 2.0, 3.0, 4.0, 5.5, 7.0] {
            let sigma = calibrate_perplexity(&DISTANCES, perplexity).sigma;
            assert!(
                sigma >= last_sigma,
                "sigma decreased from {} to {} at perplexity {}",
                last_sigma,
                sigma,
                perplexity
            );
            last_sigma = sigma;
        }
    }

    #[test]
    fn test_unreachable_target_returns_last_candidate() {
        // Equal distances give entropy ln(4) for every sigma
        let distances = [2.0; 4];
        let calibration = calibrate_perplexity(&distances, 2.0);

        assert!(!calibration.converged);
        assert_eq!(calibration.iterations, PERPLEXITY_MAX_ITER);
        assert!(calibration.sigma.is_finite() && calibration.sigma > 0.0);
    }

    #[test]
    fn test_connectivity_targets_ln2() {
        let rho = DISTANCES[0];
        let calibration = calibrate_connectivity(&DISTANCES, rho);

        assert!(calibration.converged);
        assert_relative_eq!(calibration.entropy, LN_2, epsilon = CALIBRATION_TOLERANCE);
        assert!(calibration.sigma > 0.0 && calibration.sigma <= 1000.0);

        let weights = connectivity_weights(&DISTANCES, rho, calibration.sigma);
        assert_eq!(weights[0], 1.0);
        assert!(weights.iter().all(|w| (0.0..=1.0).contains(w)));
    }

    #[test]
    fn test_connectivity_calibration_is_monotone() {
        let rho = DISTANCES[0];
        let mut last_sigma = 0.0;
        for &target in &[0.3, 0.5, LN_2, 1.0, 1.5, 1.9] {
            let sigma = calibrate_connectivity_to(&DISTANCES, rho, target).sigma;
            assert!(sigma >= last_sigma);
            last_sigma = sigma;
        }
    }

    #[test]
    fn test_single_neighbour_never_errors() {
        let calibration = calibrate_connectivity(&[0.7], 0.7);
        assert!(!calibration.converged);
        assert!(calibration.sigma.is_finite());
        assert_eq!(connectivity_entropy(&[0.7], 0.7, calibration.sigma), 0.0);
    }
}
