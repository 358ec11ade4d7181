use crate::error::{ManifoldError, Result};
use crate::manifold::graph::{AFFINITY_FLOOR, AffinityMatrix};
use crate::manifold::init::Initialisation;
use crate::manifold::kernel::{squared_euclidean, student_t};
use crate::manifold::progress::{CancelToken, NoProgress, ProgressReporter};
use crate::{Matrix, validate_input};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Hyperparameters of a t-SNE run.
///
/// `cost_every` sets how often the KL divergence is evaluated; the
/// convergence check compares consecutive evaluations once the run is
/// past `warmup_iter`.
#[derive(Clone, Debug, PartialEq)]
pub struct TsneParams {
    pub perplexity: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub momentum: f64,
    pub tolerance: f64,
    pub cost_every: usize,
    pub warmup_iter: usize,
    pub init_std: f64,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            max_iter: 1000,
            learning_rate: 200.0,
            momentum: 0.8,
            tolerance: 1e-4,
            cost_every: 50,
            warmup_iter: 100,
            init_std: 1e-4,
        }
    }
}

impl TsneParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn perplexity(mut self, perplexity: f64) -> Self {
        self.perplexity = perplexity;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn cost_every(mut self, cost_every: usize) -> Self {
        self.cost_every = cost_every;
        self
    }

    pub fn warmup_iter(mut self, warmup_iter: usize) -> Self {
        self.warmup_iter = warmup_iter;
        self
    }

    pub fn init_std(mut self, init_std: f64) -> Self {
        self.init_std = init_std;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.perplexity > 0.0 && self.perplexity.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "perplexity must be positive and finite, got {}",
                self.perplexity
            )));
        }
        if self.max_iter == 0 {
            return Err(ManifoldError::InvalidParameter(
                "max_iter must be greater than 0".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(ManifoldError::InvalidParameter(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        if !(self.tolerance >= 0.0) {
            return Err(ManifoldError::InvalidParameter(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        if self.cost_every == 0 {
            return Err(ManifoldError::InvalidParameter(
                "cost_every must be greater than 0".to_string(),
            ));
        }
        if !(self.init_std > 0.0 && self.init_std.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "init_std must be positive and finite, got {}",
                self.init_std
            )));
        }
        Ok(())
    }
}

/// Result of [`optimise`].
#[derive(Clone, Debug)]
pub(crate) struct TsneOutcome {
    pub embedding: Matrix,
    pub kl_divergence: f64,
    pub n_iter: usize,
}

/// t-distributed Stochastic Neighbour Embedding with exact O(n²) gradients.
#[derive(Clone, Debug)]
pub struct TSNE {
    pub embedding: Option<Matrix>,
    pub kl_divergence: Option<f64>,
    pub n_iter: Option<usize>,
    n_components: usize,
    params: TsneParams,
    init: Initialisation,
    random_state: Option<u64>,
    cancel: Option<CancelToken>,
}

impl TSNE {
    pub fn new(n_components: usize) -> Self {
        Self {
            embedding: None,
            kl_divergence: None,
            n_iter: None,
            n_components,
            params: TsneParams::default(),
            init: Initialisation::Random,
            random_state: None,
            cancel: None,
        }
    }

    pub fn params(mut self, params: TsneParams) -> Self {
        self.params = params;
        self
    }

    pub fn perplexity(mut self, perplexity: f64) -> Self {
        self.params.perplexity = perplexity;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.params.max_iter = max_iter;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.params.learning_rate = learning_rate;
        self
    }

    pub fn momentum(mut self, momentum: f64) -> Self {
        self.params.momentum = momentum;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.params.tolerance = tolerance;
        self
    }

    pub fn init(mut self, init: Initialisation) -> Self {
        self.init = init;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn get_params(&self) -> &TsneParams {
        &self.params
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        self.fit_transform(x).map(|_| ())
    }

    pub fn fit_transform(&mut self, x: &Matrix) -> Result<Matrix> {
        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.fit_transform_with(x, &mut rng, &mut NoProgress)
    }

    /// Fits with an explicit random source and progress hook. The hook is
    /// called at every KL divergence checkpoint.
    pub fn fit_transform_with<R, P>(
        &mut self,
        x: &Matrix,
        rng: &mut R,
        progress: &mut P,
    ) -> Result<Matrix>
    where
        R: Rng + ?Sized,
        P: ProgressReporter + ?Sized,
    {
        validate_input(x)?;
        if self.n_components == 0 {
            return Err(ManifoldError::InvalidParameter(
                "n_components must be greater than 0".to_string(),
            ));
        }
        self.params.validate()?;

        let n_samples = x.nrows();
        if n_samples < 2 {
            return Err(ManifoldError::InsufficientSamples {
                min: 2,
                actual: n_samples,
            });
        }

        let perplexity = self.params.perplexity;
        warn_if_unreachable(perplexity, n_samples);
        let start = Instant::now();
        info!(
            n_samples,
            n_features = x.ncols(),
            n_components = self.n_components,
            perplexity,
            "fitting t-SNE"
        );

        let affinities = AffinityMatrix::from_points(x, perplexity);
        let initial = self
            .init
            .embed(x, self.n_components, self.params.init_std, rng)?;

        let outcome = optimise(
            affinities.values(),
            initial,
            &self.params,
            progress,
            self.cancel.as_ref(),
        )?;

        info!(
            n_iter = outcome.n_iter,
            kl_divergence = outcome.kl_divergence,
            elapsed = ?start.elapsed(),
            "t-SNE finished"
        );

        self.kl_divergence = Some(outcome.kl_divergence);
        self.n_iter = Some(outcome.n_iter);
        self.embedding = Some(outcome.embedding.clone());

        Ok(outcome.embedding)
    }
}

impl Default for TSNE {
    fn default() -> Self {
        Self::new(2)
    }
}

/// The row entropy is at most ln(n - 1), so larger perplexities only reach
/// the calibration cap. The value is still used as given.
fn perplexity_is_reachable(perplexity: f64, n_samples: usize) -> bool {
    perplexity < (n_samples - 1) as f64
}

fn warn_if_unreachable(perplexity: f64, n_samples: usize) {
    if !perplexity_is_reachable(perplexity, n_samples) {
        warn!(
            perplexity,
            n_samples, "perplexity not reachable with this many samples, affinities will be near uniform"
        );
    }
}

/// Runs momentum gradient descent on the embedding against fixed joint
/// affinities `p`.
pub(crate) fn optimise<P>(
    p: &Matrix,
    mut y: Matrix,
    params: &TsneParams,
    progress: &mut P,
    cancel: Option<&CancelToken>,
) -> Result<TsneOutcome>
where
    P: ProgressReporter + ?Sized,
{
    let (n_samples, n_components) = y.dim();
    if p.nrows() != n_samples || p.ncols() != n_samples {
        return Err(ManifoldError::DimensionMismatch {
            expected: n_samples,
            actual: p.nrows(),
        });
    }

    let mut velocity = Matrix::zeros((n_samples, n_components));
    let mut last_cost: Option<f64> = None;
    let mut n_iter = 0;

    for iteration in 0..params.max_iter {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(ManifoldError::Cancelled { iteration });
        }

        let (num, q) = student_t_affinities(&y);

        if iteration % params.cost_every == 0 {
            let cost = kl_divergence(p, &q);
            debug!(iteration, cost, "t-SNE checkpoint");
            progress.report(iteration, cost);

            if iteration > params.warmup_iter {
                if let Some(previous) = last_cost {
                    if (previous - cost).abs() < params.tolerance {
                        debug!(iteration, cost, "t-SNE converged");
                        break;
                    }
                }
            }
            last_cost = Some(cost);
        }

        let grad = gradient(&y, p, &q, &num);

        velocity *= params.momentum;
        velocity.scaled_add(-params.learning_rate, &grad);
        y += &velocity;

        n_iter = iteration + 1;
    }

    let (_, q) = student_t_affinities(&y);
    let kl_divergence = kl_divergence(p, &q);

    Ok(TsneOutcome {
        embedding: y,
        kl_divergence,
        n_iter,
    })
}

/// Student-t numerators `1 / (1 + d²)` and the normalised, floored Q matrix.
/// Both have zero diagonals.
pub(crate) fn student_t_affinities(y: &Matrix) -> (Matrix, Matrix) {
    let n = y.nrows();
    let mut num = Matrix::zeros((n, n));

    for i in 0..n {
        for j in (i + 1)..n {
            let value = student_t(squared_euclidean(&y.row(i), &y.row(j)));
            num[[i, j]] = value;
            num[[j, i]] = value;
        }
    }

    let sum = num.sum();
    let mut q = Matrix::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            if i != j {
                q[[i, j]] = if sum > 0.0 && sum.is_finite() {
                    (num[[i, j]] / sum).max(AFFINITY_FLOOR)
                } else {
                    AFFINITY_FLOOR
                };
            }
        }
    }

    (num, q)
}

/// KL(P || Q), summed only where both probabilities are above the floor.
pub(crate) fn kl_divergence(p: &Matrix, q: &Matrix) -> f64 {
    p.iter()
        .zip(q.iter())
        .filter(|&(&p_ij, &q_ij)| p_ij > AFFINITY_FLOOR && q_ij > AFFINITY_FLOOR)
        .map(|(&p_ij, &q_ij)| p_ij * (p_ij / q_ij).ln())
        .sum()
}

/// Exact gradient `4 Σ_j (p_ij - q_ij) num_ij (y_i - y_j)`.
pub(crate) fn gradient(y: &Matrix, p: &Matrix, q: &Matrix, num: &Matrix) -> Matrix {
    let (n, dim) = y.dim();
    let mut grad = Matrix::zeros((n, dim));

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            // Coincident points give a zero difference and contribute nothing
            let factor = 4.0 * (p[[i, j]] - q[[i, j]]) * num[[i, j]];
            for d in 0..dim {
                grad[[i, d]] += factor * (y[[i, d]] - y[[j, d]]);
            }
        }
    }

    grad
}
