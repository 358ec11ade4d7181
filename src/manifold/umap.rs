use crate::error::{ManifoldError, Result};
use crate::manifold::graph::{EdgeList, NeighbourGraph};
use crate::manifold::init::Initialisation;
use crate::manifold::kernel::{squared_euclidean, umap_curve};
use crate::manifold::progress::{CancelToken, NoProgress, ProgressReporter};
use crate::{Matrix, validate_input};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_A: f64 = 1.929;
pub const DEFAULT_B: f64 = 0.7915;

const GRADIENT_CLIP: f64 = 4.0;
const REPULSION_OFFSET: f64 = 0.001;
const CROSS_ENTROPY_EPS: f64 = 1e-12;

const CURVE_POINTS: usize = 300;
const CURVE_MAX_ITER: usize = 200;

/// Hyperparameters of a UMAP run.
///
/// `a` and `b` shape the low-dimensional similarity curve. They are used
/// as given; call [`UmapParams::fit_curve`] to derive them from
/// `min_dist` and `spread` instead.
#[derive(Clone, Debug, PartialEq)]
pub struct UmapParams {
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    pub n_epochs: usize,
    pub learning_rate: f64,
    pub local_connectivity: usize,
    pub repulsion_strength: f64,
    pub negative_sample_rate: usize,
    pub a: f64,
    pub b: f64,
    pub init_std: f64,
    pub report_every: usize,
}

impl Default for UmapParams {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 500,
            learning_rate: 1.0,
            local_connectivity: 1,
            repulsion_strength: 1.0,
            negative_sample_rate: 5,
            a: DEFAULT_A,
            b: DEFAULT_B,
            init_std: 10.0,
            report_every: 50,
        }
    }
}

impl UmapParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = n_neighbors;
        self
    }

    pub fn min_dist(mut self, min_dist: f64) -> Self {
        self.min_dist = min_dist;
        self
    }

    pub fn spread(mut self, spread: f64) -> Self {
        self.spread = spread;
        self
    }

    pub fn n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn local_connectivity(mut self, local_connectivity: usize) -> Self {
        self.local_connectivity = local_connectivity;
        self
    }

    pub fn repulsion_strength(mut self, repulsion_strength: f64) -> Self {
        self.repulsion_strength = repulsion_strength;
        self
    }

    pub fn negative_sample_rate(mut self, negative_sample_rate: usize) -> Self {
        self.negative_sample_rate = negative_sample_rate;
        self
    }

    pub fn curve(mut self, a: f64, b: f64) -> Self {
        self.a = a;
        self.b = b;
        self
    }

    pub fn init_std(mut self, init_std: f64) -> Self {
        self.init_std = init_std;
        self
    }

    pub fn report_every(mut self, report_every: usize) -> Self {
        self.report_every = report_every;
        self
    }

    /// Replaces `a` and `b` with the least-squares fit for the current
    /// `spread` and `min_dist`.
    pub fn fit_curve(mut self) -> Self {
        let (a, b) = find_ab_params(self.spread, self.min_dist);
        self.a = a;
        self.b = b;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_neighbors == 0 {
            return Err(ManifoldError::InvalidParameter(
                "n_neighbors must be greater than 0".to_string(),
            ));
        }
        if !(self.min_dist >= 0.0 && self.min_dist.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "min_dist must be non-negative, got {}",
                self.min_dist
            )));
        }
        if !(self.spread > 0.0 && self.spread.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "spread must be positive, got {}",
                self.spread
            )));
        }
        if self.min_dist > self.spread {
            return Err(ManifoldError::InvalidParameter(format!(
                "min_dist ({}) must not exceed spread ({})",
                self.min_dist, self.spread
            )));
        }
        if self.n_epochs == 0 {
            return Err(ManifoldError::InvalidParameter(
                "n_epochs must be greater than 0".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.local_connectivity == 0 {
            return Err(ManifoldError::InvalidParameter(
                "local_connectivity must be at least 1".to_string(),
            ));
        }
        if !(self.repulsion_strength >= 0.0 && self.repulsion_strength.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "repulsion_strength must be non-negative, got {}",
                self.repulsion_strength
            )));
        }
        if !(self.a > 0.0 && self.a.is_finite() && self.b > 0.0 && self.b.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "curve parameters must be positive, got a={} b={}",
                self.a, self.b
            )));
        }
        if !(self.init_std > 0.0 && self.init_std.is_finite()) {
            return Err(ManifoldError::InvalidParameter(format!(
                "init_std must be positive, got {}",
                self.init_std
            )));
        }
        if self.report_every == 0 {
            return Err(ManifoldError::InvalidParameter(
                "report_every must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fits `1 / (1 + a x^(2b))` to the piecewise target that is 1 below
/// `min_dist` and decays as `exp(-(x - min_dist) / spread)` above it.
///
/// Damped Gauss-Newton (Levenberg-Marquardt) over 300 points on
/// `[0, 3 * spread]`, starting from a = b = 1.
pub fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..CURVE_POINTS)
        .map(|i| 3.0 * spread * i as f64 / (CURVE_POINTS - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let r = 1.0 / (1.0 + a * x.powf(2.0 * b)) - y;
                r * r
            })
            .sum()
    };

    let (mut a, mut b) = (1.0, 1.0);
    let mut damping = 1e-3;
    let mut current = sse(a, b);

    for _ in 0..CURVE_MAX_ITER {
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            if x <= 0.0 {
                continue;
            }
            let x2b = x.powf(2.0 * b);
            let denom = 1.0 + a * x2b;
            let residual = 1.0 / denom - y;
            let da = -x2b / (denom * denom);
            let db = -2.0 * a * x2b * x.ln() / (denom * denom);

            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * residual;
            gb += db * residual;
        }

        let mut step = None;
        while damping < 1e12 {
            let maa = jaa * (1.0 + damping);
            let mbb = jbb * (1.0 + damping);
            let det = maa * mbb - jab * jab;

            if det.abs() > f64::EPSILON {
                let sa = -(mbb * ga - jab * gb) / det;
                let sb = -(maa * gb - jab * ga) / det;
                let (na, nb) = (a + sa, b + sb);

                if na > 0.0 && nb > 0.0 {
                    let candidate = sse(na, nb);
                    if candidate < current {
                        a = na;
                        b = nb;
                        current = candidate;
                        damping = (damping / 10.0).max(1e-12);
                        step = Some((sa, sb));
                        break;
                    }
                }
            }
            damping *= 10.0;
        }

        match step {
            Some((sa, sb)) if sa.abs() > 1e-10 || sb.abs() > 1e-10 => {}
            _ => break,
        }
    }

    (a, b)
}

/// Uniform Manifold Approximation and Projection.
#[derive(Clone, Debug)]
pub struct UMAP {
    pub embedding: Option<Matrix>,
    pub graph: Option<EdgeList>,
    pub n_epochs: Option<usize>,
    n_components: usize,
    params: UmapParams,
    init: Initialisation,
    random_state: Option<u64>,
    cancel: Option<CancelToken>,
}

impl UMAP {
    pub fn new(n_components: usize) -> Self {
        Self {
            embedding: None,
            graph: None,
            n_epochs: None,
            n_components,
            params: UmapParams::default(),
            init: Initialisation::Random,
            random_state: None,
            cancel: None,
        }
    }

    pub fn params(mut self, params: UmapParams) -> Self {
        self.params = params;
        self
    }

    pub fn n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.params.n_neighbors = n_neighbors;
        self
    }

    pub fn min_dist(mut self, min_dist: f64) -> Self {
        self.params.min_dist = min_dist;
        self
    }

    pub fn n_epochs(mut self, n_epochs: usize) -> Self {
        self.params.n_epochs = n_epochs;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.params.learning_rate = learning_rate;
        self
    }

    pub fn negative_sample_rate(mut self, negative_sample_rate: usize) -> Self {
        self.params.negative_sample_rate = negative_sample_rate;
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

    pub fn get_params(&self) -> &UmapParams {
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

    /// Fits with an explicit random source and progress hook. The hook
    /// receives the fuzzy cross-entropy every `report_every` epochs.
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
        let n_neighbors = self.params.n_neighbors.min(n_samples - 1);
        if n_neighbors < self.params.n_neighbors && n_samples > 1 {
            warn!(
                requested = self.params.n_neighbors,
                n_neighbors, n_samples, "n_neighbors exceeds the sample count, clamping"
            );
        }

        let start = Instant::now();
        info!(
            n_samples,
            n_features = x.ncols(),
            n_components = self.n_components,
            n_neighbors,
            "fitting UMAP"
        );

        let graph = NeighbourGraph::build(x, n_neighbors, self.params.local_connectivity);
        let edges = EdgeList::from_symmetric(&graph.symmetrize());
        debug!(n_edges = edges.len(), "fuzzy graph built");

        let mut embedding = self
            .init
            .embed(x, self.n_components, self.params.init_std, rng)?;

        optimise_layout(
            &mut embedding,
            &edges,
            &self.params,
            rng,
            progress,
            self.cancel.as_ref(),
        )?;

        info!(
            n_epochs = self.params.n_epochs,
            cross_entropy = fuzzy_cross_entropy(&embedding, &edges, self.params.a, self.params.b),
            elapsed = ?start.elapsed(),
            "UMAP finished"
        );

        self.graph = Some(edges);
        self.n_epochs = Some(self.params.n_epochs);
        self.embedding = Some(embedding.clone());

        Ok(embedding)
    }
}

impl Default for UMAP {
    fn default() -> Self {
        Self::new(2)
    }
}

#[inline]
fn clip(value: f64) -> f64 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

/// Stochastic gradient descent over the edge list with a linearly decaying
/// learning rate. Edges are visited in list order every epoch.
pub(crate) fn optimise_layout<R, P>(
    embedding: &mut Matrix,
    edges: &EdgeList,
    params: &UmapParams,
    rng: &mut R,
    progress: &mut P,
    cancel: Option<&CancelToken>,
) -> Result<()>
where
    R: Rng + ?Sized,
    P: ProgressReporter + ?Sized,
{
    let (n_vertices, dim) = embedding.dim();
    if edges.n_vertices != n_vertices {
        return Err(ManifoldError::DimensionMismatch {
            expected: n_vertices,
            actual: edges.n_vertices,
        });
    }

    let (a, b) = (params.a, params.b);
    let gamma = params.repulsion_strength;
    let sample_negatives = n_vertices >= 3;

    for epoch in 0..params.n_epochs {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(ManifoldError::Cancelled { iteration: epoch });
        }

        if epoch % params.report_every == 0 {
            let cost = fuzzy_cross_entropy(embedding, edges, a, b);
            debug!(epoch, cost, "UMAP checkpoint");
            progress.report(epoch, cost);
        }

        let alpha = params.learning_rate * (1.0 - epoch as f64 / params.n_epochs as f64);

        for edge in edges.iter() {
            let (i, j) = (edge.source, edge.target);

            // Coincident endpoints skip the whole edge, negatives included
            let dist_sq = squared_euclidean(&embedding.row(i), &embedding.row(j));
            if dist_sq <= 0.0 {
                continue;
            }

            let pow_b = dist_sq.powf(b);
            let coef = -2.0 * a * b * dist_sq.powf(b - 1.0) * edge.weight / (1.0 + a * pow_b);

            for d in 0..dim {
                let grad = clip(coef * (embedding[[i, d]] - embedding[[j, d]]));
                embedding[[i, d]] += alpha * grad;
                embedding[[j, d]] -= alpha * grad;
            }

            if !sample_negatives {
                continue;
            }

            for _ in 0..params.negative_sample_rate {
                let k = loop {
                    let candidate = rng.gen_range(0..n_vertices);
                    if candidate != i && candidate != j {
                        break candidate;
                    }
                };

                let dist_sq = squared_euclidean(&embedding.row(i), &embedding.row(k));
                if dist_sq <= 0.0 {
                    continue;
                }

                let coef = 2.0 * gamma * b
                    / ((REPULSION_OFFSET + dist_sq) * (1.0 + a * dist_sq.powf(b)));

                for d in 0..dim {
                    let grad = clip(coef * (embedding[[i, d]] - embedding[[k, d]]));
                    embedding[[i, d]] += alpha * grad;
                }
            }
        }
    }

    Ok(())
}

/// Fuzzy set cross-entropy between the graph weights and the embedding's
/// similarities, summed over the edge list.
pub(crate) fn fuzzy_cross_entropy(embedding: &Matrix, edges: &EdgeList, a: f64, b: f64) -> f64 {
    edges
        .iter()
        .map(|edge| {
            let dist_sq = squared_euclidean(&embedding.row(edge.source), &embedding.row(edge.target));
            let v = umap_curve(dist_sq, a, b).clamp(CROSS_ENTROPY_EPS, 1.0 - CROSS_ENTROPY_EPS);
            let w = edge.weight;

            let attractive = if w > 0.0 { w * (w / v).ln() } else { 0.0 };
            let repulsive = if w < 1.0 {
                (1.0 - w) * ((1.0 - w) / (1.0 - v)).ln()
            } else {
                0.0
            };
            attractive + repulsive
        })
        .sum()
}
