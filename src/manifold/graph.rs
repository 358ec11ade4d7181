use crate::manifold::calibration::{
    calibrate_connectivity, calibrate_perplexity, connectivity_weights, gaussian_row_probabilities,
};
use crate::manifold::kernel::{euclidean_distance, pairwise_distances};
use crate::{Matrix, Vector};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Smallest value any off-diagonal affinity may take.
pub const AFFINITY_FLOOR: f64 = 1e-12;

/// Fuzzy set union of two membership strengths.
#[inline]
pub fn fuzzy_union(a: f64, b: f64) -> f64 {
    a + b - a * b
}

/// Conditional probabilities P(j|i) for every ordered pair, one calibrated
/// Gaussian bandwidth per row. Row i sums to 1 over j != i; the diagonal is 0.
///
/// Returns the probabilities and the per-row bandwidths.
pub fn conditional_probabilities(distances: &Matrix, perplexity: f64) -> (Matrix, Vector) {
    let n = distances.nrows();
    let mut conditional = Matrix::zeros((n, n));
    let mut sigmas = Vector::zeros(n);
    let mut unconverged = 0;

    for i in 0..n {
        let others: Vec<f64> = (0..n)
            .filter(|&j| j != i)
            .map(|j| distances[[i, j]])
            .collect();

        let calibration = calibrate_perplexity(&others, perplexity);
        if !calibration.converged {
            unconverged += 1;
        }
        sigmas[i] = calibration.sigma;

        let row = gaussian_row_probabilities(&others, calibration.sigma);
        for (j, p) in (0..n).filter(|&j| j != i).zip(row) {
            conditional[[i, j]] = p;
        }
    }

    if unconverged > 0 {
        debug!(unconverged, n, "perplexity search hit its cap for some points");
    }

    (conditional, sigmas)
}

/// Joint t-SNE affinities: dense, symmetric, strictly positive off the diagonal.
#[derive(Clone, Debug)]
pub struct AffinityMatrix {
    values: Matrix,
    sigmas: Vector,
}

impl AffinityMatrix {
    pub fn from_points(x: &Matrix, perplexity: f64) -> Self {
        let distances = pairwise_distances(x);
        let (conditional, sigmas) = conditional_probabilities(&distances, perplexity);
        Self::from_conditional(&conditional, sigmas)
    }

    /// Symmetrises conditional probabilities as `max((P(j|i) + P(i|j)) / 2n, floor)`.
    pub fn from_conditional(conditional: &Matrix, sigmas: Vector) -> Self {
        let n = conditional.nrows();
        let scale = 2.0 * n as f64;
        let mut values = Matrix::zeros((n, n));

        for i in 0..n {
            for j in (i + 1)..n {
                let p = ((conditional[[i, j]] + conditional[[j, i]]) / scale).max(AFFINITY_FLOOR);
                values[[i, j]] = p;
                values[[j, i]] = p;
            }
        }

        Self { values, sigmas }
    }

    pub fn values(&self) -> &Matrix {
        &self.values
    }

    pub fn sigmas(&self) -> &Vector {
        &self.sigmas
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }
}

/// Exact k-nearest-neighbour graph with UMAP membership strengths.
///
/// Row i holds point i's neighbours in ascending distance order together
/// with the directed strengths `exp(-max(0, d - rho_i) / sigma_i)`.
#[derive(Clone, Debug)]
pub struct NeighbourGraph {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f64>>,
    pub weights: Vec<Vec<f64>>,
    pub sigmas: Vector,
    pub rhos: Vector,
}

impl NeighbourGraph {
    /// `k` is clamped to `n - 1`; `local_connectivity` picks the neighbour
    /// whose distance becomes rho (1 = nearest).
    pub fn build(x: &Matrix, k: usize, local_connectivity: usize) -> Self {
        let n = x.nrows();
        let k = k.min(n.saturating_sub(1));

        let mut indices = Vec::with_capacity(n);
        let mut distances = Vec::with_capacity(n);
        let mut weights = Vec::with_capacity(n);
        let mut sigmas = Vector::zeros(n);
        let mut rhos = Vector::zeros(n);
        let mut unconverged = 0;

        for i in 0..n {
            let mut candidates: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, euclidean_distance(&x.row(i), &x.row(j))))
                .collect();

            candidates.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            candidates.truncate(k);

            let (row_indices, row_distances): (Vec<usize>, Vec<f64>) =
                candidates.into_iter().unzip();

            if row_distances.is_empty() {
                sigmas[i] = 1.0;
                indices.push(row_indices);
                distances.push(row_distances);
                weights.push(Vec::new());
                continue;
            }

            // exp(0) makes the rho neighbour's strength exactly 1, so weights
            // span the closed interval [0, 1], not [0, 1)
            let rho = row_distances[local_connectivity.clamp(1, k) - 1];
            let calibration = calibrate_connectivity(&row_distances, rho);
            if !calibration.converged {
                unconverged += 1;
            }

            rhos[i] = rho;
            sigmas[i] = calibration.sigma;
            weights.push(connectivity_weights(&row_distances, rho, calibration.sigma));
            indices.push(row_indices);
            distances.push(row_distances);
        }

        if unconverged > 0 {
            debug!(unconverged, n, "connectivity search hit its cap for some points");
        }

        Self {
            indices,
            distances,
            weights,
            sigmas,
            rhos,
        }
    }

    pub fn n_vertices(&self) -> usize {
        self.indices.len()
    }

    pub fn n_neighbors(&self) -> usize {
        self.indices.first().map_or(0, |row| row.len())
    }

    /// Directed strength of edge i -> j, 0 when j is not among i's neighbours.
    pub fn directed_weight(&self, i: usize, j: usize) -> f64 {
        self.indices[i]
            .iter()
            .position(|&m| m == j)
            .map_or(0.0, |pos| self.weights[i][pos])
    }

    /// Combines both directions of every edge with the fuzzy union. A pair
    /// known from one side only keeps that side's strength.
    pub fn symmetrize(&self) -> SymmetricGraph {
        let n = self.n_vertices();
        let mut rows: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];

        for i in 0..n {
            for (&j, &w) in self.indices[i].iter().zip(self.weights[i].iter()) {
                let combined = fuzzy_union(w, self.directed_weight(j, i));
                rows[i].insert(j, combined);
                rows[j].insert(i, combined);
            }
        }

        SymmetricGraph { rows }
    }
}

/// Symmetric sparse weights, one ordered map of neighbours per vertex.
#[derive(Clone, Debug)]
pub struct SymmetricGraph {
    rows: Vec<BTreeMap<usize, f64>>,
}

impl SymmetricGraph {
    pub fn n_vertices(&self) -> usize {
        self.rows.len()
    }

    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.rows[i].get(&j).copied().unwrap_or(0.0)
    }

    pub fn neighbours(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.rows[i].iter().map(|(&j, &w)| (j, w))
    }

    pub fn n_entries(&self) -> usize {
        self.rows.iter().map(|row| row.len()).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

/// Flattened positive-weight edges, in row-major order with ascending
/// targets. Both directions of an undirected edge are present.
#[derive(Clone, Debug, Default)]
pub struct EdgeList {
    pub edges: Vec<Edge>,
    pub n_vertices: usize,
}

impl EdgeList {
    pub fn from_symmetric(graph: &SymmetricGraph) -> Self {
        let mut edges = Vec::with_capacity(graph.n_entries());

        for source in 0..graph.n_vertices() {
            for (target, weight) in graph.neighbours(source) {
                if weight > 0.0 {
                    edges.push(Edge {
                        source,
                        target,
                        weight,
                    });
                }
            }
        }

        Self {
            edges,
            n_vertices: graph.n_vertices(),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Edge> {
        self.edges.iter()
    }
}
