use crate::error::{ManifoldError, Result};
use crate::manifold::kernel::pairwise_distances;
use crate::{Matrix, validate_input};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Leave-one-out nearest-neighbour classification accuracy in the embedding.
pub fn one_nn_accuracy(embedding: &Matrix, labels: &[usize]) -> Result<f64> {
    validate_input(embedding)?;
    if embedding.nrows() != labels.len() {
        return Err(ManifoldError::DimensionMismatch {
            expected: embedding.nrows(),
            actual: labels.len(),
        });
    }
    if labels.len() < 2 {
        return Err(ManifoldError::InsufficientSamples {
            min: 2,
            actual: labels.len(),
        });
    }

    let distances = pairwise_distances(embedding);
    let correct = (0..labels.len())
        .filter(|&i| {
            let nearest = nearest_neighbours(&distances, i, 1);
            labels[nearest[0]] == labels[i]
        })
        .count();

    Ok(correct as f64 / labels.len() as f64)
}

/// Mean fraction of each point's `k` nearest input neighbours that are also
/// among its `k` nearest neighbours in the embedding.
pub fn neighbourhood_preservation(x: &Matrix, embedding: &Matrix, k: usize) -> Result<f64> {
    validate_input(x)?;
    validate_input(embedding)?;
    if x.nrows() != embedding.nrows() {
        return Err(ManifoldError::DimensionMismatch {
            expected: x.nrows(),
            actual: embedding.nrows(),
        });
    }
    let n = x.nrows();
    if k == 0 || k >= n {
        return Err(ManifoldError::InvalidParameter(format!(
            "k must be in [1, {}), got {}",
            n, k
        )));
    }

    let input_distances = pairwise_distances(x);
    let embedded_distances = pairwise_distances(embedding);

    let total: f64 = (0..n)
        .map(|i| {
            let original: HashSet<usize> =
                nearest_neighbours(&input_distances, i, k).into_iter().collect();
            let kept = nearest_neighbours(&embedded_distances, i, k)
                .into_iter()
                .filter(|j| original.contains(j))
                .count();
            kept as f64 / k as f64
        })
        .sum();

    Ok(total / n as f64)
}

/// Indices of the `k` closest points to `i`, ties broken by index.
fn nearest_neighbours(distances: &Matrix, i: usize, k: usize) -> Vec<usize> {
    let mut others: Vec<usize> = (0..distances.nrows()).filter(|&j| j != i).collect();
    others.sort_by(|&a, &b| {
        distances[[i, a]]
            .partial_cmp(&distances[[i, b]])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    others.truncate(k);
    others
}
