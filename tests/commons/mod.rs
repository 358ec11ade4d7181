use ndarray_rand::rand_distr::{Distribution, Normal};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tabular_manifold::Matrix;

/// Two isotropic Gaussian blobs, the second shifted by `separation` along
/// every axis divided by sqrt(n_dim) so the centres are `separation` apart.
pub fn create_two_blobs(
    n_per_blob: usize,
    n_dim: usize,
    separation: f64,
    std: f64,
    seed: u64,
) -> (Matrix, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, std).unwrap();
    let offset = separation / (n_dim as f64).sqrt();

    let n_total = n_per_blob * 2;
    let mut data = Matrix::zeros((n_total, n_dim));
    let mut labels = Vec::with_capacity(n_total);

    for i in 0..n_total {
        let blob = i / n_per_blob;
        for d in 0..n_dim {
            data[[i, d]] = blob as f64 * offset + normal.sample(&mut rng);
        }
        labels.push(blob);
    }

    (data, labels)
}

/// Mean distance between points sharing a label, and between points that don't.
pub fn intra_inter_distances(embedding: &Matrix, labels: &[usize]) -> (f64, f64) {
    let (mut intra, mut n_intra) = (0.0, 0);
    let (mut inter, mut n_inter) = (0.0, 0);

    for i in 0..embedding.nrows() {
        for j in (i + 1)..embedding.nrows() {
            let diff = &embedding.row(i) - &embedding.row(j);
            let dist = diff.dot(&diff).sqrt();
            if labels[i] == labels[j] {
                intra += dist;
                n_intra += 1;
            } else {
                inter += dist;
                n_inter += 1;
            }
        }
    }

    (intra / n_intra as f64, inter / n_inter as f64)
}
