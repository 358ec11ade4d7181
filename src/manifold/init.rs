use crate::error::{ManifoldError, Result};
use crate::{Matrix, Vector};
use ndarray::Axis;
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Normal;
use rand::Rng;
use tracing::debug;

const POWER_ITERATIONS: usize = 100;
const EIGEN_TOLERANCE: f64 = 1e-10;

/// How the starting layout of an embedding is produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Initialisation {
    /// Independent zero-mean Gaussian draws.
    #[default]
    Random,
    /// Projection onto the leading principal axes, rescaled so the first
    /// axis has the requested standard deviation.
    Pca,
}

impl Initialisation {
    pub fn embed<R: Rng + ?Sized>(
        &self,
        x: &Matrix,
        n_components: usize,
        std: f64,
        rng: &mut R,
    ) -> Result<Matrix> {
        match self {
            Initialisation::Random => random_embedding(x.nrows(), n_components, std, rng),
            Initialisation::Pca => pca_embedding(x, n_components, std, rng),
        }
    }
}

pub fn random_embedding<R: Rng + ?Sized>(
    n_samples: usize,
    n_components: usize,
    std: f64,
    rng: &mut R,
) -> Result<Matrix> {
    let normal = Normal::new(0.0, std).map_err(|e| {
        ManifoldError::InvalidParameter(format!("initial std={} is not usable: {}", std, e))
    })?;
    Ok(Matrix::random_using((n_samples, n_components), normal, rng))
}

/// Principal-axis starting layout. Components beyond the number of
/// non-degenerate axes keep random draws so no coordinate starts collapsed.
pub fn pca_embedding<R: Rng + ?Sized>(
    x: &Matrix,
    n_components: usize,
    std: f64,
    rng: &mut R,
) -> Result<Matrix> {
    let mut embedding = random_embedding(x.nrows(), n_components, std, rng)?;

    let n_samples = x.nrows();
    if n_samples < 2 {
        return Ok(embedding);
    }

    // Center the data
    let mean = x.mean_axis(Axis(0)).ok_or(ManifoldError::EmptyInput)?;
    let x_centered = x - &mean.view().insert_axis(Axis(0));
    let cov = x_centered.t().dot(&x_centered) / (n_samples as f64 - 1.0);

    let n_axes = n_components.min(x.ncols());
    let (eigenvalues, axes) = leading_axes(&cov, n_axes);
    let projected = x_centered.dot(&axes.t());

    let first_std = projected.column(0).std(0.0);
    if eigenvalues[0] <= EIGEN_TOLERANCE || first_std <= 0.0 {
        debug!("input has no variance, keeping the random layout");
        return Ok(embedding);
    }

    let scale = std / first_std;
    for (c, &lambda) in eigenvalues.iter().enumerate() {
        if lambda > EIGEN_TOLERANCE {
            embedding
                .column_mut(c)
                .assign(&projected.column(c).mapv(|v| v * scale));
        }
    }

    Ok(embedding)
}

/// Leading eigenpairs of a symmetric matrix by power iteration with
/// deflation. Returns eigenvalues and the eigenvectors as rows.
fn leading_axes(matrix: &Matrix, n_axes: usize) -> (Vector, Matrix) {
    let d = matrix.nrows();
    let mut eigenvalues = Vector::zeros(n_axes);
    let mut axes = Matrix::zeros((n_axes, d));
    let mut a = matrix.clone();

    for i in 0..n_axes {
        let mut v = Vector::from_shape_fn(d, |j| 1.0 + j as f64 / d as f64);
        v /= v.dot(&v).sqrt();
        let mut lambda = 0.0;

        for _ in 0..POWER_ITERATIONS {
            let av = a.dot(&v);
            let norm = av.dot(&av).sqrt();

            if norm < EIGEN_TOLERANCE {
                lambda = 0.0;
                break;
            }

            v = av / norm;
            let new_lambda = v.dot(&a.dot(&v));

            if (new_lambda - lambda).abs() < EIGEN_TOLERANCE * new_lambda.abs().max(1.0) {
                lambda = new_lambda;
                break;
            }
            lambda = new_lambda;
        }

        eigenvalues[i] = lambda;
        axes.row_mut(i).assign(&v);

        // Deflation: remove the found eigenvalue/eigenvector
        let vv = v
            .view()
            .insert_axis(Axis(1))
            .dot(&v.view().insert_axis(Axis(0)));
        a = &a - &(vv * lambda);
    }

    (eigenvalues, axes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_embedding_shape_and_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let y = random_embedding(2000, 3, 10.0, &mut rng).unwrap();

        assert_eq!(y.shape(), &[2000, 3]);
        let std = y.std(0.0);
        assert!((std - 10.0).abs() < 0.5, "std was {}", std);
        assert!(y.mean().unwrap().abs() < 0.5);
    }

    #[test]
    fn test_random_embedding_is_seeded() {
        let a = random_embedding(10, 2, 1e-4, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = random_embedding(10, 2, 1e-4, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_std_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(random_embedding(3, 2, -1.0, &mut rng).is_err());
        assert!(random_embedding(3, 2, f64::NAN, &mut rng).is_err());
    }

    #[test]
    fn test_pca_embedding_follows_principal_axis() {
        let x = array![
            [0.0, 0.0, 0.1],
            [1.0, 1.0, 0.0],
            [2.0, 2.0, 0.1],
            [3.0, 3.0, 0.0],
            [4.0, 4.0, 0.1]
        ];
        let mut rng = StdRng::seed_from_u64(11);
        let y = pca_embedding(&x, 2, 1e-4, &mut rng).unwrap();

        assert_eq!(y.shape(), &[5, 2]);
        assert_relative_eq!(y.column(0).std(0.0), 1e-4, max_relative = 1e-6);

        // Ordering along the line is preserved up to sign
        let first = y.column(0);
        let increasing = first.windows(2).into_iter().all(|w| w[0] < w[1]);
        let decreasing = first.windows(2).into_iter().all(|w| w[0] > w[1]);
        assert!(increasing || decreasing);
    }

    #[test]
    fn test_pca_embedding_pads_missing_axes() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let mut rng = StdRng::seed_from_u64(5);
        let y = pca_embedding(&x, 3, 1.0, &mut rng).unwrap();

        assert_eq!(y.shape(), &[4, 3]);
        assert!(y.column(1).iter().any(|v| *v != 0.0));
        assert!(y.column(2).iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_leading_axes_of_diagonal_matrix() {
        let m = array![[1.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 3.0]];
        let (values, axes) = leading_axes(&m, 2);

        assert_relative_eq!(values[0], 5.0, epsilon = 1e-6);
        assert_relative_eq!(values[1], 3.0, epsilon = 1e-6);
        assert_relative_eq!(axes[[0, 1]].abs(), 1.0, epsilon = 1e-4);
        assert_relative_eq!(axes[[1, 2]].abs(), 1.0, epsilon = 1e-4);
    }
}
