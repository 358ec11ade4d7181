use crate::Matrix;
use ndarray::ArrayView1;

pub fn squared_euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
}

pub fn euclidean_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Dense matrix of Euclidean distances between every pair of rows.
/// The diagonal is zero.
pub fn pairwise_distances(x: &Matrix) -> Matrix {
    let n = x.nrows();
    let mut distances = Matrix::zeros((n, n));

    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean_distance(&x.row(i), &x.row(j));
            distances[[i, j]] = d;
            distances[[j, i]] = d;
        }
    }

    distances
}

/// Unnormalised t-SNE similarity of a point at `distance` under bandwidth `sigma`.
#[inline]
pub fn gaussian_similarity(distance: f64, sigma: f64) -> f64 {
    (-(distance * distance) / (2.0 * sigma * sigma)).exp()
}

/// Unnormalised UMAP membership strength. `rho` is the distance to the
/// point's local-connectivity neighbour, so anything at or inside it gets 1.
#[inline]
pub fn exponential_weight(distance: f64, rho: f64, sigma: f64) -> f64 {
    (-(distance - rho).max(0.0) / sigma).exp()
}

/// Student-t kernel with one degree of freedom, on a squared distance.
#[inline]
pub fn student_t(dist_sq: f64) -> f64 {
    1.0 / (1.0 + dist_sq)
}

/// Low-dimensional UMAP similarity `1 / (1 + a * d^(2b))`, on a squared distance.
#[inline]
pub fn umap_curve(dist_sq: f64, a: f64, b: f64) -> f64 {
    1.0 / (1.0 + a * dist_sq.powf(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_euclidean_distance() {
        let a = array![0.0, 0.0, 0.0];
        let b = array![1.0, 2.0, 2.0];

        assert_relative_eq!(euclidean_distance(&a.view(), &b.view()), 3.0);
        assert_relative_eq!(squared_euclidean(&a.view(), &b.view()), 9.0);
        assert_eq!(euclidean_distance(&a.view(), &a.view()), 0.0);
    }

    #[test]
    fn test_pairwise_distances_symmetric() {
        let x = array![[0.0, 0.0], [3.0, 4.0], [6.0, 8.0]];
        let d = pairwise_distances(&x);

        assert_eq!(d.shape(), &[3, 3]);
        for i in 0..3 {
            assert_eq!(d[[i, i]], 0.0);
            for j in 0..3 {
                assert_eq!(d[[i, j]], d[[j, i]]);
            }
        }
        assert_relative_eq!(d[[0, 1]], 5.0);
        assert_relative_eq!(d[[0, 2]], 10.0);
    }

    #[test]
    fn test_gaussian_similarity() {
        assert_eq!(gaussian_similarity(0.0, 1.0), 1.0);
        assert_relative_eq!(gaussian_similarity(1.0, 1.0), (-0.5f64).exp());
        // Narrower bandwidth decays faster
        assert!(gaussian_similarity(1.0, 0.5) < gaussian_similarity(1.0, 2.0));
    }

    #[test]
    fn test_exponential_weight_offsets_by_rho() {
        assert_eq!(exponential_weight(0.5, 1.0, 1.0), 1.0);
        assert_eq!(exponential_weight(1.0, 1.0, 1.0), 1.0);
        assert_relative_eq!(exponential_weight(3.0, 1.0, 2.0), (-1.0f64).exp());
    }

    #[test]
    fn test_low_dimensional_kernels() {
        assert_eq!(student_t(0.0), 1.0);
        assert_relative_eq!(student_t(3.0), 0.25);

        assert_eq!(umap_curve(0.0, 1.929, 0.7915), 1.0);
        assert_relative_eq!(umap_curve(1.0, 1.929, 0.7915), 1.0 / 2.929);
    }
}
