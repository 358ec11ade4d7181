pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod error;
pub mod manifold;
pub mod metrics;

pub use error::{ManifoldError, Result};
pub use manifold::{
    CancelToken, Initialisation, LogProgress, NoProgress, ProgressReporter, TSNE, TsneParams,
    UMAP, UmapParams,
};

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;

/// Rejects inputs the embedding estimators cannot work with: empty
/// matrices and non-finite entries.
pub(crate) fn validate_input(x: &Matrix) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ManifoldError::EmptyInput);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ManifoldError::NonFiniteInput);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn basic_types_work() {
        let vec = Vector::zeros(5);
        let mat = Matrix::zeros((3, 4));
        assert_eq!(vec.len(), 5);
        assert_eq!(mat.shape(), &[3, 4]);
    }

    #[test]
    fn validate_input_rejects_empty_and_non_finite() {
        assert_eq!(validate_input(&Matrix::zeros((0, 3))), Err(ManifoldError::EmptyInput));
        assert_eq!(validate_input(&Matrix::zeros((3, 0))), Err(ManifoldError::EmptyInput));

        let x = array![[1.0, f64::NAN], [0.0, 1.0]];
        assert_eq!(validate_input(&x), Err(ManifoldError::NonFiniteInput));

        let x = array![[1.0, 2.0], [0.0, 1.0]];
        assert!(validate_input(&x).is_ok());
    }
}
