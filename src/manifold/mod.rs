//! Nonlinear dimensionality reduction by neighbour embedding.
//!
//! This module provides:
//! - `TSNE`: t-distributed Stochastic Neighbour Embedding with exact gradients
//! - `UMAP`: Uniform Manifold Approximation and Projection
//!
//! Both estimators take an n x d matrix and return an n x `n_components`
//! embedding. Runs are reproducible when seeded with `random_state`.
//!
//! # Examples
//!
//! ## t-SNE
//! ```rust
//! use tabular_manifold::TSNE;
//! use ndarray::array;
//!
//! let x = array![
//!     [0.0, 0.0, 0.0],
//!     [0.1, 0.0, 0.1],
//!     [10.0, 10.0, 10.0],
//!     [10.1, 10.0, 10.1]
//! ];
//!
//! let mut tsne = TSNE::new(2).learning_rate(10.0).random_state(42);
//! let embedding = tsne.fit_transform(&x).unwrap();
//! assert_eq!(embedding.shape(), &[4, 2]);
//!
//! println!("KL divergence: {:?}", tsne.kl_divergence);
//! ```
//!
//! ## UMAP
//! ```rust
//! use tabular_manifold::{UMAP, UmapParams};
//! use ndarray::array;
//!
//! let x = array![
//!     [0.0, 0.0],
//!     [0.2, 0.1],
//!     [0.1, 0.3],
//!     [9.0, 9.0],
//!     [9.2, 9.1],
//!     [9.1, 9.3]
//! ];
//!
//! let params = UmapParams::new().n_neighbors(2).n_epochs(200).fit_curve();
//! let mut umap = UMAP::new(2).params(params).random_state(7);
//! let embedding = umap.fit_transform(&x).unwrap();
//!
//! let graph = umap.graph.as_ref().unwrap();
//! println!("{} edges, embedding {:?}", graph.len(), embedding.shape());
//! ```
//!
//! ## Progress and cancellation
//! ```rust
//! use tabular_manifold::{CancelToken, TSNE, TsneParams};
//! use ndarray::array;
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let x = array![[0.0, 1.0], [1.0, 0.0], [5.0, 5.0], [6.0, 5.0]];
//! let token = CancelToken::new();
//!
//! let mut tsne = TSNE::new(2)
//!     .params(TsneParams::new().max_iter(200).learning_rate(10.0))
//!     .cancel_token(token.clone());
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let mut on_progress = |iteration: usize, cost: f64| {
//!     println!("iteration {iteration}: KL = {cost:.4}");
//! };
//! tsne.fit_transform_with(&x, &mut rng, &mut on_progress).unwrap();
//! ```

pub mod calibration;
pub mod graph;
mod init;
pub mod kernel;
mod progress;
mod tsne;
mod umap;

pub use graph::{AffinityMatrix, Edge, EdgeList, NeighbourGraph, SymmetricGraph};
pub use init::Initialisation;
pub use progress::{CancelToken, LogProgress, NoProgress, ProgressReporter};
pub use tsne::{TSNE, TsneParams};
pub use umap::{DEFAULT_A, DEFAULT_B, UMAP, UmapParams, find_ab_params};
