mod commons;

use commons::{create_two_blobs, intra_inter_distances};
use ndarray::array;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tabular_manifold::metrics::{neighbourhood_preservation, one_nn_accuracy};
use tabular_manifold::{Initialisation, ManifoldError, TSNE, TsneParams, UMAP, UmapParams};

#[test]
fn tsne_separates_two_tight_pairs() {
    let x = array![
        [0.0, 0.0, 0.0],
        [0.01, 0.0, 0.0],
        [10.0, 10.0, 10.0],
        [10.01, 10.0, 10.0]
    ];
    let labels = [0, 0, 1, 1];

    for seed in 0..5 {
        let mut tsne = TSNE::new(2)
            .perplexity(1.0)
            .learning_rate(10.0)
            .random_state(seed);
        let embedding = tsne.fit_transform(&x).unwrap();

        let (intra, inter) = intra_inter_distances(&embedding, &labels);
        assert!(
            intra < inter,
            "seed {}: intra {} not below inter {}",
            seed,
            intra,
            inter
        );
        assert!(tsne.kl_divergence.unwrap().is_finite());
    }
}

#[test]
fn tsne_rejects_a_single_sample() {
    let x = array![[1.0, 2.0, 3.0]];
    let result = TSNE::new(2).fit_transform(&x);

    assert_eq!(
        result,
        Err(ManifoldError::InsufficientSamples { min: 2, actual: 1 })
    );
}

#[test]
fn tsne_keeps_blobs_apart() {
    let (x, labels) = create_two_blobs(15, 5, 30.0, 1.0, 11);

    let mut tsne = TSNE::new(2)
        .params(TsneParams::new().perplexity(5.0).learning_rate(10.0).max_iter(500))
        .random_state(3);
    let embedding = tsne.fit_transform(&x).unwrap();

    assert_eq!(embedding.shape(), &[30, 2]);
    assert!(one_nn_accuracy(&embedding, &labels).unwrap() >= 0.9);
}

#[test]
fn umap_separates_two_blobs() {
    for seed in [1, 2, 3] {
        let (x, labels) = create_two_blobs(10, 3, 50.0, 1.0, seed);

        let mut umap = UMAP::new(2).random_state(seed);
        let embedding = umap.fit_transform(&x).unwrap();

        assert_eq!(embedding.shape(), &[20, 2]);
        assert!(embedding.iter().all(|v| v.is_finite()));

        let accuracy = one_nn_accuracy(&embedding, &labels).unwrap();
        assert!(accuracy >= 0.9, "seed {}: 1-NN accuracy {}", seed, accuracy);
    }
}

#[test]
fn umap_graph_is_symmetric() {
    let (x, _) = create_two_blobs(10, 4, 20.0, 1.0, 5);
    let mut umap = UMAP::new(2).n_neighbors(4).n_epochs(10).random_state(5);
    umap.fit(&x).unwrap();

    let graph = umap.graph.as_ref().unwrap();
    for edge in graph.iter() {
        let reverse = graph
            .iter()
            .find(|e| e.source == edge.target && e.target == edge.source)
            .expect("reverse edge present");
        assert_eq!(reverse.weight, edge.weight);
        // Rho neighbours carry weight exactly 1
        assert!(edge.weight > 0.0 && edge.weight <= 1.0);
    }
}

#[test]
fn umap_with_fitted_curve_and_pca_start() {
    let (x, labels) = create_two_blobs(12, 6, 40.0, 1.0, 21);

    let params = UmapParams::new()
        .n_neighbors(5)
        .min_dist(0.3)
        .n_epochs(200)
        .fit_curve();
    let mut umap = UMAP::new(3)
        .params(params)
        .init(Initialisation::Pca)
        .random_state(21);
    let embedding = umap.fit_transform(&x).unwrap();

    assert_eq!(embedding.shape(), &[24, 3]);
    assert!(one_nn_accuracy(&embedding, &labels).unwrap() >= 0.9);
    assert!(neighbourhood_preservation(&x, &embedding, 3).unwrap() > 0.0);
}

#[test]
fn explicit_rng_matches_random_state() {
    let (x, _) = create_two_blobs(6, 3, 10.0, 1.0, 9);

    let seeded = TSNE::new(2)
        .max_iter(150)
        .learning_rate(10.0)
        .random_state(99)
        .fit_transform(&x)
        .unwrap();

    let mut rng = StdRng::seed_from_u64(99);
    let explicit = TSNE::new(2)
        .max_iter(150)
        .learning_rate(10.0)
        .fit_transform_with(&x, &mut rng, &mut tabular_manifold::NoProgress)
        .unwrap();

    assert_eq!(seeded, explicit);
}
