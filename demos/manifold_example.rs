use ndarray::array;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tabular_manifold::metrics::{neighbourhood_preservation, one_nn_accuracy};
use tabular_manifold::{Initialisation, LogProgress, Matrix, TSNE, TsneParams, UMAP, UmapParams};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Nonlinear Embedding Comparison ===\n");

    // Three loose groups in 6 dimensions
    let x = array![
        [1.0, 2.0, 3.0, 4.0, 5.0, 1.1],
        [1.2, 2.1, 2.9, 4.2, 5.1, 1.0],
        [0.9, 1.8, 3.1, 3.9, 4.8, 1.2],
        [1.1, 2.2, 3.2, 4.1, 5.2, 0.9],
        [10.0, 8.0, 6.0, 4.0, 2.0, 10.5],
        [10.3, 8.2, 6.1, 3.8, 2.2, 10.4],
        [9.8, 7.9, 5.8, 4.1, 1.9, 10.7],
        [10.1, 8.1, 6.2, 4.2, 2.1, 10.2],
        [20.0, 15.0, 10.0, 5.0, 0.0, 20.5],
        [20.2, 15.3, 9.8, 5.1, 0.2, 20.3],
        [19.7, 14.8, 10.1, 4.9, -0.1, 20.8],
        [20.1, 15.1, 10.2, 5.2, 0.1, 20.4]
    ];
    let labels = [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];

    println!("Original data shape: {} samples, {} features\n", x.nrows(), x.ncols());

    println!("=== t-SNE ===");
    println!("t-SNE matches Gaussian neighbour probabilities with heavy-tailed ones in the embedding");

    for &perplexity in &[2.0, 3.0] {
        match run_tsne(&x, perplexity) {
            Ok(embedding) => report(&x, &embedding, &labels),
            Err(e) => println!("t-SNE with perplexity {} failed: {}", perplexity, e),
        }
    }

    println!("\n=== UMAP ===");
    println!("UMAP lays out a fuzzy k-nearest-neighbour graph with attraction and negative sampling");

    for &min_dist in &[0.1, 0.5] {
        match run_umap(&x, min_dist) {
            Ok(embedding) => report(&x, &embedding, &labels),
            Err(e) => println!("UMAP with min_dist {} failed: {}", min_dist, e),
        }
    }

    println!("\n=== Error handling ===");
    match TSNE::new(2).fit_transform(&array![[1.0, 2.0, 3.0]]) {
        Ok(_) => println!("unexpected success on a single sample"),
        Err(e) => println!("single sample rejected: {}", e),
    }

    Ok(())
}

fn run_tsne(x: &Matrix, perplexity: f64) -> Result<Matrix, Box<dyn std::error::Error>> {
    let params = TsneParams::new()
        .perplexity(perplexity)
        .learning_rate(10.0)
        .max_iter(500);
    let mut tsne = TSNE::new(2).params(params).random_state(42);

    let mut rng = StdRng::seed_from_u64(42);
    let mut progress = LogProgress::new("t-SNE");
    let embedding = tsne.fit_transform_with(x, &mut rng, &mut progress)?;

    println!(
        "Perplexity {}: KL divergence {:.4} after {} iterations",
        perplexity,
        tsne.kl_divergence.unwrap_or(f64::NAN),
        tsne.n_iter.unwrap_or(0)
    );
    Ok(embedding)
}

fn run_umap(x: &Matrix, min_dist: f64) -> Result<Matrix, Box<dyn std::error::Error>> {
    let params = UmapParams::new()
        .n_neighbors(4)
        .min_dist(min_dist)
        .n_epochs(300)
        .fit_curve();
    println!(
        "min_dist {}: fitted curve a = {:.4}, b = {:.4}",
        min_dist, params.a, params.b
    );

    let mut umap = UMAP::new(2)
        .params(params)
        .init(Initialisation::Pca)
        .random_state(7);
    let embedding = umap.fit_transform(x)?;

    if let Some(graph) = &umap.graph {
        println!("Fuzzy graph has {} directed edges", graph.len());
    }
    Ok(embedding)
}

fn report(x: &Matrix, embedding: &Matrix, labels: &[usize]) {
    match (
        one_nn_accuracy(embedding, labels),
        neighbourhood_preservation(x, embedding, 3),
    ) {
        (Ok(accuracy), Ok(preserved)) => println!(
            "  1-NN accuracy: {:.3}, 3-neighbourhood preservation: {:.3}",
            accuracy, preserved
        ),
        (Err(e), _) | (_, Err(e)) => println!("  scoring failed: {}", e),
    }
}
