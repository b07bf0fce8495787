// ============================================================
// Layer 5 — 2-D t-SNE
// ============================================================
// Non-linear alternative to pca.rs for the layer plots. The
// features leave the backend once and are embedded on the CPU
// by the Barnes-Hut t-SNE of the `bhtsne` crate.
//
//   [n, d] tensor ──into_data──► n rows of d floats
//                                   │ Barnes-Hut, θ = 0.5
//                                   ▼
//                               [n, 2] coordinates (row-major)
//
// Perplexity follows the usual default of 30 but is capped at
// ⌊(n − 1) / 3⌋, within what the neighbour search accepts.
// The initial embedding is random, so coordinates differ between
// runs while cluster structure does not.
//
// Reference: van der Maaten (2014) Accelerating t-SNE using
//            Tree-Based Algorithms

use anyhow::{bail, Result};
use burn::prelude::*;

const PERPLEXITY: f32 = 30.0;
const THETA: f32 = 0.5;
const EPOCHS: usize = 1000;

/// Smallest row count with a perplexity of at least 1.
pub const MIN_ROWS: usize = 4;

/// Embeds `[n, d]` features in 2-D. Returns `2 * n` coordinates,
/// one `(x, y)` pair per row.
pub fn tsne_2d<B: Backend>(features: Tensor<B, 2>) -> Result<Vec<f32>> {
    let [n, d] = features.dims();
    if n < MIN_ROWS {
        bail!("t-SNE needs at least {} rows, got {}", MIN_ROWS, n);
    }

    let data: Vec<f32> = features.into_data().iter::<f32>().collect();
    let samples: Vec<&[f32]> = data.chunks(d).collect();

    let mut tsne = bhtsne::tSNE::new(&samples);
    tsne.embedding_dim(2)
        .perplexity(perplexity_for(n))
        .epochs(EPOCHS)
        .barnes_hut(THETA, |a, b| euclidean(a, b));

    let coords = tsne.embedding();
    if coords.len() != 2 * n {
        bail!("t-SNE returned {} coordinates for {} rows", coords.len(), n);
    }
    Ok(coords)
}

fn perplexity_for(n: usize) -> f32 {
    PERPLEXITY.min(((n - 1) / 3) as f32)
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_perplexity_is_capped_for_small_sets() {
        assert_eq!(perplexity_for(1000), 30.0);
        assert_eq!(perplexity_for(13), 4.0);
        assert_eq!(perplexity_for(6), 1.0);
    }

    #[test]
    fn test_separated_clusters_stay_apart() {
        let device = Default::default();
        // two tight clusters of 10 points, 100 units apart
        let rows: Vec<f32> = (0..20)
            .flat_map(|i| {
                let base = if i < 10 { 0.0 } else { 100.0 };
                let jitter = (i % 10) as f32 * 0.1;
                [base + jitter, base - jitter, base]
            })
            .collect();
        let features = Tensor::<TB, 1>::from_floats(rows.as_slice(), &device).reshape([20, 3]);

        let coords = tsne_2d(features).unwrap();
        assert_eq!(coords.len(), 40);
        assert!(coords.iter().all(|c| c.is_finite()));

        let points: Vec<&[f32]> = coords.chunks(2).collect();
        let same_cluster_neighbours = (0..20)
            .filter(|&i| {
                let nearest = (0..20)
                    .filter(|&j| j != i)
                    .min_by(|&a, &b| {
                        euclidean(points[i], points[a]).total_cmp(&euclidean(points[i], points[b]))
                    })
                    .unwrap();
                (nearest < 10) == (i < 10)
            })
            .count();
        assert!(same_cluster_neighbours >= 18, "{same_cluster_neighbours}/20");
    }

    #[test]
    fn test_too_few_rows_is_an_error() {
        let device = Default::default();
        let features = Tensor::<TB, 2>::from_floats([[0.0, 1.0], [1.0, 0.0], [2.0, 2.0]], &device);
        let err = tsne_2d(features).unwrap_err();
        assert!(err.to_string().contains("at least 4 rows"));
    }
}
