// ============================================================
// Layer 5 — Layer Representations
// ============================================================
// Collects the [CLS] vector of every transformer block for a set
// of batches and projects each layer to 2-D with PCA or t-SNE,
// giving one scatter plot per layer (source vs target).
//
//   batches ──encoder──► hidden states 1..=N ──cls──► [rows, d]
//                                                     │ pca_2d / tsne_2d
//                                                     ▼
//                                             layer_{i}.csv (x,y,label)

use anyhow::{Context, Result};
use burn::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::data::batcher::TextBatch;
use crate::ml::encoder::{cls_token, TransformerEncoder};
use crate::ml::pca::pca_2d;
use crate::ml::tsne::tsne_2d;

/// [CLS] features of blocks 1..=N; the embedding output is skipped.
/// Returns one `[total_rows, d_model]` tensor per block.
pub fn layer_features<B: Backend>(
    encoder: &TransformerEncoder<B>,
    batches: impl IntoIterator<Item = TextBatch<B>>,
) -> Vec<Tensor<B, 2>> {
    let mut per_layer: Vec<Vec<Tensor<B, 2>>> = vec![Vec::new(); encoder.num_layers()];
    for batch in batches {
        let hidden = encoder.forward(batch.input_ids, batch.attention_mask);
        for (layer, h) in hidden.into_iter().skip(1).enumerate() {
            per_layer[layer].push(cls_token(h));
        }
    }
    per_layer
        .into_iter()
        .filter(|chunks| !chunks.is_empty())
        .map(|chunks| Tensor::cat(chunks, 0))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub x:     f32,
    pub y:     f32,
    pub label: String,
}

/// PCA-project one layer's source ∪ target features.
/// `labels` must hold one entry per row.
pub fn project_layer<B: Backend>(features: Tensor<B, 2>, labels: &[String]) -> Vec<PlotPoint> {
    let coords: Vec<f32> = pca_2d(features).into_data().iter::<f32>().collect();
    plot_points(&coords, labels)
}

/// t-SNE counterpart of [`project_layer`].
pub fn embed_layer<B: Backend>(features: Tensor<B, 2>, labels: &[String]) -> Result<Vec<PlotPoint>> {
    let coords = tsne_2d(features)?;
    Ok(plot_points(&coords, labels))
}

fn plot_points(coords: &[f32], labels: &[String]) -> Vec<PlotPoint> {
    coords
        .chunks(2)
        .zip(labels)
        .map(|(xy, label)| PlotPoint { x: xy[0], y: xy[1], label: label.clone() })
        .collect()
}

/// Writes `{dir}/layer_{layer}.csv` and returns its path.
pub fn write_layer_csv(dir: &Path, layer: usize, points: &[PlotPoint]) -> Result<PathBuf> {
    let path = dir.join(format!("layer_{layer}.csv"));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    for point in points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(path)
}
