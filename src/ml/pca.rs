// ============================================================
// Layer 5 — 2-D PCA
// ============================================================
// Projects [n, d] features onto their first two principal
// components for plotting.
//
//   X̄   = X − mean(X)
//   C   = X̄ᵀ X̄ / (n − 1)                  [d, d]
//   v_k = power iteration on C, re-orthogonalised against
//         v_1..v_{k-1} after every multiplication
//   out = X̄ · [v_1 v_2]                    [n, 2]
//
// The start vector is fixed (1, 2, …, d) so projections are
// reproducible between runs; the sign of each axis is arbitrary.

use burn::prelude::*;

const POWER_ITERATIONS: usize = 100;
const NORM_EPS: f64 = 1e-12;

pub fn pca_2d<B: Backend>(features: Tensor<B, 2>) -> Tensor<B, 2> {
    let [n, d] = features.dims();
    let device = features.device();

    let centered = features.clone() - features.mean_dim(0);
    let denom = (n.max(2) - 1) as f64;
    let covariance = centered.clone().transpose().matmul(centered.clone()).div_scalar(denom);

    let mut components: Vec<Tensor<B, 2>> = Vec::with_capacity(2);
    for _ in 0..2 {
        let start = Tensor::<B, 1, Int>::arange(1..d as i64 + 1, &device)
            .float()
            .reshape([d, 1]);
        let mut v = normalize(orthogonalize(start, &components));
        for _ in 0..POWER_ITERATIONS {
            v = normalize(orthogonalize(covariance.clone().matmul(v), &components));
        }
        components.push(v);
    }

    centered.matmul(Tensor::cat(components, 1))
}

/// Removes from `v` its projection on every (unit) vector in `basis`.
fn orthogonalize<B: Backend>(mut v: Tensor<B, 2>, basis: &[Tensor<B, 2>]) -> Tensor<B, 2> {
    for u in basis {
        let overlap = u.clone().transpose().matmul(v.clone());
        v = v - u.clone() * overlap;
    }
    v
}

fn normalize<B: Backend>(v: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = (v.clone() * v.clone()).sum().add_scalar(NORM_EPS).sqrt();
    v / norm.reshape([1, 1])
}
