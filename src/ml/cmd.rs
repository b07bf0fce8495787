// ============================================================
// Layer 5 — Central Moment Discrepancy
// ============================================================
// CMD compares two feature distributions through their moments
// (Zellinger et al., 2017):
//
//   CMD(X, Y) = ‖E[X] − E[Y]‖₂
//             + Σ_{k=2..K} ‖ E[(X − E[X])^k] − E[(Y − E[Y])^k] ‖₂
//
// X is [n1, d], Y is [n2, d]; expectations run over the rows.
// K = n_moments (5 in the reference formulation).
//
// Properties relied on by the objectives and tests:
//   CMD(X, X) = 0,  CMD(X, Y) ≥ 0,  CMD(X, Y) = CMD(Y, X)
//
// Central powers are built by repeated multiplication: a float
// power of a negative base is NaN on several backends, and odd
// moments are mostly negative values.

use burn::prelude::*;

use crate::ml::encoder::cls_token;

pub const DEFAULT_MOMENTS: usize = 5;

/// Keeps d/ds of the norm finite when two moments coincide exactly.
const NORM_EPS: f64 = 1e-12;

pub fn cmd<B: Backend>(x1: Tensor<B, 2>, x2: Tensor<B, 2>, n_moments: usize) -> Tensor<B, 1> {
    let m1 = x1.clone().mean_dim(0);
    let m2 = x2.clone().mean_dim(0);
    let c1 = x1 - m1.clone();
    let c2 = x2 - m2.clone();

    let mut total = moment_distance(m1, m2);

    let mut p1 = c1.clone();
    let mut p2 = c2.clone();
    for _ in 2..=n_moments {
        p1 = p1 * c1.clone();
        p2 = p2 * c2.clone();
        total = total + moment_distance(p1.clone().mean_dim(0), p2.clone().mean_dim(0));
    }
    total
}

/// ‖a − b‖₂ computed as √(s + ε) − √ε, which is exactly 0 when
/// a == b and has a finite gradient there.
fn moment_distance<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = a - b;
    let squared = (diff.clone() * diff).sum();
    squared.add_scalar(NORM_EPS).sqrt().sub_scalar(NORM_EPS.sqrt())
}

/// Sum of CMD over every hidden-state layer.
///
/// Each hidden state holds the source rows first and the target
/// rows after them (`n_source` rows, then the rest). The [CLS]
/// vector of each row is the feature compared.
pub fn layerwise_cmd<B: Backend>(
    hidden_states: Vec<Tensor<B, 3>>,
    n_source:      usize,
    n_moments:     usize,
    device:        &B::Device,
) -> Tensor<B, 1> {
    let mut total = Tensor::<B, 1>::zeros([1], device);
    for hidden in hidden_states {
        let features = cls_token(hidden);
        let [rows, d_model] = features.dims();
        let source = features.clone().slice([0..n_source, 0..d_model]);
        let target = features.slice([n_source..rows, 0..d_model]);
        total = total + cmd(source, target, n_moments);
    }
    total
}
