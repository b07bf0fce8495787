// ============================================================
// Layer 5 — Classification Scores
// ============================================================
// Accuracy and macro-averaged F1 over classes 0..num_classes.
//
//   precision_c = tp_c / (tp_c + fp_c)
//   recall_c    = tp_c / (tp_c + fn_c)
//   f1_c        = 2 · p · r / (p + r)      (0 when p + r = 0)
//   macro F1    = mean over classes of f1_c

pub fn accuracy(predicted: &[i64], labels: &[i64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(labels).filter(|(p, l)| p == l).count();
    correct as f64 / labels.len() as f64
}

pub fn macro_f1(predicted: &[i64], labels: &[i64], num_classes: usize) -> f64 {
    if labels.is_empty() || num_classes == 0 {
        return 0.0;
    }

    let mut tp = vec![0usize; num_classes];
    let mut fp = vec![0usize; num_classes];
    let mut fn_ = vec![0usize; num_classes];

    for (&p, &l) in predicted.iter().zip(labels) {
        let in_range = |c: i64| c >= 0 && (c as usize) < num_classes;
        if p == l {
            if in_range(p) {
                tp[p as usize] += 1;
            }
        } else {
            if in_range(p) {
                fp[p as usize] += 1;
            }
            if in_range(l) {
                fn_[l as usize] += 1;
            }
        }
    }

    let total: f64 = (0..num_classes)
        .map(|c| {
            let precision = ratio(tp[c], tp[c] + fp[c]);
            let recall    = ratio(tp[c], tp[c] + fn_[c]);
            if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            }
        })
        .sum();
    total / num_classes as f64
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 2, 2], &[0, 1, 1, 2]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_perfect_predictions_give_f1_of_one() {
        assert!((macro_f1(&[0, 1, 2], &[0, 1, 2], 3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unseen_class_counts_as_zero() {
        // Class 2 is never predicted nor present: contributes 0.
        let f1 = macro_f1(&[0, 1], &[0, 1], 3);
        assert!((f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mixed_predictions() {
        // class 0: tp=1 fp=1 fn=0 → p=0.5 r=1 → f1=2/3
        // class 1: tp=1 fp=0 fn=1 → p=1 r=0.5 → f1=2/3
        let f1 = macro_f1(&[0, 0, 1], &[0, 1, 1], 2);
        assert!((f1 - 2.0 / 3.0).abs() < 1e-12);
    }
}
