// ============================================================
// Layer 5 — Reduce-LR-on-Plateau
// ============================================================
// Lowers the learning rate when a monitored metric stops
// improving. Stepped once per epoch.
//
//   improvement (min, relative threshold):  a < best · (1 − threshold)
//   improvement (max, relative threshold):  a > best · (1 + threshold)
//
//   after more than `patience` epochs without improvement:
//       lr ← max(lr · factor, min_lr)   (skipped if the change ≤ eps)
//       then wait `cooldown` epochs before counting again

use serde::{Deserialize, Serialize};

/// Direction in which a monitored metric is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Min,
    Max,
}

impl Mode {
    /// Strict improvement of `value` over `best`.
    pub fn improves(&self, value: f64, best: f64) -> bool {
        match self {
            Mode::Min => value < best,
            Mode::Max => value > best,
        }
    }

    pub fn worst(&self) -> f64 {
        match self {
            Mode::Min => f64::INFINITY,
            Mode::Max => f64::NEG_INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateauConfig {
    pub mode:      Mode,
    pub factor:    f64,
    pub patience:  usize,
    pub threshold: f64,
    pub cooldown:  usize,
    pub min_lr:    f64,
    pub eps:       f64,
}

impl PlateauConfig {
    pub fn init(self) -> ReduceLrOnPlateau {
        ReduceLrOnPlateau {
            best:              self.mode.worst(),
            num_bad_epochs:    0,
            cooldown_counter:  0,
            config:            self,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    config:           PlateauConfig,
    best:             f64,
    num_bad_epochs:   usize,
    cooldown_counter: usize,
}

impl ReduceLrOnPlateau {
    fn is_better(&self, value: f64) -> bool {
        let t = self.config.threshold;
        match self.config.mode {
            Mode::Min => value < self.best * (1.0 - t),
            Mode::Max => value > self.best * (1.0 + t),
        }
    }

    /// Feed one epoch's metric; returns the learning rate to use next.
    pub fn step(&mut self, metric: f64, lr: f64) -> f64 {
        if self.is_better(metric) {
            self.best = metric;
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.cooldown_counter > 0 {
            self.cooldown_counter -= 1;
            self.num_bad_epochs = 0;
        }

        if self.num_bad_epochs > self.config.patience {
            self.cooldown_counter = self.config.cooldown;
            self.num_bad_epochs = 0;
            let new_lr = (lr * self.config.factor).max(self.config.min_lr);
            if lr - new_lr > self.config.eps {
                tracing::info!("Reducing learning rate: {:.3e} → {:.3e}", lr, new_lr);
                return new_lr;
            }
        }
        lr
    }
}
