// ============================================================
// Layer 3 — Hyperparameters
// ============================================================
// One flat record holding every option of a run. It is built
// once from the CLI arguments, validated, written next to the
// checkpoints as hparams.json, and then only ever borrowed.
//
// Objective-specific options live in `ObjectiveParams`, which is
// flattened into the same JSON object and tagged with an
// "experiment" key:
//
//   {
//     "bsz": 32,
//     "learning_rate": 0.0001,
//     ...
//     "experiment": "dsn",
//     "hidden_size": 512,
//     "diff_weight": 0.3,
//     ...
//   }

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::domain::source_target::SourceTarget;

/// Which CSV layout the dataset directory uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DataModuleKind {
    /// premise,hypothesis,label
    Mnli,
    /// sentence,label
    Sa,
}

impl DataModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataModuleKind::Mnli => "mnli",
            DataModuleKind::Sa   => "sa",
        }
    }
}

/// How sequences are padded inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// Pad every sequence to `max_seq_length`
    MaxLength,
    /// Pad to the longest sequence in the batch
    Longest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub bsz:                   usize,
    pub train_proportion:      f64,
    pub dev_proportion:        f64,
    pub test_proportion:       f64,
    pub source_target:         SourceTarget,
    pub num_classes:           usize,
    pub dataset_cache_dir:     String,
    pub exp_dir:               String,
    pub seed:                  u64,
    pub learning_rate:         f64,
    pub epochs:                usize,
    pub gpu:                   Option<usize>,
    pub pretrained_model_name: String,
    pub models_dir:            String,
    pub max_seq_length:        usize,
    pub padding:               Padding,
    pub data_module:           DataModuleKind,
    pub log_freq:              usize,
    #[serde(flatten)]
    pub objective:             ObjectiveParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "experiment", rename_all = "snake_case")]
pub enum ObjectiveParams {
    DomainAdapter(AdapterParams),
    Dsn(DsnParams),
    FineTune(FineTuneParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterParams {
    pub domain_adapter_name: String,
    pub reduction_factor:    usize,
    pub n_moments:           usize,
    pub betas:               (f32, f32),
    pub eps:                 f32,
    pub weight_decay:        f32,
    pub scheduler_factor:    f64,
    pub scheduler_patience:  usize,
    pub scheduler_threshold: f64,
    pub scheduler_cooldown:  usize,
    pub scheduler_eps:       f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsnParams {
    pub hidden_size:      usize,
    pub reduction_factor: usize,
    pub n_moments:        usize,
    pub diff_weight:      f64,
    pub sim_weight:       f64,
    pub recon_weight:     f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineTuneParams {
    pub gradient_clip_norm: f32,
}

impl Hyperparameters {
    /// Reject option combinations that would only fail later,
    /// deep inside a training run.
    pub fn validate(&self) -> Result<()> {
        if self.bsz == 0 {
            bail!("bsz must be at least 1");
        }
        if self.epochs == 0 {
            bail!("epochs must be at least 1");
        }
        for (name, p) in [
            ("train_proportion", self.train_proportion),
            ("dev_proportion",   self.dev_proportion),
            ("test_proportion",  self.test_proportion),
        ] {
            if !(p > 0.0 && p <= 1.0) {
                bail!("{name} must be in (0, 1], got {p}");
            }
        }
        if !(self.learning_rate > 0.0) {
            bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        if self.num_classes < 2 {
            bail!("num_classes must be at least 2, got {}", self.num_classes);
        }
        if self.max_seq_length < 3 {
            bail!("max_seq_length must leave room for [CLS] and [SEP]");
        }
        if self.log_freq == 0 {
            bail!("log_freq must be at least 1");
        }

        match &self.objective {
            ObjectiveParams::DomainAdapter(p) => {
                check_moments(p.n_moments)?;
                check_reduction(p.reduction_factor)?;
                if !(p.scheduler_factor > 0.0 && p.scheduler_factor < 1.0) {
                    bail!("scheduler_factor must be in (0, 1), got {}", p.scheduler_factor);
                }
            }
            ObjectiveParams::Dsn(p) => {
                check_moments(p.n_moments)?;
                check_reduction(p.reduction_factor)?;
                if p.hidden_size == 0 {
                    bail!("hidden_size must be at least 1");
                }
                for (name, w) in [
                    ("diff_weight",  p.diff_weight),
                    ("sim_weight",   p.sim_weight),
                    ("recon_weight", p.recon_weight),
                ] {
                    if w < 0.0 || !w.is_finite() {
                        bail!("{name} must be a non-negative number, got {w}");
                    }
                }
            }
            ObjectiveParams::FineTune(p) => {
                if !(p.gradient_clip_norm > 0.0) {
                    bail!("gradient_clip_norm must be positive");
                }
            }
        }
        Ok(())
    }

    /// Sequences longer than the position table cannot be embedded.
    pub fn check_positions(&self, max_positions: usize) -> Result<()> {
        if self.max_seq_length > max_positions {
            bail!(
                "max_seq_length {} exceeds the {} positions supported by '{}'",
                self.max_seq_length,
                max_positions,
                self.pretrained_model_name
            );
        }
        Ok(())
    }
}

fn check_moments(n: usize) -> Result<()> {
    if n == 0 {
        bail!("n_moments must be at least 1");
    }
    Ok(())
}

fn check_reduction(r: usize) -> Result<()> {
    if r == 0 {
        bail!("reduction_factor must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_hparams(objective: ObjectiveParams) -> Hyperparameters {
        Hyperparameters {
            bsz:                   4,
            train_proportion:      1.0,
            dev_proportion:        1.0,
            test_proportion:       1.0,
            source_target:         SourceTarget::new("slate", "travel"),
            num_classes:           3,
            dataset_cache_dir:     "data/mnli".to_string(),
            exp_dir:               "experiments".to_string(),
            seed:                  1729,
            learning_rate:         1e-4,
            epochs:                2,
            gpu:                   None,
            pretrained_model_name: "bert-tiny".to_string(),
            models_dir:            "models".to_string(),
            max_seq_length:        32,
            padding:               Padding::MaxLength,
            data_module:           DataModuleKind::Mnli,
            log_freq:              1,
            objective,
        }
    }

    pub(crate) fn dsn_params() -> ObjectiveParams {
        ObjectiveParams::Dsn(DsnParams {
            hidden_size:      16,
            reduction_factor: 4,
            n_moments:        5,
            diff_weight:      0.3,
            sim_weight:       1.0,
            recon_weight:     0.1,
        })
    }

    #[test]
    fn test_json_is_flat_and_tagged() {
        let hp = sample_hparams(dsn_params());
        let value = serde_json::to_value(&hp).unwrap();
        assert_eq!(value["experiment"], "dsn");
        assert_eq!(value["hidden_size"], 16);
        assert_eq!(value["source_target"], "slate_travel");
        assert_eq!(value["padding"], "max_length");

        let back: Hyperparameters = serde_json::from_value(value).unwrap();
        assert_eq!(back, hp);
    }

    #[test]
    fn test_valid_config_passes() {
        let hp = sample_hparams(ObjectiveParams::FineTune(FineTuneParams { gradient_clip_norm: 5.0 }));
        assert!(hp.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_proportion() {
        let mut hp = sample_hparams(dsn_params());
        hp.dev_proportion = 0.0;
        assert!(hp.validate().is_err());
        hp.dev_proportion = 1.5;
        assert!(hp.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_loss_weight() {
        let mut hp = sample_hparams(dsn_params());
        if let ObjectiveParams::Dsn(p) = &mut hp.objective {
            p.diff_weight = -0.1;
        }
        assert!(hp.validate().is_err());
    }

    #[test]
    fn test_position_limit() {
        let hp = sample_hparams(dsn_params());
        assert!(hp.check_positions(512).is_ok());
        assert!(hp.check_positions(16).is_err());
    }
}
