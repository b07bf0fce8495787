// ============================================================
// Layer 6 — Run Directories
// ============================================================
// Every training run gets its own directory under exp_dir:
//
//   domain adapter: {exp_dir}/{source_target}/domain_adapter/{run_id}/
//   DSN:            {exp_dir}/{source_target}/DSN/{run_id}/
//   fine-tuning:    {exp_dir}/{data_module}_ft/{source}/{run_id}/
//
// Contents:
//   hparams.json        ← written before training starts
//   tokenizer.json      ← tokenizer used to encode the data
//   checkpoints/        ← best.mpk.gz + best.json
//   metrics.jsonl       ← hparams / step / epoch / summary records
//   epochs.csv          ← one row per epoch
//   adapter.mpk.gz      ← trained adapters (domain adapter runs)
//   encoder.mpk.gz      ← fine-tuned encoder (fine-tuning runs)

use anyhow::{Context, Result};
use rand::{distributions::Alphanumeric, Rng};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::hparams::{Hyperparameters, ObjectiveParams};

pub const RUN_ID_LEN: usize = 8;

/// Random lowercase alphanumeric id, e.g. "k3x9q0az".
pub fn generate_run_id<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(RUN_ID_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Parent directory of all runs of this experiment kind.
pub fn experiment_root(hp: &Hyperparameters) -> PathBuf {
    let exp_dir = Path::new(&hp.exp_dir);
    match &hp.objective {
        ObjectiveParams::DomainAdapter(_) => exp_dir
            .join(hp.source_target.to_string())
            .join("domain_adapter"),
        ObjectiveParams::Dsn(_) => exp_dir.join(hp.source_target.to_string()).join("DSN"),
        ObjectiveParams::FineTune(_) => exp_dir
            .join(format!("{}_ft", hp.data_module.as_str()))
            .join(&hp.source_target.source),
    }
}

#[derive(Debug, Clone)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    /// Create a fresh run directory for `hp`.
    pub fn create(hp: &Hyperparameters) -> Result<Self> {
        let root = experiment_root(hp).join(generate_run_id(&mut rand::thread_rng()));
        fs::create_dir_all(&root)
            .with_context(|| format!("Cannot create run dir '{}'", root.display()))?;
        tracing::info!("Run directory: {}", root.display());
        Ok(Self { root })
    }

    /// Open an existing run directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            anyhow::bail!("Run dir '{}' does not exist", root.display());
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn hparams_path(&self) -> PathBuf {
        self.root.join("hparams.json")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    /// Extension-less; the recorder adds `.mpk.gz`.
    pub fn adapter_path(&self) -> PathBuf {
        self.root.join("adapter")
    }

    /// Extension-less; the recorder adds `.mpk.gz`.
    pub fn encoder_path(&self) -> PathBuf {
        self.root.join("encoder")
    }

    pub fn save_hparams(&self, hp: &Hyperparameters) -> Result<()> {
        let path = self.hparams_path();
        fs::write(&path, serde_json::to_string_pretty(hp)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_hparams(&self) -> Result<Hyperparameters> {
        let path = self.hparams_path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid hyperparameter file", path.display()))
    }
}
