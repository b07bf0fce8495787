// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores module weights using Burn's default file
// recorder (named MessagePack + gzip, full precision, `.mpk.gz`).
//
// A run keeps a single best checkpoint (save-top-1):
//
//   checkpoints/
//     best.mpk.gz   ← weights of the best epoch so far
//     best.json     ← {"epoch": 3, "monitor": "val/divergence", "value": 0.41}
//
// The recorder appends the `.mpk.gz` extension itself, so every
// path handed to it is extension-less.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Which epoch the best checkpoint came from and why it won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCheckpoint {
    pub epoch:   usize,
    pub monitor: String,
    pub value:   f64,
}

type FileRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the best checkpoint with `model`.
    pub fn save_best<B: Backend, M: Module<B>>(&self, model: &M, info: &BestCheckpoint) -> Result<()> {
        save_module::<B, M>(model, &self.dir.join("best"))?;

        let info_path = self.dir.join("best.json");
        fs::write(&info_path, serde_json::to_string_pretty(info)?)
            .with_context(|| format!("Cannot write '{}'", info_path.display()))?;

        tracing::debug!(
            "Saved best checkpoint: epoch {} ({}={:.4})",
            info.epoch, info.monitor, info.value
        );
        Ok(())
    }

    /// Metadata of the best checkpoint, or None before the first save.
    pub fn best_info(&self) -> Result<Option<BestCheckpoint>> {
        let path = self.dir.join("best.json");
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(Some(serde_json::from_str(&s)?))
    }

    /// Load the best weights into `model`. The architecture of
    /// `model` must match the saved one.
    pub fn load_best<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        load_module::<B, M>(model, &self.dir.join("best"), device)
            .context("Cannot load best checkpoint. Has the run finished an epoch?")
    }
}

/// Write `module`'s record to `{path}.mpk.gz`.
pub fn save_module<B: Backend, M: Module<B>>(module: &M, path: &Path) -> Result<()> {
    FileRecorder::new()
        .record(module.clone().into_record(), path.to_path_buf())
        .with_context(|| format!("Failed to save record to '{}'", path.display()))
}

/// Restore `module` from `{path}.mpk.gz`.
pub fn load_module<B: Backend, M: Module<B>>(module: M, path: &Path, device: &B::Device) -> Result<M> {
    let record = FileRecorder::new()
        .load(path.to_path_buf(), device)
        .with_context(|| format!("Cannot load record '{}'", path.display()))?;
    Ok(module.load_record(record))
}

/// `{path}.mpk.gz` exists, i.e. something was saved at `path`.
pub fn record_exists(path: &Path) -> bool {
    let mut file = path.as_os_str().to_owned();
    file.push(".mpk.gz");
    PathBuf::from(file).exists()
}
