// ============================================================
// Layer 6 — Local Experiment Tracker
// ============================================================
// Records a run's hyperparameters and metrics in its directory.
//
//   metrics.jsonl - one JSON object per line:
//     {"kind":"hparams","hparams":{...}}
//     {"kind":"step","step":20,"metrics":{"train/loss":0.41}}
//     {"kind":"epoch","epoch":1,"metrics":{...}}
//     {"kind":"summary","metrics":{"test/divergence":0.37}}
//
//   epochs.csv - epoch,<metric keys of the first epoch...>
//     Keys missing in a later epoch are left empty.
//
// Example CSV output:
//   epoch,lr,train/divergence,val/divergence
//   1,0.0001,0.912345,0.887654
//   2,0.0001,0.701234,0.713456
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::hparams::Hyperparameters;
use crate::domain::traits::{ExperimentTracker, Metrics};

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Record<'a> {
    Hparams { hparams: &'a Hyperparameters },
    Step { step: usize, metrics: &'a Metrics },
    Epoch { epoch: usize, metrics: &'a Metrics },
    Summary { metrics: &'a Metrics },
}

pub struct LocalTracker {
    jsonl:       File,
    csv_path:    PathBuf,
    csv:         Option<csv::Writer<File>>,
    csv_columns: Vec<String>,
}

impl LocalTracker {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let jsonl_path = dir.join("metrics.jsonl");
        let jsonl = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&jsonl_path)
            .with_context(|| format!("Cannot open '{}'", jsonl_path.display()))?;

        Ok(Self {
            jsonl,
            csv_path: dir.join("epochs.csv"),
            csv: None,
            csv_columns: Vec::new(),
        })
    }

    fn append(&mut self, record: &Record) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.jsonl, "{line}")?;
        self.jsonl.flush()?;
        Ok(())
    }

    fn append_csv(&mut self, epoch: usize, metrics: &Metrics) -> Result<()> {
        if self.csv.is_none() {
            let mut writer = csv::Writer::from_path(&self.csv_path)
                .with_context(|| format!("Cannot create '{}'", self.csv_path.display()))?;
            self.csv_columns = metrics.keys().cloned().collect();

            let mut header = vec!["epoch".to_string()];
            header.extend(self.csv_columns.iter().cloned());
            writer.write_record(&header)?;
            self.csv = Some(writer);
        }

        let mut row = vec![epoch.to_string()];
        row.extend(
            self.csv_columns
                .iter()
                .map(|k| metrics.get(k).map(|v| format!("{v:.6}")).unwrap_or_default()),
        );
        if let Some(writer) = self.csv.as_mut() {
            writer.write_record(&row)?;
            writer.flush()?;
        }
        Ok(())
    }
}

impl ExperimentTracker for LocalTracker {
    fn log_hparams(&mut self, hparams: &Hyperparameters) -> Result<()> {
        self.append(&Record::Hparams { hparams })
    }

    fn log_step(&mut self, step: usize, metrics: &Metrics) -> Result<()> {
        self.append(&Record::Step { step, metrics })
    }

    fn log_epoch(&mut self, epoch: usize, metrics: &Metrics) -> Result<()> {
        self.append(&Record::Epoch { epoch, metrics })?;
        self.append_csv(epoch, metrics)?;
        tracing::debug!("Logged epoch {} ({} metrics)", epoch, metrics.len());
        Ok(())
    }

    fn log_summary(&mut self, metrics: &Metrics) -> Result<()> {
        self.append(&Record::Summary { metrics })
    }
}
