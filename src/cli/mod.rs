// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All experiment logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `train-adapter`   - trains CMD domain adapters
//   2. `train-dsn`       - trains a domain separation network
//   3. `train-ft`        - fine-tuning baseline
//   4. `representations` - layer-wise PCA / t-SNE of a trained adapter
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, RepresentationsArgs};

use crate::application::experiment::RunSummary;

#[derive(Parser, Debug)]
#[command(
    name = "domadapter",
    version,
    about = "Domain adaptation experiments with adapters, DSN, and fine-tuning."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        use crate::application::{
            train_adapter::TrainAdapterUseCase, train_dsn::TrainDsnUseCase,
            train_ft::TrainFineTuneUseCase,
        };

        match self.command {
            Commands::TrainAdapter(args) => {
                tracing::info!("Training domain adapter on {}", args.common.source_target);
                report(TrainAdapterUseCase::new(args.into()).execute()?);
            }
            Commands::TrainDsn(mut args) => {
                tracing::info!("Training DSN on {}", args.common.source_target);
                let adapter_run = args.domain_adapter.take();
                report(TrainDsnUseCase::new(args.into(), adapter_run).execute()?);
            }
            Commands::TrainFt(args) => {
                tracing::info!("Fine-tuning on {}", args.common.source_target);
                report(TrainFineTuneUseCase::new(args.into()).execute()?);
            }
            Commands::Representations(args) => run_representations(args)?,
        }
        Ok(())
    }
}

fn run_representations(args: RepresentationsArgs) -> Result<()> {
    use crate::application::representations::RepresentationsUseCase;

    let gpu = args.gpu;
    let use_case = RepresentationsUseCase {
        run_dir:    args.run_dir,
        source:     args.source,
        target:     args.target,
        output_dir: args.output_dir,
        reduction:  args.reduction,
        bsz:        args.bsz,
    };
    let written = use_case.execute(gpu)?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn report(summary: RunSummary) {
    println!("\nRun finished: {}", summary.run_dir.display());
    for (key, value) in &summary.test_metrics {
        println!("  {key:<24} {value:.4}");
    }
}
