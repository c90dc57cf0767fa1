// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — trains an encoder and evaluates it on the
//                   held-out test units
//   2. `evaluate` — reloads a saved run and re-scores the test
//                   units
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

use crate::infra::evaluation::ClassificationReport;

#[derive(Parser, Debug)]
#[command(
    name = "transient-gru",
    version = "0.1.0",
    about = "Train a stateful recurrent classifier for transient events in long time series."
)]
pub struct Cli {
    /// The subcommand to run (train or evaluate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => Self::run_train(args),
            Commands::Evaluate(args) => Self::run_evaluate(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training ({:?} architecture)", args.architecture);

        // Convert CLI args → application config (separates presentation from domain)
        let use_case = TrainUseCase::new(args.into());
        let summary = use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        for (i, (train, val)) in summary.history.train_loss.iter().zip(&summary.history.val_loss).enumerate() {
            println!("  epoch {:>3}: train_loss={:.4} val_loss={:.4}", i + 1, train, val);
        }
        if let Some(best) = &summary.best_epoch {
            println!("Best validation loss {:.4} at epoch {}", best.val_loss, best.epoch);
        }
        if let Some(report) = &summary.report {
            print_report(report);
        }
        Ok(())
    }

    fn run_evaluate(args: EvaluateArgs) -> Result<()> {
        use crate::application::evaluate_use_case::EvaluateUseCase;

        let use_case = EvaluateUseCase::new(args.checkpoint_dir, args.report_dir);
        match use_case.execute()? {
            Some(report) => print_report(&report),
            None => println!("No test units to evaluate."),
        }
        Ok(())
    }
}

fn print_report(r: &ClassificationReport) {
    println!("\nTest results over {} timesteps:", r.samples);
    println!("  accuracy            {:.4}", r.accuracy);
    println!("  precision (event)   {:.4}", r.precision_event);
    println!("  recall    (event)   {:.4}", r.recall_event);
    println!("  precision (none)    {:.4}", r.precision_background);
    println!("  recall    (none)    {:.4}", r.recall_background);
    println!("  f1        (event)   {:.4}", r.f1_event);
    match r.roc_auc {
        Some(auc) => println!("  roc auc             {:.4}", auc),
        None      => println!("  roc auc             n/a (single class)"),
    }
    let cm = &r.confusion;
    println!("  confusion [[tn fp] [fn tp]] = [[{} {}] [{} {}]]",
        cm.true_negative, cm.false_positive, cm.false_negative, cm.true_positive);
}
