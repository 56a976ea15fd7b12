//! Train a two-layer network on a spiral dataset and print the per-epoch report.
//!
//! ```bash
//! cargo run --release --bin spiral -- --epochs 10000 --lr 1.0
//! cargo run --release --bin spiral -- --data spiral.json
//! ```
//!
//! stdout is a JSON array of `[epoch, accuracy, loss]` triples.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;

use rust_backprop::{
    Activation, Dataset, Driver, FitConfig, FitReport, LrSchedule, NetworkBuilder, SimpleDriver,
    SpiralConfig, spiral,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DriverKind {
    Simple,
    #[cfg(feature = "matrixmultiply")]
    Gemm,
}

#[derive(Parser, Debug)]
#[command(
    name = "spiral",
    about = "Train a dense ReLU + softmax network on a spiral dataset"
)]
struct Args {
    /// Number of full-batch epochs
    #[arg(long, default_value_t = 10_000)]
    epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 1.0)]
    lr: f64,

    /// Inverse-time learning-rate decay (0 keeps the rate constant)
    #[arg(long, default_value_t = 0.0)]
    decay: f64,

    /// Hidden layer width
    #[arg(long, default_value_t = 64)]
    hidden: usize,

    /// Load `{"X": [[..]], "y": [..]}` from this file instead of generating a spiral
    #[arg(long)]
    data: Option<PathBuf>,

    /// Spiral arms (classes)
    #[arg(long, default_value_t = 3)]
    classes: usize,

    /// Points per arm
    #[arg(long, default_value_t = 100)]
    samples: usize,

    /// Spiral twist in radians
    #[arg(long, default_value_t = 5.0)]
    twist: f64,

    /// Angular noise
    #[arg(long, default_value_t = 0.1)]
    dispersion: f64,

    /// Seed for the dataset and the weight initialization
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// After training, print every Nth epoch's metrics to stderr (0 disables)
    #[arg(long, default_value_t = 1000)]
    log_every: usize,

    /// Numeric backend
    #[arg(long, value_enum, default_value_t = DriverKind::Simple)]
    driver: DriverKind,
}

fn load_dataset(args: &Args) -> rust_backprop::Result<Dataset> {
    match &args.data {
        Some(path) => Dataset::from_json_path(path),
        None => {
            let cfg = SpiralConfig {
                classes: args.classes,
                samples: args.samples,
                twist: args.twist,
                dispersion: args.dispersion,
            };
            spiral(&cfg, &mut StdRng::seed_from_u64(args.seed))
        }
    }
}

fn run<D: Driver>(driver: D, args: &Args, train: &Dataset) -> rust_backprop::Result<FitReport> {
    let mut net = NetworkBuilder::new(train.input_dim())?
        .add_layer(args.hidden, Activation::ReLU)?
        .add_layer(train.num_classes(), Activation::Identity)?
        .build_with_seed(driver, args.seed)?;

    let lr_schedule = if args.decay > 0.0 {
        LrSchedule::InverseTime { decay: args.decay }
    } else {
        LrSchedule::Constant
    };
    let cfg = FitConfig {
        epochs: args.epochs,
        lr: args.lr,
        lr_schedule,
        log_every: args.log_every,
    };

    let report = net.fit(train, &cfg)?;
    if args.log_every > 0 {
        for e in report.epochs.iter().step_by(args.log_every) {
            eprintln!(
                "epoch {:>6}  loss {:.6}  accuracy {:.4}  lr {:.5}",
                e.epoch, e.loss, e.accuracy, e.lr
            );
        }
    }
    Ok(report)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = load_dataset(&args).and_then(|train| match args.driver {
        DriverKind::Simple => run(SimpleDriver, &args, &train),
        #[cfg(feature = "matrixmultiply")]
        DriverKind::Gemm => run(rust_backprop::GemmDriver, &args, &train),
    });

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(last) = report.last() {
        eprintln!(
            "final: epoch {} loss {:.6} accuracy {:.4}",
            last.epoch, last.loss, last.accuracy
        );
    }

    let triples: Vec<(usize, f64, f64)> = report
        .epochs
        .iter()
        .map(|e| (e.epoch, e.accuracy, e.loss))
        .collect();
    match serde_json::to_string(&triples) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: cannot encode report: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn log_every_help_describes_the_post_training_summary() {
        let cmd = Args::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "log_every")
            .unwrap();
        let help = arg.get_help().unwrap().to_string();
        assert!(help.starts_with("After training"), "{help}");
    }

    #[test]
    fn defaults_match_the_reference_run() {
        let args = Args::try_parse_from(["spiral"]).unwrap();
        assert_eq!(args.epochs, 10_000);
        assert_eq!(args.hidden, 64);
        assert_eq!(args.log_every, 1000);
        assert!(args.data.is_none());

        let args = Args::try_parse_from(["spiral", "--log-every", "0", "--lr", "0.5"]).unwrap();
        assert_eq!(args.log_every, 0);
        assert_eq!(args.lr, 0.5);
    }
}
