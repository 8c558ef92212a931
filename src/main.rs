use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tabclean::learner::{ClusLearner, Heuristic};
use tabclean::pipeline::{run_pipeline, CleanerConfig, Mode};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabclean")]
#[command(about = "Dependency-driven tabular data cleaning")]
struct Args {
    /// Dataset CSV file
    dataset: PathBuf,

    /// Dependency rule file (CFD lines unless --fd is given)
    rules: PathBuf,

    /// Known-correct copy of the dataset, scored against after cleaning
    #[arg(long)]
    ground_truth: Option<PathBuf>,

    /// Directory for per-job training/test/output files
    #[arg(long, default_value = "exp")]
    workdir: PathBuf,

    /// Splitting criterion passed to the tree learner
    #[arg(long, default_value = "Gain")]
    heuristic: Heuristic,

    /// Treat the rule file as FDs and mask violating entries instead of
    /// modelling replacements
    #[arg(long)]
    fd: bool,

    /// Jar of the Clus learner
    #[arg(long, default_value = "lib/Clus.jar")]
    clus_jar: PathBuf,

    /// Java binary used to launch the learner
    #[arg(long, default_value = "java")]
    java: String,
}

fn run(args: Args) -> Result<()> {
    let config = CleanerConfig {
        dataset: args.dataset,
        rules: args.rules,
        ground_truth: args.ground_truth,
        workdir: args.workdir,
        heuristic: args.heuristic,
        mode: if args.fd { Mode::Fd } else { Mode::Cfd },
    };
    let learner = ClusLearner::new(args.java, args.clus_jar);

    let summary = run_pipeline(&config, &learner)?;
    if summary.all_jobs_failed() {
        anyhow::bail!("every cleaning job failed");
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        error!("{}", err);
        std::process::exit(1);
    }
}
