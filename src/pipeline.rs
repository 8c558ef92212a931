//! Sequential cleaning pipeline: parse rules, detect violations, partition,
//! plan jobs, run the learner per job, reinject predictions, score. Jobs are
//! isolated: a learner or integrity failure flags that job and the pipeline
//! continues with the rest.

use crate::dataset::Dataset;
use crate::error::{CleanError, Result};
use crate::learner::{Heuristic, ModelBuilder};
use crate::partition::{mask_fd_attributes, separate};
use crate::planner::{plan, CleaningJob};
use crate::reinject::reinject;
use crate::rules::{cfd_summary, fd_summary, parse_cfds, parse_fds, validate_cfds, validate_fds};
use crate::scorer::score;
use crate::violations::{find_cfd_violations, find_fd_violations};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// How detected violations are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Treat the rule file as CFDs; remove violating rows and predict
    /// replacements per dependency group.
    Cfd,
    /// Treat the rule file as FDs; keep violating rows in place and mask
    /// the constrained attributes to missing for later retraining.
    Fd,
}

#[derive(Debug, Clone)]
pub struct CleanerConfig {
    pub dataset: PathBuf,
    pub rules: PathBuf,
    pub ground_truth: Option<PathBuf>,
    pub workdir: PathBuf,
    pub heuristic: Heuristic,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { id: usize, accuracy: Option<f32> },
    Failed { id: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub violating_rows: usize,
    pub outcomes: Vec<JobOutcome>,
}

impl PipelineSummary {
    pub fn failed_jobs(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, JobOutcome::Failed { .. }))
            .count()
    }

    /// True when jobs were planned and none of them completed.
    pub fn all_jobs_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed_jobs() == self.outcomes.len()
    }

    pub fn render(&self) -> String {
        let mut out = format!("Violating tuples: {}\n", self.violating_rows);
        for outcome in &self.outcomes {
            match outcome {
                JobOutcome::Completed {
                    id,
                    accuracy: Some(percent),
                } => out.push_str(&format!("Job {}: completed, {:.2}% correct\n", id, percent)),
                JobOutcome::Completed { id, accuracy: None } => {
                    out.push_str(&format!("Job {}: completed\n", id))
                }
                JobOutcome::Failed { id, reason } => {
                    out.push_str(&format!("Job {}: FAILED ({})\n", id, reason))
                }
            }
        }
        out
    }
}

pub fn run_pipeline(config: &CleanerConfig, builder: &dyn ModelBuilder) -> Result<PipelineSummary> {
    let mut dataset = Dataset::from_csv_path(&config.dataset)?;
    info!("Dataset summary:\n{}", dataset.summary());

    let rules_text = fs::read_to_string(&config.rules)?;
    match config.mode {
        Mode::Cfd => run_cfd_pipeline(config, builder, &mut dataset, &rules_text),
        Mode::Fd => run_fd_pipeline(config, &mut dataset, &rules_text),
    }
}

fn run_cfd_pipeline(
    config: &CleanerConfig,
    builder: &dyn ModelBuilder,
    dataset: &mut Dataset,
    rules_text: &str,
) -> Result<PipelineSummary> {
    let cfds = parse_cfds(rules_text);
    if cfds.is_empty() {
        return Err(CleanError::Config(format!(
            "no valid dependencies in {}",
            config.rules.display()
        )));
    }
    validate_cfds(dataset, &cfds)?;
    info!("CFDs summary:\n{}", cfd_summary(dataset, &cfds));

    let report = find_cfd_violations(dataset, &cfds)?;
    info!("\n{}", report.render_table());

    let violated = report.subset.clone();
    separate(dataset, &report);

    // all dataset mutation is complete before any job is planned or run
    let jobs = plan(&cfds, &config.workdir, config.heuristic);
    for job in &jobs {
        fs::create_dir_all(&job.dir)?;
        dataset.to_csv_path(&job.train_file)?;
        violated.to_csv_path(&job.test_file)?;
    }

    let mut outcomes = Vec::new();
    for job in &jobs {
        match run_job(job, builder, config.ground_truth.as_deref()) {
            Ok(accuracy) => outcomes.push(JobOutcome::Completed {
                id: job.id,
                accuracy,
            }),
            Err(err) => {
                error!("Job {} failed: {}", job.id, err);
                outcomes.push(JobOutcome::Failed {
                    id: job.id,
                    reason: err.to_string(),
                });
            }
        }
    }

    let summary = PipelineSummary {
        violating_rows: report.num_violating(),
        outcomes,
    };
    info!("Pipeline summary:\n{}", summary.render());
    Ok(summary)
}

/// Builds the model, reinjects its predictions, and scores the cleaned file
/// when a ground truth is available. Any error here fails only this job.
fn run_job(
    job: &CleaningJob,
    builder: &dyn ModelBuilder,
    ground_truth: Option<&Path>,
) -> Result<Option<f32>> {
    builder.build(job)?;
    let cleaned = reinject(job)?;

    let Some(truth_path) = ground_truth else {
        return Ok(None);
    };
    let cleaned = Dataset::from_csv_path(&cleaned)?;
    let truth = Dataset::from_csv_path(truth_path)?;
    let accuracy = score(&cleaned, &truth)?;
    if !accuracy.wrong.is_empty() {
        info!("The following tuples were wrongly classified:");
        for row in &accuracy.wrong {
            info!("{}", row);
        }
    }
    Ok(Some(accuracy.percent))
}

/// The alternate FD policy: violating rows stay in the dataset's violation
/// subset with their constrained attributes masked to missing; no learner
/// jobs are planned.
fn run_fd_pipeline(
    config: &CleanerConfig,
    dataset: &mut Dataset,
    rules_text: &str,
) -> Result<PipelineSummary> {
    let fds = parse_fds(rules_text);
    if fds.is_empty() {
        return Err(CleanError::Config(format!(
            "no valid dependencies in {}",
            config.rules.display()
        )));
    }
    validate_fds(dataset, &fds)?;
    info!("FDs summary:\n{}", fd_summary(dataset, &fds));

    let report = find_fd_violations(dataset, &fds)?;
    info!("\n{}", report.render_table());

    let mut violated = report.subset.clone();
    separate(dataset, &report);
    mask_fd_attributes(&mut violated, &fds)?;

    fs::create_dir_all(&config.workdir)?;
    dataset.to_csv_path(&config.workdir.join("clean.csv"))?;
    violated.to_csv_path(&config.workdir.join("violations.csv"))?;

    let summary = PipelineSummary {
        violating_rows: report.num_violating(),
        outcomes: Vec::new(),
    };
    info!("Pipeline summary:\n{}", summary.render());
    Ok(summary)
}
