//! Bridge to the external decision-tree learner. Serializes the per-job
//! settings artifact, blocks on the learner subprocess, and hands back the
//! path of the prediction artifact it wrote. No learning happens here.

use crate::error::{CleanError, Result};
use crate::planner::CleaningJob;
use itertools::Itertools;
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

/// Splitting criterion passed through to the tree learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    Default,
    ReducedError,
    Gain,
    GainRatio,
    VarianceReduction,
    MEstimate,
    Morishita,
    DispersionAdt,
    DispersionMlt,
    RDispersionAdt,
    RDispersionMlt,
}

impl Heuristic {
    pub const ALL: [Heuristic; 11] = [
        Heuristic::Default,
        Heuristic::ReducedError,
        Heuristic::Gain,
        Heuristic::GainRatio,
        Heuristic::VarianceReduction,
        Heuristic::MEstimate,
        Heuristic::Morishita,
        Heuristic::DispersionAdt,
        Heuristic::DispersionMlt,
        Heuristic::RDispersionAdt,
        Heuristic::RDispersionMlt,
    ];

    /// The settings-file spelling of the heuristic.
    pub fn name(&self) -> &'static str {
        match self {
            Heuristic::Default => "Default",
            Heuristic::ReducedError => "ReducedError",
            Heuristic::Gain => "Gain",
            Heuristic::GainRatio => "GainRatio",
            Heuristic::VarianceReduction => "VarianceReduction",
            Heuristic::MEstimate => "MEstimate",
            Heuristic::Morishita => "Morishita",
            Heuristic::DispersionAdt => "DispersionAdt",
            Heuristic::DispersionMlt => "DispersionMlt",
            Heuristic::RDispersionAdt => "RDispersionAdt",
            Heuristic::RDispersionMlt => "RDispersionMlt",
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Heuristic {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Heuristic::ALL
            .into_iter()
            .find(|h| h.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown heuristic '{}' (expected one of: {})",
                    s,
                    Heuristic::ALL.iter().map(|h| h.name()).join(", ")
                )
            })
    }
}

/// Writes the job's settings artifact: training and test file paths, the
/// `-`-joined merged target list, the heuristic, and a `%TargetSize`
/// comment line consumed only by the reinjector.
pub fn write_settings(job: &CleaningJob) -> Result<PathBuf> {
    let path = job.settings_file();
    let contents = format!(
        "\n[Data]\nFile = {}\nTestSet = {}\n\n[Output]\nWritePredictions = {{Test}}\n\n\
         [Attributes]\nTarget = {}\n\n[Tree]\nHeuristic = {}\n\n%TargetSize = {}\n",
        job.train_file.display(),
        job.test_file.display(),
        job.targets.iter().join("-"),
        job.heuristic,
        job.targets.len(),
    );
    fs::write(&path, contents)?;
    Ok(path)
}

/// The model-building collaborator: given a cleaning job whose training and
/// test files exist on disk, produce a prediction artifact and return its
/// path. Implemented by the external learner bridge; swappable for an
/// in-process learner without touching detection or reinjection.
pub trait ModelBuilder {
    fn build(&self, job: &CleaningJob) -> Result<PathBuf>;
}

/// Runs the Clus decision-tree learner as a blocking subprocess.
pub struct ClusLearner {
    java_bin: String,
    jar: PathBuf,
}

impl ClusLearner {
    pub fn new(java_bin: impl Into<String>, jar: impl Into<PathBuf>) -> Self {
        Self {
            java_bin: java_bin.into(),
            jar: jar.into(),
        }
    }

    fn job_failure(job: &CleaningJob, reason: impl Into<String>) -> CleanError {
        CleanError::ExternalProcess {
            job: job.id,
            reason: reason.into(),
        }
    }
}

impl ModelBuilder for ClusLearner {
    fn build(&self, job: &CleaningJob) -> Result<PathBuf> {
        let settings = write_settings(job)?;
        info!("Making model for job {}...", job.id);

        let start = Instant::now();
        let mut child = Command::new(&self.java_bin)
            .arg("-jar")
            .arg(&self.jar)
            .arg(&settings)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Self::job_failure(job, format!("failed to launch learner: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Self::job_failure(job, "learner stdout unavailable"))?;
        for line in BufReader::new(stdout).lines() {
            let line =
                line.map_err(|e| Self::job_failure(job, format!("unreadable output: {}", e)))?;
            info!("{}", line);
        }

        let status = child
            .wait()
            .map_err(|e| Self::job_failure(job, format!("failed to wait on learner: {}", e)))?;
        info!("Elapsed time: {:?}", start.elapsed());

        if !status.success() {
            return Err(Self::job_failure(job, format!("learner {}", status)));
        }

        let predictions = job.predictions_file();
        if !predictions.exists() {
            return Err(Self::job_failure(
                job,
                format!("learner wrote no predictions at {}", predictions.display()),
            ));
        }
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn job_at(dir: &std::path::Path, id: usize, targets: Vec<usize>) -> CleaningJob {
        CleaningJob::rooted_at(dir, id, targets, Heuristic::Gain)
    }

    #[test]
    fn test_heuristic_names_round_trip() {
        for h in Heuristic::ALL {
            assert_eq!(h.name().parse::<Heuristic>().unwrap(), h);
        }
        assert!("Entropy".parse::<Heuristic>().is_err());
    }

    #[test]
    fn test_write_settings_layout() {
        let dir = tempdir().unwrap();
        let job = job_at(dir.path(), 1, vec![2, 3]);
        let path = write_settings(&job).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("[Data]"));
        assert!(text.contains(&format!("File = {}", job.train_file.display())));
        assert!(text.contains(&format!("TestSet = {}", job.test_file.display())));
        assert!(text.contains("WritePredictions = {Test}"));
        assert!(text.contains("Target = 2-3"));
        assert!(text.contains("Heuristic = Gain"));
        assert!(text.contains("%TargetSize = 2"));
    }

    #[test]
    fn test_nonzero_exit_is_a_job_failure() {
        let dir = tempdir().unwrap();
        let job = job_at(dir.path(), 3, vec![1]);
        let learner = ClusLearner::new("false", "nonexistent.jar");
        let err = learner.build(&job).unwrap_err();
        match err {
            CleanError::ExternalProcess { job: id, .. } => assert_eq!(id, 3),
            other => panic!("expected ExternalProcess, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_predictions_is_a_job_failure() {
        let dir = tempdir().unwrap();
        let job = job_at(dir.path(), 1, vec![1]);
        // exits cleanly but never writes a prediction artifact
        let learner = ClusLearner::new("true", "nonexistent.jar");
        let err = learner.build(&job).unwrap_err();
        assert!(err.to_string().contains("no predictions"));
    }
}
