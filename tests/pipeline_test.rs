//! End-to-end pipeline runs over a small noisy hospital dataset, with the
//! external learner replaced by an in-process stub.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tabclean::error::{CleanError, Result};
use tabclean::learner::{write_settings, Heuristic, ModelBuilder};
use tabclean::pipeline::{run_pipeline, CleanerConfig, JobOutcome, Mode};
use tabclean::planner::CleaningJob;
use tempfile::tempdir;

const NOISY: &str = "name,zip,city,state\n\
                     mercy,16801,state college,PA\n\
                     geisinger,17821,danville,PA\n\
                     mercy west,16801,springfield,PA\n\
                     nittany,16803,state college,PA\n";

const TRUTH: &str = "name,zip,city,state\n\
                     mercy,16801,state college,PA\n\
                     geisinger,17821,danville,PA\n\
                     mercy west,16801,state college,PA\n\
                     nittany,16803,state college,PA\n";

const CFDS: &str = "1=\"16801\"->2=\"state college\"\n\
                    1=\"16801\"->3=\"PA\"\n\
                    1=\"17821\"->2=\"danville\"\n";

/// Answers every job with a fixed predicted value per target attribute,
/// emitting the learner's artifact shape: header lines, a @DATA marker,
/// then one row per test row of original values followed by predictions.
struct StubLearner {
    answers: HashMap<usize, String>,
    fail_job: Option<usize>,
}

impl StubLearner {
    fn new(answers: HashMap<usize, String>) -> Self {
        Self {
            answers,
            fail_job: None,
        }
    }
}

impl ModelBuilder for StubLearner {
    fn build(&self, job: &CleaningJob) -> Result<PathBuf> {
        if self.fail_job == Some(job.id) {
            return Err(CleanError::ExternalProcess {
                job: job.id,
                reason: "stub refused the job".to_string(),
            });
        }
        write_settings(job)?;

        let test = fs::read_to_string(&job.test_file)?;
        let mut out = String::from("stub model output\n@DATA\n");
        for row in test.lines().skip(1).filter(|l| !l.trim().is_empty()) {
            out.push_str(row);
            for target in &job.targets {
                out.push(',');
                out.push_str(&self.answers[target]);
            }
            out.push('\n');
        }
        let path = job.predictions_file();
        fs::write(&path, out)?;
        Ok(path)
    }
}

fn write_fixtures(dir: &Path) -> CleanerConfig {
    fs::write(dir.join("hospital.csv"), NOISY).unwrap();
    fs::write(dir.join("truth.csv"), TRUTH).unwrap();
    fs::write(dir.join("cfds.txt"), CFDS).unwrap();
    CleanerConfig {
        dataset: dir.join("hospital.csv"),
        rules: dir.join("cfds.txt"),
        ground_truth: Some(dir.join("truth.csv")),
        workdir: dir.join("exp"),
        heuristic: Heuristic::Gain,
        mode: Mode::Cfd,
    }
}

fn city_state_answers() -> HashMap<usize, String> {
    HashMap::from([(2, "state college".to_string()), (3, "PA".to_string())])
}

#[test]
fn test_pipeline_cleans_and_scores_100() {
    let dir = tempdir().unwrap();
    let config = write_fixtures(dir.path());
    let learner = StubLearner::new(city_state_answers());

    let summary = run_pipeline(&config, &learner).unwrap();

    assert_eq!(summary.violating_rows, 1);
    assert_eq!(summary.outcomes.len(), 2);
    for outcome in &summary.outcomes {
        match outcome {
            JobOutcome::Completed { accuracy, .. } => assert_eq!(*accuracy, Some(100.0)),
            other => panic!("expected completed job, got {:?}", other),
        }
    }

    // the two same-premise rules collapsed into job 1; the 17821 rule got
    // its own job 2
    let train = fs::read_to_string(config.workdir.join("1").join("train.csv")).unwrap();
    assert_eq!(train.lines().count(), 4); // header + 3 clean rows
    assert!(!train.contains("springfield"));

    let test = fs::read_to_string(config.workdir.join("1").join("test.csv")).unwrap();
    assert_eq!(test.lines().count(), 2); // header + 1 violating row
    assert!(!config.workdir.join("3").exists());

    let cleaned = fs::read_to_string(config.workdir.join("1").join("test_cleaned.csv")).unwrap();
    assert_eq!(
        cleaned,
        "name,zip,city,state\nmercy west,16801,state college,PA\n"
    );
}

#[test]
fn test_failed_job_is_flagged_and_pipeline_continues() {
    let dir = tempdir().unwrap();
    let config = write_fixtures(dir.path());
    let mut learner = StubLearner::new(city_state_answers());
    learner.fail_job = Some(1);

    let summary = run_pipeline(&config, &learner).unwrap();

    assert_eq!(summary.failed_jobs(), 1);
    assert!(!summary.all_jobs_failed());
    assert!(matches!(
        summary.outcomes[0],
        JobOutcome::Failed { id: 1, .. }
    ));
    assert!(matches!(
        summary.outcomes[1],
        JobOutcome::Completed { id: 2, .. }
    ));
    // the failed job never produced a cleaned file
    assert!(!config.workdir.join("1").join("test_cleaned.csv").exists());
    assert!(config.workdir.join("2").join("test_cleaned.csv").exists());
}

#[test]
fn test_empty_rule_file_is_a_configuration_error() {
    let dir = tempdir().unwrap();
    let mut config = write_fixtures(dir.path());
    fs::write(dir.path().join("empty.txt"), "not a rule\n").unwrap();
    config.rules = dir.path().join("empty.txt");

    let learner = StubLearner::new(city_state_answers());
    let err = run_pipeline(&config, &learner).unwrap_err();
    assert!(matches!(err, CleanError::Config(_)));
}

#[test]
fn test_fd_mode_masks_instead_of_modelling() {
    let dir = tempdir().unwrap();
    let mut config = write_fixtures(dir.path());
    fs::write(dir.path().join("fds.txt"), "1->2\n").unwrap();
    config.rules = dir.path().join("fds.txt");
    config.mode = Mode::Fd;

    let learner = StubLearner::new(city_state_answers());
    let summary = run_pipeline(&config, &learner).unwrap();

    assert!(summary.outcomes.is_empty());
    // zip 16801 maps to both "state college" and "springfield": rows 0 and
    // 2 are the witnesses
    assert_eq!(summary.violating_rows, 2);

    let clean = fs::read_to_string(config.workdir.join("clean.csv")).unwrap();
    assert_eq!(clean.lines().count(), 3);

    let violations = fs::read_to_string(config.workdir.join("violations.csv")).unwrap();
    for row in violations.lines().skip(1) {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields[1], "?");
        assert_eq!(fields[2], "?");
        assert_ne!(fields[0], "?");
    }
}
