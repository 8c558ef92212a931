//! Merges the external learner's predictions back into the violating rows.
//!
//! Two artifacts are parsed per job: the job's own settings file, to recover
//! the ordered target list and its size, and the learner's prediction file,
//! whose data section holds one row per test row with the original attribute
//! values followed by the predicted target values. The prediction stream and
//! the test file are walked in lock-step; any length mismatch between the
//! two is fatal for the job.

use crate::error::{CleanError, Result};
use crate::planner::CleaningJob;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

lazy_static! {
    static ref DIGITS: Regex = Regex::new(r"\d+").unwrap();
}

/// The data-section marker of the prediction artifact.
const DATA_MARKER: &str = "@DATA";

#[derive(Debug, PartialEq, Eq)]
pub struct SettingsSummary {
    pub targets: Vec<usize>,
    pub target_size: usize,
}

/// Recovers the ordered target-attribute list and its declared size from a
/// job's settings artifact. Either entry missing, or the two disagreeing,
/// is a configuration error.
pub fn parse_settings(path: &Path) -> Result<SettingsSummary> {
    let text = fs::read_to_string(path)?;

    let mut targets: Option<Vec<usize>> = None;
    let mut target_size: Option<usize> = None;
    for line in text.lines() {
        if let Some(rest) = line.trim().strip_prefix("Target = ") {
            let parsed = rest
                .trim()
                .split('-')
                .map(|id| id.trim().parse::<usize>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| {
                    CleanError::Config(format!("unparsable target list '{}' in settings", rest))
                })?;
            targets = Some(parsed);
        } else if line.trim_start().starts_with("%TargetSize") {
            target_size = DIGITS
                .find(line)
                .and_then(|m| m.as_str().parse::<usize>().ok());
        }
    }

    let targets = targets
        .ok_or_else(|| CleanError::Config(format!("settings {} has no Target", path.display())))?;
    let target_size = target_size.ok_or_else(|| {
        CleanError::Config(format!("settings {} has no TargetSize", path.display()))
    })?;
    if targets.len() != target_size {
        return Err(CleanError::Config(format!(
            "settings {} declares TargetSize {} but lists {} targets",
            path.display(),
            target_size,
            targets.len()
        )));
    }
    Ok(SettingsSummary {
        targets,
        target_size,
    })
}

/// Replaces the target-attribute values of every test row with the learner's
/// predictions and writes the merged rows to the job's cleaned file. All
/// non-target columns pass through unchanged.
pub fn reinject(job: &CleaningJob) -> Result<PathBuf> {
    info!("Replacing erroneous entries with the predicted values");
    let settings = parse_settings(&job.settings_file())?;

    let pred_text = fs::read_to_string(job.predictions_file())?;
    let mut pred_lines = pred_text.lines();
    loop {
        match pred_lines.next() {
            Some(line) if line.trim().eq_ignore_ascii_case(DATA_MARKER) => break,
            Some(_) => continue,
            None => {
                return Err(CleanError::Integrity(format!(
                    "prediction artifact {} has no {} marker",
                    job.predictions_file().display(),
                    DATA_MARKER
                )))
            }
        }
    }
    let mut pred_rows = pred_lines.filter(|l| !l.trim().is_empty());

    let test_text = fs::read_to_string(&job.test_file)?;
    let mut test_lines = test_text.lines();
    let header = test_lines
        .next()
        .ok_or_else(|| CleanError::Integrity(format!("test file {} is empty", job.test_file.display())))?;
    let width = header.split(',').count();
    let mut test_rows = test_lines.filter(|l| !l.trim().is_empty());

    for &target in &settings.targets {
        if target >= width {
            return Err(CleanError::Config(format!(
                "target attribute {} out of range (test header has {} attributes)",
                target, width
            )));
        }
    }

    let mut cleaned = String::from(header);
    cleaned.push('\n');
    loop {
        let (pred, test) = match (pred_rows.next(), test_rows.next()) {
            (Some(pred), Some(test)) => (pred, test),
            (None, None) => break,
            _ => {
                return Err(CleanError::Integrity(
                    "prediction and test files have different row counts".to_string(),
                ))
            }
        };

        // predicted values sit after the width-th field separator, one per
        // target, in target-list order
        let pred_fields: Vec<&str> = pred.split(',').collect();
        if pred_fields.len() != width + settings.target_size {
            return Err(CleanError::Integrity(format!(
                "prediction row has {} fields, expected {} originals + {} predictions",
                pred_fields.len(),
                width,
                settings.target_size
            )));
        }
        let predicted = &pred_fields[width..width + settings.target_size];

        let mut fields: Vec<&str> = test.split(',').collect();
        if fields.len() != width {
            return Err(CleanError::Integrity(format!(
                "test row has {} fields but the header has {} attributes",
                fields.len(),
                width
            )));
        }

        for (&value, &target) in predicted.iter().zip(&settings.targets) {
            debug!("replacing: {} -> {} in: {}", fields[target], value, test);
            fields[target] = value;
        }
        cleaned.push_str(&fields.join(","));
        cleaned.push('\n');
    }

    let out = job.cleaned_file();
    fs::write(&out, cleaned)?;
    info!("Wrote cleaned test set: {}", out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::{write_settings, Heuristic};
    use tempfile::tempdir;

    fn job_with_artifacts(targets: Vec<usize>, pred: &str, test: &str) -> (tempfile::TempDir, CleaningJob) {
        let dir = tempdir().unwrap();
        let job = CleaningJob::rooted_at(dir.path(), 1, targets, Heuristic::Gain);
        write_settings(&job).unwrap();
        fs::write(job.predictions_file(), pred).unwrap();
        fs::write(&job.test_file, test).unwrap();
        (dir, job)
    }

    #[test]
    fn test_reinjection_alignment() {
        let (_dir, job) = job_with_artifacts(
            vec![2, 3],
            "comment header\n@DATA\nv0,v1,v2,v3,p2,p3\n",
            "a,b,c,d\nv0,v1,x,x\n",
        );
        let cleaned = reinject(&job).unwrap();
        let text = fs::read_to_string(cleaned).unwrap();
        assert_eq!(text, "a,b,c,d\nv0,v1,p2,p3\n");
    }

    #[test]
    fn test_non_target_columns_pass_through() {
        let (_dir, job) = job_with_artifacts(
            vec![1],
            "@DATA\nk1,old1,z1,new1\nk2,old2,z2,new2\n",
            "a,b,c\nk1,old1,z1\nk2,old2,z2\n",
        );
        let cleaned = reinject(&job).unwrap();
        let text = fs::read_to_string(cleaned).unwrap();
        assert_eq!(text, "a,b,c\nk1,new1,z1\nk2,new2,z2\n");
    }

    #[test]
    fn test_missing_data_marker_is_integrity_error() {
        let (_dir, job) = job_with_artifacts(vec![1], "no marker here\n", "a,b\nx,y\n");
        let err = reinject(&job).unwrap_err();
        assert!(matches!(err, CleanError::Integrity(_)));
    }

    #[test]
    fn test_row_count_mismatch_is_integrity_error() {
        let (_dir, job) = job_with_artifacts(
            vec![1],
            "@DATA\nx,y,p\n",
            "a,b\nx,y\nq,r\n",
        );
        let err = reinject(&job).unwrap_err();
        assert!(err.to_string().contains("different row counts"));
    }

    #[test]
    fn test_short_prediction_row_is_integrity_error() {
        let (_dir, job) = job_with_artifacts(vec![1], "@DATA\nx,y\n", "a,b\nx,y\n");
        let err = reinject(&job).unwrap_err();
        assert!(matches!(err, CleanError::Integrity(_)));
    }

    #[test]
    fn test_parse_settings_round_trip() {
        let dir = tempdir().unwrap();
        let job = CleaningJob::rooted_at(dir.path(), 1, vec![2, 5, 7], Heuristic::GainRatio);
        let path = write_settings(&job).unwrap();
        let summary = parse_settings(&path).unwrap();
        assert_eq!(summary.targets, vec![2, 5, 7]);
        assert_eq!(summary.target_size, 3);
    }

    #[test]
    fn test_parse_settings_missing_target_size_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.s");
        fs::write(&path, "[Attributes]\nTarget = 1-2\n").unwrap();
        let err = parse_settings(&path).unwrap_err();
        assert!(matches!(err, CleanError::Config(_)));
    }
}
