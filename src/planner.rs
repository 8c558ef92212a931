//! Groups dependencies that share a premise pattern into joint multi-target
//! cleaning jobs.

use crate::learner::Heuristic;
use crate::rules::Cfd;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// One unit of work for the external learner: a dependency group's merged
/// target attributes plus the file layout the learner reads and writes.
/// Jobs are numbered sequentially from 1 in planning order; the returned
/// list is the single channel between planning and reinjection.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningJob {
    pub id: usize,
    pub targets: Vec<usize>,
    pub dir: PathBuf,
    pub train_file: PathBuf,
    pub test_file: PathBuf,
    pub heuristic: Heuristic,
}

impl CleaningJob {
    pub fn settings_file(&self) -> PathBuf {
        self.dir.join("settings.s")
    }

    pub fn predictions_file(&self) -> PathBuf {
        self.dir.join("settings.test.pred.csv")
    }

    pub fn cleaned_file(&self) -> PathBuf {
        self.dir.join("test_cleaned.csv")
    }

    /// A job with the standard file layout rooted at `dir`.
    pub fn rooted_at(dir: &Path, id: usize, targets: Vec<usize>, heuristic: Heuristic) -> Self {
        Self {
            id,
            targets,
            train_file: dir.join("train.csv"),
            test_file: dir.join("test.csv"),
            dir: dir.to_path_buf(),
            heuristic,
        }
    }
}

/// Walks the dependency multiset once in declaration order. Each unseen
/// dependency seeds a job keyed by its premise pattern (compared as a set
/// of (attribute, value) pairs, not a list); every later dependency with
/// the same key is absorbed into the job, and the job's targets are the
/// union of the absorbed RHS attributes. Iteration over the same Vec is
/// stable, so planning is deterministic within a run.
pub fn plan(cfds: &[Cfd], workdir: &Path, heuristic: Heuristic) -> Vec<CleaningJob> {
    let mut jobs = Vec::new();
    let mut seen = vec![false; cfds.len()];

    for i in 0..cfds.len() {
        if seen[i] {
            continue;
        }
        seen[i] = true;

        let key = premise_pattern(&cfds[i]);
        let mut targets = BTreeSet::new();
        targets.insert(cfds[i].rhs.0);

        for j in i + 1..cfds.len() {
            if !seen[j] && premise_pattern(&cfds[j]) == key {
                seen[j] = true;
                targets.insert(cfds[j].rhs.0);
            }
        }

        let id = jobs.len() + 1;
        let dir = workdir.join(id.to_string());
        jobs.push(CleaningJob::rooted_at(
            &dir,
            id,
            targets.into_iter().collect(),
            heuristic,
        ));
    }

    info!("Planned {} cleaning jobs from {} dependencies", jobs.len(), cfds.len());
    jobs
}

fn premise_pattern(cfd: &Cfd) -> BTreeSet<(usize, &str)> {
    cfd.premise
        .iter()
        .map(|(idx, value)| (*idx, value.as_str()))
        .collect()
}
