//! Violation detection: finds the rows of a dataset that break a set of
//! dependencies, with correct index bookkeeping for the later partition step.
//!
//! Two algorithms over the same report shape: the CFD pattern scan is the
//! default production path, the FD witness-map scan is an alternate policy.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::rules::{validate_cfds, validate_fds, Cfd, FunctionalDependency};
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Which rows violate which dependencies. A row index appears in the map
/// iff its row is present exactly once in `subset`; the description list of
/// a row is ordered and duplicate-free. Built fresh on every detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationReport {
    pub violations: BTreeMap<usize, Vec<String>>,
    pub subset: Dataset,
}

impl ViolationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn num_violating(&self) -> usize {
        self.violations.len()
    }

    /// Violating row indices in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.violations.keys().copied().collect()
    }

    /// Table of violating rows and the rules they break, for the log.
    pub fn render_table(&self) -> String {
        let mut out = format!("{:>5}   {:>5}    Rule\n", "Num", "Index");
        for (count, (index, rules)) in self.violations.iter().enumerate() {
            out.push_str(&format!(
                "{:>5}   {:>5} : {}\n",
                count,
                index,
                rules.iter().join(" | ")
            ));
        }
        out
    }
}

/// Pattern consistency: a row violates a CFD iff its values at every premise
/// attribute equal the required values and its value at the RHS attribute
/// differs from the required RHS value. Missing values never match.
pub fn find_cfd_violations(dataset: &Dataset, cfds: &[Cfd]) -> Result<ViolationReport> {
    validate_cfds(dataset, cfds)?;
    info!("Finding violating tuples...");

    let mut violations: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for cfd in cfds {
        let desc = cfd.render();
        for row in 0..dataset.num_rows() {
            let premise_holds = cfd
                .premise
                .iter()
                .all(|(idx, required)| dataset.value(row, *idx) == Some(required.as_str()));
            if premise_holds && dataset.value(row, cfd.rhs.0) != Some(cfd.rhs.1.as_str()) {
                mark(&mut violations, row, &desc);
            }
        }
    }

    Ok(build_report(dataset, violations))
}

/// Global functional consistency via a premise-value witness map. On the
/// first RHS mismatch for a premise value, every row index ever associated
/// with that value is marked along with the current row: a consistency
/// violation implicates all prior witnesses, not only the newest one. No
/// retroactive re-check is performed, so witnesses that were mutually
/// consistent before the mismatching row arrived are still marked.
pub fn find_fd_violations(
    dataset: &Dataset,
    fds: &[FunctionalDependency],
) -> Result<ViolationReport> {
    validate_fds(dataset, fds)?;
    info!("Finding violating tuples...");

    let mut violations: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for fd in fds {
        let desc = fd.render_named(dataset);
        // premise value -> (witness row indices, RHS value tuple)
        let mut witnesses: HashMap<Option<String>, (Vec<usize>, Vec<Option<String>>)> =
            HashMap::new();

        for row in 0..dataset.num_rows() {
            let premise_value = dataset.value(row, fd.premise).map(str::to_string);
            let rhs_values: Vec<Option<String>> = fd
                .rhs
                .iter()
                .map(|&idx| dataset.value(row, idx).map(str::to_string))
                .collect();

            match witnesses.get_mut(&premise_value) {
                Some((indices, seen_rhs)) if *seen_rhs != rhs_values => {
                    for &index in indices.iter() {
                        mark(&mut violations, index, &desc);
                    }
                    mark(&mut violations, row, &desc);
                }
                Some((indices, _)) => {
                    indices.push(row);
                }
                None => {
                    witnesses.insert(premise_value, (vec![row], rhs_values));
                }
            }
        }
    }

    Ok(build_report(dataset, violations))
}

/// Whether the dataset satisfies every FD. Stops at the first inconsistent
/// pair, logging the premise value and the two RHS tuples that disagree.
pub fn check_fd_satisfaction(dataset: &Dataset, fds: &[FunctionalDependency]) -> Result<bool> {
    validate_fds(dataset, fds)?;
    info!("Checking FD satisfaction...");

    for fd in fds {
        let mut seen: HashMap<Option<String>, Vec<Option<String>>> = HashMap::new();
        for row in 0..dataset.num_rows() {
            let premise_value = dataset.value(row, fd.premise).map(str::to_string);
            let rhs_values: Vec<Option<String>> = fd
                .rhs
                .iter()
                .map(|&idx| dataset.value(row, idx).map(str::to_string))
                .collect();
            match seen.get(&premise_value) {
                Some(prior) if *prior != rhs_values => {
                    info!(
                        "The following pair violate an FD ({}): premise {:?} maps to both {:?} and {:?}",
                        fd.render_named(dataset),
                        premise_value,
                        prior,
                        rhs_values
                    );
                    return Ok(false);
                }
                Some(_) => {}
                None => {
                    seen.insert(premise_value, rhs_values);
                }
            }
        }
    }
    Ok(true)
}

fn mark(violations: &mut BTreeMap<usize, Vec<String>>, row: usize, desc: &str) {
    let rules = violations.entry(row).or_default();
    if !rules.iter().any(|r| r == desc) {
        rules.push(desc.to_string());
    }
}

fn build_report(dataset: &Dataset, violations: BTreeMap<usize, Vec<String>>) -> ViolationReport {
    let mut subset = dataset.empty_like();
    for &index in violations.keys() {
        subset
            .push_row(dataset.row(index).to_vec())
            .expect("subset shares the dataset header");
    }
    info!("Found: {} violating tuples.", subset.num_rows());
    ViolationReport { violations, subset }
}
