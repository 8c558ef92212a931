//! Splits a dataset into a clean subset and a violating subset, or masks
//! rule attributes to missing instead of removing rows.

use crate::dataset::Dataset;
use crate::error::{CleanError, Result};
use crate::rules::{Cfd, FunctionalDependency};
use crate::violations::ViolationReport;
use tracing::info;

/// Removes every violating row from `dataset`, leaving the clean subset in
/// place; the violating subset is `report.subset`. Indices are deleted in
/// strictly descending order: each removal shifts all later rows down by
/// one, so ascending removal would corrupt the remaining deletions.
pub fn separate(dataset: &mut Dataset, report: &ViolationReport) {
    info!("Separating violating tuples from dataset...");
    let mut indices = report.indices();
    indices.sort_unstable_by(|a, b| b.cmp(a));

    for &index in &indices {
        dataset.delete_row(index);
    }

    if indices.is_empty() {
        info!("Did not perform any removal. Violating tuples set is empty.");
    } else {
        info!("Removed: {}", indices.len());
        info!("Num rows left: {}", dataset.num_rows());
    }
}

/// Sets the listed attribute positions to missing on every row, so the
/// violating rows can stay in place for later prediction.
pub fn mask_missing(dataset: &mut Dataset, attr_indexes: &[usize]) -> Result<()> {
    for &index in attr_indexes {
        if index >= dataset.num_attributes() {
            return Err(CleanError::Config(format!(
                "mask attribute index {} out of range (header has {} attributes)",
                index,
                dataset.num_attributes()
            )));
        }
    }
    for row in 0..dataset.num_rows() {
        for &index in attr_indexes {
            dataset.set_missing(row, index);
        }
    }
    Ok(())
}

/// The attribute positions an FD constrains: premise plus every RHS.
pub fn fd_attribute_indexes(fd: &FunctionalDependency) -> Vec<usize> {
    let mut indexes = vec![fd.premise];
    indexes.extend(fd.rhs.iter().copied());
    indexes
}

/// The attribute positions a CFD constrains: RHS plus every premise.
pub fn cfd_attribute_indexes(cfd: &Cfd) -> Vec<usize> {
    let mut indexes = vec![cfd.rhs.0];
    indexes.extend(cfd.premise.iter().map(|(idx, _)| *idx));
    indexes
}

/// Masks the attributes constrained by each FD across the violating subset.
pub fn mask_fd_attributes(dataset: &mut Dataset, fds: &[FunctionalDependency]) -> Result<()> {
    for fd in fds {
        mask_missing(dataset, &fd_attribute_indexes(fd))?;
    }
    Ok(())
}

/// Masks the attributes constrained by each CFD across the violating subset.
pub fn mask_cfd_attributes(dataset: &mut Dataset, cfds: &[Cfd]) -> Result<()> {
    for cfd in cfds {
        mask_missing(dataset, &cfd_attribute_indexes(cfd))?;
    }
    Ok(())
}
