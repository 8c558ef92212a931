//! Dependency rule model and rule-file parsing.
//!
//! FD lines look like `1->2,3` and CFD lines like `5="16801"->4="PA"`.
//! Malformed lines are skipped with a warning; parsing never aborts the
//! remaining file. Rule collections are multisets: declaration order and
//! duplicates are preserved.

use crate::dataset::Dataset;
use crate::error::{CleanError, Result};
use itertools::Itertools;
use tracing::warn;

/// A premise attribute whose value determines one or more RHS attributes
/// across the whole dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionalDependency {
    pub premise: usize,
    pub rhs: Vec<usize>,
}

impl FunctionalDependency {
    pub fn render(&self) -> String {
        format!("{}->{}", self.premise, self.rhs.iter().join(","))
    }

    /// Same rendering with attribute indices resolved to names.
    pub fn render_named(&self, dataset: &Dataset) -> String {
        format!(
            "{}->{}",
            dataset.attribute_name(self.premise),
            self.rhs.iter().map(|&r| dataset.attribute_name(r)).join(", ")
        )
    }
}

/// A pattern constraint: any row matching every premise (attribute, value)
/// pair must also match the RHS pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cfd {
    pub premise: Vec<(usize, String)>,
    pub rhs: (usize, String),
}

impl Cfd {
    pub fn render(&self) -> String {
        format!(
            "{}->{}={}",
            self.premise
                .iter()
                .map(|(idx, value)| format!("{}={}", idx, value))
                .join(","),
            self.rhs.0,
            self.rhs.1
        )
    }

    pub fn render_named(&self, dataset: &Dataset) -> String {
        format!(
            "{}->{}={}",
            self.premise
                .iter()
                .map(|(idx, value)| format!("{}={}", dataset.attribute_name(*idx), value))
                .join(","),
            dataset.attribute_name(self.rhs.0),
            self.rhs.1
        )
    }
}

pub fn parse_fds(text: &str) -> Vec<FunctionalDependency> {
    let mut fds = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_fd_line(line) {
            Some(fd) => fds.push(fd),
            None => warn!("invalid FD syntax: {}", line),
        }
    }
    fds
}

fn parse_fd_line(line: &str) -> Option<FunctionalDependency> {
    let (lhs, rhs) = line.split_once("->")?;
    let premise = lhs.trim().parse::<usize>().ok()?;
    if rhs.trim().is_empty() {
        return None;
    }
    let rhs = rhs
        .split(',')
        .map(|part| part.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .ok()?;
    Some(FunctionalDependency { premise, rhs })
}

pub fn parse_cfds(text: &str) -> Vec<Cfd> {
    let mut cfds = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_cfd_line(line) {
            Some(cfd) => cfds.push(cfd),
            None => warn!("invalid CFD syntax: {}", line),
        }
    }
    cfds
}

fn parse_cfd_line(line: &str) -> Option<Cfd> {
    let (lhs, rhs) = line.split_once("->")?;
    let premise = lhs
        .split(',')
        .map(parse_cfd_pair)
        .collect::<Option<Vec<_>>>()?;
    if premise.is_empty() {
        return None;
    }
    let rhs = parse_cfd_pair(rhs)?;
    Some(Cfd { premise, rhs })
}

fn parse_cfd_pair(part: &str) -> Option<(usize, String)> {
    let (idx, value) = part.split_once('=')?;
    let idx = idx.trim().parse::<usize>().ok()?;
    Some((idx, strip_quotes(value.trim()).to_string()))
}

/// Strips one symmetric pair of surrounding quote characters, if present.
fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// An attribute index referenced by a rule must fall inside the header.
pub fn validate_fds(dataset: &Dataset, fds: &[FunctionalDependency]) -> Result<()> {
    let width = dataset.num_attributes();
    for fd in fds {
        let bad = std::iter::once(fd.premise)
            .chain(fd.rhs.iter().copied())
            .find(|&idx| idx >= width);
        if let Some(idx) = bad {
            return Err(CleanError::Config(format!(
                "FD {} references attribute {} but the dataset has {} attributes",
                fd.render(),
                idx,
                width
            )));
        }
    }
    Ok(())
}

pub fn validate_cfds(dataset: &Dataset, cfds: &[Cfd]) -> Result<()> {
    let width = dataset.num_attributes();
    for cfd in cfds {
        let bad = cfd
            .premise
            .iter()
            .map(|(idx, _)| *idx)
            .chain(std::iter::once(cfd.rhs.0))
            .find(|&idx| idx >= width);
        if let Some(idx) = bad {
            return Err(CleanError::Config(format!(
                "CFD {} references attribute {} but the dataset has {} attributes",
                cfd.render(),
                idx,
                width
            )));
        }
    }
    Ok(())
}

/// Numbered listing of FDs with attribute names resolved.
pub fn fd_summary(dataset: &Dataset, fds: &[FunctionalDependency]) -> String {
    let mut summary = format!("Num FDs: {}\n\n", fds.len());
    for (counter, fd) in fds.iter().enumerate() {
        summary.push_str(&format!(
            "{:>4}   {}\n",
            counter + 1,
            fd.render_named(dataset)
        ));
    }
    summary
}

pub fn cfd_summary(dataset: &Dataset, cfds: &[Cfd]) -> String {
    let mut summary = format!("Num CFDs: {}\n\n", cfds.len());
    for (counter, cfd) in cfds.iter().enumerate() {
        summary.push_str(&format!(
            "{:>4}   {}\n",
            counter + 1,
            cfd.render_named(dataset)
        ));
    }
    summary
}
