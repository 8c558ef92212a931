//! In-memory tabular model: an ordered header of attribute descriptors plus
//! index-aligned rows. Loaded once from CSV, then mutated in place by row
//! deletion, missing-value masking, or an explicit attribute merge.

use crate::error::{CleanError, Result};
use itertools::Itertools;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// On-disk spelling of a missing value.
pub const MISSING: &str = "?";

#[derive(Debug, Clone, PartialEq)]
pub enum AttrDomain {
    Numeric,
    Nominal(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub domain: AttrDomain,
}

/// A single cell in canonical comparable form. Numeric cells compare by
/// parsed value so that "1.0" and "1.00" are the same observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Missing,
    Num(u64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub attributes: Vec<Attribute>,
    rows: Vec<Vec<Option<String>>>,
}

impl Dataset {
    /// A dataset sharing this header but containing no rows.
    pub fn empty_like(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            rows: Vec::new(),
        }
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn attribute_name(&self, index: usize) -> &str {
        &self.attributes[index].name
    }

    pub fn row(&self, index: usize) -> &[Option<String>] {
        &self.rows[index]
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows[row][col].as_deref()
    }

    /// Every row must carry exactly one value per attribute.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<()> {
        if row.len() != self.attributes.len() {
            return Err(CleanError::Config(format!(
                "row has {} values but header has {} attributes",
                row.len(),
                self.attributes.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn delete_row(&mut self, index: usize) {
        self.rows.remove(index);
    }

    pub fn set_missing(&mut self, row: usize, col: usize) {
        self.rows[row][col] = None;
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        info!("Reading dataset: {}", path.display());
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_csv_reader(text.as_bytes())
    }

    fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let names = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|cell| {
                    let cell = cell.trim();
                    if cell.is_empty() || cell == MISSING {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect::<Vec<_>>();
            if row.len() != names.len() {
                return Err(CleanError::Config(format!(
                    "row has {} values but header has {} attributes",
                    row.len(),
                    names.len()
                )));
            }
            rows.push(row);
        }

        let attributes = infer_attributes(names, &rows);
        Ok(Self { attributes, rows })
    }

    pub fn to_csv_path(&self, path: &Path) -> Result<()> {
        info!("Saving dataset: {}", path.display());
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(self.attributes.iter().map(|a| a.name.as_str()))?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|v| v.as_deref().unwrap_or(MISSING)))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Renders a row the way it is written to disk: comma-separated, missing
    /// values as `?`.
    pub fn render_row(&self, index: usize) -> String {
        self.rows[index]
            .iter()
            .map(|v| v.as_deref().unwrap_or(MISSING))
            .join(",")
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} rows, {} attributes\n",
            self.rows.len(),
            self.attributes.len()
        );
        for (idx, attr) in self.attributes.iter().enumerate() {
            let kind = match &attr.domain {
                AttrDomain::Numeric => "numeric".to_string(),
                AttrDomain::Nominal(values) => format!("nominal ({} values)", values.len()),
            };
            out.push_str(&format!("{:>4} {} [{}]\n", idx, attr.name, kind));
        }
        out
    }

    /// Canonical comparable form of a row, respecting attribute domains.
    pub fn row_key(&self, index: usize) -> Vec<ValueKey> {
        row_key_for(&self.attributes, &self.rows[index])
    }

    /// Merges the listed attributes into a new nominal attribute appended at
    /// the end of the header, its value per row being the source values
    /// joined with " | ".
    pub fn merge_attributes(&mut self, indexes: &[usize]) -> Result<()> {
        for &index in indexes {
            if index >= self.attributes.len() {
                return Err(CleanError::Config(format!(
                    "merge attribute index {} out of range (header has {} attributes)",
                    index,
                    self.attributes.len()
                )));
            }
        }

        let name = indexes
            .iter()
            .map(|&i| self.attributes[i].name.as_str())
            .join("_");
        info!("Merging attributes into new attribute: {}", name);

        let merged: Vec<Option<String>> = self
            .rows
            .iter()
            .map(|row| {
                let parts: Vec<&str> = indexes.iter().filter_map(|&i| row[i].as_deref()).collect();
                if parts.len() == indexes.len() {
                    Some(parts.join(" | "))
                } else {
                    // any missing source value makes the merged value missing
                    None
                }
            })
            .collect();

        // distinct values in first-appearance order
        let mut seen = HashSet::new();
        let mut domain = Vec::new();
        for value in merged.iter().flatten() {
            if seen.insert(value.clone()) {
                domain.push(value.clone());
            }
        }

        self.attributes.push(Attribute {
            name,
            domain: AttrDomain::Nominal(domain),
        });
        for (row, value) in self.rows.iter_mut().zip(merged) {
            row.push(value);
        }
        Ok(())
    }
}

fn infer_attributes(names: Vec<String>, rows: &[Vec<Option<String>>]) -> Vec<Attribute> {
    names
        .into_iter()
        .enumerate()
        .map(|(col, name)| {
            let mut any_value = false;
            let mut all_numeric = true;
            let mut seen = HashSet::new();
            let mut values = Vec::new();
            for row in rows {
                if let Some(v) = &row[col] {
                    any_value = true;
                    if v.parse::<f64>().is_err() {
                        all_numeric = false;
                    }
                    if seen.insert(v.clone()) {
                        values.push(v.clone());
                    }
                }
            }
            let domain = if any_value && all_numeric {
                AttrDomain::Numeric
            } else {
                AttrDomain::Nominal(values)
            };
            Attribute { name, domain }
        })
        .collect()
}

/// Canonical comparable form of a row under the given header. Numeric
/// attributes compare by parsed value, nominal by string, missing as its
/// own variant.
pub fn row_key_for(attributes: &[Attribute], row: &[Option<String>]) -> Vec<ValueKey> {
    row.iter()
        .zip(attributes)
        .map(|(value, attr)| match value {
            None => ValueKey::Missing,
            Some(v) => match attr.domain {
                AttrDomain::Numeric => match v.parse::<f64>() {
                    Ok(n) => ValueKey::Num(normalize_f64(n)),
                    Err(_) => ValueKey::Text(v.clone()),
                },
                AttrDomain::Nominal(_) => ValueKey::Text(v.clone()),
            },
        })
        .collect()
}

fn normalize_f64(value: f64) -> u64 {
    // fold -0.0 into 0.0 so the two hash identically
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}
