//! Column-oriented tables shared by the whole pipeline.
//!
//! Two shapes flow through the pipeline:
//!
//! - [`StringFrame`]: the raw ingestion output. Every cell is an
//!   `Option<String>` (missing tokens already nulled), column order matches
//!   the source header, and the frame is guaranteed rectangular.
//! - [`TypedFrame`]: the canonical typed table produced by coercion. Rows are
//!   [`Record`] values; the frame also remembers the full harmonized column
//!   inventory and which canonical columns the source actually carried.

use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// The stable column vocabulary the preparation steps understand.
///
/// Harmonized header names map onto these via [`CanonicalColumn::from_name`];
/// anything else is carried in the inventory but never typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalColumn {
    Annee,
    Region,
    Dept,
    Sexe,
    ClaAge5,
    PathoNiv1,
    PathoNiv2,
    PathoNiv3,
    Ntop,
    Npop,
    Prev,
    Tri,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 12] = [
        CanonicalColumn::Annee,
        CanonicalColumn::Region,
        CanonicalColumn::Dept,
        CanonicalColumn::Sexe,
        CanonicalColumn::ClaAge5,
        CanonicalColumn::PathoNiv1,
        CanonicalColumn::PathoNiv2,
        CanonicalColumn::PathoNiv3,
        CanonicalColumn::Ntop,
        CanonicalColumn::Npop,
        CanonicalColumn::Prev,
        CanonicalColumn::Tri,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::Annee => "annee",
            CanonicalColumn::Region => "region",
            CanonicalColumn::Dept => "dept",
            CanonicalColumn::Sexe => "sexe",
            CanonicalColumn::ClaAge5 => "cla_age_5",
            CanonicalColumn::PathoNiv1 => "patho_niv1",
            CanonicalColumn::PathoNiv2 => "patho_niv2",
            CanonicalColumn::PathoNiv3 => "patho_niv3",
            CanonicalColumn::Ntop => "ntop",
            CanonicalColumn::Npop => "npop",
            CanonicalColumn::Prev => "prev",
            CanonicalColumn::Tri => "tri",
        }
    }

    /// Resolves a harmonized header name to its canonical column, if any.
    pub fn from_name(name: &str) -> Option<Self> {
        CanonicalColumn::ALL
            .into_iter()
            .find(|column| column.as_str() == name)
    }
}

/// Rectangular table of nullable text cells in source column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringFrame {
    headers: Vec<String>,
    columns: Vec<Vec<Option<String>>>,
}

impl StringFrame {
    pub fn new(headers: Vec<String>) -> Self {
        let columns = headers.iter().map(|_| Vec::new()).collect();
        Self { headers, columns }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Appends one row. Fails when the field count does not match the header,
    /// which is the only way ingestion output can stop being table-shaped.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<()> {
        if row.len() != self.headers.len() {
            return Err(anyhow!(
                "Row has {} field(s) but the header declares {}",
                row.len(),
                self.headers.len()
            ));
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, index: usize) -> Option<&[Option<String>]> {
        self.columns.get(index).map(|c| c.as_slice())
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|c| c.get(row))
            .and_then(|v| v.as_deref())
    }
}

/// One typed row of the canonical table. Every field is nullable because the
/// source masks small case counts and the raw extract is full of holes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    pub year: Option<i32>,
    pub region: Option<String>,
    pub dept: Option<String>,
    pub sex: Option<i64>,
    pub pathology_level_1: Option<String>,
    pub pathology_level_2: Option<String>,
    pub pathology_level_3: Option<String>,
    pub age_class: Option<String>,
    pub case_count: Option<f64>,
    pub reference_population: Option<f64>,
    pub prevalence: Option<f64>,
    pub sort_key: Option<f64>,
}

/// The canonical typed table: immutable once built, pure input to every
/// derived computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedFrame {
    columns: Vec<String>,
    present: BTreeSet<CanonicalColumn>,
    rows: Vec<Record>,
}

impl TypedFrame {
    pub fn new(
        columns: Vec<String>,
        present: BTreeSet<CanonicalColumn>,
        rows: Vec<Record>,
    ) -> Self {
        Self {
            columns,
            present,
            rows,
        }
    }

    /// Full harmonized column inventory, including columns the pipeline does
    /// not type (labels, internal codes).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Capability check: did the source carry this canonical column at all?
    pub fn has(&self, column: CanonicalColumn) -> bool {
        self.present.contains(&column)
    }

    pub fn has_all(&self, columns: &[CanonicalColumn]) -> bool {
        columns.iter().all(|c| self.has(*c))
    }

    pub fn has_any(&self, columns: &[CanonicalColumn]) -> bool {
        columns.iter().any(|c| self.has(*c))
    }
}
