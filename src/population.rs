//! Population deduplication and the union computation.
//!
//! `npop` is the denominator population for a (department, age-class) slice
//! and is repeated verbatim on every pathology row sharing that slice.
//! Summing it naively over-counts by a factor proportional to the number of
//! pathology categories. The union computation collapses each slice to a
//! single figure with a configurable reducer before summing.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::frame::{CanonicalColumn, Record, TypedFrame};

/// Department code used for aggregate placeholder rows, excluded from scope.
pub const AGGREGATE_DEPT: &str = "999";

/// Columns the union computation cannot work without.
pub const REQUIRED_COLUMNS: [CanonicalColumn; 3] = [
    CanonicalColumn::Annee,
    CanonicalColumn::Dept,
    CanonicalColumn::Npop,
];

/// How the repeated per-slice population figures collapse to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    #[default]
    Median,
    Min,
    Max,
    First,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Median => "median",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::First => "first",
        }
    }

    /// Collapses the non-empty per-slice values in row order.
    fn collapse(&self, values: &[f64]) -> f64 {
        match self {
            Reducer::Median => median(values),
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::First => values[0],
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// One point of the per-year union series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearPopulation {
    pub year: i32,
    pub population: f64,
}

/// Slice-level disagreement report produced by [`audit_for_year`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UnionAudit {
    /// Number of (department, age-class) slices in scope.
    pub slices: usize,
    /// Slices carrying more than one distinct population value.
    pub multi_values: usize,
}

fn age_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*\d{1,2}\s*-\s*\d{1,2}\s*$|^\s*\d{1,2}\s*\+\s*$|^\s*\d{2}\s*et\s*plus\s*$")
            .expect("age pattern compiles")
    })
}

/// True for 5-year-bucket labels such as `"75-79"`, `"95+"`, `"95 et plus"`.
pub fn is_five_year_age_class(label: &str) -> bool {
    age_pattern().is_match(label)
}

/// Scope filter: drops aggregate departments and, when the age column
/// exists, rows without a usable 5-year age label.
fn in_scope(record: &Record, has_age_column: bool) -> bool {
    let Some(dept) = record.dept.as_deref() else {
        return false;
    };
    if dept == AGGREGATE_DEPT {
        return false;
    }
    if has_age_column {
        match record.age_class.as_deref() {
            Some(label) if is_five_year_age_class(label) => {}
            _ => return false,
        }
    }
    record.reference_population.is_some()
}

type SliceKey = (String, Option<String>);

fn slice_key(record: &Record, has_age_column: bool) -> SliceKey {
    let age = if has_age_column {
        record.age_class.clone()
    } else {
        None
    };
    (record.dept.clone().unwrap_or_default(), age)
}

fn grouped_for_year(frame: &TypedFrame, year: i32) -> Option<BTreeMap<SliceKey, Vec<f64>>> {
    if !frame.has_all(&REQUIRED_COLUMNS) {
        return None;
    }
    let has_age = frame.has(CanonicalColumn::ClaAge5);
    let mut groups: BTreeMap<SliceKey, Vec<f64>> = BTreeMap::new();
    for record in frame.rows() {
        if record.year != Some(year) || !in_scope(record, has_age) {
            continue;
        }
        let Some(npop) = record.reference_population else {
            continue;
        };
        groups.entry(slice_key(record, has_age)).or_default().push(npop);
    }
    Some(groups)
}

/// De-duplicated total reference population for one year, or `None` when the
/// required columns are missing or nothing is in scope.
pub fn union_for_year(frame: &TypedFrame, year: i32, reducer: Reducer) -> Option<f64> {
    let groups = grouped_for_year(frame, year)?;
    if groups.is_empty() {
        return None;
    }
    Some(groups.values().map(|values| reducer.collapse(values)).sum())
}

/// Per-year union series, sorted ascending by year. Empty when the required
/// columns are missing or nothing is in scope.
pub fn union_by_year(frame: &TypedFrame, reducer: Reducer) -> Vec<YearPopulation> {
    if !frame.has_all(&REQUIRED_COLUMNS) {
        return Vec::new();
    }
    let has_age = frame.has(CanonicalColumn::ClaAge5);
    let mut groups: BTreeMap<(i32, SliceKey), Vec<f64>> = BTreeMap::new();
    for record in frame.rows() {
        let Some(year) = record.year else {
            continue;
        };
        if !in_scope(record, has_age) {
            continue;
        }
        let Some(npop) = record.reference_population else {
            continue;
        };
        groups
            .entry((year, slice_key(record, has_age)))
            .or_default()
            .push(npop);
    }

    let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
    for ((year, _), values) in &groups {
        *totals.entry(*year).or_insert(0.0) += reducer.collapse(values);
    }
    totals
        .into_iter()
        .map(|(year, population)| YearPopulation { year, population })
        .collect()
}

/// Counts how many in-scope slices disagree on the population figure for a
/// year. Purely diagnostic; quantifies what the reducer is resolving.
pub fn audit_for_year(frame: &TypedFrame, year: i32) -> UnionAudit {
    let Some(groups) = grouped_for_year(frame, year) else {
        return UnionAudit::default();
    };
    let multi_values = groups
        .values()
        .filter(|values| {
            let mut sorted = (*values).clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            sorted.dedup();
            sorted.len() > 1
        })
        .count();
    UnionAudit {
        slices: groups.len(),
        multi_values,
    }
}
