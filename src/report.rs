//! Data-quality summary and JSON report persistence.
//!
//! Range violations are counted here, never rejected during coercion: a
//! prevalence outside [0,100] or a negative count is a finding for the
//! report, not an error. The reported prevalence and the derived
//! `100 * ntop / npop` ratio are allowed to diverge; the median relative
//! error is surfaced as a diagnostic with no pass/fail threshold.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    frame::{CanonicalColumn, TypedFrame},
    population::{self, Reducer},
};

/// Default location of the persisted report, relative to the working
/// directory.
pub const DEFAULT_REPORT_PATH: &str = "reports/data_quality_report.json";

/// Reference year for the headline population union figure.
pub const UNION_REFERENCE_YEAR: i32 = 2023;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    pub rows: usize,
    pub cols: usize,
    pub regions: usize,
    pub departments: usize,
    pub years: Vec<i32>,
    pub population_union_npop: Option<f64>,
    pub population_union_npop_2023: Option<f64>,
    pub has_weight: bool,
    pub has_sex: bool,
    pub cols_list: Vec<String>,
    pub prevalence_out_of_range: usize,
    pub negative_case_count: usize,
    pub negative_population: usize,
    pub prevalence_error_median: Option<f64>,
}

/// Builds the data-quality summary for a typed table.
pub fn summarize(frame: &TypedFrame) -> QualitySummary {
    let union = population::union_for_year(frame, UNION_REFERENCE_YEAR, Reducer::Median);

    let mut regions: Vec<&str> = frame.rows().iter().filter_map(|r| r.region.as_deref()).collect();
    regions.sort_unstable();
    regions.dedup();

    let mut departments: Vec<&str> = frame.rows().iter().filter_map(|r| r.dept.as_deref()).collect();
    departments.sort_unstable();
    departments.dedup();

    let mut years: Vec<i32> = frame.rows().iter().filter_map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();

    let prevalence_out_of_range = frame
        .rows()
        .iter()
        .filter_map(|r| r.prevalence)
        .filter(|p| !(0.0..=100.0).contains(p))
        .count();
    let negative_case_count = frame
        .rows()
        .iter()
        .filter_map(|r| r.case_count)
        .filter(|n| *n < 0.0)
        .count();
    let negative_population = frame
        .rows()
        .iter()
        .filter_map(|r| r.reference_population)
        .filter(|n| *n < 0.0)
        .count();

    QualitySummary {
        rows: frame.row_count(),
        cols: frame.column_count(),
        regions: regions.len(),
        departments: departments.len(),
        years,
        population_union_npop: union,
        population_union_npop_2023: union,
        has_weight: frame.has(CanonicalColumn::Npop),
        has_sex: frame.has(CanonicalColumn::Sexe),
        cols_list: frame.columns().to_vec(),
        prevalence_out_of_range,
        negative_case_count,
        negative_population,
        prevalence_error_median: prevalence_error_median(frame),
    }
}

/// Median relative error between the reported prevalence and the ratio
/// derived from the masked counts. Diagnostic only.
fn prevalence_error_median(frame: &TypedFrame) -> Option<f64> {
    let mut errors: Vec<f64> = frame
        .rows()
        .iter()
        .filter_map(|r| {
            let prev = r.prevalence?;
            let ntop = r.case_count?;
            let npop = r.reference_population?;
            if prev <= 0.0 || npop <= 0.0 {
                return None;
            }
            let ratio = 100.0 * ntop / npop;
            Some((prev - ratio).abs() / prev)
        })
        .collect();
    if errors.is_empty() {
        return None;
    }
    errors.sort_by(|a, b| a.total_cmp(b));
    let mid = errors.len() / 2;
    Some(if errors.len() % 2 == 1 {
        errors[mid]
    } else {
        (errors[mid - 1] + errors[mid]) / 2.0
    })
}

/// Persists the report as indented UTF-8 JSON, creating parent directories.
/// Unavailable figures serialize as `null`.
pub fn save_report(report: &QualitySummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating report directory {parent:?}"))?;
    }
    let json = serde_json::to_string_pretty(report).context("Serializing data-quality report")?;
    fs::write(path, json).with_context(|| format!("Writing report to {path:?}"))
}
