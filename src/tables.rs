//! Derived tables consumed by the presentation layer.
//!
//! Every sub-table is a pure function of the typed table. Whether a table
//! can be built is decided once, against the declared requirement list in
//! [`TABLE_REQUIREMENTS`], instead of per-table column probing scattered
//! through the computations. A missing prerequisite silently omits that
//! sub-table; the quality summary is always produced.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    frame::{CanonicalColumn, TypedFrame},
    geo,
    report::{self, QualitySummary},
};

/// Fixed names of the derived tables at the presentation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TableKind {
    Fine,
    TimeSeries,
    ByRegion,
    ByRegionWeighted,
    BySexDesc,
    Quality,
}

impl TableKind {
    pub fn key(&self) -> &'static str {
        match self {
            TableKind::Fine => "fine",
            TableKind::TimeSeries => "timeseries",
            TableKind::ByRegion => "by_region",
            TableKind::ByRegionWeighted => "by_region_weighted",
            TableKind::BySexDesc => "by_sexe_desc",
            TableKind::Quality => "dq",
        }
    }
}

const DIMENSIONS: &[CanonicalColumn] = &[
    CanonicalColumn::Annee,
    CanonicalColumn::Region,
    CanonicalColumn::Dept,
    CanonicalColumn::Sexe,
    CanonicalColumn::ClaAge5,
];

const MEASURES: &[CanonicalColumn] = &[
    CanonicalColumn::Ntop,
    CanonicalColumn::Npop,
    CanonicalColumn::Prev,
];

/// Declares what a table needs: every column in `all_of`, plus at least one
/// column from each group in `any_of`.
pub struct TableRequirement {
    pub kind: TableKind,
    pub all_of: &'static [CanonicalColumn],
    pub any_of: &'static [&'static [CanonicalColumn]],
}

/// The single, auditable omission policy for the whole builder.
pub const TABLE_REQUIREMENTS: &[TableRequirement] = &[
    TableRequirement {
        kind: TableKind::Fine,
        all_of: &[],
        any_of: &[DIMENSIONS, MEASURES],
    },
    TableRequirement {
        kind: TableKind::TimeSeries,
        all_of: &[CanonicalColumn::Annee, CanonicalColumn::Prev],
        any_of: &[],
    },
    TableRequirement {
        kind: TableKind::ByRegion,
        all_of: &[CanonicalColumn::Region, CanonicalColumn::Prev],
        any_of: &[],
    },
    TableRequirement {
        kind: TableKind::ByRegionWeighted,
        all_of: &[
            CanonicalColumn::Region,
            CanonicalColumn::Prev,
            CanonicalColumn::Npop,
        ],
        any_of: &[],
    },
    TableRequirement {
        kind: TableKind::BySexDesc,
        all_of: &[CanonicalColumn::Sexe, CanonicalColumn::Prev],
        any_of: &[],
    },
    TableRequirement {
        kind: TableKind::Quality,
        all_of: &[],
        any_of: &[],
    },
];

/// Evaluates the requirement list once against the frame's capabilities.
pub fn available_tables(frame: &TypedFrame) -> BTreeSet<TableKind> {
    TABLE_REQUIREMENTS
        .iter()
        .filter(|req| {
            frame.has_all(req.all_of) && req.any_of.iter().all(|group| frame.has_any(group))
        })
        .map(|req| req.kind)
        .collect()
}

/// Narrow fact row: available dimensions plus available measures, for fast
/// re-aggregation by the presentation pages. `region_code`/`dept_code` carry
/// the INSEE-keyed forms ready for joining against boundary geometries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FineRow {
    pub year: Option<i32>,
    pub region: Option<String>,
    pub region_code: Option<String>,
    pub dept: Option<String>,
    pub dept_code: Option<String>,
    pub sex: Option<i64>,
    pub age_class: Option<String>,
    pub case_count: Option<f64>,
    pub reference_population: Option<f64>,
    pub prevalence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyPrevalence {
    pub year: i32,
    pub mean_prevalence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionPrevalence {
    pub region: String,
    pub mean_prevalence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionWeightedPrevalence {
    pub region: String,
    pub weighted_prevalence: f64,
    pub weight: f64,
}

/// Descriptive statistics of prevalence within one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrevalenceDescribe {
    pub count: usize,
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SexPrevalenceSummary {
    pub sex: i64,
    #[serde(flatten)]
    pub stats: PrevalenceDescribe,
}

/// The full derived-table mapping. Optional tables are `None` when their
/// declared requirement is unmet; the quality summary is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedTables {
    pub fine: Option<Vec<FineRow>>,
    pub timeseries: Option<Vec<YearlyPrevalence>>,
    pub by_region: Option<Vec<RegionPrevalence>>,
    pub by_region_weighted: Option<Vec<RegionWeightedPrevalence>>,
    pub by_sexe_desc: Option<Vec<SexPrevalenceSummary>>,
    pub quality: QualitySummary,
}

impl DerivedTables {
    /// Names of the tables actually present, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.fine.is_some() {
            names.push(TableKind::Fine.key());
        }
        if self.timeseries.is_some() {
            names.push(TableKind::TimeSeries.key());
        }
        if self.by_region.is_some() {
            names.push(TableKind::ByRegion.key());
        }
        if self.by_region_weighted.is_some() {
            names.push(TableKind::ByRegionWeighted.key());
        }
        if self.by_sexe_desc.is_some() {
            names.push(TableKind::BySexDesc.key());
        }
        names.push(TableKind::Quality.key());
        names
    }
}

/// Builds every derived table the frame's columns allow.
pub fn build_tables(frame: &TypedFrame) -> DerivedTables {
    let available = available_tables(frame);
    let build = |kind: TableKind| available.contains(&kind);

    DerivedTables {
        fine: build(TableKind::Fine).then(|| fine_table(frame)),
        timeseries: build(TableKind::TimeSeries).then(|| timeseries(frame)),
        by_region: build(TableKind::ByRegion).then(|| by_region(frame)),
        by_region_weighted: build(TableKind::ByRegionWeighted)
            .then(|| by_region_weighted(frame)),
        by_sexe_desc: build(TableKind::BySexDesc).then(|| by_sex(frame)),
        quality: report::summarize(frame),
    }
}

fn fine_table(frame: &TypedFrame) -> Vec<FineRow> {
    frame
        .rows()
        .iter()
        .map(|r| FineRow {
            year: r.year,
            region: r.region.clone(),
            region_code: r.region.as_deref().map(geo::normalize_region_code),
            dept: r.dept.clone(),
            dept_code: r.dept.as_deref().map(geo::normalize_dept_code),
            sex: r.sex,
            age_class: r.age_class.clone(),
            case_count: r.case_count,
            reference_population: r.reference_population,
            prevalence: r.prevalence,
        })
        .collect()
}

fn timeseries(frame: &TypedFrame) -> Vec<YearlyPrevalence> {
    let mut groups: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for record in frame.rows() {
        let (Some(year), Some(prev)) = (record.year, record.prevalence) else {
            continue;
        };
        let entry = groups.entry(year).or_insert((0.0, 0));
        entry.0 += prev;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|(year, (sum, count))| YearlyPrevalence {
            year,
            mean_prevalence: sum / count as f64,
        })
        .collect()
}

fn by_region(frame: &TypedFrame) -> Vec<RegionPrevalence> {
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in frame.rows() {
        let (Some(region), Some(prev)) = (record.region.as_deref(), record.prevalence) else {
            continue;
        };
        let entry = groups.entry(region.to_string()).or_insert((0.0, 0));
        entry.0 += prev;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|(region, (sum, count))| RegionPrevalence {
            region,
            mean_prevalence: sum / count as f64,
        })
        .sorted_by(|a, b| b.mean_prevalence.total_cmp(&a.mean_prevalence))
        .collect()
}

fn by_region_weighted(frame: &TypedFrame) -> Vec<RegionWeightedPrevalence> {
    let mut groups: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for record in frame.rows() {
        let (Some(region), Some(prev), Some(weight)) = (
            record.region.as_deref(),
            record.prevalence,
            record.reference_population,
        ) else {
            continue;
        };
        let entry = groups.entry(region.to_string()).or_insert((0.0, 0.0));
        entry.0 += prev * weight;
        entry.1 += weight;
    }
    groups
        .into_iter()
        .filter(|(_, (_, weight))| *weight != 0.0)
        .map(|(region, (weighted_sum, weight))| RegionWeightedPrevalence {
            region,
            weighted_prevalence: weighted_sum / weight,
            weight,
        })
        .sorted_by(|a, b| b.weighted_prevalence.total_cmp(&a.weighted_prevalence))
        .collect()
}

fn by_sex(frame: &TypedFrame) -> Vec<SexPrevalenceSummary> {
    let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for record in frame.rows() {
        let (Some(sex), Some(prev)) = (record.sex, record.prevalence) else {
            continue;
        };
        groups.entry(sex).or_default().push(prev);
    }
    groups
        .into_iter()
        .map(|(sex, values)| SexPrevalenceSummary {
            sex,
            stats: describe(&values),
        })
        .collect()
}

/// count/mean/std/min/quartiles/max with linear quantile interpolation.
/// Standard deviation is the sample estimate and `None` below two values.
fn describe(values: &[f64]) -> PrevalenceDescribe {
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let std_dev = (count > 1).then(|| {
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    });

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    PrevalenceDescribe {
        count,
        mean,
        std_dev,
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[count - 1],
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let fraction = position - lower as f64;
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}
