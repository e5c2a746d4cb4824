//! Type coercion from the string frame to the canonical typed table.
//!
//! Two entry modes share one algorithm. `Clean` trusts upstream cleaning and
//! parses numerics directly; `Raw` additionally repairs decimal-comma
//! numbers, filters years to a sane range, and drops rows that carry no
//! information at all. Malformed individual values never fail coercion; they
//! become nulls and surface later as data-quality findings.

use std::collections::BTreeSet;

use chrono::Datelike;
use log::debug;

use crate::{
    frame::{CanonicalColumn, Record, StringFrame, TypedFrame},
    harmonize,
};

/// Years outside this inclusive range are nulled-out artifacts in the raw
/// extract (export glitches, placeholder rows).
pub const YEAR_RANGE: (i32, i32) = (2000, 2100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionMode {
    /// Input already cleaned upstream: direct numeric parses, no row drops.
    Clean,
    /// Raw extract: decimal-comma repair, year range filter, row cleanup.
    Raw,
}

/// Parses a year that may arrive date-shaped (`2023-01-01`) or as a bare
/// integer.
pub fn parse_year(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
    for fmt in DATE_FORMATS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date.year());
        }
    }
    trimmed.parse::<i32>().ok()
}

/// Nullable integer parse for the sex code; tolerates float-shaped values
/// like `"1.0"` that some exports produce.
pub fn parse_sex(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 => Some(value as i64),
        _ => None,
    }
}

/// Direct numeric parse used in `Clean` mode.
pub fn parse_float_clean(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Defensive numeric parse used in `Raw` mode: trims and substitutes the
/// decimal comma before conversion.
pub fn parse_float_raw(raw: &str) -> Option<f64> {
    let repaired = raw.trim().replace(',', ".");
    if repaired.is_empty() {
        return None;
    }
    repaired.parse::<f64>().ok()
}

/// Zero-pads digit-only department codes to width 3, reconciling the `"99"`
/// vs `"099"` representations. Non-numeric codes (Corsica `2A`/`2B`) pass
/// through untouched.
pub fn pad_department(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{trimmed:0>3}")
    } else {
        trimmed.to_string()
    }
}

fn trimmed_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

struct ColumnIndexes {
    year: Option<usize>,
    region: Option<usize>,
    dept: Option<usize>,
    sex: Option<usize>,
    patho1: Option<usize>,
    patho2: Option<usize>,
    patho3: Option<usize>,
    age_class: Option<usize>,
    case_count: Option<usize>,
    population: Option<usize>,
    prevalence: Option<usize>,
    sort_key: Option<usize>,
}

impl ColumnIndexes {
    fn resolve(headers: &[String]) -> Self {
        let find = |column: CanonicalColumn| headers.iter().position(|h| h == column.as_str());
        Self {
            year: find(CanonicalColumn::Annee),
            region: find(CanonicalColumn::Region),
            dept: find(CanonicalColumn::Dept),
            sex: find(CanonicalColumn::Sexe),
            patho1: find(CanonicalColumn::PathoNiv1),
            patho2: find(CanonicalColumn::PathoNiv2),
            patho3: find(CanonicalColumn::PathoNiv3),
            age_class: find(CanonicalColumn::ClaAge5),
            case_count: find(CanonicalColumn::Ntop),
            population: find(CanonicalColumn::Npop),
            prevalence: find(CanonicalColumn::Prev),
            sort_key: find(CanonicalColumn::Tri),
        }
    }
}

/// Coerces a string frame into the canonical typed table.
///
/// Headers are harmonized first, so callers can hand over the ingestion
/// output directly. The returned frame records which canonical columns the
/// source carried; downstream computations check those capabilities instead
/// of probing by name.
pub fn coerce(frame: &StringFrame, mode: CoercionMode) -> TypedFrame {
    let headers = harmonize::harmonize_headers(frame.headers());
    let idx = ColumnIndexes::resolve(&headers);

    let present: BTreeSet<CanonicalColumn> = headers
        .iter()
        .filter_map(|name| CanonicalColumn::from_name(name))
        .collect();

    let parse_float = match mode {
        CoercionMode::Clean => parse_float_clean,
        CoercionMode::Raw => parse_float_raw,
    };

    fn cell<'a>(frame: &'a StringFrame, row: usize, column: Option<usize>) -> Option<&'a str> {
        column.and_then(|c| frame.value(row, c))
    }

    let mut rows = Vec::with_capacity(frame.row_count());
    let mut dropped_year = 0usize;
    let mut dropped_empty = 0usize;

    for row in 0..frame.row_count() {
        let year = cell(frame, row, idx.year).and_then(parse_year);

        if mode == CoercionMode::Raw
            && let Some(value) = year
            && !(YEAR_RANGE.0..=YEAR_RANGE.1).contains(&value)
        {
            dropped_year += 1;
            continue;
        }

        let record = Record {
            year,
            region: cell(frame, row, idx.region).and_then(trimmed_text),
            dept: cell(frame, row, idx.dept).map(pad_department).filter(|d| !d.is_empty()),
            sex: cell(frame, row, idx.sex).and_then(parse_sex),
            pathology_level_1: cell(frame, row, idx.patho1).and_then(trimmed_text),
            pathology_level_2: cell(frame, row, idx.patho2).and_then(trimmed_text),
            pathology_level_3: cell(frame, row, idx.patho3).and_then(trimmed_text),
            age_class: cell(frame, row, idx.age_class).and_then(trimmed_text),
            case_count: cell(frame, row, idx.case_count).and_then(parse_float),
            reference_population: cell(frame, row, idx.population).and_then(parse_float),
            prevalence: cell(frame, row, idx.prevalence).and_then(parse_float),
            sort_key: cell(frame, row, idx.sort_key).and_then(parse_float),
        };

        if mode == CoercionMode::Raw && fully_uninformative(&record, &present) {
            dropped_empty += 1;
            continue;
        }
        rows.push(record);
    }

    if dropped_year > 0 || dropped_empty > 0 {
        debug!(
            "Coercion dropped {dropped_year} out-of-range year row(s) and {dropped_empty} empty row(s)"
        );
    }

    TypedFrame::new(headers, present, rows)
}

/// A raw row is dropped only when every present key field (year, region,
/// dept, prev) is null at once.
fn fully_uninformative(record: &Record, present: &BTreeSet<CanonicalColumn>) -> bool {
    let mut any_key_column = false;
    let mut any_value = false;
    if present.contains(&CanonicalColumn::Annee) {
        any_key_column = true;
        any_value |= record.year.is_some();
    }
    if present.contains(&CanonicalColumn::Region) {
        any_key_column = true;
        any_value |= record.region.is_some();
    }
    if present.contains(&CanonicalColumn::Dept) {
        any_key_column = true;
        any_value |= record.dept.is_some();
    }
    if present.contains(&CanonicalColumn::Prev) {
        any_key_column = true;
        any_value |= record.prevalence.is_some();
    }
    any_key_column && !any_value
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    use crate::ingest::read_frame_from_bytes;

    fn frame(data: &str) -> StringFrame {
        read_frame_from_bytes(data.as_bytes(), None, UTF_8).expect("frame")
    }

    #[test]
    fn parse_year_accepts_dates_and_integers() {
        assert_eq!(parse_year("2023-01-01"), Some(2023));
        assert_eq!(parse_year("2023"), Some(2023));
        assert_eq!(parse_year(" 2019 "), Some(2019));
        assert_eq!(parse_year("not a year"), None);
    }

    #[test]
    fn raw_float_parse_repairs_decimal_commas() {
        assert_eq!(parse_float_raw("12,5"), Some(12.5));
        assert_eq!(parse_float_raw(" 3.75 "), Some(3.75));
        assert_eq!(parse_float_raw("abc"), None);
        assert_eq!(parse_float_raw(""), None);
    }

    #[test]
    fn department_padding_spares_corsica() {
        assert_eq!(pad_department("99"), "099");
        assert_eq!(pad_department("1"), "001");
        assert_eq!(pad_department("2A"), "2A");
        assert_eq!(pad_department(" 75 "), "075");
        assert_eq!(pad_department("971"), "971");
    }

    #[test]
    fn every_canonical_column_coerces_from_one_row() {
        let frame = frame(
            "annee;region;dept;sexe;patho_niv1;patho_niv2;patho_niv3;cla_age_5;ntop;npop;prev;tri\n\
             2023;84;99;1;Diabète;Diabète type 2;Insuline;0-4;120;1000;12,0;3\n",
        );
        let typed = coerce(&frame, CoercionMode::Raw);
        let row = &typed.rows()[0];
        assert_eq!(row.year, Some(2023));
        assert_eq!(row.region.as_deref(), Some("84"));
        assert_eq!(row.dept.as_deref(), Some("099"));
        assert_eq!(row.sex, Some(1));
        assert_eq!(row.pathology_level_1.as_deref(), Some("Diabète"));
        assert_eq!(row.pathology_level_2.as_deref(), Some("Diabète type 2"));
        assert_eq!(row.pathology_level_3.as_deref(), Some("Insuline"));
        assert_eq!(row.age_class.as_deref(), Some("0-4"));
        assert_eq!(row.case_count, Some(120.0));
        assert_eq!(row.reference_population, Some(1000.0));
        assert_eq!(row.prevalence, Some(12.0));
        assert_eq!(row.sort_key, Some(3.0));
    }

    #[test]
    fn raw_mode_filters_year_range_but_keeps_nulls() {
        let frame = frame(
            "Année;dept;prev\n1999;01;5,0\n2000;01;5,0\n2100;01;5,0\n;01;5,0\n2101;01;5,0\n",
        );
        let typed = coerce(&frame, CoercionMode::Raw);
        let years: Vec<Option<i32>> = typed.rows().iter().map(|r| r.year).collect();
        assert_eq!(years, vec![Some(2000), Some(2100), None]);
    }

    #[test]
    fn clean_mode_does_not_range_filter() {
        let frame = frame("annee,dept,prev\n1999,01,5.0\n");
        let typed = coerce(&frame, CoercionMode::Clean);
        assert_eq!(typed.rows()[0].year, Some(1999));
    }

    #[test]
    fn raw_mode_drops_fully_uninformative_rows() {
        let frame = frame("annee;region;dept;prev;ntop\n;;;;42\n2023;84;069;1,2;100\n");
        let typed = coerce(&frame, CoercionMode::Raw);
        assert_eq!(typed.row_count(), 1);
        assert_eq!(typed.rows()[0].dept.as_deref(), Some("069"));
        assert_eq!(typed.rows()[0].prevalence, Some(1.2));
    }

    #[test]
    fn malformed_values_become_null_not_errors() {
        let frame = frame("annee;sexe;ntop;npop;prev\n2023;neuf;abc;12 3;1,5\n");
        let typed = coerce(&frame, CoercionMode::Raw);
        let row = &typed.rows()[0];
        assert_eq!(row.sex, None);
        assert_eq!(row.case_count, None);
        assert_eq!(row.reference_population, None);
        assert_eq!(row.prevalence, Some(1.5));
    }

    #[test]
    fn clean_mode_does_not_repair_decimal_commas() {
        let frame = frame("annee,dept,prev\n2023,01,\"12,5\"\n");
        let typed = coerce(&frame, CoercionMode::Clean);
        assert_eq!(typed.rows()[0].prevalence, None);
    }
}
