mod common;

use assert_cmd::Command;
use common::{RAW_EXTRACT, TestWorkspace};
use predicates::str::contains;

fn ald_prep() -> Command {
    Command::cargo_bin("ald-prep").expect("binary under test")
}

#[test]
fn prepare_writes_the_data_quality_report() {
    let workspace = TestWorkspace::new();
    let source = workspace.write("effectifs.csv", RAW_EXTRACT);
    let report = workspace.path().join("reports").join("dq.json");

    ald_prep()
        .arg("prepare")
        .arg("-i")
        .arg(&source)
        .args(["--mode", "raw"])
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    let text = std::fs::read_to_string(&report).expect("report written");
    assert!(text.contains("\"rows\": 5"));
    assert!(text.contains("\"population_union_npop_2023\": 3000.0"));
    assert!(text.contains("\"has_sex\": true"));
}

#[test]
fn union_prints_the_single_year_total() {
    let workspace = TestWorkspace::new();
    let source = workspace.write("effectifs.csv", RAW_EXTRACT);

    ald_prep()
        .arg("union")
        .arg("-i")
        .arg(&source)
        .args(["--mode", "raw", "--year", "2023", "--reducer", "median"])
        .arg("--audit")
        .assert()
        .success()
        .stdout(contains("2023\t3000"));
}

#[test]
fn union_without_year_prints_the_series() {
    let workspace = TestWorkspace::new();
    let source = workspace.write("effectifs.csv", RAW_EXTRACT);

    ald_prep()
        .arg("union")
        .arg("-i")
        .arg(&source)
        .args(["--mode", "raw"])
        .assert()
        .success()
        .stdout(contains("2023\t3000"));
}

#[test]
fn union_reports_not_available_when_columns_are_missing() {
    let workspace = TestWorkspace::new();
    let source = workspace.write("partial.csv", "annee,prev\n2023,5.0\n");

    ald_prep()
        .arg("union")
        .arg("-i")
        .arg(&source)
        .args(["--year", "2023"])
        .assert()
        .success()
        .stdout(contains("2023\tnot available"));
}

#[test]
fn tables_exports_every_available_table_as_json() {
    let workspace = TestWorkspace::new();
    let source = workspace.write("effectifs.csv", RAW_EXTRACT);
    let out_dir = workspace.path().join("tables");

    ald_prep()
        .arg("tables")
        .arg("-i")
        .arg(&source)
        .args(["--mode", "raw"])
        .arg("-o")
        .arg(&out_dir)
        .assert()
        .success();

    for name in [
        "fine",
        "timeseries",
        "by_region",
        "by_region_weighted",
        "by_sexe_desc",
        "dq",
    ] {
        assert!(
            out_dir.join(format!("{name}.json")).exists(),
            "expected {name}.json"
        );
    }
    let dq = std::fs::read_to_string(out_dir.join("dq.json")).expect("dq table");
    assert!(dq.contains("\"departments\": 3"));
}

#[test]
fn tables_omits_sex_statistics_when_the_column_is_absent() {
    let workspace = TestWorkspace::new();
    let source = workspace.write(
        "cleaned.csv",
        "annee,region,dept,npop,prev\n2023,84,099,1000,12.5\n",
    );
    let out_dir = workspace.path().join("tables");

    ald_prep()
        .arg("tables")
        .arg("-i")
        .arg(&source)
        .arg("-o")
        .arg(&out_dir)
        .assert()
        .success();

    assert!(!out_dir.join("by_sexe_desc.json").exists());
    assert!(out_dir.join("by_region_weighted.json").exists());
}

#[test]
fn prepare_uses_the_cache_directory_when_given() {
    let workspace = TestWorkspace::new();
    let source = workspace.write("effectifs.csv", RAW_EXTRACT);
    let cache_dir = workspace.path().join("data_cache");

    ald_prep()
        .arg("prepare")
        .arg("-i")
        .arg(&source)
        .args(["--mode", "raw"])
        .arg("--cache-dir")
        .arg(&cache_dir)
        .assert()
        .success();

    assert!(cache_dir.join("effectifs.bin").exists());
}

#[test]
fn missing_input_fails_with_an_io_error() {
    ald_prep()
        .arg("prepare")
        .arg("-i")
        .arg("does-not-exist.csv")
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn delimiter_override_bypasses_sniffing() {
    let workspace = TestWorkspace::new();
    let source = workspace.write("odd.csv", "annee;dept;npop\n2023;099;5.0\n");

    ald_prep()
        .arg("union")
        .arg("-i")
        .arg(&source)
        .args(["--delimiter", "semicolon", "--year", "2023"])
        .assert()
        .success()
        .stdout(contains("2023\t5"));
}
