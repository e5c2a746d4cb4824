use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{coerce::CoercionMode, population::Reducer};

#[derive(Debug, Parser)]
#[command(author, version, about = "Prepare the ALD prevalence extract", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest and coerce an extract, log a summary, optionally write the
    /// data-quality report
    Prepare(PrepareArgs),
    /// Compute the de-duplicated population union for a year or per year
    Union(UnionArgs),
    /// Build the derived tables and optionally export them as JSON
    Tables(TablesArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Extract already cleaned upstream (effectifs_cleaned.csv)
    Clean,
    /// Raw extract with locale quirks (effectifs.csv)
    Raw,
}

impl From<ModeArg> for CoercionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Clean => CoercionMode::Clean,
            ModeArg::Raw => CoercionMode::Raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReducerArg {
    Median,
    Min,
    Max,
    First,
}

impl From<ReducerArg> for Reducer {
    fn from(reducer: ReducerArg) -> Self {
        match reducer {
            ReducerArg::Median => Reducer::Median,
            ReducerArg::Min => Reducer::Min,
            ReducerArg::Max => Reducer::Max,
            ReducerArg::First => Reducer::First,
        }
    }
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input delimited file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Coercion mode matching the extract variant
    #[arg(long, value_enum, default_value_t = ModeArg::Clean)]
    pub mode: ModeArg,
    /// Field separator override (supports ',', 'tab', ';', '|'); sniffed
    /// from the file when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Directory for the binary frame cache; caching is off when omitted
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Write the JSON data-quality report to this path
    #[arg(long, num_args = 0..=1, default_missing_value = crate::report::DEFAULT_REPORT_PATH)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct UnionArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Restrict to a single year; the whole per-year series when omitted
    #[arg(long)]
    pub year: Option<i32>,
    /// Reducer collapsing duplicate per-slice population figures
    #[arg(long, value_enum, default_value_t = ReducerArg::Median)]
    pub reducer: ReducerArg,
    /// Also report how many slices disagree on the population figure
    #[arg(long)]
    pub audit: bool,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Directory receiving one <name>.json file per derived table
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
