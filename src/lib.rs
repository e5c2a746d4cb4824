pub mod cli;
pub mod coerce;
pub mod frame;
pub mod geo;
pub mod harmonize;
pub mod ingest;
pub mod population;
pub mod report;
pub mod tables;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use encoding_rs::{Encoding, UTF_8};
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, InputArgs, PrepareArgs, TablesArgs, UnionArgs},
    frame::TypedFrame,
    ingest::FrameCache,
    population::Reducer,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("ald_prep", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Prepare(args) => handle_prepare(&args),
        Commands::Union(args) => handle_union(&args),
        Commands::Tables(args) => handle_tables(&args),
    }
}

fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Shared front half of every command: ingest (through the cache when one is
/// configured) and coerce into the typed table.
fn load_typed(args: &InputArgs) -> Result<TypedFrame> {
    let encoding = resolve_encoding(args.input_encoding.as_deref())?;
    let raw = match &args.cache_dir {
        Some(dir) => FrameCache::new(dir).load_or_read(&args.input, args.delimiter, encoding),
        None => ingest::read_frame(&args.input, args.delimiter, encoding),
    }
    .with_context(|| format!("Ingesting {:?}", args.input))?;
    info!(
        "Ingested {} row(s) x {} column(s) from '{}'",
        raw.row_count(),
        raw.column_count(),
        args.input.display()
    );
    Ok(coerce::coerce(&raw, args.mode.into()))
}

fn handle_prepare(args: &PrepareArgs) -> Result<()> {
    let typed = load_typed(&args.input)?;
    info!(
        "Typed table holds {} row(s) across {} column(s)",
        typed.row_count(),
        typed.column_count()
    );
    let summary = report::summarize(&typed);
    info!(
        "{} region(s), {} department(s), year(s) {:?}",
        summary.regions, summary.departments, summary.years
    );
    if let Some(path) = &args.report {
        report::save_report(&summary, path)
            .with_context(|| format!("Writing data-quality report to {path:?}"))?;
        info!("Data-quality report written to {path:?}");
    }
    Ok(())
}

fn handle_union(args: &UnionArgs) -> Result<()> {
    let typed = load_typed(&args.input)?;
    let reducer: Reducer = args.reducer.into();
    match args.year {
        Some(year) => {
            match population::union_for_year(&typed, year, reducer) {
                Some(total) => println!("{year}\t{total}"),
                None => println!("{year}\tnot available"),
            }
            if args.audit {
                let audit = population::audit_for_year(&typed, year);
                info!(
                    "{} slice(s) in scope, {} with more than one population value",
                    audit.slices, audit.multi_values
                );
            }
        }
        None => {
            let series = population::union_by_year(&typed, reducer);
            if series.is_empty() {
                info!("Population union is not available for this extract");
            }
            for point in &series {
                println!("{}\t{}", point.year, point.population);
            }
            if args.audit {
                for point in &series {
                    let audit = population::audit_for_year(&typed, point.year);
                    info!(
                        "Year {}: {} slice(s), {} with disagreement",
                        point.year, audit.slices, audit.multi_values
                    );
                }
            }
        }
    }
    Ok(())
}

fn handle_tables(args: &TablesArgs) -> Result<()> {
    let typed = load_typed(&args.input)?;
    let derived = tables::build_tables(&typed);
    info!("Built derived table(s): {}", derived.names().join(", "));

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))?;
        write_json(dir, "fine", derived.fine.as_ref())?;
        write_json(dir, "timeseries", derived.timeseries.as_ref())?;
        write_json(dir, "by_region", derived.by_region.as_ref())?;
        write_json(dir, "by_region_weighted", derived.by_region_weighted.as_ref())?;
        write_json(dir, "by_sexe_desc", derived.by_sexe_desc.as_ref())?;
        write_json(dir, "dq", Some(&derived.quality))?;
        info!("Derived tables exported to {dir:?}");
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(
    dir: &std::path::Path,
    name: &str,
    table: Option<&T>,
) -> Result<()> {
    let Some(table) = table else {
        return Ok(());
    };
    let path = dir.join(format!("{name}.json"));
    let json = serde_json::to_string_pretty(table)
        .with_context(|| format!("Serializing table '{name}'"))?;
    fs::write(&path, json).with_context(|| format!("Writing table to {path:?}"))
}
