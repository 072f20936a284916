//! Writes synthetic yearly ACE proton files for trying the pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use solar_anomaly::data::model::{COLUMNS, MISSING_SENTINEL};

#[derive(Parser)]
#[command(name = "generate-sample")]
#[command(about = "Generate synthetic solar-wind proton data", long_about = None)]
struct Args {
    /// Output directory
    #[arg(short, long, default_value = "CSV")]
    output: PathBuf,

    /// First year to generate
    #[arg(long, default_value_t = 2003)]
    from_year: i32,

    /// Last year to generate (inclusive)
    #[arg(long, default_value_t = 2004)]
    to_year: i32,

    /// Minutes between samples (1-1440)
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=1440))]
    interval: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(short, long, value_enum, default_value = "csv")]
    format: Format,

    /// Omit the CSV header row, like raw ACE exports
    #[arg(long)]
    no_header: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Parquet,
}

/// One synthetic row: Year, Day, Hour, Minute, density, speed.
struct Row {
    year: i64,
    day: i64,
    hour: i64,
    minute: i64,
    density: f64,
    speed: f64,
}

/// Box-Muller transform for a normal variate.
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_yo_opt(year, 366).is_some() {
        366
    } else {
        365
    }
}

fn generate_year(year: i32, interval: u32, rng: &mut StdRng) -> Vec<Row> {
    let per_day = 24 * 60 / interval;
    let mut rows = Vec::new();

    for day in 1..=days_in_year(year) {
        // Slow variation standing in for solar-wind streams.
        let phase = f64::from(day) / 27.0 * std::f64::consts::TAU;
        for step in 0..per_day {
            let minute_of_day = step * interval;
            let mut density = (gauss(rng, 1.6, 0.35) + 0.3 * phase.sin()).exp();
            let mut speed = gauss(rng, 430.0 + 80.0 * phase.cos(), 30.0);

            if rng.gen_bool(0.0015) {
                density *= rng.gen_range(4.0..8.0);
            }
            if rng.gen_bool(0.0015) {
                speed += rng.gen_range(300.0..600.0);
            }
            if rng.gen_bool(0.01) {
                density = MISSING_SENTINEL;
            }
            if rng.gen_bool(0.01) {
                speed = MISSING_SENTINEL;
            }

            rows.push(Row {
                year: i64::from(year),
                day: i64::from(day),
                hour: i64::from(minute_of_day / 60),
                minute: i64::from(minute_of_day % 60),
                density,
                speed,
            });
        }
    }
    rows
}

fn write_csv(path: &Path, rows: &[Row], header: bool) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if header {
        writer.write_record(COLUMNS)?;
    }
    for r in rows {
        writer.write_record([
            r.year.to_string(),
            r.day.to_string(),
            r.hour.to_string(),
            r.minute.to_string(),
            format!("{:.2}", r.density),
            format!("{:.1}", r.speed),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, rows: &[Row]) -> Result<()> {
    let ints = |f: fn(&Row) -> i64| Int64Array::from(rows.iter().map(f).collect::<Vec<_>>());
    let floats = |f: fn(&Row) -> f64| Float64Array::from(rows.iter().map(f).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new(COLUMNS[0], DataType::Int64, false),
        Field::new(COLUMNS[1], DataType::Int64, false),
        Field::new(COLUMNS[2], DataType::Int64, false),
        Field::new(COLUMNS[3], DataType::Int64, false),
        Field::new(COLUMNS[4], DataType::Float64, true),
        Field::new(COLUMNS[5], DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(ints(|r| r.year)),
            Arc::new(ints(|r| r.day)),
            Arc::new(ints(|r| r.hour)),
            Arc::new(ints(|r| r.minute)),
            Arc::new(floats(|r| r.density)),
            Arc::new(floats(|r| r.speed)),
        ],
    )?;

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    for year in args.from_year..=args.to_year {
        let rows = generate_year(year, args.interval, &mut rng);
        let path = match args.format {
            Format::Csv => {
                let path = args.output.join(format!("ACE_SW_Proton_Data_{year}.csv"));
                write_csv(&path, &rows, !args.no_header)?;
                path
            }
            Format::Parquet => {
                let path = args.output.join(format!("ACE_SW_Proton_Data_{year}.parquet"));
                write_parquet(&path, &rows)?;
                path
            }
        };
        println!("Wrote {} rows to {}", rows.len(), path.display());
    }
    Ok(())
}
