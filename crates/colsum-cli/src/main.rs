use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colsum_core::{
    aggregate_path, probe_path, AggregateError, AggregationResult, ProgressUpdate, SchemaError,
    SchemaErrorKind, SchemaProbe, SourceError,
};
use colsum_export::{
    export_bytes, export_results_csv, render_pivot, render_table, write_results_csv,
    CsvExportOptions,
};
use serde::Serialize;

mod settings;

use settings::{LocaleArgs, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "colsum",
    version,
    about = "Sum numeric columns of delimited files too large for memory, optionally per category."
)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the columns of a file, how they look, and a preview of the first rows.
    Probe(ProbeArgs),
    /// Sum columns, optionally grouped by a categorical column.
    Sum(SumArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProbeFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    /// Groups down, summed columns across.
    Pivot,
    Csv,
    Json,
}

#[derive(clap::Args, Debug)]
struct ProbeArgs {
    /// Delimited input file.
    input: PathBuf,

    /// Number of leading rows used to classify columns.
    #[arg(long, value_name = "N")]
    sample_rows: Option<usize>,

    #[arg(long, value_enum, default_value_t = ProbeFormat::Text)]
    format: ProbeFormat,

    #[command(flatten)]
    locale: LocaleArgs,
}

#[derive(clap::Args, Debug)]
struct SumArgs {
    /// Delimited input file.
    input: PathBuf,

    /// Column to sum (repeatable). Defaults to the first numeric columns of the file.
    #[arg(short = 'c', long = "column", value_name = "NAME")]
    columns: Vec<String>,

    /// Categorical column whose values partition the sums.
    #[arg(short = 'g', long, value_name = "NAME")]
    group_by: Option<String>,

    /// Rows held in memory at a time.
    #[arg(long, value_name = "ROWS")]
    batch_size: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Write the output to a file instead of stdout. Existing files are replaced atomically.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Field delimiter of CSV output.
    #[arg(long, value_name = "CHAR", default_value_t = ',')]
    output_delimiter: char,

    #[command(flatten)]
    locale: LocaleArgs,
}

#[derive(Debug, Serialize)]
struct ProbeReport<'a> {
    #[serde(flatten)]
    probe: &'a SchemaProbe,
    default_targets: Vec<String>,
    group_candidates: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Probe(args) => run_probe(args),
        Command::Sum(args) => run_sum(args),
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run_probe(args: ProbeArgs) -> Result<()> {
    let settings = Settings::load(args.locale.config.as_deref())?;
    let locale = args.locale.resolve(settings.locale)?;
    let mut options = settings.probe;
    if let Some(rows) = args.sample_rows {
        options.sample_rows = rows;
    }

    let probe = probe_path(&args.input, &locale, &options)
        .map_err(|err| with_schema_hint(err, &args.input))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.format {
        ProbeFormat::Json => {
            let report = ProbeReport {
                probe: &probe,
                default_targets: probe.default_targets(),
                group_candidates: probe.group_candidates(),
            };
            serde_json::to_writer_pretty(&mut out, &report)?;
            out.write_all(b"\n")?;
        }
        ProbeFormat::Text => write_probe_text(&mut out, &probe)?,
    }
    Ok(())
}

fn write_probe_text(out: &mut impl Write, probe: &SchemaProbe) -> Result<()> {
    let width = probe
        .column_names()
        .map(|n| n.chars().count())
        .max()
        .unwrap_or(0);

    writeln!(out, "Columns ({}):", probe.columns().len())?;
    for column in probe.columns() {
        let kind = if column.is_numeric() {
            "numeric"
        } else {
            "categorical"
        };
        writeln!(out, "  {:<width$}  {kind}", column.name)?;
    }

    let join = |names: Vec<String>| {
        if names.is_empty() {
            "(none)".to_string()
        } else {
            names.join(", ")
        }
    };
    writeln!(out, "Default selection: {}", join(probe.default_targets()))?;
    writeln!(out, "Group candidates: {}", join(probe.group_candidates()))?;

    if !probe.sample_rows().is_empty() {
        writeln!(out, "Preview ({} rows):", probe.sample_rows().len())?;
        writeln!(out, "  {}", probe.column_names().collect::<Vec<_>>().join(" | "))?;
        for row in probe.sample_rows() {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            writeln!(out, "  {}", cells.join(" | "))?;
        }
    }
    Ok(())
}

fn run_sum(args: SumArgs) -> Result<()> {
    let settings = Settings::load(args.locale.config.as_deref())?;
    let locale = args.locale.resolve(settings.locale)?;

    let mut config = settings.aggregation;
    if !args.columns.is_empty() {
        config.target_columns = args.columns.clone();
    }
    if let Some(group) = &args.group_by {
        config.group_column = Some(group.clone());
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    if config.target_columns.is_empty() {
        let probe = probe_path(&args.input, &locale, &settings.probe)
            .map_err(|err| with_schema_hint(err, &args.input))?;
        config.target_columns = probe.default_targets();
        if config.target_columns.is_empty() {
            log::warn!("no numeric columns found; pass --column to choose what to sum");
        } else {
            log::info!(
                "no --column given; summing {}",
                config.target_columns.join(", ")
            );
        }
    } else if config.validate().is_ok() {
        // Advisory only: categorical columns are still summed, their cells coerced one by one.
        if let Ok(probe) = probe_path(&args.input, &locale, &settings.probe) {
            for column in probe.non_numeric_selection(&config.target_columns) {
                log::warn!(
                    "column {column:?} does not look numeric; values that are not numbers will be skipped"
                );
            }
        }
    }

    let mut progress = ProgressLog::default();
    let result = aggregate_path(&args.input, &config, &locale, |update: ProgressUpdate| {
        progress.report(update)
    })
    .map_err(|err| with_aggregate_hint(err, &args.input))?;

    write_output(&args, &result)
}

fn write_output(args: &SumArgs, result: &AggregationResult) -> Result<()> {
    let csv_options = CsvExportOptions {
        delimiter: u8::try_from(args.output_delimiter)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| {
                format!(
                    "invalid output delimiter {:?} (expected an ASCII character)",
                    args.output_delimiter
                )
            })?,
        ..CsvExportOptions::default()
    };

    if let (OutputFormat::Csv, Some(path)) = (args.format, &args.output) {
        export_results_csv(path, result, &csv_options)
            .with_context(|| format!("write {}", path.display()))?;
        log::info!("wrote {} rows to {}", result.rows().len(), path.display());
        return Ok(());
    }

    let bytes = match args.format {
        OutputFormat::Table => render_table(result).into_bytes(),
        OutputFormat::Pivot => render_pivot(result).into_bytes(),
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            write_results_csv(&mut buf, result, &csv_options)?;
            buf
        }
        OutputFormat::Json => {
            let mut buf = serde_json::to_vec_pretty(result)?;
            buf.push(b'\n');
            buf
        }
    };

    match &args.output {
        Some(path) => {
            export_bytes(path, &bytes).with_context(|| format!("write {}", path.display()))?;
            log::info!("wrote results to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            out.write_all(&bytes)?;
            out.flush()?;
        }
    }
    Ok(())
}

/// Logs progress at every tenth of the way and on completion.
#[derive(Default)]
struct ProgressLog {
    last_decile: u32,
}

impl ProgressLog {
    fn report(&mut self, update: ProgressUpdate) {
        if update.done {
            log::info!("done: {} rows in {} batches", update.rows, update.batches);
            return;
        }
        let decile = (update.fraction * 10.0).floor() as u32;
        if decile > self.last_decile {
            self.last_decile = decile;
            log::info!("{:>3.0}% ({} rows)", update.fraction * 100.0, update.rows);
        } else {
            log::debug!(
                "batch {}: {:.1}% ({} rows)",
                update.batches,
                update.fraction * 100.0,
                update.rows
            );
        }
    }
}

fn schema_hint(kind: SchemaErrorKind) -> Option<&'static str> {
    match kind {
        SchemaErrorKind::EmptyInput => Some("the file is empty or has no header row"),
        SchemaErrorKind::ParseFailure => {
            Some("check --delimiter, --decimal and --thousands against the file")
        }
        SchemaErrorKind::EncodingFailure => {
            Some("try --encoding latin1, or --encoding auto to fall back per field")
        }
        SchemaErrorKind::Io => None,
    }
}

fn with_schema_hint(err: SchemaError, input: &Path) -> anyhow::Error {
    let hint = schema_hint(err.kind());
    attach_hint(anyhow::Error::new(err), hint, input)
}

fn with_aggregate_hint(err: AggregateError, input: &Path) -> anyhow::Error {
    let hint = match &err {
        AggregateError::Schema(schema) => schema_hint(schema.kind()),
        AggregateError::Source(SourceError::Parse { .. }) => {
            schema_hint(SchemaErrorKind::ParseFailure)
        }
        AggregateError::Source(SourceError::Encoding { .. }) => {
            schema_hint(SchemaErrorKind::EncodingFailure)
        }
        AggregateError::ColumnAbsent { .. } => {
            Some("run `colsum probe` to list the columns of the file")
        }
        AggregateError::Config(_) | AggregateError::Source(SourceError::Io(_)) => None,
    };
    attach_hint(anyhow::Error::new(err), hint, input)
}

fn attach_hint(err: anyhow::Error, hint: Option<&str>, input: &Path) -> anyhow::Error {
    let message = match hint {
        Some(hint) => format!("cannot process {} ({hint})", input.display()),
        None => format!("cannot process {}", input.display()),
    };
    err.context(message)
}
