//! readmit-join CLI - Join HRRP readmission measures with POS facility data
//!
//! # Stages
//!
//! ```bash
//! readmit-join map hrrp.csv pos.csv > tagged.tsv        # classify + tag rows
//! LC_ALL=C sort -s -t$'\t' -k1,1 tagged.tsv > sorted.tsv
//! readmit-join reduce sorted.tsv > joined.csv           # group + join
//! ```
//!
//! # Local run
//!
//! ```bash
//! readmit-join run hrrp.csv pos.csv -o joined.csv --report report.json
//! readmit-join detect pos.csv                            # show detected settings
//! ```

use clap::{ArgAction, Parser, Subcommand};
use readmit_join::{
    inspect, map_files, map_stream, parse_delimiter, reduce_to_writer, run_files, JoinOptions,
    PipelineError,
};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "readmit-join")]
#[command(about = "Join CMS HRRP readmission measures with Provider of Services characteristics", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify raw HRRP/POS tables into tagged key/value lines
    Map {
        /// Input tables (default: stdin)
        inputs: Vec<PathBuf>,

        /// Input delimiter (auto-detect if not specified)
        #[arg(short, long, value_parser = parse_delimiter)]
        delimiter: Option<char>,

        /// Input encoding (auto-detect if not specified)
        #[arg(long)]
        encoding: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Group key-sorted tagged lines and write the joined table
    Reduce {
        /// Sorted intermediate file (default: stdin)
        input: Option<PathBuf>,

        /// Output delimiter (default: ',')
        #[arg(long, value_parser = parse_delimiter)]
        output_delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Map, sort in memory and reduce in one process
    Run {
        /// Input tables
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Input delimiter (auto-detect if not specified)
        #[arg(short, long, value_parser = parse_delimiter)]
        delimiter: Option<char>,

        /// Input encoding (auto-detect if not specified)
        #[arg(long)]
        encoding: Option<String>,

        /// Output delimiter (default: ',')
        #[arg(long, value_parser = parse_delimiter)]
        output_delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show detected encoding, delimiter and schema headers of a table
    Detect {
        /// Input table
        input: PathBuf,

        /// Input delimiter (auto-detect if not specified)
        #[arg(short, long, value_parser = parse_delimiter)]
        delimiter: Option<char>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Map {
            inputs,
            delimiter,
            encoding,
            output,
        } => cmd_map(&inputs, delimiter, encoding, output.as_deref()),

        Commands::Reduce {
            input,
            output_delimiter,
            output,
        } => cmd_reduce(input.as_deref(), output_delimiter, output.as_deref()),

        Commands::Run {
            inputs,
            delimiter,
            encoding,
            output_delimiter,
            output,
            report,
        } => cmd_run(
            &inputs,
            delimiter,
            encoding,
            output_delimiter,
            output.as_deref(),
            report.as_deref(),
        ),

        Commands::Detect { input, delimiter } => cmd_detect(&input, delimiter),
    };

    if let Err(e) = result {
        if e.downcast_ref::<PipelineError>().is_some_and(PipelineError::is_broken_pipe) {
            return;
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "readmit_join=info",
        1 => "readmit_join=debug",
        _ => "readmit_join=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_options(
    delimiter: Option<char>,
    encoding: Option<String>,
    output_delimiter: Option<char>,
) -> Result<JoinOptions, Box<dyn std::error::Error>> {
    let options = JoinOptions::from_env()?
        .with_delimiter(delimiter)
        .with_encoding(encoding)
        .with_output_delimiter(output_delimiter);
    // Fail on a bad --encoding before any output is written
    options.input_encoding()?;
    Ok(options)
}

fn cmd_map(
    inputs: &[PathBuf],
    delimiter: Option<char>,
    encoding: Option<String>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = load_options(delimiter, encoding, None)?;
    let out = open_output(output)?;

    let stats = if inputs.is_empty() {
        map_stream(io::stdin().lock(), &options, out)?
    } else {
        map_files(inputs, &options, out)?
    };

    tracing::info!(
        records = stats.records_emitted(),
        skipped = stats.rows_skipped(),
        "map done"
    );
    Ok(())
}

fn cmd_reduce(
    input: Option<&Path>,
    output_delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = load_options(None, None, output_delimiter)?;
    let out = open_output(output)?;

    let stats = match input {
        Some(path) => reduce_to_writer(File::open(path)?, &options, out)?,
        None => reduce_to_writer(io::stdin().lock(), &options, out)?,
    };

    if let Some(p) = output {
        tracing::info!(rows = stats.rows_written, path = %p.display(), "output written");
    }
    Ok(())
}

fn cmd_run(
    inputs: &[PathBuf],
    delimiter: Option<char>,
    encoding: Option<String>,
    output_delimiter: Option<char>,
    output: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = load_options(delimiter, encoding, output_delimiter)?;
    let out = open_output(output)?;

    let report = run_files(inputs, &options, out)?;

    if let Some(path) = report_path {
        fs::write(path, report.to_json()?)?;
        tracing::info!(path = %path.display(), "report written");
    }
    if let Some(p) = output {
        tracing::info!(rows = report.reduce.rows_written, path = %p.display(), "output written");
    }
    Ok(())
}

fn cmd_detect(input: &Path, delimiter: Option<char>) -> Result<(), Box<dyn std::error::Error>> {
    let options = load_options(delimiter, None, None)?;
    let info = inspect(input, &options)?;

    println!("File:      {}", input.display());
    println!("Encoding:  {}", info.encoding);
    println!("Delimiter: '{}'{}", info.delimiter, if delimiter.is_none() { " (auto-detected)" } else { "" });
    println!("Rows:      {}", info.rows);

    if info.headers.is_empty() {
        println!("Headers:   none (no HRRP or POS header row found)");
    } else {
        println!("Headers:");
        for header in &info.headers {
            println!("  line {:>8}  {:<4}  {} columns", header.line, header.schema, header.columns);
        }
    }
    Ok(())
}

fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(File::create(p)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}
