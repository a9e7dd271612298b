//! hic-straw CLI entry point
//!
//! Dumps contact records from local or remote .hic files.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use hic_straw::core::{DEFAULT_BIN_THRESHOLD, DEFAULT_USER_AGENT};
use hic_straw::{
    block_record_total, count, fetch, infer_resolution, read_metadata, ContactRecord, IoStrategy, QueryOptions,
    StrawRequest, Unit,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Local file access strategy (CLI enum)
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum IoStrategyArg {
    /// Memory-map files of 100MB or more
    #[default]
    #[value(name = "auto")]
    Auto,
    /// Seek and read per request
    #[value(name = "buffered")]
    Buffered,
    /// Always memory-map
    #[value(name = "mmap")]
    Mmap,
}

impl From<IoStrategyArg> for IoStrategy {
    fn from(arg: IoStrategyArg) -> Self {
        match arg {
            IoStrategyArg::Auto => IoStrategy::Auto,
            IoStrategyArg::Buffered => IoStrategy::Buffered,
            IoStrategyArg::Mmap => IoStrategy::MemoryMapped,
        }
    }
}

#[derive(Parser)]
#[command(name = "hic-straw")]
#[command(about = "Extract contact records from .hic files")]
#[command(version)]
struct Cli {
    /// Local file access strategy
    #[arg(long = "io", global = true, default_value = "auto")]
    io_strategy: IoStrategyArg,

    /// User-Agent for remote files
    #[arg(long = "user-agent", global = true, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump contact records for a region pair
    Dump {
        /// Normalization: NONE, VC, VC_SQRT or KR
        norm: String,
        /// .hic file path or http(s) URL
        file: String,
        /// First region: chr or chr:start:end
        chr1: String,
        /// Second region: chr or chr:start:end
        chr2: String,
        /// Unit: BP or FRAG
        unit: String,
        /// Bin size, or "auto" to pick one from the file's resolutions
        binsize: String,
        /// Output file (optional, stdout if not specified)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        /// Number of threads for block decoding
        #[arg(short = 't', long, default_value = "1")]
        threads: usize,
        /// Print only the number of records
        #[arg(long)]
        count: bool,
        /// Print the raw sum of block record counts instead of decoding
        #[arg(long, conflicts_with = "count")]
        block_total: bool,
    },
    /// Print header metadata
    Info {
        /// .hic file path or http(s) URL
        file: String,
    },
}

/// Replace an `auto` bin size with one inferred from the file's resolutions
fn resolve_bin_size(request: &mut StrawRequest, options: &QueryOptions) -> anyhow::Result<()> {
    let header = read_metadata(&request.file, options)?;
    let region1 = request.region1.resolve(&header.chromosomes)?;
    let region2 = request.region2.resolve(&header.chromosomes)?;
    let resolutions = match request.unit {
        Unit::Bp => &header.bp_resolutions,
        Unit::Frag => &header.frag_resolutions,
    };
    let length = region1.length().max(region2.length());
    request.bin_size = infer_resolution(length, resolutions, DEFAULT_BIN_THRESHOLD)
        .with_context(|| format!("{} has no {} resolutions", request.file, request.unit))?;
    eprintln!("Inferred bin size: {}", request.bin_size);
    Ok(())
}

fn open_output(output: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

/// What `dump` prints
enum DumpResult {
    Total(u64),
    Records(Vec<ContactRecord>),
}

/// Run the query; nothing is written until it has succeeded
fn run_dump(
    request: &StrawRequest,
    options: &QueryOptions,
    count_only: bool,
    block_total: bool,
) -> anyhow::Result<DumpResult> {
    Ok(if block_total {
        DumpResult::Total(block_record_total(request, options)?)
    } else if count_only {
        DumpResult::Total(count(request, options)?)
    } else {
        DumpResult::Records(fetch(request, options)?)
    })
}

fn write_dump(out: &mut dyn Write, result: &DumpResult) -> io::Result<()> {
    match result {
        DumpResult::Total(n) => writeln!(out, "{}", n)?,
        DumpResult::Records(records) => {
            for r in records {
                writeln!(out, "{}\t{}\t{}", r.bin_x, r.bin_y, r.counts)?;
            }
        }
    }
    out.flush()
}

/// Run the query, then write its result to `output` (stdout when `None`)
fn dump_to(
    request: &StrawRequest,
    options: &QueryOptions,
    count_only: bool,
    block_total: bool,
    output: Option<&PathBuf>,
) -> anyhow::Result<DumpResult> {
    let result = run_dump(request, options, count_only, block_total)?;
    let mut out = open_output(output)?;
    write_dump(&mut out, &result)?;
    Ok(result)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    let mut options = QueryOptions {
        io_strategy: cli.io_strategy.into(),
        user_agent: cli.user_agent,
        ..QueryOptions::default()
    };

    match cli.command {
        Commands::Dump {
            norm,
            file,
            chr1,
            chr2,
            unit,
            binsize,
            output,
            threads,
            count: count_only,
            block_total,
        } => {
            options.threads = threads;
            let auto = binsize.eq_ignore_ascii_case("auto");
            let bin_size = if auto {
                1
            } else {
                binsize
                    .parse::<i32>()
                    .with_context(|| format!("Invalid bin size '{}'", binsize))?
            };
            let mut request = StrawRequest::parse(&norm, &file, &chr1, &chr2, &unit, bin_size)?;
            if auto {
                resolve_bin_size(&mut request, &options)?;
            }

            eprintln!("Querying {} {} x {} at {} {}", file, chr1, chr2, request.bin_size, request.unit);
            let result = dump_to(&request, &options, count_only, block_total, output.as_ref())?;
            if let DumpResult::Records(records) = &result {
                eprintln!("\n=== Query Statistics ===");
                eprintln!("Records:         {}", records.len());
            }
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Info { file } => {
            let header = read_metadata(&file, &options)?;
            let mut out = open_output(None)?;
            writeln!(out, "version\t{}", header.version)?;
            writeln!(out, "genome\t{}", header.genome_id)?;
            for (key, value) in &header.attributes {
                // attribute values can be multi-line (statistics, graphs)
                writeln!(out, "attribute\t{}\t{}", key, value.lines().next().unwrap_or(""))?;
            }
            for chrom in header.chromosomes.iter() {
                writeln!(out, "chromosome\t{}\t{}\t{}", chrom.index, chrom.name, chrom.length)?;
            }
            let join = |values: &[i32]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
            writeln!(out, "bp_resolutions\t{}", join(&header.bp_resolutions))?;
            writeln!(out, "frag_resolutions\t{}", join(&header.frag_resolutions))?;
            out.flush()?;
        }
    }

    Ok(())
}
