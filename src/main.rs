//! # Main — CLI Entry Point
//!
//! Parses the command line and routes to the execution functions in `cli`.
//! Counting without printing runs on the rayon pool; printing and status
//! output force the single-threaded path so stdout stays ordered.
//!
//! ## Global Options
//!
//! - `START [STOP]`: the sieving interval; one bound means `[0, START]`.
//! - `--count K` / `--print K`: select k-tuplet sizes (1 = primes,
//!   2 = twins, ... 7 = septuplets); counting primes is the default action.
//! - `--size` / `--pre-sieve`: sieve tuning, validated eagerly.
//! - `--threads`: rayon pool size (0 = all logical cores).
//! - `LOG_FORMAT=json`: structured logs for machine consumption.

mod cli;

use anyhow::Result;
use clap::Parser;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "primescan", version, about = "Count and print primes and prime k-tuplets")]
struct Cli {
    /// Lower bound of the sieving interval; with a single bound given,
    /// the interval is [0, START]
    start: u64,

    /// Upper bound of the sieving interval (inclusive)
    stop: Option<u64>,

    /// Count prime k-tuplets: 1 = primes, 2 = twins, ... 7 = septuplets
    /// (repeatable; counting primes is the default action)
    #[arg(short = 'c', long = "count", value_name = "K")]
    count: Vec<u8>,

    /// Print prime k-tuplets, one per line (repeatable)
    #[arg(short = 'p', long = "print", value_name = "K")]
    print: Vec<u8>,

    /// Sieve segment size in KiB (a power of two in 1..=4096)
    #[arg(short = 's', long, default_value_t = 32)]
    size: u32,

    /// Presieve limit: 7, 11, 13, 17 or 19
    #[arg(long, default_value_t = 19)]
    pre_sieve: u64,

    /// Worker threads for counting (0 = all logical cores)
    #[arg(short = 't', long, default_value_t = 0, env = "PRIMESCAN_THREADS")]
    threads: usize,

    /// Show sieving progress on stderr
    #[arg(long)]
    status: bool,

    /// Emit the results as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // LOG_FORMAT=json for machine-readable logs, human-readable otherwise;
    // logs go to stderr so stdout carries only primes and results
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    cli::configure_rayon(cli.threads);
    cli::run(&cli)
}
