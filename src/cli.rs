//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim: flag assembly,
//! the sequential/parallel dispatch, and result reporting (human-readable
//! or JSON).

use anyhow::{bail, Result};
use primescan::prime_sieve::{flags_for_count, flags_for_print, CALCULATE_STATUS, PRINT_STATUS};
use primescan::{par, PrimeSieve};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use super::Cli;

const LABELS: [&str; 7] =
    ["primes", "twins", "triplets", "quadruplets", "quintuplets", "sextuplets", "septuplets"];

#[derive(Serialize)]
struct Report {
    start: u64,
    stop: u64,
    seconds: f64,
    counts: BTreeMap<&'static str, u64>,
}

/// Sizes the global rayon pool; 0 keeps the default (all logical cores).
pub fn configure_rayon(threads: usize) {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build_global().ok();
    }
}

pub fn run(cli: &Cli) -> Result<()> {
    let (start, stop) = match cli.stop {
        Some(stop) => (cli.start, stop),
        None => (0, cli.start),
    };
    if stop < start {
        bail!("STOP ({}) must not be smaller than START ({})", stop, start);
    }

    let mut count_ks: Vec<usize> = cli.count.iter().map(|&k| k as usize).collect();
    let print_ks: Vec<usize> = cli.print.iter().map(|&k| k as usize).collect();
    if count_ks.is_empty() && print_ks.is_empty() {
        count_ks.push(1);
    }
    for &k in count_ks.iter().chain(print_ks.iter()) {
        if !(1..=7).contains(&k) {
            bail!("k-tuplet size {} must be in 1..=7 (1 = primes, 2 = twins, ...)", k);
        }
    }
    let count_flags = count_ks.iter().fold(0u32, |acc, &k| acc | flags_for_count(k));
    let print_flags = print_ks.iter().fold(0u32, |acc, &k| acc | flags_for_print(k));

    // printing and status need ordered output; counting can fan out
    let parallel = print_flags == 0 && !cli.status && cli.threads != 1;
    info!(start, stop, parallel, "sieving");
    let timer = Instant::now();

    let counts: [u64; 7] = if parallel {
        par::count_range(start, stop, count_flags, cli.size, cli.pre_sieve)?
    } else {
        let mut ps = PrimeSieve::new();
        ps.set_sieve_size(cli.size)?;
        ps.set_pre_sieve(cli.pre_sieve)?;
        let mut flags = count_flags | print_flags;
        if cli.status {
            flags |= PRINT_STATUS | CALCULATE_STATUS;
        }
        ps.set_flags(flags)?;
        ps.sieve(start, stop)?;
        std::array::from_fn(|i| ps.count(i + 1))
    };
    let seconds = timer.elapsed().as_secs_f64();

    if cli.json {
        let report = Report {
            start,
            stop,
            seconds,
            counts: count_ks.iter().map(|&k| (LABELS[k - 1], counts[k - 1])).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for &k in &count_ks {
            let mut label = LABELS[k - 1].to_string();
            label[..1].make_ascii_uppercase();
            println!("{}: {}", label, counts[k - 1]);
        }
        if !count_ks.is_empty() {
            println!("Seconds: {:.3}", seconds);
        }
    }
    info!(seconds, "done");
    Ok(())
}
