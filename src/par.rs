//! # Par — Parallel Counting over Disjoint Sub-Intervals
//!
//! Splits `[start, stop]` into chunks with boundaries on multiples of 30 and
//! runs an independent [`PrimeSieve`] per chunk on the rayon pool. A
//! 30-boundary is a sieve byte boundary, and every k-tuplet byte mask is
//! byte-local, so each tuplet is counted by exactly one chunk and the count
//! vectors add.
//!
//! Sieving depends on the primes up to sqrt(stop), so each chunk recomputes
//! them locally; sieving-prime state is never shared across threads.

use crate::prime_sieve::COUNT_PRIMES;
use crate::{Error, PrimeSieve};
use rayon::prelude::*;
use tracing::debug;

/// Count flags only; printing and status from worker threads would interleave.
const COUNTABLE: u32 = (1 << 7) - 1;

/// Don't bother splitting tiny ranges; a chunk should amortize its own
/// sieving-prime generation.
const MIN_CHUNK_SPAN: u64 = 8 * 1024 * 1024;

/// Counts primes and k-tuplets over `[start, stop]` in parallel, returning
/// the seven-slot count vector. `flags` must only contain COUNT bits;
/// `sieve_size_kib` and `pre_sieve` are forwarded to every chunk sieve.
pub fn count_range(
    start: u64,
    stop: u64,
    flags: u32,
    sieve_size_kib: u32,
    pre_sieve: u64,
) -> Result<[u64; 7], Error> {
    if flags & !COUNTABLE != 0 {
        return Err(Error::InvalidFlags(flags));
    }
    if stop < start {
        return Err(Error::InvalidRange { start, stop });
    }

    let count = |lo: u64, hi: u64| -> Result<[u64; 7], Error> {
        let mut ps = PrimeSieve::new();
        ps.set_sieve_size(sieve_size_kib)?;
        ps.set_pre_sieve(pre_sieve)?;
        ps.set_flags(flags)?;
        ps.sieve(lo, hi)?;
        Ok(std::array::from_fn(|i| ps.count(i + 1)))
    };

    let threads = rayon::current_num_threads() as u64;
    let chunks = chunk_bounds(start, stop, threads * 4, MIN_CHUNK_SPAN);
    debug!(start, stop, chunks = chunks.len(), threads, "parallel count");

    if chunks.len() == 1 {
        return count(start, stop);
    }
    let vectors: Result<Vec<[u64; 7]>, Error> =
        chunks.into_par_iter().map(|(lo, hi)| count(lo, hi)).collect();
    let mut totals = [0u64; 7];
    for v in vectors? {
        for (t, n) in totals.iter_mut().zip(v) {
            *t += n;
        }
    }
    Ok(totals)
}

/// Parallel pi(stop) - pi(start - 1) with default sieve parameters.
pub fn count_primes(start: u64, stop: u64) -> Result<u64, Error> {
    Ok(count_range(start, stop, COUNT_PRIMES, 32, 19)?[0])
}

/// Disjoint chunks covering `[start, stop]` exactly, with every interior
/// boundary on a multiple of 30.
fn chunk_bounds(start: u64, stop: u64, want: u64, min_span: u64) -> Vec<(u64, u64)> {
    let span = stop - start + 1;
    let want = want.clamp(1, span / min_span.max(1) + 1);
    let per = (span / want).max(min_span);
    let mut chunks = Vec::new();
    let mut lo = start;
    while lo <= stop {
        let raw_hi = lo.saturating_add(per);
        // align the cut upward to a multiple of 30, exclusive bound
        let cut = raw_hi.checked_next_multiple_of(30).unwrap_or(u64::MAX);
        let hi = if cut > stop || cut == u64::MAX { stop } else { cut - 1 };
        chunks.push((lo, hi));
        if hi == stop {
            break;
        }
        lo = hi + 1;
    }
    chunks
}
