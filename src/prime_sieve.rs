//! # PrimeSieve — Public Façade
//!
//! Owns the sieving parameters, dispatches a run of the segmented sieve, and
//! exposes the results: the seven-slot count vector (primes, twins, ...,
//! septuplets), printed output, or an ascending callback stream.
//!
//! ```no_run
//! use primescan::{PrimeSieve, COUNT_TWINS};
//!
//! let mut ps = PrimeSieve::new();
//! assert_eq!(ps.count_primes(0, 100)?, 25);
//!
//! ps.set_flags(COUNT_TWINS)?;
//! ps.sieve(0, 1_000_000)?;
//! assert_eq!(ps.count(2), 8169);
//! # Ok::<(), primescan::Error>(())
//! ```
//!
//! Flag bit positions are fixed for cross-language wire stability; user
//! flags must fit the low 20 bits, the rest are reserved for the internal
//! callback modes.

use crate::finder::{Callback, PrimeFinder};
use crate::sieve::SieveOfEratosthenes;
use crate::sieving_primes::SievingPrimes;
use crate::{isqrt, Error};
use std::time::Instant;
use tracing::debug;

pub const COUNT_PRIMES: u32 = 1 << 0;
pub const COUNT_TWINS: u32 = 1 << 1;
pub const COUNT_TRIPLETS: u32 = 1 << 2;
pub const COUNT_QUADRUPLETS: u32 = 1 << 3;
pub const COUNT_QUINTUPLETS: u32 = 1 << 4;
pub const COUNT_SEXTUPLETS: u32 = 1 << 5;
pub const COUNT_SEPTUPLETS: u32 = 1 << 6;
pub const PRINT_PRIMES: u32 = 1 << 7;
pub const PRINT_TWINS: u32 = 1 << 8;
pub const PRINT_TRIPLETS: u32 = 1 << 9;
pub const PRINT_QUADRUPLETS: u32 = 1 << 10;
pub const PRINT_QUINTUPLETS: u32 = 1 << 11;
pub const PRINT_SEXTUPLETS: u32 = 1 << 12;
pub const PRINT_SEPTUPLETS: u32 = 1 << 13;
pub const PRINT_STATUS: u32 = 1 << 14;
pub const CALCULATE_STATUS: u32 = 1 << 15;

/// Internal callback modes; user flags must stay below this bit.
pub(crate) const CALLBACK_PLAIN: u32 = 1 << 20;
pub(crate) const CALLBACK_CTX: u32 = 1 << 21;

const PUBLIC_FLAGS: u32 = (1 << 20) - 1;

/// Count flag for k-tuplet size `k` in 1..=7 (1 = plain primes).
#[inline]
pub fn flags_for_count(k: usize) -> u32 {
    debug_assert!((1..=7).contains(&k));
    1 << (k - 1)
}

/// Print flag for k-tuplet size `k` in 1..=7.
#[inline]
pub fn flags_for_print(k: usize) -> u32 {
    debug_assert!((1..=7).contains(&k));
    1 << (6 + k)
}

pub struct PrimeSieve {
    start: u64,
    stop: u64,
    sieve_size_kib: u32,
    pre_sieve: u64,
    flags: u32,
    counts: [u64; 7],
    percent: f64,
    seconds: f64,
    status_hook: Option<Box<dyn FnMut(f64) -> bool>>,
}

impl Default for PrimeSieve {
    fn default() -> Self {
        PrimeSieve::new()
    }
}

impl PrimeSieve {
    pub fn new() -> PrimeSieve {
        PrimeSieve {
            start: 0,
            stop: 0,
            sieve_size_kib: 32,
            pre_sieve: 19,
            flags: 0,
            counts: [0; 7],
            percent: 0.0,
            seconds: 0.0,
            status_hook: None,
        }
    }

    // ── Getters ─────────────────────────────────────────────────────

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn stop(&self) -> u64 {
        self.stop
    }

    /// Sieve size in KiB.
    pub fn sieve_size(&self) -> u32 {
        self.sieve_size_kib
    }

    pub fn pre_sieve(&self) -> u64 {
        self.pre_sieve
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Progress of the last `sieve()` in percent.
    pub fn status(&self) -> f64 {
        self.percent
    }

    /// Wall time of the last `sieve()` in seconds.
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Count for k-tuplet size `k` in 1..=7; zero unless the matching
    /// COUNT flag was set during the last `sieve()`.
    pub fn count(&self, k: usize) -> u64 {
        assert!((1..=7).contains(&k), "k-tuplet size {} not in 1..=7", k);
        self.counts[k - 1]
    }

    // ── Setters ─────────────────────────────────────────────────────

    /// Sets the segment size in KiB; must be a power of two in 1..=4096.
    pub fn set_sieve_size(&mut self, kib: u32) -> Result<(), Error> {
        if !kib.is_power_of_two() || !(1..=4096).contains(&kib) {
            return Err(Error::InvalidSieveSize(kib));
        }
        self.sieve_size_kib = kib;
        Ok(())
    }

    /// Sets the presieve limit; must be one of 7, 11, 13, 17, 19.
    pub fn set_pre_sieve(&mut self, limit: u64) -> Result<(), Error> {
        if ![7, 11, 13, 17, 19].contains(&limit) {
            return Err(Error::InvalidPreSieve(limit));
        }
        self.pre_sieve = limit;
        Ok(())
    }

    /// Replaces the flag set; bits >= 2^20 are reserved and rejected.
    pub fn set_flags(&mut self, flags: u32) -> Result<(), Error> {
        if flags & !PUBLIC_FLAGS != 0 {
            return Err(Error::InvalidFlags(flags));
        }
        self.flags = flags;
        Ok(())
    }

    /// Adds to the flag set; bits >= 2^20 are reserved and rejected.
    pub fn add_flags(&mut self, flags: u32) -> Result<(), Error> {
        if flags & !PUBLIC_FLAGS != 0 {
            return Err(Error::InvalidFlags(flags));
        }
        self.flags |= flags;
        Ok(())
    }

    /// Installs a status hook, called at most once per segment with the
    /// current percentage (monotone, 0..=100). Returning `false` cancels
    /// the sieve between segments with [`Error::Interrupted`].
    pub fn set_status_hook(&mut self, hook: impl FnMut(f64) -> bool + 'static) {
        self.status_hook = Some(Box::new(hook));
    }

    // ── Sieving ─────────────────────────────────────────────────────

    /// Runs the sieve over `[start, stop]` honouring the current flags.
    pub fn sieve(&mut self, start: u64, stop: u64) -> Result<(), Error> {
        self.run(start, stop, Callback::None, 0)
    }

    /// Calls `f` once per prime in `[start, stop]`, in ascending order.
    pub fn generate_primes(
        &mut self,
        start: u64,
        stop: u64,
        mut f: impl FnMut(u64),
    ) -> Result<(), Error> {
        self.run(start, stop, Callback::Plain(&mut f), CALLBACK_PLAIN)
    }

    /// Like [`generate_primes`], passing `ctx` through unchanged — the
    /// hand-off used by external parallel drivers to tag the source chunk.
    ///
    /// [`generate_primes`]: PrimeSieve::generate_primes
    pub fn generate_primes_ctx(
        &mut self,
        start: u64,
        stop: u64,
        ctx: i32,
        mut f: impl FnMut(u64, i32),
    ) -> Result<(), Error> {
        self.run(start, stop, Callback::WithCtx(&mut f, ctx), CALLBACK_CTX)
    }

    fn run(
        &mut self,
        start: u64,
        stop: u64,
        callback: Callback<'_>,
        internal_flags: u32,
    ) -> Result<(), Error> {
        if stop < start {
            return Err(Error::InvalidRange { start, stop });
        }
        self.start = start;
        self.stop = stop;
        self.counts = [0; 7];
        self.percent = 0.0;
        let flags = self.flags | internal_flags;
        let timer = Instant::now();

        let result = {
            let hook = self.status_hook.as_deref_mut();
            let mut finder = PrimeFinder::new(
                start,
                stop,
                flags,
                callback,
                flags & CALCULATE_STATUS != 0,
                flags & PRINT_STATUS != 0,
                hook,
            );
            finder.process_small_tuples();
            let result = if stop >= 7 {
                Self::drive(start, stop, self.sieve_size_kib, self.pre_sieve, &mut finder)
            } else {
                Ok(())
            };
            if result.is_ok() {
                finder.finalize();
                self.counts = finder.counts();
                self.percent = finder.status_percent().unwrap_or(100.0);
            }
            result
        };
        self.seconds = timer.elapsed().as_secs_f64();
        debug!(
            start,
            stop,
            flags = format_args!("{:#x}", flags),
            seconds = self.seconds,
            "sieve finished"
        );
        result
    }

    /// The generator/consumer protocol: primes up to sqrt(stop) arrive in
    /// ascending order; the driver sieves ahead only far enough to admit
    /// each one, then runs out the remaining segments.
    fn drive(
        start: u64,
        stop: u64,
        sieve_size_kib: u32,
        pre_sieve: u64,
        finder: &mut PrimeFinder<'_, '_>,
    ) -> Result<(), Error> {
        let mut soe = SieveOfEratosthenes::new(start, stop, sieve_size_kib, pre_sieve)?;
        for prime in SievingPrimes::new(isqrt(stop)) {
            soe.sieve_prime(prime, finder)?;
        }
        soe.finish(finder)
    }

    // ── Convenience Wrappers ────────────────────────────────────────

    fn count_with(&mut self, start: u64, stop: u64, flags: u32, k: usize) -> Result<u64, Error> {
        let saved = self.flags;
        self.flags = flags;
        let result = self.run(start, stop, Callback::None, 0);
        self.flags = saved;
        result.map(|()| self.counts[k - 1])
    }

    /// pi(stop) - pi(start - 1).
    pub fn count_primes(&mut self, start: u64, stop: u64) -> Result<u64, Error> {
        self.count_with(start, stop, COUNT_PRIMES, 1)
    }

    pub fn count_twins(&mut self, start: u64, stop: u64) -> Result<u64, Error> {
        self.count_with(start, stop, COUNT_TWINS, 2)
    }

    pub fn count_triplets(&mut self, start: u64, stop: u64) -> Result<u64, Error> {
        self.count_with(start, stop, COUNT_TRIPLETS, 3)
    }

    pub fn count_quadruplets(&mut self, start: u64, stop: u64) -> Result<u64, Error> {
        self.count_with(start, stop, COUNT_QUADRUPLETS, 4)
    }

    pub fn count_quintuplets(&mut self, start: u64, stop: u64) -> Result<u64, Error> {
        self.count_with(start, stop, COUNT_QUINTUPLETS, 5)
    }

    pub fn count_sextuplets(&mut self, start: u64, stop: u64) -> Result<u64, Error> {
        self.count_with(start, stop, COUNT_SEXTUPLETS, 6)
    }

    pub fn count_septuplets(&mut self, start: u64, stop: u64) -> Result<u64, Error> {
        self.count_with(start, stop, COUNT_SEPTUPLETS, 7)
    }

    /// Counts k-tuplets of size `k` in 1..=7.
    pub fn count_ktuplets(&mut self, k: usize, start: u64, stop: u64) -> Result<u64, Error> {
        if !(1..=7).contains(&k) {
            return Err(Error::InvalidKTupletSize(k));
        }
        self.count_with(start, stop, flags_for_count(k), k)
    }

    /// Prints one prime per line to stdout.
    pub fn print_primes(&mut self, start: u64, stop: u64) -> Result<(), Error> {
        let saved = self.flags;
        self.flags = PRINT_PRIMES;
        let result = self.run(start, stop, Callback::None, 0);
        self.flags = saved;
        result
    }

    /// Prints one k-tuplet per line, `(p1, p2, ...)`.
    pub fn print_ktuplets(&mut self, k: usize, start: u64, stop: u64) -> Result<(), Error> {
        if !(1..=7).contains(&k) {
            return Err(Error::InvalidKTupletSize(k));
        }
        let saved = self.flags;
        self.flags = flags_for_print(k);
        let result = self.run(start, stop, Callback::None, 0);
        self.flags = saved;
        result
    }
}

#[cfg(test)]
mod tests {
    //! Façade-level correctness: tabulated pi and tuplet values, parameter
    //! validation, callback ordering, status behavior. The heavyweight
    //! (10^8 and up) spot checks live in tests/count_tests.rs.

    use super::*;

    // ── Tabulated Counts ────────────────────────────────────────────

    /// pi at the classic table values, via the convenience wrapper.
    #[test]
    fn pi_spot_checks() {
        let mut ps = PrimeSieve::new();
        assert_eq!(ps.count_primes(0, 10).unwrap(), 4);
        assert_eq!(ps.count_primes(0, 100).unwrap(), 25);
        assert_eq!(ps.count_primes(0, 1_000).unwrap(), 168);
        assert_eq!(ps.count_primes(0, 10_000).unwrap(), 1_229);
        assert_eq!(ps.count_primes(0, 1_000_000).unwrap(), 78_498);
    }

    /// Twin count at 10^6 (8169 pairs, including (3,5) and (5,7)).
    #[test]
    fn twin_count_at_1e6() {
        let mut ps = PrimeSieve::new();
        assert_eq!(ps.count_twins(0, 1_000_000).unwrap(), 8_169);
    }

    /// All seven counters in one pass over [0, 100]: 25 primes; 8 twins;
    /// 8 triplets from (5,7,11) through (67,71,73); quadruplets (5,7,11,13)
    /// and (11,13,17,19); quintuplets (5,..,17), (7,..,19) and (11,..,23);
    /// the sextuplet (7,..,23); and the septuplet (11,13,17,19,23,29,31).
    #[test]
    fn all_counters_to_100() {
        let mut ps = PrimeSieve::new();
        ps.set_flags((1..=7).map(flags_for_count).fold(0, |a, b| a | b)).unwrap();
        ps.sieve(0, 100).unwrap();
        assert_eq!(ps.count(1), 25);
        assert_eq!(ps.count(2), 8);
        assert_eq!(ps.count(3), 8);
        assert_eq!(ps.count(4), 2);
        assert_eq!(ps.count(5), 3);
        assert_eq!(ps.count(6), 1);
        assert_eq!(ps.count(7), 1);
    }

    /// Degenerate ranges from the interface contract.
    #[test]
    fn degenerate_ranges() {
        let mut ps = PrimeSieve::new();
        assert_eq!(ps.count_primes(0, 0).unwrap(), 0);
        assert_eq!(ps.count_primes(2, 2).unwrap(), 1);
        assert_eq!(ps.count_primes(3, 3).unwrap(), 1);
        assert_eq!(ps.count_primes(4, 4).unwrap(), 0);
        assert_eq!(ps.count_primes(7, 7).unwrap(), 1);
        assert_eq!(ps.count_primes(0, 1).unwrap(), 0);
    }

    /// Interval arithmetic: pi(a, b) = pi(0, b) - pi(0, a-1).
    #[test]
    fn interval_additivity() {
        let mut ps = PrimeSieve::new();
        for (a, b) in [(100u64, 10_000u64), (17, 17), (1_000, 2_000), (9_999, 100_000)] {
            let full = ps.count_primes(0, b).unwrap();
            let below = ps.count_primes(0, a - 1).unwrap();
            let range = ps.count_primes(a, b).unwrap();
            assert_eq!(range, full - below, "[{}, {}]", a, b);
        }
    }

    // ── Parameter Validation ────────────────────────────────────────

    #[test]
    fn setters_validate() {
        let mut ps = PrimeSieve::new();
        assert_eq!(ps.set_sieve_size(0), Err(Error::InvalidSieveSize(0)));
        assert_eq!(ps.set_sieve_size(48), Err(Error::InvalidSieveSize(48)));
        assert_eq!(ps.set_sieve_size(8192), Err(Error::InvalidSieveSize(8192)));
        assert!(ps.set_sieve_size(1).is_ok());
        assert!(ps.set_sieve_size(4096).is_ok());

        assert_eq!(ps.set_pre_sieve(23), Err(Error::InvalidPreSieve(23)));
        assert_eq!(ps.set_pre_sieve(5), Err(Error::InvalidPreSieve(5)));
        assert!(ps.set_pre_sieve(7).is_ok());

        assert_eq!(ps.set_flags(1 << 20), Err(Error::InvalidFlags(1 << 20)));
        assert_eq!(ps.add_flags(1 << 25), Err(Error::InvalidFlags(1 << 25)));
        assert!(ps.set_flags(COUNT_PRIMES | PRINT_STATUS).is_ok());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut ps = PrimeSieve::new();
        assert_eq!(
            ps.count_primes(10, 5),
            Err(Error::InvalidRange { start: 10, stop: 5 })
        );
    }

    /// The generic k wrappers report bad sizes as errors like every other
    /// parameter, and agree with the dedicated wrappers for legal k.
    #[test]
    fn ktuplet_size_is_validated() {
        let mut ps = PrimeSieve::new();
        assert_eq!(ps.count_ktuplets(0, 0, 100), Err(Error::InvalidKTupletSize(0)));
        assert_eq!(ps.count_ktuplets(8, 0, 100), Err(Error::InvalidKTupletSize(8)));
        assert_eq!(ps.print_ktuplets(9, 0, 100), Err(Error::InvalidKTupletSize(9)));
        assert_eq!(ps.count_ktuplets(1, 0, 100).unwrap(), 25);
        assert_eq!(ps.count_ktuplets(2, 0, 100).unwrap(), 8);
    }

    /// Counts not requested stay zero.
    #[test]
    fn unrequested_counts_are_zero() {
        let mut ps = PrimeSieve::new();
        ps.set_flags(COUNT_PRIMES).unwrap();
        ps.sieve(0, 1000).unwrap();
        assert_eq!(ps.count(1), 168);
        for k in 2..=7 {
            assert_eq!(ps.count(k), 0, "k = {}", k);
        }
    }

    // ── Callback Streams ────────────────────────────────────────────

    /// The callback sequence is strictly increasing, starts at the small
    /// primes, and matches the count.
    #[test]
    fn generate_is_ascending_and_complete() {
        let mut ps = PrimeSieve::new();
        let mut seen = Vec::new();
        ps.generate_primes(0, 1_000, |p| seen.push(p)).unwrap();
        assert_eq!(seen.len(), 168);
        assert_eq!(&seen[..6], &[2, 3, 5, 7, 11, 13]);
        assert_eq!(seen.last(), Some(&997));
        for pair in seen.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    /// Range boundaries are honoured exactly.
    #[test]
    fn generate_respects_bounds() {
        let mut ps = PrimeSieve::new();
        let mut seen = Vec::new();
        ps.generate_primes(10, 30, |p| seen.push(p)).unwrap();
        assert_eq!(seen, vec![11, 13, 17, 19, 23, 29]);
    }

    /// The ctx variant passes the integer through unchanged.
    #[test]
    fn generate_ctx_passes_context() {
        let mut ps = PrimeSieve::new();
        let mut seen = Vec::new();
        ps.generate_primes_ctx(0, 30, 7, |p, ctx| seen.push((p, ctx))).unwrap();
        assert!(seen.iter().all(|&(_, ctx)| ctx == 7));
        let primes: Vec<u64> = seen.iter().map(|&(p, _)| p).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    // ── Status ──────────────────────────────────────────────────────

    /// The hook sees a monotone sequence ending at 100.
    #[test]
    fn status_hook_is_monotone() {
        use std::cell::RefCell;
        use std::rc::Rc;
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls2 = Rc::clone(&calls);
        let mut ps = PrimeSieve::new();
        ps.set_sieve_size(1).unwrap();
        ps.set_status_hook(move |p| {
            calls2.borrow_mut().push(p);
            true
        });
        ps.add_flags(COUNT_PRIMES | CALCULATE_STATUS).unwrap();
        ps.sieve(0, 200_000).unwrap();
        let calls = calls.borrow();
        assert!(calls.len() >= 3, "one call per segment plus finish");
        for pair in calls.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(*calls.last().unwrap(), 100.0);
        assert_eq!(ps.status(), 100.0);
    }

    /// A hook returning false cancels between segments; no counts survive.
    #[test]
    fn status_hook_cancels() {
        let mut ps = PrimeSieve::new();
        ps.set_sieve_size(1).unwrap();
        ps.set_status_hook(|p| p < 40.0);
        ps.add_flags(COUNT_PRIMES).unwrap();
        assert_eq!(ps.sieve(0, 500_000), Err(Error::Interrupted));
        assert_eq!(ps.count(1), 0, "partial counts must not surface");
    }

    /// Sieve size changes never change results (façade-level sweep; the
    /// full matrix lives in the integration tests).
    #[test]
    fn sieve_size_invariance() {
        let mut reference = PrimeSieve::new();
        let expected = reference.count_primes(0, 300_000).unwrap();
        for kib in [1u32, 4, 256] {
            let mut ps = PrimeSieve::new();
            ps.set_sieve_size(kib).unwrap();
            assert_eq!(ps.count_primes(0, 300_000).unwrap(), expected, "{} KiB", kib);
        }
    }
}
