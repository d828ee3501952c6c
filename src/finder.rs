//! # Finder — Counting, Printing and Callback Sinks
//!
//! `PrimeFinder` consumes finalized segment bitmaps. Counting primes is a
//! straight popcount; counting k-tuplets exploits the byte layout: one sieve
//! byte spans 30 numbers, and every canonical k-tuplet gap pattern that fits
//! the coprime residues lies entirely inside one byte, so per k a handful of
//! byte masks plus a 256-entry lookup table give the count per byte.
//!
//! Printing and callbacks reconstruct numbers from set bits in ascending
//! order. The primes and tuplets that reach below the wheel's span
//! ({2, 3, 5} and the tuplets containing them) cannot appear in the bitmap
//! and come from a fixed table instead.

use crate::prime_sieve::{flags_for_count, flags_for_print};
use crate::sieve::SegmentSink;
use crate::wheel::{BIT_VALUES, NUMBERS_PER_BYTE};
use crate::Error;
use std::io::{self, BufWriter, Write};

/// Byte masks per tuplet size; a byte matching a mask holds one k-tuplet.
/// Twins: (11,13) (17,19) (29,31); triplets: (7,11,13) (11,13,17)
/// (13,17,19) (17,19,23); and so on up to the lone septuplet pattern
/// (11,13,17,19,23,29,31).
const TWIN_MASKS: &[u8] = &[0x06, 0x18, 0xc0];
const TRIPLET_MASKS: &[u8] = &[0x07, 0x0e, 0x1c, 0x38];
const QUADRUPLET_MASKS: &[u8] = &[0x1e];
const QUINTUPLET_MASKS: &[u8] = &[0x1f, 0x3e];
const SEXTUPLET_MASKS: &[u8] = &[0x3f];
const SEPTUPLET_MASKS: &[u8] = &[0xfe];

/// Masks for tuplet size `k` (2..=7).
pub fn ktuplet_masks(k: usize) -> &'static [u8] {
    match k {
        2 => TWIN_MASKS,
        3 => TRIPLET_MASKS,
        4 => QUADRUPLET_MASKS,
        5 => QUINTUPLET_MASKS,
        6 => SEXTUPLET_MASKS,
        7 => SEPTUPLET_MASKS,
        _ => panic!("k-tuplet size {} not in 2..=7", k),
    }
}

/// Primes and tuplets with a member below 7: not representable in the
/// bitmap, emitted from this table when they fall inside [start, stop].
/// Tuplets from (7,11,13) upward are byte-local and need no entry.
const SMALL_TUPLES: [(u64, u64, usize, &str); 8] = [
    (2, 2, 0, "2"),
    (3, 3, 0, "3"),
    (5, 5, 0, "5"),
    (3, 5, 1, "(3, 5)"),
    (5, 7, 1, "(5, 7)"),
    (5, 11, 2, "(5, 7, 11)"),
    (5, 13, 3, "(5, 7, 11, 13)"),
    (5, 17, 4, "(5, 7, 11, 13, 17)"),
];

/// Callback sink handed to [`PrimeFinder`]; the ctx variant passes the
/// caller-supplied integer through unchanged.
pub enum Callback<'a> {
    None,
    Plain(&'a mut dyn FnMut(u64)),
    WithCtx(&'a mut dyn FnMut(u64, i32), i32),
}

/// Monotone progress over the sieved interval, updated once per segment.
pub struct StatusTracker<'a> {
    processed: u128,
    total: u128,
    percent: f64,
    print: bool,
    last_printed: i64,
    hook: Option<&'a mut (dyn FnMut(f64) -> bool + 'static)>,
}

impl<'a> StatusTracker<'a> {
    fn new(start: u64, stop: u64, print: bool, hook: Option<&'a mut (dyn FnMut(f64) -> bool + 'static)>) -> Self {
        StatusTracker {
            processed: 0,
            total: stop as u128 - start as u128 + 1,
            percent: 0.0,
            print,
            last_printed: -1,
            hook,
        }
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Accounts `numbers` more processed values; may cancel via the hook.
    fn update(&mut self, numbers: u64) -> Result<(), Error> {
        self.processed = (self.processed + numbers as u128).min(self.total);
        let percent = self.processed as f64 / self.total as f64 * 100.0;
        // monotone even under f64 rounding
        self.percent = self.percent.max(percent.min(100.0));
        if self.print && self.percent as i64 > self.last_printed {
            self.last_printed = self.percent as i64;
            eprint!("\rstatus: {:.0}%", self.percent);
        }
        if let Some(hook) = self.hook.as_mut() {
            if !hook(self.percent) {
                return Err(Error::Interrupted);
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.percent = 100.0;
        if self.print {
            eprintln!("\rstatus: 100%");
        }
        if let Some(hook) = self.hook.as_mut() {
            hook(self.percent);
        }
    }
}

pub struct PrimeFinder<'a, 'b> {
    start: u64,
    stop: u64,
    flags: u32,
    counts: [u64; 7],
    /// (count slot, per-byte tuplet count) for every requested k >= 2.
    tables: Vec<(usize, [u8; 256])>,
    out: Option<BufWriter<io::StdoutLock<'static>>>,
    callback: Callback<'a>,
    status: Option<StatusTracker<'b>>,
}

impl<'a, 'b> PrimeFinder<'a, 'b> {
    pub fn new(
        start: u64,
        stop: u64,
        flags: u32,
        callback: Callback<'a>,
        status: bool,
        print_status: bool,
        hook: Option<&'b mut (dyn FnMut(f64) -> bool + 'static)>,
    ) -> PrimeFinder<'a, 'b> {
        let mut tables = Vec::new();
        for k in 2..=7usize {
            if flags & flags_for_count(k) != 0 {
                let masks = ktuplet_masks(k);
                let mut table = [0u8; 256];
                for (byte, entry) in table.iter_mut().enumerate() {
                    *entry = masks.iter().filter(|&&m| byte as u8 & m == m).count() as u8;
                }
                tables.push((k - 1, table));
            }
        }
        let any_print = (2..=7).any(|k| flags & flags_for_print(k) != 0)
            || flags & flags_for_print(1) != 0;
        let out = any_print.then(|| BufWriter::new(io::stdout().lock()));
        let status = (status || print_status || hook.is_some())
            .then(|| StatusTracker::new(start, stop, print_status, hook));
        PrimeFinder { start, stop, flags, counts: [0; 7], tables, out, callback, status }
    }

    pub fn counts(&self) -> [u64; 7] {
        self.counts
    }

    pub fn status_percent(&self) -> Option<f64> {
        self.status.as_ref().map(|s| s.percent())
    }

    /// Emits the primes and tuplets below the wheel's reach. Call once,
    /// before the first segment.
    pub fn process_small_tuples(&mut self) {
        for &(first, last, slot, text) in SMALL_TUPLES.iter() {
            if self.start <= first && last <= self.stop {
                if self.flags & flags_for_count(slot + 1) != 0 {
                    self.counts[slot] += 1;
                }
                if self.flags & flags_for_print(slot + 1) != 0 {
                    if let Some(out) = self.out.as_mut() {
                        let _ = writeln!(out, "{}", text);
                    }
                }
                if slot == 0 {
                    match &mut self.callback {
                        Callback::None => {}
                        Callback::Plain(f) => f(first),
                        Callback::WithCtx(f, ctx) => f(first, *ctx),
                    }
                }
            }
        }
    }

    /// Flushes pending output and pins the status at 100%.
    pub fn finalize(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let _ = out.flush();
        }
        if let Some(status) = self.status.as_mut() {
            status.finish();
        }
    }

    fn count(&mut self, sieve: &[u8]) {
        if self.flags & flags_for_count(1) != 0 {
            let mut chunks = sieve.chunks_exact(8);
            let mut ones = 0u64;
            for chunk in &mut chunks {
                ones += u64::from_le_bytes(chunk.try_into().unwrap()).count_ones() as u64;
            }
            for &b in chunks.remainder() {
                ones += b.count_ones() as u64;
            }
            self.counts[0] += ones;
        }
        for (slot, table) in &self.tables {
            let mut n = 0u64;
            for &b in sieve {
                n += table[b as usize] as u64;
            }
            self.counts[*slot] += n;
        }
    }

    fn emit(&mut self, segment_low: u64, sieve: &[u8]) {
        // per-prime emission: print and callbacks share the bit walk
        let print_primes = self.flags & flags_for_print(1) != 0;
        let has_callback = !matches!(self.callback, Callback::None);
        if print_primes || has_callback {
            for (i, &byte) in sieve.iter().enumerate() {
                let mut b = byte;
                while b != 0 {
                    let bit = b.trailing_zeros() as usize;
                    b &= b - 1;
                    let p = segment_low + (i as u64 * NUMBERS_PER_BYTE + BIT_VALUES[bit]);
                    if print_primes {
                        if let Some(out) = self.out.as_mut() {
                            let _ = writeln!(out, "{}", p);
                        }
                    }
                    match &mut self.callback {
                        Callback::None => {}
                        Callback::Plain(f) => f(p),
                        Callback::WithCtx(f, ctx) => f(p, *ctx),
                    }
                }
            }
        }
        for k in 2..=7usize {
            if self.flags & flags_for_print(k) == 0 {
                continue;
            }
            for (i, &byte) in sieve.iter().enumerate() {
                for &mask in ktuplet_masks(k) {
                    if byte & mask == mask {
                        let base = segment_low + i as u64 * NUMBERS_PER_BYTE;
                        let mut sep = "(";
                        let mut line = String::new();
                        for (bit, &off) in BIT_VALUES.iter().enumerate() {
                            if mask & (1 << bit) != 0 {
                                line.push_str(sep);
                                line.push_str(&(base + off).to_string());
                                sep = ", ";
                            }
                        }
                        line.push(')');
                        if let Some(out) = self.out.as_mut() {
                            let _ = writeln!(out, "{}", line);
                        }
                    }
                }
            }
        }
    }
}

impl SegmentSink for PrimeFinder<'_, '_> {
    fn segment_processed(&mut self, segment_low: u64, sieve: &[u8]) -> Result<(), Error> {
        self.count(sieve);
        self.emit(segment_low, sieve);
        if let Some(status) = self.status.as_mut() {
            status.update(sieve.len() as u64 * NUMBERS_PER_BYTE)?;
        }
        Ok(())
    }
}
