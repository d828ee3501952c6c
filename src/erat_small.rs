//! # EratSmall — Cross-Off for Primes with Many Multiples per Segment
//!
//! Handles sieving primes up to half the segment size. Each such prime hits
//! the segment at least twice per wheel rotation, so the inner loop is
//! unrolled one full mod-30 rotation at a time: eight bit-clears at fixed
//! byte offsets, then a jump of exactly `p` bytes. Scalar steps finish the
//! partial rotation at the segment edge, and the overshoot is carried into
//! the next segment.

use crate::wheel::{wheel30, WheelPrime};

pub struct EratSmall {
    /// Inclusive admission bound (prime value, in bytes of segment span).
    limit: u64,
    primes: Vec<WheelPrime>,
}

impl EratSmall {
    pub fn new(limit: u64) -> EratSmall {
        EratSmall { limit, primes: Vec::new() }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Admits `prime`, placing its first multiple relative to `segment_low`.
    /// Primes whose first wheel multiple exceeds `stop` are dropped.
    pub fn add(&mut self, prime: u64, segment_low: u64, stop: u64) {
        debug_assert!(prime <= self.limit);
        if let Some((multiple_index, wheel_index)) = wheel30().position(prime, segment_low, stop) {
            let sp = (prime / 30) as u32;
            self.primes.push(WheelPrime::new(sp, multiple_index as u32, wheel_index));
        }
    }

    /// Clears the multiples of every admitted prime inside `sieve`, in
    /// insertion order (bit clears commute; contiguity is what matters).
    pub fn cross_off(&mut self, sieve: &mut [u8]) {
        let wheel = wheel30();
        let len = sieve.len() as u64;
        for wp in &mut self.primes {
            let q = wp.sieving_prime() as u64;
            let mut mi = wp.multiple_index() as u64;
            let mut wi = wp.wheel_index() as usize;

            // One rotation from the current wheel position: 8 clears
            // spanning exactly p = 30*q + (p % 30) bytes.
            let mut offsets = [0u64; 8];
            let mut masks = [0u8; 8];
            let mut span = 0u64;
            let mut w = wi;
            for k in 0..8 {
                let e = &wheel.elements[w];
                offsets[k] = span;
                masks[k] = e.unset_bit;
                span += e.next_multiple_factor as u64 * q + e.correct as u64;
                w = e.next as usize;
            }

            while mi + span <= len {
                for k in 0..8 {
                    sieve[(mi + offsets[k]) as usize] &= masks[k];
                }
                mi += span;
            }
            while mi < len {
                let e = &wheel.elements[wi];
                sieve[mi as usize] &= e.unset_bit;
                mi += e.next_multiple_factor as u64 * q + e.correct as u64;
                wi = e.next as usize;
            }
            wp.set_position((mi - len) as u32, wi as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wheel::BIT_VALUES;

    /// Clears multiples of `prime` in a reference sieve covering
    /// `[low, low + 30 * bytes)`, straight from the bit-layout definition.
    fn reference_cross_off(sieve: &mut [u8], low: u64, prime: u64) {
        for (i, byte) in sieve.iter_mut().enumerate() {
            for (b, &off) in BIT_VALUES.iter().enumerate() {
                let v = low + i as u64 * 30 + off;
                if v % prime == 0 && v >= prime * prime {
                    *byte &= !(1u8 << b);
                }
            }
        }
    }

    /// A fully-set segment crossed by one small prime matches the reference
    /// for several primes and segment positions, with carry across segments.
    #[test]
    fn matches_reference_over_three_segments() {
        for prime in [7u64, 11, 13, 29, 31, 97] {
            let bytes = 256usize;
            let mut erat = EratSmall::new(100_000);
            erat.add(prime, 0, u64::MAX);
            for seg in 0..3u64 {
                let low = seg * bytes as u64 * 30;
                let mut sieve = vec![0xffu8; bytes];
                let mut expected = vec![0xffu8; bytes];
                erat.cross_off(&mut sieve);
                reference_cross_off(&mut expected, low, prime);
                assert_eq!(sieve, expected, "prime {} segment {}", prime, seg);
            }
        }
    }

    /// Several primes at once; clears from different primes compose.
    #[test]
    fn composes_multiple_primes() {
        let bytes = 128usize;
        let mut erat = EratSmall::new(100_000);
        for p in [7u64, 11, 13, 17, 19, 23] {
            erat.add(p, 0, u64::MAX);
        }
        let mut sieve = vec![0xffu8; bytes];
        erat.cross_off(&mut sieve);
        let mut expected = vec![0xffu8; bytes];
        for p in [7u64, 11, 13, 17, 19, 23] {
            reference_cross_off(&mut expected, 0, p);
        }
        assert_eq!(sieve, expected);
    }

    /// A prime whose first multiple lies beyond `stop` is never stored.
    #[test]
    fn drops_primes_beyond_stop() {
        let mut erat = EratSmall::new(100_000);
        erat.add(101, 0, 10_000); // 101^2 = 10201 > stop
        assert!(erat.primes.is_empty());
    }

    /// The carried multiple index always lands inside the next segment's
    /// address space (< segment length + one rotation).
    #[test]
    fn carry_stays_bounded() {
        let bytes = 64usize;
        let mut erat = EratSmall::new(100_000);
        erat.add(7, 0, u64::MAX);
        for _ in 0..50 {
            let mut sieve = vec![0xffu8; bytes];
            erat.cross_off(&mut sieve);
            let wp = erat.primes[0];
            assert!((wp.multiple_index() as u64) < bytes as u64 + 7);
        }
    }
}
