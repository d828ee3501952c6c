//! # EratMedium — Cross-Off for Primes with a Few Multiples per Segment
//!
//! Handles sieving primes between half the segment size and the full
//! segment size. The mod-210 wheel gives these primes sharper skips than
//! the mod-30 wheel (48 of 210 residues instead of 8 of 30), and with only
//! a handful of hits per segment the plain table-driven loop beats any
//! unrolling.

use crate::wheel::{wheel210, WheelPrime};

pub struct EratMedium {
    limit: u64,
    primes: Vec<WheelPrime>,
}

impl EratMedium {
    pub fn new(limit: u64) -> EratMedium {
        EratMedium { limit, primes: Vec::new() }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Admits `prime`; drops it if its first wheel multiple exceeds `stop`.
    pub fn add(&mut self, prime: u64, segment_low: u64, stop: u64) {
        debug_assert!(prime <= self.limit);
        if let Some((multiple_index, wheel_index)) = wheel210().position(prime, segment_low, stop) {
            let sp = (prime / 30) as u32;
            self.primes.push(WheelPrime::new(sp, multiple_index as u32, wheel_index));
        }
    }

    /// Crosses off the handful of multiples each prime has in `sieve`, then
    /// carries the overshoot into the next segment.
    pub fn cross_off(&mut self, sieve: &mut [u8]) {
        let wheel = wheel210();
        let len = sieve.len() as u64;
        for wp in &mut self.primes {
            let q = wp.sieving_prime() as u64;
            let mut mi = wp.multiple_index() as u64;
            let mut wi = wp.wheel_index() as usize;
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

    fn reference_cross_off(sieve: &mut [u8], low: u64, prime: u64) {
        for (i, byte) in sieve.iter_mut().enumerate() {
            for (b, &off) in BIT_VALUES.iter().enumerate() {
                let v = low + i as u64 * 30 + off;
                if v % prime == 0 && v >= prime * prime && (v / prime) % 7 != 0 {
                    *byte &= !(1u8 << b);
                }
            }
        }
    }

    /// The mod-210 wheel skips multiples m = p * f with 7 | f: those are
    /// crossed off by 7's own pass. Everything else must match the
    /// reference across segment carries.
    #[test]
    fn matches_reference_and_skips_factor_7() {
        for prime in [541u64, 1009, 1499] {
            let bytes = 64usize; // 1920 numbers per segment, several carries
            let mut erat = EratMedium::new(100_000);
            erat.add(prime, 0, u64::MAX);
            let segments = (prime * prime * 3) / (bytes as u64 * 30);
            let mut cleared_any = false;
            for seg in 0..segments {
                let low = seg * bytes as u64 * 30;
                let mut sieve = vec![0xffu8; bytes];
                let mut expected = vec![0xffu8; bytes];
                erat.cross_off(&mut sieve);
                reference_cross_off(&mut expected, low, prime);
                assert_eq!(sieve, expected, "prime {} segment {}", prime, seg);
                cleared_any |= sieve.iter().any(|&b| b != 0xff);
            }
            assert!(cleared_any, "prime {} never fired", prime);
        }
    }

    /// Primes first firing beyond `stop` are dropped at admission.
    #[test]
    fn drops_primes_beyond_stop() {
        let mut erat = EratMedium::new(100_000);
        erat.add(1009, 0, 1009 * 1009 - 1);
        assert!(erat.primes.is_empty());
    }
}
