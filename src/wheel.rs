//! # Wheel — Residue Wheel Tables and Sieving Prime Records
//!
//! Wheel factorization skips numbers sharing a factor with the wheel modulus:
//! the mod-30 wheel (8 residue classes coprime to 2*3*5) drives [`crate::erat_small`],
//! the mod-210 wheel (48 classes coprime to 2*3*5*7) drives
//! [`crate::erat_medium`] and [`crate::erat_big`].
//!
//! For every pair (prime residue class mod 30, multiple residue class) a
//! [`WheelElement`] holds everything the cross-off loops need: the byte mask
//! that clears the multiple's bit, the factor distance to the prime's next
//! wheel multiple, the byte-advance correction, and the next table index.
//! Advancing a sieving prime is then three adds and two lookups:
//!
//! ```text
//! sieve[multiple_index] &= e.unset_bit;
//! multiple_index += e.next_multiple_factor * (p / 30) + e.correct;
//! wheel_index     = e.next;
//! ```
//!
//! Both tables are pure constant data, computed once on first use into
//! process-wide immutable storage and shared by every sieve instance.
//!
//! ## Bit layout
//!
//! Bit `b` of sieve byte `i` represents `segment_low + 30*i + BIT_VALUES[b]`
//! with `BIT_VALUES = {7, 11, 13, 17, 19, 23, 29, 31}`. Numbers congruent to
//! 1 (mod 30) are carried as offset 31 of the previous byte, so the byte
//! index of a multiple `m` is `(m - segment_low - 7) / 30`.

use std::sync::OnceLock;

/// Integers covered by one sieve byte.
pub const NUMBERS_PER_BYTE: u64 = 30;

/// Bit offsets of one sieve byte: the residues coprime to 30, shifted so
/// that byte 0 holds 7..31. The order is load-bearing — every wheel table
/// and every k-tuplet byte mask depends on it.
pub const BIT_VALUES: [u64; 8] = [7, 11, 13, 17, 19, 23, 29, 31];

/// Residues mod 30 of all primes > 5, ascending.
const PRIME_RESIDUES: [u64; 8] = [1, 7, 11, 13, 17, 19, 23, 29];

/// Maps `p % 30` of a prime > 5 to its class index in [`PRIME_RESIDUES`].
const PRIME_CLASS: [u8; 30] = [
    255, 0, 255, 255, 255, 255, 255, 1, 255, 255, 255, 2, 255, 3, 255, 255, 255, 4, 255, 5, 255,
    255, 255, 6, 255, 255, 255, 255, 255, 7,
];

/// Maps a shifted residue in {7, 11, 13, 17, 19, 23, 29, 31} to its bit index.
fn bit_index(shifted: u64) -> u8 {
    BIT_VALUES.iter().position(|&v| v == shifted).expect("residue coprime to 30") as u8
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Residue 1 is stored as offset 31 of the previous byte.
#[inline]
fn shift(residue: u64) -> u64 {
    if residue == 1 {
        31
    } else {
        residue
    }
}

/// Per-residue entry used when a sieving prime is admitted: the distance from
/// an arbitrary multiple factor to the next factor coprime to the wheel, and
/// that factor's class index.
#[derive(Clone, Copy, Debug)]
pub struct WheelInit {
    pub next_multiple_factor: u8,
    pub wheel_index: u8,
}

/// One steady-state cross-off step, see the module docs.
#[derive(Clone, Copy, Debug)]
pub struct WheelElement {
    pub unset_bit: u8,
    pub next_multiple_factor: u8,
    pub correct: u8,
    pub next: u16,
}

/// A complete wheel: init table indexed by residue, element table indexed by
/// `prime_class * factor_count + multiple_class`.
pub struct WheelData {
    pub modulo: u64,
    pub factor_count: usize,
    pub init: Vec<WheelInit>,
    pub elements: Vec<WheelElement>,
    max_factor: u8,
}

impl WheelData {
    fn build(modulo: u64) -> WheelData {
        let factors: Vec<u64> = (1..modulo).filter(|&f| gcd(f, modulo) == 1).collect();
        let k = factors.len();
        let dist = |j: usize| {
            if j + 1 < k {
                factors[j + 1] - factors[j]
            } else {
                factors[0] + modulo - factors[k - 1]
            }
        };

        let mut init = Vec::with_capacity(modulo as usize);
        for r in 0..modulo {
            let mut t = 0u64;
            while gcd((r + t) % modulo, modulo) != 1 {
                t += 1;
            }
            let j = factors.binary_search(&((r + t) % modulo)).expect("coprime residue");
            init.push(WheelInit { next_multiple_factor: t as u8, wheel_index: j as u8 });
        }

        let mut elements = Vec::with_capacity(8 * k);
        for (i, &pr) in PRIME_RESIDUES.iter().enumerate() {
            for j in 0..k {
                let f = factors[j];
                let d = dist(j);
                let s = shift(pr * f % 30);
                let s_next = shift(pr * (f + d) % 30);
                // byte advance = d * (p / 30) + correct, exact by construction
                let numerator = (pr * d) as i64 + s as i64 - s_next as i64;
                debug_assert!(numerator >= 0 && numerator % 30 == 0);
                elements.push(WheelElement {
                    unset_bit: !(1u8 << bit_index(s)),
                    next_multiple_factor: d as u8,
                    correct: (numerator / 30) as u8,
                    next: (i * k + (j + 1) % k) as u16,
                });
            }
        }

        let max_factor = elements
            .iter()
            .map(|e| e.next_multiple_factor)
            .chain(init.iter().map(|w| w.next_multiple_factor))
            .max()
            .unwrap_or(0);

        WheelData { modulo, factor_count: k, init, elements, max_factor }
    }

    /// Largest factor distance appearing in this wheel; bounds the byte
    /// advance of any single cross-off step by `max_factor * (p/30) + max_factor`.
    pub fn max_factor(&self) -> u64 {
        self.max_factor as u64
    }

    /// Locate the first wheel multiple of `prime` that is >= `segment_low + 7`
    /// and >= `prime^2`, expressed as (byte index relative to `segment_low`,
    /// wheel table index). Returns `None` when that multiple exceeds `stop`,
    /// i.e. the prime never fires in the sieved interval.
    ///
    /// All products are widened to u128 so ranges near 2^64 cannot wrap.
    pub fn position(&self, prime: u64, segment_low: u64, stop: u64) -> Option<(u64, u32)> {
        let quotient = (segment_low + 6) / prime + 1;
        let mut multiple = prime as u128 * quotient as u128;
        let mut quotient = quotient;
        // by theory the first multiple needing a cross-off is prime^2
        let square = prime as u128 * prime as u128;
        if multiple < square {
            multiple = square;
            quotient = prime;
        }
        if multiple > stop as u128 {
            return None;
        }
        let wi = self.init[(quotient % self.modulo) as usize];
        multiple += prime as u128 * wi.next_multiple_factor as u128;
        if multiple > stop as u128 {
            return None;
        }
        let multiple_index = (multiple as u64 - segment_low - 7) / NUMBERS_PER_BYTE;
        let prime_class = PRIME_CLASS[(prime % 30) as usize] as usize;
        let wheel_index = (prime_class * self.factor_count + wi.wheel_index as usize) as u32;
        Some((multiple_index, wheel_index))
    }
}

static WHEEL30: OnceLock<WheelData> = OnceLock::new();
static WHEEL210: OnceLock<WheelData> = OnceLock::new();

/// The mod-30 wheel: 8 residue classes, skips multiples of 2, 3, 5.
pub fn wheel30() -> &'static WheelData {
    WHEEL30.get_or_init(|| WheelData::build(30))
}

/// The mod-210 wheel: 48 residue classes, skips multiples of 2, 3, 5, 7.
pub fn wheel210() -> &'static WheelData {
    WHEEL210.get_or_init(|| WheelData::build(210))
}

/// A sieving prime packed into two 32-bit words: `p / 30` in one, the byte
/// index of its next multiple (23 bits) and its wheel table index (9 bits)
/// in the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WheelPrime {
    indexes: u32,
    sieving_prime: u32,
}

const MULTIPLE_INDEX_BITS: u32 = 23;
const MULTIPLE_INDEX_MASK: u32 = (1 << MULTIPLE_INDEX_BITS) - 1;

impl WheelPrime {
    pub const EMPTY: WheelPrime = WheelPrime { indexes: 0, sieving_prime: 0 };

    #[inline]
    pub fn new(sieving_prime: u32, multiple_index: u32, wheel_index: u32) -> WheelPrime {
        debug_assert!(multiple_index <= MULTIPLE_INDEX_MASK);
        debug_assert!(wheel_index < 8 * 48);
        WheelPrime { indexes: multiple_index | (wheel_index << MULTIPLE_INDEX_BITS), sieving_prime }
    }

    /// The prime divided by 30 (wheel units).
    #[inline]
    pub fn sieving_prime(&self) -> u32 {
        self.sieving_prime
    }

    #[inline]
    pub fn multiple_index(&self) -> u32 {
        self.indexes & MULTIPLE_INDEX_MASK
    }

    #[inline]
    pub fn wheel_index(&self) -> u32 {
        self.indexes >> MULTIPLE_INDEX_BITS
    }

    #[inline]
    pub fn set_position(&mut self, multiple_index: u32, wheel_index: u32) {
        debug_assert!(multiple_index <= MULTIPLE_INDEX_MASK);
        self.indexes = multiple_index | (wheel_index << MULTIPLE_INDEX_BITS);
    }
}
