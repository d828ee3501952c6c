//! # EratBig — Bucket-Sorted Cross-Off for Primes Spanning Many Segments
//!
//! Primes larger than the segment hit each segment at most a few times, most
//! not at all. Instead of scanning every prime every segment, each prime is
//! parked in a bucket list keyed by the segment where its next multiple
//! falls: list 0 holds exactly the primes that fire in the current segment.
//! After a segment, the list vector rotates left by one, so "list 1" becomes
//! "list 0" for free.
//!
//! What a priority queue of next-fire events would express with O(log n)
//! per operation, the rotating lists do with a shift and an append —
//! branch-light and cache-friendly, which is why this is where the sieve
//! spends most of its time.
//!
//! ## Bucket pool
//!
//! Buckets are fixed arrays of packed sieving primes, allocated in slabs and
//! recycled through a free stock by link mutation; individual buckets are
//! never freed. Links are indices into the slab arena rather than pointers,
//! so the whole structure is plain safe Rust. Slab allocation is the only
//! steady-state heap activity and the only fallible one.

use crate::wheel::{wheel210, WheelPrime};
use crate::Error;
use tracing::debug;

/// Packed sieving primes per bucket.
const BUCKET_CAPACITY: usize = 1024;
/// Buckets per slab allocation (1 MiB of entries per slab).
const BUCKETS_PER_ALLOC: usize = 128;
/// Null bucket link.
const NONE: u32 = u32::MAX;

struct Bucket {
    items: [WheelPrime; BUCKET_CAPACITY],
    len: u32,
    next: u32,
}

pub struct EratBig {
    /// Head bucket per future segment; index 0 is the current segment.
    lists: Vec<u32>,
    /// Free bucket stock, linked through `Bucket::next`.
    stock: u32,
    slabs: Vec<Vec<Bucket>>,
    log2_sieve_size: u32,
    modulo_sieve_size: u64,
    stop: u64,
}

impl EratBig {
    /// `sieve_size` is the segment length in bytes and must be a power of
    /// two — the segment/offset split of a multiple index is a shift and a
    /// mask. `sqrt_stop` bounds the sieving primes and sizes the list
    /// vector so that any cross-off advance stays inside it.
    pub fn new(sieve_size: usize, sqrt_stop: u64, stop: u64) -> Result<EratBig, Error> {
        if !sieve_size.is_power_of_two() {
            return Err(Error::InvalidSieveSize((sieve_size / 1024) as u32));
        }
        let log2_sieve_size = sieve_size.trailing_zeros();
        let max_sieving_prime = sqrt_stop / 30;
        let max_factor = wheel210().max_factor() + 2;
        let max_next_multiple = max_sieving_prime * max_factor + max_factor;
        let max_multiple_index = sieve_size as u64 - 1 + max_next_multiple;
        let lists_len = (max_multiple_index >> log2_sieve_size) + 1;
        Ok(EratBig {
            lists: vec![NONE; lists_len as usize],
            stock: NONE,
            slabs: Vec::new(),
            log2_sieve_size,
            modulo_sieve_size: sieve_size as u64 - 1,
            stop,
        })
    }

    #[inline]
    fn bucket(&self, id: u32) -> &Bucket {
        &self.slabs[id as usize / BUCKETS_PER_ALLOC][id as usize % BUCKETS_PER_ALLOC]
    }

    #[inline]
    fn bucket_mut(&mut self, id: u32) -> &mut Bucket {
        &mut self.slabs[id as usize / BUCKETS_PER_ALLOC][id as usize % BUCKETS_PER_ALLOC]
    }

    /// Admits `prime`; its first multiple may lie many segments ahead.
    pub fn add(&mut self, prime: u64, segment_low: u64) -> Result<(), Error> {
        if let Some((multiple_index, wheel_index)) =
            wheel210().position(prime, segment_low, self.stop)
        {
            let sp = (prime / 30) as u32;
            self.store(sp, multiple_index, wheel_index)?;
        }
        Ok(())
    }

    /// Files a sieving prime into the bucket list of the segment holding
    /// its next multiple.
    #[inline]
    fn store(&mut self, sieving_prime: u32, multiple_index: u64, wheel_index: u32) -> Result<(), Error> {
        let segment = (multiple_index >> self.log2_sieve_size) as usize;
        let local = (multiple_index & self.modulo_sieve_size) as u32;
        if segment >= self.lists.len() {
            self.lists.resize(segment + 1, NONE);
        }
        let head = self.lists[segment];
        if head == NONE || self.bucket(head).len as usize == BUCKET_CAPACITY {
            self.push_bucket(segment)?;
        }
        let head = self.lists[segment];
        let bucket = self.bucket_mut(head);
        bucket.items[bucket.len as usize] = WheelPrime::new(sieving_prime, local, wheel_index);
        bucket.len += 1;
        Ok(())
    }

    /// Links a fresh bucket from the stock (allocating a slab if the stock
    /// is empty) onto the front of `lists[segment]`.
    fn push_bucket(&mut self, segment: usize) -> Result<(), Error> {
        if self.stock == NONE {
            self.alloc_slab()?;
        }
        let id = self.stock;
        self.stock = self.bucket(id).next;
        let old_head = self.lists[segment];
        let bucket = self.bucket_mut(id);
        bucket.len = 0;
        bucket.next = old_head;
        self.lists[segment] = id;
        Ok(())
    }

    fn alloc_slab(&mut self) -> Result<(), Error> {
        let slab_index = self.slabs.len();
        let mut slab = Vec::new();
        slab.try_reserve_exact(BUCKETS_PER_ALLOC).map_err(|_| Error::AllocationFailed)?;
        for i in 0..BUCKETS_PER_ALLOC {
            let next = if i + 1 < BUCKETS_PER_ALLOC {
                (slab_index * BUCKETS_PER_ALLOC + i + 1) as u32
            } else {
                NONE
            };
            slab.push(Bucket { items: [WheelPrime::EMPTY; BUCKET_CAPACITY], len: 0, next });
        }
        self.stock = (slab_index * BUCKETS_PER_ALLOC) as u32;
        self.slabs.push(slab);
        debug!(slabs = self.slabs.len(), "allocated bucket slab");
        Ok(())
    }

    /// Crosses off every multiple falling in the current segment, refiling
    /// each prime under its next multiple's segment, then rotates the list
    /// vector. A refiled prime whose next multiple is still in the current
    /// segment lands back in list 0 and is picked up by the outer loop.
    pub fn cross_off(&mut self, sieve: &mut [u8]) -> Result<(), Error> {
        loop {
            let mut current = self.lists[0];
            if current == NONE {
                break;
            }
            self.lists[0] = NONE;
            while current != NONE {
                let next = self.bucket(current).next;
                self.cross_off_bucket(current, sieve)?;
                // recycle the drained bucket into the stock
                let stock = self.stock;
                let bucket = self.bucket_mut(current);
                bucket.len = 0;
                bucket.next = stock;
                self.stock = current;
                current = next;
            }
        }
        self.lists.rotate_left(1);
        Ok(())
    }

    fn cross_off_bucket(&mut self, id: u32, sieve: &mut [u8]) -> Result<(), Error> {
        let len = self.bucket(id).len as usize;
        // Entries are processed in pairs so the two loads can overlap.
        let mut k = 0;
        while k + 2 <= len {
            let wp0 = self.bucket(id).items[k];
            let wp1 = self.bucket(id).items[k + 1];
            let (mi0, wi0) = unset_and_advance(wp0, sieve);
            let (mi1, wi1) = unset_and_advance(wp1, sieve);
            self.store(wp0.sieving_prime(), mi0, wi0)?;
            self.store(wp1.sieving_prime(), mi1, wi1)?;
            k += 2;
        }
        if k < len {
            let wp = self.bucket(id).items[k];
            let (mi, wi) = unset_and_advance(wp, sieve);
            self.store(wp.sieving_prime(), mi, wi)?;
        }
        Ok(())
    }
}

/// Clears the entry's bit and returns its advanced (full multiple index,
/// wheel index).
#[inline]
fn unset_and_advance(wp: WheelPrime, sieve: &mut [u8]) -> (u64, u32) {
    let wheel = wheel210();
    let e = &wheel.elements[wp.wheel_index() as usize];
    sieve[wp.multiple_index() as usize] &= e.unset_bit;
    let mi = wp.multiple_index() as u64
        + e.next_multiple_factor as u64 * wp.sieving_prime() as u64
        + e.correct as u64;
    (mi, e.next as u32)
}
