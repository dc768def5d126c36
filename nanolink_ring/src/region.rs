//! Region map: binds the ring to a caller-supplied shared-memory mapping.
//!
//! The region does not own its memory — the caller (typically
//! [`crate::shm::ShmRegion`] or a test buffer) keeps the mapping alive.
//! Construction validates the capacity and mapping bounds, optionally
//! initialises the header, and always verifies magic, version and capacity
//! before handing out access.

use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

use crate::error::{RingError, RingResult};
use crate::layout::{
    is_power_of_two, RegionHeader, CACHE_LINE, HEADER_BYTES, MAGIC, MAX_CAPACITY, MIN_CAPACITY,
    VERSION,
};

/// Validate ring capacity constraints.
///
/// Accepted capacities are powers of two in `[MIN_CAPACITY, MAX_CAPACITY]`.
pub fn validate_capacity(capacity_bytes: u32) -> RingResult<()> {
    if !is_power_of_two(capacity_bytes)
        || capacity_bytes < MIN_CAPACITY
        || capacity_bytes > MAX_CAPACITY
    {
        return Err(RingError::InvalidCapacity {
            capacity: capacity_bytes,
            min: MIN_CAPACITY,
            max: MAX_CAPACITY,
        });
    }
    Ok(())
}

/// Validated view over a shared region: header plus ring bytes.
///
/// A `Region` is a cheap copyable handle. Cloning it does not duplicate the
/// region; the producer and the consumer each hold their own view of the
/// same bytes.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    base: NonNull<u8>,
    capacity_bytes: u32,
}

impl Region {
    /// Bind to a shared-memory mapping and validate (or initialise) it.
    ///
    /// If `initialise` is set and the header's magic, version and capacity
    /// do not all match the expected values, the header is overwritten:
    /// magic, version and capacity are set and all three counters zeroed.
    /// This converges when both sides initialise with identical values, but
    /// races on a truly concurrent first attach — arrange a single
    /// initialiser (see [`crate::shm::ShmRegion::create`], which elects one
    /// via an exclusive lock).
    ///
    /// Validation always runs, so a mismatching region is rejected with a
    /// distinct error even after an `initialise` request.
    ///
    /// # Safety
    ///
    /// `base .. base + total_bytes` must be a live, readable and writable
    /// mapping that remains valid for the lifetime of the returned `Region`
    /// and every copy of it. At most one producer and one consumer may
    /// operate on the region, and no other code may touch its bytes.
    pub unsafe fn new(
        base: NonNull<u8>,
        total_bytes: usize,
        capacity_bytes: u32,
        initialise: bool,
    ) -> RingResult<Region> {
        validate_capacity(capacity_bytes)?;

        let required = HEADER_BYTES + capacity_bytes as usize;
        if total_bytes < required {
            return Err(RingError::RegionTooSmall {
                total: total_bytes,
                required,
            });
        }

        let address = base.as_ptr() as usize;
        if address % CACHE_LINE != 0 {
            return Err(RingError::Misaligned {
                address,
                alignment: CACHE_LINE,
            });
        }

        let header_ptr = base.as_ptr() as *mut RegionHeader;

        if initialise && !(*header_ptr).matches(capacity_bytes) {
            header_ptr.write(RegionHeader::new(capacity_bytes));
            // Publish the fresh header before the peer can observe it.
            fence(Ordering::Release);
        }

        let header = &*header_ptr;
        if header.magic != MAGIC {
            return Err(RingError::InvalidMagic {
                found: header.magic,
            });
        }
        if header.version != VERSION {
            return Err(RingError::LayoutVersionMismatch {
                expected: VERSION,
                found: header.version,
            });
        }
        if header.capacity_bytes != capacity_bytes {
            return Err(RingError::CapacityMismatch {
                expected: capacity_bytes,
                found: header.capacity_bytes,
            });
        }

        Ok(Region {
            base,
            capacity_bytes,
        })
    }

    /// Typed access to the region header.
    #[inline]
    pub fn header(&self) -> &RegionHeader {
        // SAFETY: construction validated that the mapping covers the header
        // and is cache-line aligned; the caller keeps it alive.
        unsafe { &*(self.base.as_ptr() as *const RegionHeader) }
    }

    /// Base pointer of the ring bytes (first byte after the header).
    #[inline]
    pub fn ring_base(&self) -> NonNull<u8> {
        // SAFETY: construction validated total_bytes >= HEADER_BYTES + capacity.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(HEADER_BYTES)) }
    }

    /// Ring capacity in bytes.
    #[inline]
    pub fn capacity_bytes(&self) -> u32 {
        self.capacity_bytes
    }

    /// Bytes ever published by the producer (acquire load).
    #[inline]
    pub fn head_bytes(&self) -> u64 {
        self.header().head_bytes.load(Ordering::Acquire)
    }

    /// Bytes ever consumed by the consumer (acquire load).
    #[inline]
    pub fn tail_bytes(&self) -> u64 {
        self.header().tail_bytes.load(Ordering::Acquire)
    }

    /// Writes rejected by the admission check (acquire load).
    #[inline]
    pub fn dropped_writes(&self) -> u64 {
        self.header().dropped_writes.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    /// Heap buffer with the alignment the region contract demands.
    #[repr(C, align(64))]
    struct AlignedBuf<const N: usize>([u8; N]);

    fn fresh_region<const N: usize>(
        buf: &mut Box<AlignedBuf<N>>,
        capacity: u32,
        initialise: bool,
    ) -> RingResult<Region> {
        let base = NonNull::new(buf.0.as_mut_ptr()).unwrap();
        unsafe { Region::new(base, N, capacity, initialise) }
    }

    #[test]
    fn capacity_bounds() {
        assert!(validate_capacity(MIN_CAPACITY).is_ok());
        assert!(validate_capacity(MAX_CAPACITY).is_ok());
        assert!(validate_capacity(65536).is_ok());

        assert!(matches!(
            validate_capacity(MIN_CAPACITY - 1),
            Err(RingError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            validate_capacity(MIN_CAPACITY + 1),
            Err(RingError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            validate_capacity(MIN_CAPACITY / 2),
            Err(RingError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            validate_capacity(MAX_CAPACITY - 1),
            Err(RingError::InvalidCapacity { .. })
        ));
        // MAX_CAPACITY * 2 is still a power of two but out of range.
        assert!(matches!(
            validate_capacity(MAX_CAPACITY << 1),
            Err(RingError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            validate_capacity(0),
            Err(RingError::InvalidCapacity { .. })
        ));
    }

    #[test]
    fn initialise_writes_header_and_zeroes_counters() {
        let mut buf = Box::new(AlignedBuf([0xFFu8; HEADER_BYTES + 4096]));
        let region = fresh_region(&mut buf, 4096, true).unwrap();

        let header = region.header();
        assert_eq!(header.magic, MAGIC);
        assert_eq!(header.version, VERSION);
        assert_eq!(header.capacity_bytes, 4096);
        assert_eq!(header.reserved, 0);
        assert_eq!(region.head_bytes(), 0);
        assert_eq!(region.tail_bytes(), 0);
        assert_eq!(region.dropped_writes(), 0);
    }

    #[test]
    fn reinitialise_preserves_matching_header() {
        let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + 4096]));
        let region = fresh_region(&mut buf, 4096, true).unwrap();
        region.header().head_bytes.store(96, Ordering::Release);
        region.header().tail_bytes.store(96, Ordering::Release);

        // A second initialise with the same values must not reset counters:
        // the header already matches.
        let region2 = fresh_region(&mut buf, 4096, true).unwrap();
        assert_eq!(region2.head_bytes(), 96);
        assert_eq!(region2.tail_bytes(), 96);
    }

    #[test]
    fn attach_without_initialise_rejects_blank_region() {
        let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + 4096]));
        let result = fresh_region(&mut buf, 4096, false);
        assert!(matches!(result, Err(RingError::InvalidMagic { found: 0 })));
    }

    #[test]
    fn version_mismatch_is_distinct() {
        let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + 4096]));
        fresh_region(&mut buf, 4096, true).unwrap();

        // Corrupt the version field in place.
        buf.0[4..8].copy_from_slice(&99u32.to_le_bytes());
        let result = fresh_region(&mut buf, 4096, false);
        assert!(matches!(
            result,
            Err(RingError::LayoutVersionMismatch {
                expected: VERSION,
                found: 99
            })
        ));
    }

    #[test]
    fn capacity_mismatch_is_distinct() {
        let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + 8192]));
        fresh_region(&mut buf, 8192, true).unwrap();

        let result = fresh_region(&mut buf, 4096, false);
        assert!(matches!(
            result,
            Err(RingError::CapacityMismatch {
                expected: 4096,
                found: 8192
            })
        ));
    }

    #[test]
    fn region_too_small() {
        let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + 4096 - 8]));
        let result = fresh_region(&mut buf, 4096, true);
        assert!(matches!(
            result,
            Err(RingError::RegionTooSmall {
                required,
                ..
            }) if required == HEADER_BYTES + 4096
        ));
    }

    #[test]
    fn misaligned_base_rejected() {
        let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + 4096 + 64]));
        let base = NonNull::new(unsafe { buf.0.as_mut_ptr().add(8) }).unwrap();
        let result = unsafe { Region::new(base, HEADER_BYTES + 4096, 4096, true) };
        assert!(matches!(result, Err(RingError::Misaligned { .. })));
    }

    #[test]
    fn ring_base_follows_header() {
        let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + 4096]));
        let region = fresh_region(&mut buf, 4096, true).unwrap();
        let delta = region.ring_base().as_ptr() as usize - buf.0.as_ptr() as usize;
        assert_eq!(delta, HEADER_BYTES);
    }
}
