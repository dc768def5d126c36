//! Error types for ring construction and shared-memory acquisition.
//!
//! Everything here is a configuration-time failure: once a region has been
//! validated, the hot-path operations never return an error. Precondition
//! violations (empty or oversize payloads) and observed region corruption
//! fail fast by panicking — see the `# Panics` sections in [`crate::ring`].

use thiserror::Error;

/// Errors that can occur while binding to or creating a shared region.
#[derive(Debug, Error)]
pub enum RingError {
    /// Capacity is not a power of two or lies outside the accepted range.
    #[error("invalid ring capacity: {capacity} bytes (must be a power of two in [{min}, {max}])")]
    InvalidCapacity {
        /// Requested capacity in bytes.
        capacity: u32,
        /// Smallest accepted capacity.
        min: u32,
        /// Largest accepted capacity.
        max: u32,
    },

    /// The supplied mapping is too small for header plus ring bytes.
    #[error("region too small: {total} bytes mapped, {required} required")]
    RegionTooSmall {
        /// Bytes available in the mapping.
        total: usize,
        /// Bytes required for header + capacity.
        required: usize,
    },

    /// The supplied mapping is not cache-line aligned.
    #[error("region base {address:#x} not aligned to {alignment} bytes")]
    Misaligned {
        /// Base address of the mapping.
        address: usize,
        /// Required alignment.
        alignment: usize,
    },

    /// The region header does not carry the expected magic.
    #[error("invalid region magic: {found:#010x}")]
    InvalidMagic {
        /// Magic value read from the header.
        found: u32,
    },

    /// The region was initialised with an incompatible layout version.
    #[error("layout version mismatch: expected {expected}, found {found}")]
    LayoutVersionMismatch {
        /// Version this build understands.
        expected: u32,
        /// Version read from the header.
        found: u32,
    },

    /// The region's capacity differs from the caller's expectation.
    #[error("capacity mismatch: expected {expected} bytes, region holds {found}")]
    CapacityMismatch {
        /// Capacity the caller asked for.
        expected: u32,
        /// Capacity read from the header.
        found: u32,
    },

    /// Another producer already holds the exclusive lock on this segment.
    #[error("producer already exists for segment '{segment}'")]
    ProducerAlreadyExists {
        /// Segment name.
        segment: String,
    },

    /// Segment does not exist in `/dev/shm/`.
    #[error("segment not found: '{segment}'")]
    SegmentNotFound {
        /// Segment name.
        segment: String,
    },

    /// Permission denied when opening the shared-memory segment.
    #[error("permission denied for segment '{segment}'")]
    PermissionDenied {
        /// Segment name.
        segment: String,
    },

    /// OS-level error from nix/libc calls.
    #[error("OS error on segment '{segment}': {source}")]
    Os {
        /// Segment name.
        segment: String,
        /// Underlying errno.
        source: nix::errno::Errno,
    },
}

/// Result type for ring operations.
pub type RingResult<T> = Result<T, RingError>;
