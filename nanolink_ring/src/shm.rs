//! Named POSIX shared-memory acquisition for cooperating processes.
//!
//! The ring core only sees a base pointer and a size; this module supplies
//! them from a named `/dev/shm` segment so a producer process and a
//! consumer process can map the same bytes.
//!
//! ## Producer exclusivity
//!
//! [`ShmRegion::create`] takes a non-blocking exclusive `flock` on a
//! separate `.lock` shm segment and holds it for the region's lifetime.
//! The lock elects the single initialiser and rejects duplicate producers;
//! the data segment itself is never flock'd, so the consumer attaches
//! without touching the lock.
//!
//! ## Naming
//!
//! Segments live under `/dev/shm/` as `nanolink_<name>` with a sibling
//! `nanolink_<name>.lock`.

use std::os::unix::io::{AsRawFd, OwnedFd};
use std::ptr::NonNull;

use nix::fcntl::{Flock, FlockArg, OFlag};
use nix::sys::mman::{self, MapFlags, MmapAdvise, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd;
use tracing::debug;

use crate::error::{RingError, RingResult};
use crate::layout::{HEADER_BYTES, MIN_CAPACITY};
use crate::region::{validate_capacity, Region};

/// SHM name prefix for all nanolink segments.
const SHM_PREFIX: &str = "/nanolink_";

/// Build the POSIX SHM path for a segment name.
fn shm_path(name: &str) -> String {
    format!("{SHM_PREFIX}{name}")
}

/// Build the lock-file path for producer-exclusivity enforcement.
fn lock_path(name: &str) -> String {
    format!("{SHM_PREFIX}{name}.lock")
}

fn os_err(name: &str, source: nix::errno::Errno) -> RingError {
    RingError::Os {
        segment: name.to_string(),
        source,
    }
}

/// A mapped named shared-memory segment sized for one ring.
///
/// The creator owns the segment lifetime: dropping a created `ShmRegion`
/// unlinks both the data and the lock segments. An opened `ShmRegion` only
/// unmaps — existing mappings in either process stay valid until unmapped,
/// per POSIX unlink semantics.
pub struct ShmRegion {
    /// Exclusive flock held for the producer's lifetime. `None` on the
    /// consumer side.
    _lock: Option<Flock<OwnedFd>>,
    /// Data segment descriptor, kept alive for cleanup.
    _fd: OwnedFd,
    map_ptr: NonNull<libc::c_void>,
    map_len: usize,
    name: String,
    owner: bool,
}

// SAFETY: the mapping is only dereferenced through Region, whose producer /
// consumer protocol provides the cross-thread ordering.
unsafe impl Send for ShmRegion {}

impl ShmRegion {
    /// Create (or re-create) the named segment sized for a ring of
    /// `capacity_bytes`, acquiring the exclusive producer lock.
    ///
    /// # Errors
    ///
    /// - [`RingError::InvalidCapacity`] before any system call.
    /// - [`RingError::ProducerAlreadyExists`] if another process holds the
    ///   lock.
    /// - [`RingError::Os`] for system-level failures.
    pub fn create(name: &str, capacity_bytes: u32) -> RingResult<ShmRegion> {
        validate_capacity(capacity_bytes)?;
        let map_len = HEADER_BYTES + capacity_bytes as usize;

        let lock_name = lock_path(name);
        let lock_fd = mman::shm_open(
            lock_name.as_str(),
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| os_err(name, e))?;

        let lock = Flock::lock(lock_fd, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == nix::errno::Errno::EWOULDBLOCK {
                RingError::ProducerAlreadyExists {
                    segment: name.to_string(),
                }
            } else {
                os_err(name, errno)
            }
        })?;

        let data_name = shm_path(name);
        let data_fd = mman::shm_open(
            data_name.as_str(),
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR, // 0o600
        )
        .map_err(|e| os_err(name, e))?;

        unistd::ftruncate(&data_fd, map_len as libc::off_t).map_err(|e| os_err(name, e))?;

        let map_ptr = unsafe {
            mman::mmap(
                None,
                std::num::NonZeroUsize::new(map_len).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &data_fd,
                0,
            )
            .map_err(|e| os_err(name, e))?
        };

        // The ring is written front to back within each cycle.
        let _ = unsafe { mman::madvise(map_ptr, map_len, MmapAdvise::MADV_SEQUENTIAL) };

        debug!(segment = name, bytes = map_len, "created shared region");

        Ok(ShmRegion {
            _lock: Some(lock),
            _fd: data_fd,
            map_ptr,
            map_len,
            name: name.to_string(),
            owner: true,
        })
    }

    /// Map an existing named segment.
    ///
    /// The mapping is read-write: the consumer publishes `tail_bytes` into
    /// the shared header. Single-consumer discipline remains the caller's
    /// contract.
    ///
    /// # Errors
    ///
    /// - [`RingError::SegmentNotFound`] if no such segment exists.
    /// - [`RingError::PermissionDenied`] on insufficient permissions.
    /// - [`RingError::RegionTooSmall`] if the segment cannot hold even a
    ///   minimum-capacity ring.
    /// - [`RingError::Os`] for other system-level failures.
    pub fn open(name: &str) -> RingResult<ShmRegion> {
        let data_name = shm_path(name);
        let data_fd =
            mman::shm_open(data_name.as_str(), OFlag::O_RDWR, Mode::empty()).map_err(|e| {
                match e {
                    nix::errno::Errno::ENOENT => RingError::SegmentNotFound {
                        segment: name.to_string(),
                    },
                    nix::errno::Errno::EACCES => RingError::PermissionDenied {
                        segment: name.to_string(),
                    },
                    other => os_err(name, other),
                }
            })?;

        let stat = nix::sys::stat::fstat(data_fd.as_raw_fd()).map_err(|e| os_err(name, e))?;
        let map_len = stat.st_size as usize;
        let min_len = HEADER_BYTES + MIN_CAPACITY as usize;
        if map_len < min_len {
            return Err(RingError::RegionTooSmall {
                total: map_len,
                required: min_len,
            });
        }

        let map_ptr = unsafe {
            mman::mmap(
                None,
                std::num::NonZeroUsize::new(map_len).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &data_fd,
                0,
            )
            .map_err(|e| os_err(name, e))?
        };

        debug!(segment = name, bytes = map_len, "opened shared region");

        Ok(ShmRegion {
            _lock: None,
            _fd: data_fd,
            map_ptr,
            map_len,
            name: name.to_string(),
            owner: false,
        })
    }

    /// Bind the ring core to this mapping.
    ///
    /// The returned [`Region`] (and any copy of it) must not outlive this
    /// `ShmRegion` — dropping the `ShmRegion` unmaps the bytes.
    pub fn region(&self, capacity_bytes: u32, initialise: bool) -> RingResult<Region> {
        // SAFETY: the mapping covers map_len bytes, is page-aligned, and
        // stays alive until self is dropped; the caller upholds the
        // one-producer / one-consumer contract.
        unsafe { Region::new(self.base(), self.map_len, capacity_bytes, initialise) }
    }

    /// Base pointer of the mapping.
    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.map_ptr.cast()
    }

    /// Mapped size in bytes (header plus ring).
    #[inline]
    pub fn len(&self) -> usize {
        self.map_len
    }

    /// Whether the mapping is empty (never true for a live region).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map_len == 0
    }

    /// Segment name (without the `/nanolink_` prefix).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        // SAFETY: map_ptr/map_len come from a successful mmap.
        unsafe {
            let _ = mman::munmap(self.map_ptr, self.map_len);
        }
        if self.owner {
            let _ = mman::shm_unlink(shm_path(&self.name).as_str());
            let _ = mman::shm_unlink(lock_path(&self.name).as_str());
        }
        // _lock and _fd drop automatically, releasing the flock and fds.
    }
}
