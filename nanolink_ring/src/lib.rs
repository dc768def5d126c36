//! # nanolink: SPSC shared-memory ring for framed messages
//!
//! A single-producer / single-consumer variable-size byte ring stored in a
//! shared-memory region, for low-latency inter-process streaming of framed
//! records (sensor samples, telemetry, audio frames) on one host. Two
//! cooperating processes map the same named region; the producer appends
//! framed records, the consumer drains them. After setup the hot path is
//! pure shared memory plus a handful of ordered atomic loads and stores —
//! no kernel crossings, no allocation, no locks.
//!
//! ## Region layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ RegionHeader (256 B)         │  magic / version / capacity
//! │   head_bytes   @ 64          │  three counters on distinct
//! │   tail_bytes   @ 128         │  cache lines
//! │   dropped_writes @ 192       │
//! ├──────────────────────────────┤
//! │ ring bytes (capacity_bytes)  │  [record hdr|payload|pad] ...
//! └──────────────────────────────┘
//! ```
//!
//! Records carry a 24-byte header and are padded to 8-byte boundaries; a
//! record never crosses the ring end — wrap markers consume the slack.
//! Admission is drop-newest: a full ring rejects the incoming write and
//! counts it, leaving queued records intact.
//!
//! ## Usage
//!
//! ```no_run
//! use nanolink_ring::{RingConsumer, RingProducer, ShmRegion};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Producer process
//! let shm = ShmRegion::create("telemetry", 1 << 16)?;
//! let mut producer = RingProducer::new(shm.region(1 << 16, true)?);
//! producer.try_write(b"sample", 1, 42, 0);
//!
//! // Consumer process
//! let shm = ShmRegion::open("telemetry")?;
//! let mut consumer = RingConsumer::new(shm.region(1 << 16, false)?);
//! let mut buf = [0u8; 4096];
//! if let Some(record) = consumer.try_read(&mut buf) {
//!     let payload = &buf[..record.payload_len];
//!     // ...
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Waiting
//!
//! `try_write` and `try_read` never block. Callers that need to wait for
//! space or data drive their own spin / yield / event loop around the
//! non-blocking calls; the ring stays deterministic and portable.
//!
//! ## Thread safety
//!
//! - [`RingProducer`]: NOT thread-safe — exactly one producer thread.
//! - [`RingConsumer`]: NOT thread-safe — exactly one consumer thread.
//! - The producer and the consumer may run in the same or in different
//!   processes; the protocol provides all cross-thread ordering.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod layout;
pub mod region;
pub mod ring;
pub mod shm;

pub use error::{RingError, RingResult};
pub use layout::{
    HEADER_BYTES, MAGIC, MAX_CAPACITY, MIN_CAPACITY, RECORD_HEADER_BYTES, VERSION, WRAP_MARKER,
};
pub use region::{validate_capacity, Region};
pub use ring::{RecordInfo, RingConsumer, RingProducer, RingStats};
pub use shm::ShmRegion;
