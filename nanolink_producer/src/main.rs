//! # nanolink demo producer
//!
//! Creates a named shared-memory ring and streams framed records into it at
//! an optional paced rate. Admission failures are not retried — the ring's
//! drop-newest policy is left visible in the final drop count.
//!
//! # Usage
//!
//! ```bash
//! # 100k records of 128 bytes, as fast as admission allows
//! nanolink_producer --name demo
//!
//! # 1 KiB records paced at 50k records/s into a 1 MiB ring
//! nanolink_producer --name demo --capacity 1048576 --payload-size 1024 --rate 50000
//! ```

use std::time::{Duration, Instant};

use clap::Parser;
use nanolink_ring::{RingProducer, ShmRegion};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Message type tag used for demo sample records.
const SAMPLE_MSG_TYPE: u32 = 1;

/// nanolink demo producer — streams framed records into a shared-memory ring
#[derive(Parser, Debug)]
#[command(name = "nanolink_producer")]
#[command(version)]
#[command(about = "Streams framed records into a nanolink shared-memory ring")]
struct Args {
    /// Segment name (mapped as /dev/shm/nanolink_<name>)
    #[arg(long, default_value = "nanolink_demo")]
    name: String,

    /// Ring capacity in bytes (power of two, 4 KiB - 256 MiB)
    #[arg(long, default_value_t = 1 << 20)]
    capacity: u32,

    /// Number of records to write
    #[arg(long, default_value_t = 100_000)]
    count: u64,

    /// Payload size in bytes per record
    #[arg(long, default_value_t = 128)]
    payload_size: usize,

    /// Target rate in records per second (0 = unpaced)
    #[arg(long, default_value_t = 0)]
    rate: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("producer failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    info!(
        name = args.name,
        capacity = args.capacity,
        count = args.count,
        payload_size = args.payload_size,
        rate = args.rate,
        "nanolink producer starting"
    );

    let shm = ShmRegion::create(&args.name, args.capacity)?;
    let region = shm.region(args.capacity, true)?;
    let mut producer = RingProducer::new(region);

    let mut payload = vec![0u8; args.payload_size];
    let interval = (args.rate > 0).then(|| Duration::from_secs_f64(1.0 / args.rate as f64));

    let start = Instant::now();
    let mut next_deadline = start;
    let mut admitted = 0u64;

    for seq in 0..args.count {
        if let Some(interval) = interval {
            // Absolute deadlines so pacing error does not accumulate.
            while Instant::now() < next_deadline {
                std::hint::spin_loop();
            }
            next_deadline += interval;
        }

        payload.fill(seq as u8);
        if producer.try_write(&payload, SAMPLE_MSG_TYPE, monotonic_ns()?, seq as u32) {
            admitted += 1;
        }
    }
    let elapsed = start.elapsed();

    // Give the consumer a bounded window to drain before the segment is
    // unlinked. Its own mapping stays valid either way.
    let drain_deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let stats = producer.stats();
        if stats.head_bytes == stats.tail_bytes || Instant::now() > drain_deadline {
            break;
        }
        std::thread::yield_now();
    }

    let stats = producer.stats();
    info!(
        admitted,
        dropped = stats.dropped_writes,
        elapsed_ms = elapsed.as_millis() as u64,
        rate = format!("{:.0}/s", admitted as f64 / elapsed.as_secs_f64()),
        "producer done"
    );
    Ok(())
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

/// CLOCK_MONOTONIC nanoseconds — comparable across processes on one host.
fn monotonic_ns() -> Result<u64, nix::errno::Errno> {
    let ts = nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC)?;
    Ok(ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64)
}
