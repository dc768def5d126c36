//! # nanolink demo consumer
//!
//! Attaches to a named shared-memory ring and drains it with a
//! spin-then-yield backoff until the ring stays idle or Ctrl-C. Each record
//! carries the producer's `CLOCK_MONOTONIC` timestamp, so the consumer can
//! report one-way latency percentiles alongside the ring's counter snapshot.
//!
//! # Usage
//!
//! ```bash
//! nanolink_consumer --name demo --capacity 1048576
//! nanolink_consumer --name demo --capacity 1048576 --json
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use nanolink_ring::{RingConsumer, RingStats, ShmRegion};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Spins between polls before falling back to `yield_now`.
const SPIN_ROUNDS: u32 = 64;

/// nanolink demo consumer — drains a ring and reports latency percentiles
#[derive(Parser, Debug)]
#[command(name = "nanolink_consumer")]
#[command(version)]
#[command(about = "Drains a nanolink shared-memory ring and reports latency percentiles")]
struct Args {
    /// Segment name (mapped as /dev/shm/nanolink_<name>)
    #[arg(long, default_value = "nanolink_demo")]
    name: String,

    /// Expected ring capacity in bytes (must match the producer's)
    #[arg(long, default_value_t = 1 << 20)]
    capacity: u32,

    /// Destination buffer size; must cover the largest expected payload
    #[arg(long, default_value_t = 65536)]
    buffer_size: usize,

    /// Stop after this long without a record (milliseconds)
    #[arg(long, default_value_t = 2000)]
    idle_timeout_ms: u64,

    /// Emit the final report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Final drain report.
#[derive(Debug, Serialize)]
struct Report {
    received: u64,
    sequence_gaps: u64,
    latency_p50_ns: u64,
    latency_p90_ns: u64,
    latency_p99_ns: u64,
    latency_max_ns: u64,
    ring: RingStats,
}

fn main() {
    if let Err(e) = run() {
        error!("consumer failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    info!(
        name = args.name,
        capacity = args.capacity,
        "nanolink consumer attaching"
    );

    let shm = ShmRegion::open(&args.name)?;
    let region = shm.region(args.capacity, false)?;
    let mut consumer = RingConsumer::new(region);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })?;

    let idle_timeout = Duration::from_millis(args.idle_timeout_ms);
    let mut dest = vec![0u8; args.buffer_size];
    let mut latencies_ns: Vec<u64> = Vec::new();
    let mut last_sequence: Option<u32> = None;
    let mut sequence_gaps = 0u64;
    let mut received = 0u64;
    let mut last_record = Instant::now();
    let mut spins = 0u32;

    while running.load(Ordering::SeqCst) {
        match consumer.try_read(&mut dest) {
            Some(record) => {
                received += 1;
                latencies_ns.push(monotonic_ns()?.saturating_sub(record.timestamp));

                if let Some(prev) = last_sequence {
                    if record.sequence > prev {
                        sequence_gaps += u64::from(record.sequence - prev - 1);
                    } else {
                        warn!(
                            sequence = record.sequence,
                            previous = prev,
                            "non-increasing sequence"
                        );
                    }
                }
                last_sequence = Some(record.sequence);
                last_record = Instant::now();
                spins = 0;
            }
            None => {
                if last_record.elapsed() > idle_timeout {
                    break;
                }
                // Spin briefly for the next record, then get out of the way.
                if spins < SPIN_ROUNDS {
                    spins += 1;
                    std::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
            }
        }
    }

    let report = build_report(received, sequence_gaps, latencies_ns, consumer.stats());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            received = report.received,
            sequence_gaps = report.sequence_gaps,
            p50_us = report.latency_p50_ns / 1000,
            p90_us = report.latency_p90_ns / 1000,
            p99_us = report.latency_p99_ns / 1000,
            max_us = report.latency_max_ns / 1000,
            dropped = report.ring.dropped_writes,
            "consumer done"
        );
    }
    Ok(())
}

fn build_report(
    received: u64,
    sequence_gaps: u64,
    mut latencies_ns: Vec<u64>,
    ring: RingStats,
) -> Report {
    latencies_ns.sort_unstable();
    Report {
        received,
        sequence_gaps,
        latency_p50_ns: percentile(&latencies_ns, 0.50),
        latency_p90_ns: percentile(&latencies_ns, 0.90),
        latency_p99_ns: percentile(&latencies_ns, 0.99),
        latency_max_ns: latencies_ns.last().copied().unwrap_or(0),
        ring,
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[rank]
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
