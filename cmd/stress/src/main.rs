//! Stress harness - dummy producer, consumer and stats console
//!
//! Runs one producer pushing random-length packets, one consumer reading
//! fixed-size chunks, and a console printing counters until `q` is read
//! from stdin or `--duration` elapses.

use clap::Parser;
use ingest::{DrainerStats, IngestConfig, IngestController, IngestHandle, Stats};
use rand::Rng;
use std::io::BufRead;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "stress", about = "Drive an ingest controller with a dummy producer and consumer")]
struct Args {
    /// Delay between producer pushes, in milliseconds
    #[arg(long, default_value_t = 500)]
    producer_ms: u64,

    /// Delay between consumer reads, in milliseconds
    #[arg(long, default_value_t = 100)]
    consumer_ms: u64,

    /// Delay between console refreshes, in milliseconds
    #[arg(long, default_value_t = 1000)]
    console_ms: u64,

    /// Bytes requested per consumer read
    #[arg(long, default_value_t = 8)]
    read_size: usize,

    /// Staging capacity in bytes (defaults to INGEST_STAGING_CAPACITY or 1024)
    #[arg(long)]
    capacity: Option<usize>,

    /// Drain thread stack size in bytes (system default if unset)
    #[arg(long)]
    stack_size: Option<usize>,

    /// Stop after this many seconds instead of waiting for `q`
    #[arg(long)]
    duration: Option<u64>,
}

/// Quit flag that doubles as an interruptible sleep
#[derive(Default)]
struct Quit {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl Quit {
    fn set(&self) {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.condvar.notify_all();
    }

    /// Sleep for `interval` or until quit; true means quit
    fn wait(&self, interval: Duration) -> bool {
        let guard = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .condvar
            .wait_timeout_while(guard, interval, |quit| !*quit)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// `recv` timings, in nanoseconds
#[derive(Default)]
struct RecvTimings {
    last: AtomicU64,
    max: AtomicU64,
    sum: AtomicU64,
}

impl RecvTimings {
    fn record(&self, elapsed: Duration) {
        let ns = elapsed.as_nanos() as u64;
        self.last.store(ns, Ordering::Relaxed);
        self.max.fetch_max(ns, Ordering::Relaxed);
        self.sum.fetch_add(ns, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct ConsumerCounts {
    reads: AtomicU64,
    bytes: AtomicU64,
}

fn ms(ns: u64) -> f64 {
    ns as f64 * 1e-6
}

fn print_stats(st: &Stats, timings: &RecvTimings, consumer: &ConsumerCounts) {
    let total = st.packets_total();
    let avg = if total == 0 {
        0.0
    } else {
        ms(timings.sum.load(Ordering::Relaxed)) / total as f64
    };

    println!("Controller");
    println!("  {:<22}{:>15}", "Packets Received:", st.packets_received);
    println!("  {:<22}{:>15}", "Bytes Received:", st.bytes_received);
    println!("  {:<22}{:>15}", "Packets Dropped:", st.packets_dropped);
    println!("  {:<22}{:>15}", "Bytes Dropped:", st.bytes_dropped);
    println!("  {:<22}{:>14.2}%", "Drop Ratio:", st.drop_ratio() * 100.0);
    println!("  {:<22}{:>15}", "Last Error:", st.last_error.as_str());
    println!("  {:<22}{:>12.4} ms", "Last Recv:", ms(timings.last.load(Ordering::Relaxed)));
    println!("  {:<22}{:>12.4} ms", "Max Recv:", ms(timings.max.load(Ordering::Relaxed)));
    println!("  {:<22}{:>12.4} ms", "Avg Recv:", avg);
    println!("Consumer");
    println!("  {:<22}{:>15}", "Reads:", consumer.reads.load(Ordering::Relaxed));
    println!("  {:<22}{:>15}", "Bytes Received:", consumer.bytes.load(Ordering::Relaxed));
}

fn run_producer(
    mut controller: IngestController,
    quit: Arc<Quit>,
    timings: Arc<RecvTimings>,
    interval: Duration,
) -> (Stats, DrainerStats) {
    let pattern: Vec<u8> = (0..=255u8).collect();
    let mut rng = rand::thread_rng();

    while !quit.wait(interval) {
        let len = rng.gen_range(10..=pattern.len());
        let start = Instant::now();
        controller.recv(&pattern[..len]);
        timings.record(start.elapsed());
    }

    let stats = controller.stats();
    (stats, controller.shutdown())
}

fn run_consumer(
    handle: IngestHandle,
    quit: Arc<Quit>,
    counts: Arc<ConsumerCounts>,
    interval: Duration,
    read_size: usize,
) {
    while !quit.wait(interval) {
        let bytes = handle.get(read_size);
        counts.reads.fetch_add(1, Ordering::Relaxed);
        counts.bytes.fetch_add(bytes.len() as u64, Ordering::Relaxed);
    }
}

fn main() {
    let args = Args::parse();
    ingest::init_logging();

    let mut config = IngestConfig::from_env();
    if let Some(capacity) = args.capacity {
        config = config.staging_capacity(capacity);
    }
    if args.stack_size.is_some() {
        config = config.stack_size(args.stack_size);
    }
    config.log();

    let controller = match IngestController::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            tracing::error!(error = %e, "failed to start controller");
            std::process::exit(1);
        }
    };

    println!("=== Ingest Stress Test ===");
    match args.duration {
        Some(secs) => println!("Running for {}s (q + Enter to stop early)\n", secs),
        None => println!("Type q + Enter to stop\n"),
    }

    let quit = Arc::new(Quit::default());
    let timings = Arc::new(RecvTimings::default());
    let counts = Arc::new(ConsumerCounts::default());
    let handle = controller.handle();
    let start = Instant::now();

    let producer = {
        let quit = Arc::clone(&quit);
        let timings = Arc::clone(&timings);
        let interval = Duration::from_millis(args.producer_ms);
        thread::spawn(move || run_producer(controller, quit, timings, interval))
    };

    let consumer = {
        let quit = Arc::clone(&quit);
        let counts = Arc::clone(&counts);
        let handle = handle.clone();
        let interval = Duration::from_millis(args.consumer_ms);
        let read_size = args.read_size;
        thread::spawn(move || run_consumer(handle, quit, counts, interval, read_size))
    };

    let console = {
        let quit = Arc::clone(&quit);
        let timings = Arc::clone(&timings);
        let counts = Arc::clone(&counts);
        let interval = Duration::from_millis(args.console_ms);
        thread::spawn(move || {
            while !quit.wait(interval) {
                print_stats(&handle.stats(), &timings, &counts);
                println!();
            }
        })
    };

    // Detached: blocks on stdin until the process exits
    {
        let quit = Arc::clone(&quit);
        thread::spawn(move || {
            // EOF leaves the run to --duration or Ctrl-C
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim() == "q" => {
                        quit.set();
                        return;
                    }
                    Ok(_) => continue,
                    Err(_) => return,
                }
            }
        });
    }

    match args.duration {
        Some(secs) => {
            quit.wait(Duration::from_secs(secs));
        }
        None => while !quit.wait(Duration::from_secs(3600)) {},
    }
    quit.set();

    let (stats, drainer) = match producer.join() {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("producer thread panicked");
            std::process::exit(1);
        }
    };
    let _ = consumer.join();
    let _ = console.join();

    println!("\n=== Results ===");
    print_stats(&stats, &timings, &counts);
    println!("Drain thread");
    println!("  {:<22}{:>15}", "Wakeups:", drainer.wakeups);
    println!("  {:<22}{:>15}", "Drains:", drainer.drains);
    println!("  {:<22}{:>15}", "Bytes Drained:", drainer.bytes_drained);
    println!("  {:<22}{:>15}", "Largest Block:", drainer.max_block);
    println!("  {:<22}{:>15.2?}", "Run Time:", start.elapsed());
    println!("\n=== Stress Test Complete ===");
}
