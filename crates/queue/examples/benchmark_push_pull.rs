//! Benchmark for pushing, pulling and deleting messages
//!
//! Measures throughput of the in-memory engine for a full
//! push -> pull -> delete cycle over a single queue.
//!
//! Set `RUST_LOG=debug` to see engine log lines.

use std::io::{self, Write};
use std::time::{Duration, Instant};
use visq_queue::{InMemoryQueueService, QueueConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Push / Pull / Delete Benchmark ===\n");

    // Benchmark configuration
    const NUM_MESSAGES: usize = 10_000;
    const PROGRESS_INTERVAL: usize = 1_000;

    let config = QueueConfig::new(Duration::from_secs(60)).expect("valid visibility timeout");
    let engine = InMemoryQueueService::in_memory(config).expect("engine starts");
    let queue = engine.create_queue().expect("queue is created");

    println!("Pushing {} messages...", NUM_MESSAGES);
    let push_start = Instant::now();
    for i in 0..NUM_MESSAGES {
        engine
            .push(&queue, &format!("message_{}", i))
            .expect("push succeeds")
            .expect("queue exists");

        if (i + 1) % PROGRESS_INTERVAL == 0 {
            eprint!(".");
            io::stderr().flush().unwrap();
        }
    }
    eprintln!();
    let push_seconds = push_start.elapsed().as_secs_f64();

    println!("Pulling and deleting {} messages...", NUM_MESSAGES);
    let pull_start = Instant::now();
    let mut pulled = 0;
    while let Some(reservation) = engine.pull(&queue).expect("pull succeeds") {
        engine
            .delete(&queue, &reservation.receipt_handle)
            .expect("delete succeeds");
        pulled += 1;

        if pulled % PROGRESS_INTERVAL == 0 {
            eprint!(".");
            io::stderr().flush().unwrap();
        }
    }
    eprintln!();
    let pull_seconds = pull_start.elapsed().as_secs_f64();

    // Print final statistics
    println!("\n=== Benchmark Results ===");
    println!("Messages pushed:   {}", NUM_MESSAGES);
    println!("Messages pulled:   {}", pulled);
    println!(
        "Push throughput:   {:.0} messages/second",
        NUM_MESSAGES as f64 / push_seconds
    );
    println!(
        "Pull+delete:       {:.0} messages/second",
        pulled as f64 / pull_seconds
    );

    assert_eq!(pulled, NUM_MESSAGES, "every message is delivered once");
    println!("\n✓ Benchmark complete!");
}
