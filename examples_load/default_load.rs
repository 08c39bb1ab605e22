use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use ring_log_sink::init::init_tracing;
use ring_log_sink::noop_store::NoopStore;

fn main() {
    let sink = init_tracing(Arc::new(NoopStore)).expect("install tracing");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    sink.close();
    println!("{:?}", sink.stats());
}
