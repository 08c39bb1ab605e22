use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;
use tracing::level_filters::LevelFilter;

use ring_log_sink::config::SinkConfig;
use ring_log_sink::init::{init_tracing_with_config, LayerConfig};
use ring_log_sink::noop_store::NoopStore;

fn main() {
    let layer_config = LayerConfig {
        sink: SinkConfig {
            capacity: 50_000,
            overflow_report_window: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
            level: LevelFilter::ERROR,
            ..SinkConfig::default()
        },
        enable_stdout: false,
    };

    let sink = init_tracing_with_config(Arc::new(NoopStore), layer_config).expect("install tracing");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    sink.close();
    let stats = sink.stats();
    println!("persisted {} / dropped {}", stats.persisted, stats.dropped);
}
