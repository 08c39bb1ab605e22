use tracing::{error, info};
use ring_log_sink::{
    backend::{make_store_from_config, parse_dsn},
    env::{env_or, RING_LOG_SINK_DSN_ENV},
    init::init_tracing,
};

fn main() {
    // Example DSN: opensearch://localhost:9200/logs
    let dsn = env_or(RING_LOG_SINK_DSN_ENV, "opensearch://localhost:9200/logs");

    let backend_cfg = parse_dsn(&dsn).expect("invalid RING_LOG_SINK_DSN");
    let store = make_store_from_config(&backend_cfg)
        .expect("failed to build opensearch store");

    let sink = init_tracing(store).expect("install tracing");

    info!("opensearch backend example started");
    error!(index = "logs", "simulated error sent via OpenSearch backend");

    sink.close();
}
