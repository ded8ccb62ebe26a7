//! Entrypoint of the `scyllaprom` server binary.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(clippy::clone_on_ref_ptr, clippy::todo, clippy::dbg_macro)]

use backoff::{Retry, RetryConfig};
use clap::Parser;
use clap_blocks::{api::ApiConfig, scylla::ScyllaConfig};
use observability_deps::tracing::info;
use router::http::HttpDelegate;
use std::sync::Arc;
use std::time::Duration;
use store::scylla::ScyllaDatabase;
use store::SeriesStore;
use tracing_subscriber::EnvFilter;

/// Fixed pause between attempts to establish the cluster session.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[clap(
    name = "scyllaprom",
    about = "Prometheus remote storage adapter backed by ScyllaDB",
    version
)]
struct Config {
    /// Log filter, e.g. `info` or `store=debug,router=debug`.
    #[clap(long = "log-filter", env = "LOG_FILTER", default_value = "info")]
    log_filter: String,

    #[clap(flatten)]
    scylla: ScyllaConfig,

    #[clap(flatten)]
    api: ApiConfig,
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    init_logging(&config.log_filter);

    // A cluster that is still coming up is not fatal; keep knocking.
    let scylla = &config.scylla;
    let connect_retry = Retry::new(&RetryConfig {
        max_attempts: 1,
        retry_delay: CONNECT_RETRY_DELAY,
    });
    let db = connect_retry
        .retry_forever("connect to cluster", || async {
            ScyllaDatabase::connect(
                &scylla.hosts,
                scylla.keyspace.clone(),
                scylla.session_timeout(),
            )
            .await
        })
        .await;
    info!(hosts = ?scylla.hosts, keyspace = %scylla.keyspace, "session established");

    let store = SeriesStore::new(
        Arc::new(db),
        RetryConfig {
            max_attempts: scylla.max_retries,
            retry_delay: scylla.retry_delay(),
        },
    );
    store.init().await?;

    let delegate = Arc::new(HttpDelegate::new(Arc::new(store)));
    router::server::serve(config.api.bind_address, delegate).await?;
    Ok(())
}
