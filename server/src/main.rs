//! Accept order submissions over HTTP and fan their fragments out to the
//! darknodes of each pod.

mod config;
mod error;
mod http;
mod keystore;
mod orderbook;
mod registry;
mod swarmer;
mod wire;

use commonware_runtime::{tokio, Metrics, Runner, Spawner};
use darkpool_ingress::{swarm, Config, Ingress};
use futures::{future, stream, StreamExt};
use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse arguments
    let matches = config::command().get_matches();
    let settings = config::Settings::from_matches(&matches).expect("invalid settings");

    // Create logger, letting RUST_LOG override the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_string()));
    if settings.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_line_number(true)
            .with_file(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_line_number(true)
            .with_file(true)
            .init();
    }

    // Load network and account
    let network = settings
        .load_network()
        .expect("failed to load network configuration");
    let account = keystore::load(&settings.keystore_path(), &settings.passphrase)
        .expect("failed to load keystore");
    info!(
        network = %settings.network,
        port = settings.port,
        alpha = settings.alpha,
        account = %account.address,
        registry = %network.registry,
        bootstrap = network.bootstrap.len(),
        "loaded configuration"
    );

    let executor = tokio::Runner::default();
    executor.start(|context| async move {
        // Connect to the outside world
        let timeout = darkpool_ingress::config::DEFAULT_RPC_TIMEOUT;
        let registry = registry::Client::new(&network.registry, &account.address, timeout)
            .expect("failed to create registry client");
        let swarmer = swarmer::Client::new(network.bootstrap, settings.alpha, timeout)
            .expect("failed to create swarmer client");
        let swarmer = swarm::Cache::new(
            context.with_label("swarm"),
            swarmer,
            Duration::from_secs(network.discovery_ttl),
        );
        let orderbook =
            orderbook::Client::new(timeout).expect("failed to create orderbook client");

        // Start the ingress
        let ingress = Ingress::new(
            context.with_label("ingress"),
            Config::new(registry, swarmer, orderbook),
        );
        let sync_errors = ingress.sync();
        let process_errors = ingress.process_requests();
        context.with_label("errors").spawn(|_| async move {
            let mut errors = stream::select(sync_errors, process_errors);
            while let Some(err) = errors.next().await {
                error!(?err, "ingress failure");
            }
        });

        // Serve submissions
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, settings.port));
        let listener = ::tokio::net::TcpListener::bind(addr)
            .await
            .expect("failed to bind listener");
        info!(?addr, "serving orders");
        let app = http::router(ingress, context.with_label("http"));
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                if let Err(err) = ::tokio::signal::ctrl_c().await {
                    error!(?err, "failed to listen for ctrl-c");
                    future::pending::<()>().await;
                }
            })
            .await
            .expect("failed to serve orders");

        // Let workers finish the request they hold. A delivery may wait on
        // both discovery and the orderbook.
        info!("shutting down");
        if let Err(err) = context.stop(0, Some(timeout * 2)).await {
            warn!(?err, "tasks did not stop in time");
        }
    });
}
