//! Community cache node binary.

use std::sync::Arc;
use std::time::Duration;

use outpost::{Fetcher, LatencyProbe, RegistrationAgent};
use outpost_core::Backend;
use outpost_memory::MemoryBackend;
use outpost_redis::RedisBackend;
use outpost_server::config::Config;
use outpost_server::routes;
use outpost_server::state::AppState;
use outpost_server::upstream::RegistryHttpClient;
use tracing::info;

/// How often the in-memory backend drops entries past their eviction bound.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,outpost=debug,outpost_server=debug".into());
    let subscriber = tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let config = Config::from_env().expect("Invalid configuration");

    let backend: Arc<dyn Backend> = match config.redis_url.as_deref() {
        Some(url) => Arc::new(
            RedisBackend::builder()
                .server(url)
                .build()
                .expect("Invalid REDIS_URL"),
        ),
        None => {
            let backend = MemoryBackend::new();
            let sweeper = backend.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(SWEEP_INTERVAL);
                loop {
                    tick.tick().await;
                    sweeper.sweep();
                }
            });
            Arc::new(backend)
        }
    };
    let backend_name = backend.name().to_owned();
    info!(backend = %backend_name, "cache store ready");

    let registry = Arc::new(
        RegistryHttpClient::new(&config.registry_url, config.fetcher.upstream_timeout)
            .expect("Failed to build registry client"),
    );

    let agent = RegistrationAgent::new(
        Arc::clone(&registry),
        config.identity.clone(),
        config.heartbeat.clone(),
    );
    tokio::spawn(agent.run());

    let state = AppState {
        fetcher: Arc::new(Fetcher::new(Arc::clone(&backend), config.fetcher.clone())),
        probe: Arc::new(LatencyProbe::new(
            Arc::clone(&backend),
            Arc::clone(&registry),
            config.probe_timeout,
        )),
        registry,
        identity: Arc::new(config.identity),
        policies: Arc::new(config.policies),
        backend_name,
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listen address");
    info!(
        "{} listening on http://{}",
        state.identity.name,
        listener.local_addr().expect("Listener has no local address")
    );
    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        return;
    }
    info!("shutting down");
}
