use anyhow::Result;
use axum::serve;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vigil_core::{collector, config::AppConfig};

mod router;

/// Initializes the logging system based on the configuration.
///
/// `RUST_LOG` takes precedence over the configured level so a noisy target
/// can be silenced without touching the config file.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,vigil_core={level},vigil_server={level}",
            level = config.logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json();
        registry.with(fmt_layer).init();
    } else {
        // "pretty" and any other format default to pretty logging
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config =
        AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config);
    info!("Starting Vigil exporter");
    debug!(
        chain = config.target.chain.as_str(),
        api_url = %config.target.api_url,
        bind_port = config.server.bind_port,
        "Configuration loaded"
    );

    let collector = collector::load(&config)
        .map_err(|e| anyhow::anyhow!("Collector initialization failed: {e}"))?;

    let app = router::create_router(collector);
    let addr = config
        .socket_addr()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {e}"))?;
    info!(address = %addr, "Exporter listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "Server error occurred");
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(
                error = %e,
                "Failed to install Ctrl+C handler"
            );
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(
                    error = %e,
                    "Failed to install signal handler"
                );

                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
