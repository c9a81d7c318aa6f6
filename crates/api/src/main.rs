use std::sync::Arc;

use anyhow::Context;

use webmarket_api::app::{build_app, services};
use webmarket_api::config::ApiConfig;

fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("loading configuration")?;
    webmarket_observability::init(config.log_format);

    // Built before the runtime starts: the blocking catalog client must not
    // be created or dropped on an async worker thread.
    let (services, workers) = services::build_services(&config).context("wiring services")?;
    let app = build_app(Arc::clone(&services));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;

    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;
        tracing::info!("listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown requested");
            })
            .await
            .context("server error")
    })?;

    // Last handle to the services goes away off the runtime.
    drop(runtime);
    drop(services);
    workers.shutdown();
    Ok(())
}
