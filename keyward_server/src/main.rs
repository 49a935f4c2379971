#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use clap::Parser;
use keyward_oidc::Authority;

mod opts;
mod routes;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    dotenvy::from_path("./config/.env").ok();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = opts::Opts::parse();
    let authority = Authority::from_config(&opts.authority_config())?;

    let listener = tokio::net::TcpListener::bind(opts.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, routes::app(authority))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log_signal_error(&err);
        std::future::pending::<()>().await;
    }
}

fn log_signal_error(err: &std::io::Error) {
    let error: &dyn std::error::Error = err;
    tracing::warn!(error, "unable to listen for shutdown signal");
}
