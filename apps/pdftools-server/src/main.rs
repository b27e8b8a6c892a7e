//! PDF tools server
//!
//! HTTP front end for the page-transform engine in `pdftools-core`. A single
//! multipart endpoint takes an `operation` field plus the uploaded PDFs and
//! answers with the transformed PDF, a list of split outputs, or a JSON
//! report.
//!
//! Configuration comes from command-line flags with environment fallbacks;
//! a `.env` file is read at startup when present.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod form;
mod state;

use state::{AppState, UploadLimits};

/// Command-line arguments for the PDF tools server
#[derive(Parser, Debug)]
#[command(name = "pdftools-server")]
#[command(about = "HTTP server for merging, splitting and editing PDF pages")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Largest accepted upload, per file, in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "50")]
    max_upload_mb: usize,

    /// Most files accepted in one request
    #[arg(long, env = "MAX_FILES", default_value = "20")]
    max_files: usize,

    /// Per-request processing timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    timeout_ms: u64,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "RATE_LIMIT", default_value = "10")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PDF tools server on {}:{}", args.host, args.port);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .ok_or_else(|| anyhow!("rate limit must be greater than zero"))?,
    );

    let state = AppState {
        limits: UploadLimits {
            max_file_bytes: args.max_upload_mb * 1024 * 1024,
            max_files: args.max_files,
        },
        timeout: Duration::from_millis(args.timeout_ms),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state)
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!(
        "Upload limit: {}MB x {} files, timeout {}ms",
        args.max_upload_mb, args.max_files, args.timeout_ms
    );

    // The rate limiter keys on the peer address
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
