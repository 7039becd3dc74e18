// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Pulse event analytics server binary.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulse_server::{create_app_state, create_router};
use pulse_server_cache::CacheSweeper;
use pulse_server_ingest::BufferSweeper;

/// How long shutdown waits for the queue to drain.
const QUEUE_DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// How often the cache reclaims expired entries.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Pulse server - multi-tenant event analytics backend.
#[derive(Parser, Debug)]
#[command(name = "pulse-server", about = "Pulse event analytics server", version)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/pulse/server.toml).
	#[arg(long)]
	config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match args.config {
		Some(path) => pulse_server_config::load_config_with_file(path)?,
		None => pulse_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting pulse-server"
	);

	let pool = pulse_server_db::create_pool(&config.database.url).await?;
	pulse_server_db::run_migrations(&pool).await?;

	let cors = if config.cors.origin == "*" {
		CorsLayer::new()
			.allow_origin(Any)
			.allow_methods(Any)
			.allow_headers(Any)
	} else {
		CorsLayer::new()
			.allow_origin(config.cors.origin.parse::<axum::http::HeaderValue>()?)
			.allow_methods(Any)
			.allow_headers(Any)
	};

	let addr = config.socket_addr();
	let state = create_app_state(pool, config).await;

	let cache_sweeper = CacheSweeper::start(Arc::clone(&state.cache), CACHE_SWEEP_INTERVAL);
	let buffer_sweeper = BufferSweeper::start(Arc::clone(&state.ingestion));

	let ingestion = Arc::clone(&state.ingestion);
	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(cors);

	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
		}
	}

	// Shutdown order matters: stop the sweeper, flush every buffered
	// event into the durable queue, then drain the queue to a deadline.
	// Jobs not drained stay in storage for the next instance.
	buffer_sweeper.shutdown().await;
	cache_sweeper.shutdown().await;

	match ingestion.flush_all().await {
		Ok(flushed) if flushed > 0 => {
			tracing::info!(flushed, "flushed buffered events on shutdown");
		}
		Ok(_) => {}
		Err(e) => tracing::error!(error = %e, "failed to flush buffers on shutdown"),
	}

	ingestion.queue().shutdown(QUEUE_DRAIN_DEADLINE).await;

	tracing::info!("server shutdown complete");
	Ok(())
}
