// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Application state shared across handlers.

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pulse_server_analytics::AnalyticsEngine;
use pulse_server_auth::Authenticator;
use pulse_server_cache::MemoryCache;
use pulse_server_config::ServerConfig;
use pulse_server_db::{ApiKeyRepository, EventRepository, FunnelRepository, QueueRepository};
use pulse_server_ingest::{IngestionContext, PersistEventsHandler, EVENT_PERSIST_TOPIC};
use pulse_server_queue::JobQueue;
use pulse_server_ratelimit::RateLimiter;
use pulse_server_realtime::RealtimeBus;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub config: ServerConfig,
	pub pool: SqlitePool,
	pub events: Arc<EventRepository>,
	pub funnels: Arc<FunnelRepository>,
	pub api_keys: Arc<ApiKeyRepository>,
	pub cache: Arc<MemoryCache>,
	pub authenticator: Arc<Authenticator<ApiKeyRepository>>,
	pub limiter: Arc<RateLimiter<MemoryCache>>,
	pub ingestion: Arc<IngestionContext>,
	pub engine: Arc<AnalyticsEngine<EventRepository, FunnelRepository>>,
	pub bus: Arc<RealtimeBus>,
	pub started_at: Instant,
}

/// Build the application state and wire the pipeline together. Queue
/// recovery and consumers are started here so a returned state is ready
/// to persist events.
pub async fn create_app_state(pool: SqlitePool, config: ServerConfig) -> AppState {
	let events = Arc::new(EventRepository::new(pool.clone()));
	let funnels = Arc::new(FunnelRepository::new(pool.clone()));
	let api_keys = Arc::new(ApiKeyRepository::new(pool.clone()));
	let cache = Arc::new(MemoryCache::new());
	let bus = Arc::new(RealtimeBus::new());

	let queue = Arc::new(JobQueue::new(Arc::new(QueueRepository::new(pool.clone()))));
	if let Err(e) = queue.recover().await {
		tracing::error!(error = %e, "failed to recover stale queue jobs");
	}

	let counter_ttl = Duration::from_secs(config.cache.default_ttl_secs);
	let persist_handler = Arc::new(PersistEventsHandler::new(
		Arc::clone(&events),
		cache.clone() as Arc<dyn pulse_server_cache::Cache>,
		Arc::clone(&bus),
		counter_ttl,
	));
	queue
		.consume(
			EVENT_PERSIST_TOPIC,
			persist_handler,
			config.ingest.worker_concurrency,
		)
		.await;

	let ingestion = Arc::new(IngestionContext::new(
		Arc::clone(&queue),
		cache.clone() as Arc<dyn pulse_server_cache::Cache>,
		Arc::clone(&bus),
		config.ingest.clone(),
	));

	let engine = Arc::new(AnalyticsEngine::new(
		Arc::clone(&events),
		Arc::clone(&funnels),
		cache.clone() as Arc<dyn pulse_server_cache::Cache>,
		Duration::from_secs(config.cache.query_ttl_secs),
	));

	let authenticator = Arc::new(Authenticator::new(Arc::clone(&api_keys)));
	let limiter = Arc::new(RateLimiter::new(
		Arc::clone(&cache),
		config.rate_limit.clone(),
	));

	AppState {
		config,
		pool,
		events,
		funnels,
		api_keys,
		cache,
		authenticator,
		limiter,
		ingestion,
		engine,
		bus,
		started_at: Instant::now(),
	}
}
