// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Pulse event analytics HTTP server.
//!
//! Thin request-to-component mapping: handlers authenticate, rate limit,
//! and delegate to the ingestion pipeline, the analytics engine, and the
//! repositories. All routes live under the configured API prefix
//! (default `/api/v1`).

pub mod api_response;
pub mod extract;
pub mod routes;
pub mod state;
pub mod websocket;

pub use state::{create_app_state, AppState};

use axum::{
	routing::{get, post},
	Router,
};

/// Build the application router under the configured API prefix.
pub fn create_router(state: AppState) -> Router {
	let api = Router::new()
		.route("/health", get(routes::health::health_check))
		.route("/events", post(routes::events::ingest_events))
		.route("/events/summary", get(routes::events::event_summary))
		.route("/events/realtime", get(routes::events::realtime_count))
		.route(
			"/funnels",
			post(routes::funnels::create_funnel).get(routes::funnels::list_funnels),
		)
		.route(
			"/funnels/{id}",
			get(routes::funnels::get_funnel)
				.put(routes::funnels::update_funnel)
				.delete(routes::funnels::delete_funnel),
		)
		.route(
			"/funnels/{id}/analytics",
			get(routes::funnels::funnel_analytics),
		)
		.route("/retention", get(routes::retention::retention))
		.route("/metrics", get(routes::metrics::metrics))
		.route("/metrics/events", get(routes::metrics::event_names))
		.route("/metrics/summary", get(routes::metrics::metrics_summary))
		.route("/users/{user_id}/journey", get(routes::users::user_journey))
		.route("/users/{user_id}/events", get(routes::users::user_events))
		.route("/users/{user_id}/summary", get(routes::users::user_summary))
		.route(
			"/auth/keys",
			post(routes::keys::create_key).get(routes::keys::list_keys),
		)
		.route(
			"/auth/keys/{id}",
			get(routes::keys::get_key)
				.put(routes::keys::update_key)
				.delete(routes::keys::delete_key),
		)
		.route("/auth/validate", post(routes::keys::validate_key))
		.route("/ws", get(websocket::ws_upgrade_handler));

	let prefix = state.config.http.api_prefix.clone();
	Router::new().nest(&prefix, api).with_state(state)
}
