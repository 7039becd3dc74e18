// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Liveness endpoint. The only route that skips authentication.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

/// GET /health - liveness plus a database ping and queue depth.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let database_ok = sqlx::query("SELECT 1")
		.execute(&state.pool)
		.await
		.is_ok();

	let queue = state.ingestion.queue().counts().await.ok();

	let status = if database_ok { "OK" } else { "DEGRADED" };
	let http_status = if database_ok {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};

	(
		http_status,
		Json(json!({
			"status": status,
			"timestamp": Utc::now(),
			"uptime": state.started_at.elapsed().as_secs(),
			"environment": state.config.logging.environment,
			"queue": queue.map(|c| json!({
				"queued": c.queued,
				"running": c.running,
				"completed": c.completed,
				"failed": c.failed,
			})),
		})),
	)
}
