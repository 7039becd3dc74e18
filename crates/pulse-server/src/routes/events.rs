// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Event ingestion and event-level queries.

use axum::{
	extract::{Query, State},
	http::HeaderMap,
	response::Response,
	Json,
};
use chrono::Utc;
use serde_json::json;

use pulse_core::{EventPayload, Permission, PulseError};
use pulse_server_cache::Cache;
use pulse_server_ingest::ClientInfo;
use pulse_server_ratelimit::RouteClass;

use crate::api_response::{ok, ApiError};
use crate::extract::{Auth, DateRangeQuery};
use crate::state::AppState;

fn client_info(headers: &HeaderMap) -> ClientInfo {
	let ip_address = headers
		.get("x-forwarded-for")
		.and_then(|v| v.to_str().ok())
		.map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
		.or_else(|| {
			headers
				.get("x-real-ip")
				.and_then(|v| v.to_str().ok())
				.map(|s| s.to_string())
		});

	let user_agent = headers
		.get("user-agent")
		.and_then(|v| v.to_str().ok())
		.map(|s| s.to_string());

	ClientInfo {
		user_agent,
		ip_address,
	}
}

/// POST /events - ingest a single event object or an array of them.
pub async fn ingest_events(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	headers: HeaderMap,
	Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Write)?;
	state
		.limiter
		.check(RouteClass::Ingest, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let payloads: Vec<EventPayload> = if body.is_array() {
		serde_json::from_value(body)
			.map_err(|e| PulseError::invalid(format!("malformed event batch: {e}")))?
	} else {
		vec![serde_json::from_value(body)
			.map_err(|e| PulseError::invalid(format!("malformed event: {e}")))?]
	};

	let report = state
		.ingestion
		.ingest(&tenant, payloads, client_info(&headers))
		.await?;

	let skipped: Vec<serde_json::Value> = report
		.skipped
		.iter()
		.map(|s| json!({"index": s.index, "reasons": s.reasons}))
		.collect();

	Ok(ok(json!({
		"processed": report.processed,
		"duplicates": report.duplicates,
		"skipped": skipped,
		"timestamp": Utc::now(),
	})))
}

/// GET /events/summary - per-event-name counts for a date range.
pub async fn event_summary(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Query(query): Query<DateRangeQuery>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let range = query.parse_or_last_days(30)?;
	let summary = state.engine.event_summary(&tenant, range).await?;
	Ok(ok(summary))
}

/// GET /events/realtime - current value of the tenant's event counter.
pub async fn realtime_count(
	State(state): State<AppState>,
	Auth(ctx): Auth,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let key = format!("events:{}:{}:count", tenant.org_id, tenant.project_id);
	let count = match state.cache.get(&key).await {
		Ok(Some(raw)) => raw.parse::<i64>().unwrap_or(0),
		Ok(None) => 0,
		Err(e) => {
			tracing::warn!(error = %e, "realtime counter unavailable");
			0
		}
	};

	Ok(ok(json!({
		"count": count,
		"timestamp": Utc::now(),
	})))
}
