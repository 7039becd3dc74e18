// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Time-bucketed metrics endpoints.

use axum::{
	extract::{Query, State},
	response::Response,
};
use serde::Deserialize;

use pulse_core::{FilterExpr, Permission, PulseError};
use pulse_server_db::{EventStore, Interval};
use pulse_server_ratelimit::RouteClass;

use crate::api_response::{ok, ApiError};
use crate::extract::{Auth, DateRangeQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
	pub event: Option<String>,
	pub interval: Option<String>,
	/// JSON-encoded filter predicate.
	pub filters: Option<String>,
	pub start_date: Option<String>,
	pub end_date: Option<String>,
}

/// GET /metrics?event&interval&startDate&endDate&filters
pub async fn metrics(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Query(query): Query<MetricsQuery>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let event = query
		.event
		.filter(|e| !e.is_empty())
		.ok_or_else(|| PulseError::invalid("event name is required"))?;

	let interval: Interval = query
		.interval
		.as_deref()
		.unwrap_or("daily")
		.parse()
		.map_err(PulseError::invalid)?;

	let filters = query
		.filters
		.as_deref()
		.map(|raw| {
			let parsed: FilterExpr = serde_json::from_str(raw)
				.map_err(|e| PulseError::invalid(format!("invalid filters JSON: {e}")))?;
			parsed.validate()?;
			Ok::<_, PulseError>(parsed)
		})
		.transpose()?;

	let range = DateRangeQuery {
		start_date: query.start_date,
		end_date: query.end_date,
	}
	.parse()?;
	let result = state
		.engine
		.metrics(&tenant, &event, interval, range, filters.as_ref())
		.await?;
	Ok(ok(result))
}

/// GET /metrics/events - distinct event names for the tenant.
pub async fn event_names(
	State(state): State<AppState>,
	Auth(ctx): Auth,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let names = state.events.distinct_event_names(&tenant).await?;
	Ok(ok(names))
}

/// GET /metrics/summary - alias of the event summary over a range.
pub async fn metrics_summary(
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
