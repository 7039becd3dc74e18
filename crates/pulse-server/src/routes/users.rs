// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Per-user endpoints: journey, raw event listing, summary.

use axum::{
	extract::{Path, Query, State},
	response::Response,
};
use serde::Deserialize;

use pulse_core::Permission;
use pulse_server_db::{EventStore, ScanFilter, ScanOrder};
use pulse_server_ratelimit::RouteClass;

use crate::api_response::{ok, ok_paginated, ApiError, Pagination};
use crate::extract::{Auth, DateRangeQuery};
use crate::state::AppState;

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEventsQuery {
	pub page: Option<u32>,
	pub limit: Option<u32>,
	pub event_name: Option<String>,
	pub start_date: Option<String>,
	pub end_date: Option<String>,
}

/// GET /users/{userId}/journey
pub async fn user_journey(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(user_id): Path<String>,
	Query(query): Query<DateRangeQuery>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let range = query.parse()?;
	let journey = state.engine.user_journey(&tenant, &user_id, range).await?;
	Ok(ok(journey))
}

/// GET /users/{userId}/events?page&limit&startDate&endDate&eventName
pub async fn user_events(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(user_id): Path<String>,
	Query(query): Query<UserEventsQuery>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let page = query.page.unwrap_or(1).max(1);
	let limit = query.limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE);
	let offset = (page as i64 - 1) * limit as i64;

	let filter = ScanFilter {
		user_id: Some(user_id),
		event_name: query.event_name.filter(|name| !name.is_empty()),
		range: DateRangeQuery {
			start_date: query.start_date,
			end_date: query.end_date,
		}
		.parse()?,
		..Default::default()
	};

	let events = state
		.events
		.scan(&tenant, &filter, ScanOrder::Descending, limit as i64, offset)
		.await?;
	let total = state.events.count(&tenant, &filter).await? as u64;

	Ok(ok_paginated(events, Pagination::new(page, limit, total)))
}

/// GET /users/{userId}/summary
pub async fn user_summary(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let summary = state.engine.user_summary(&tenant, &user_id).await?;
	Ok(ok(summary))
}
