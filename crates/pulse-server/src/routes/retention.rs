// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Cohort retention endpoint.

use axum::{
	extract::{Query, State},
	response::Response,
};
use serde::Deserialize;

use pulse_core::{Permission, PulseError};
use pulse_server_ratelimit::RouteClass;

use crate::api_response::{ok, ApiError};
use crate::extract::{Auth, DateRangeQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionQuery {
	pub cohort: Option<String>,
	pub days: Option<u32>,
	pub start_date: Option<String>,
	pub end_date: Option<String>,
}

/// GET /retention?cohort&days&startDate&endDate
pub async fn retention(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Query(query): Query<RetentionQuery>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let cohort = query
		.cohort
		.filter(|c| !c.is_empty())
		.ok_or_else(|| PulseError::invalid("cohort event name is required"))?;
	let days = query
		.days
		.ok_or_else(|| PulseError::invalid("days is required"))?;

	let range = DateRangeQuery {
		start_date: query.start_date,
		end_date: query.end_date,
	}
	.parse()?;
	let analytics = state.engine.retention(&tenant, &cohort, days, range).await?;
	Ok(ok(analytics))
}
