// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Funnel CRUD and funnel analytics.

use axum::{
	extract::{Path, Query, State},
	response::Response,
	Json,
};
use serde::Deserialize;
use uuid::Uuid;

use pulse_core::{Funnel, FunnelStep, Permission, PulseError};
use pulse_server_db::FunnelStore;
use pulse_server_ratelimit::RouteClass;

use crate::api_response::{created, ok, ok_message, ApiError};
use crate::extract::{Auth, DateRangeQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFunnelRequest {
	pub name: String,
	pub steps: Vec<FunnelStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFunnelRequest {
	pub name: Option<String>,
	pub steps: Option<Vec<FunnelStep>>,
}

fn parse_funnel_id(raw: &str) -> Result<Uuid, PulseError> {
	Uuid::parse_str(raw).map_err(|_| PulseError::invalid(format!("invalid funnel id: {raw}")))
}

/// POST /funnels
pub async fn create_funnel(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Json(body): Json<CreateFunnelRequest>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Write)?;
	state
		.limiter
		.check(RouteClass::General, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	Funnel::validate(&body.name, &body.steps)?;
	let funnel = state
		.funnels
		.create_funnel(&tenant, &body.name, body.steps)
		.await?;

	Ok(created(funnel))
}

/// GET /funnels
pub async fn list_funnels(
	State(state): State<AppState>,
	Auth(ctx): Auth,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Read)?;
	state
		.limiter
		.check(RouteClass::General, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let funnels = state.funnels.list_funnels(&tenant).await?;
	Ok(ok(funnels))
}

/// GET /funnels/{id}
pub async fn get_funnel(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Read)?;
	state
		.limiter
		.check(RouteClass::General, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;

	let id = parse_funnel_id(&id)?;
	let funnel = state
		.funnels
		.get_funnel(&tenant, id)
		.await?
		.ok_or_else(|| PulseError::NotFound("funnel not found".to_string()))?;
	Ok(ok(funnel))
}

/// PUT /funnels/{id}
pub async fn update_funnel(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	Json(body): Json<UpdateFunnelRequest>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Write)?;
	state
		.limiter
		.check(RouteClass::General, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;
	let id = parse_funnel_id(&id)?;

	if let Some(steps) = &body.steps {
		let name = body.name.as_deref().unwrap_or("unchanged");
		Funnel::validate(name, steps)?;
	} else if let Some(name) = &body.name {
		if name.is_empty() {
			return Err(PulseError::invalid("name must not be empty").into());
		}
	}

	let funnel = state
		.funnels
		.update_funnel(&tenant, id, body.name, body.steps)
		.await?
		.ok_or_else(|| PulseError::NotFound("funnel not found".to_string()))?;
	Ok(ok(funnel))
}

/// DELETE /funnels/{id}
pub async fn delete_funnel(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Write)?;
	state
		.limiter
		.check(RouteClass::General, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;
	let id = parse_funnel_id(&id)?;

	let deleted = state
		.funnels
		.delete_funnel(&tenant, id)
		.await?;
	if !deleted {
		return Err(PulseError::NotFound("funnel not found".to_string()).into());
	}
	Ok(ok_message("funnel deleted"))
}

/// GET /funnels/{id}/analytics
pub async fn funnel_analytics(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	Query(query): Query<DateRangeQuery>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Analytics)?;
	state
		.limiter
		.check(RouteClass::Analytics, &ctx.key_id.to_string())
		.await?;
	let tenant = ctx.tenant()?;
	let id = parse_funnel_id(&id)?;

	let range = query.parse_or_last_days(30)?;
	let analytics = state
		.engine
		.funnel_analytics(&tenant, id, range, None)
		.await?;
	Ok(ok(analytics))
}
