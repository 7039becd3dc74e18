// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! API key administration. Every route here requires `admin` except
//! `POST /auth/validate`, which any authenticated caller may use.
//!
//! The raw key is returned exactly once, in the creation response.

use axum::{
	extract::{Path, State},
	response::Response,
	Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pulse_core::{ApiKey, Permission, ProjectId, PulseError};
use pulse_server_auth::{generate_raw_key, hash_key};
use pulse_server_db::{ApiKeyStore, ApiKeyUpdate};
use pulse_server_ratelimit::RouteClass;

use crate::api_response::{created, ok, ok_message, ApiError};
use crate::extract::Auth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
	pub name: String,
	pub project_id: Option<String>,
	pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKeyRequest {
	pub name: Option<String>,
	pub permissions: Option<Vec<Permission>>,
	pub is_active: Option<bool>,
}

/// Key record as exposed over the API; never includes the hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
	pub id: Uuid,
	pub name: String,
	pub org_id: String,
	pub project_id: Option<String>,
	pub permissions: Vec<Permission>,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyResponse {
	fn from(key: ApiKey) -> Self {
		Self {
			id: key.id,
			name: key.name,
			org_id: key.org_id.to_string(),
			project_id: key.project_id.map(|p| p.to_string()),
			permissions: key.permissions,
			is_active: key.is_active,
			created_at: key.created_at,
			last_used_at: key.last_used_at,
		}
	}
}

fn parse_key_id(raw: &str) -> Result<Uuid, PulseError> {
	Uuid::parse_str(raw).map_err(|_| PulseError::invalid(format!("invalid key id: {raw}")))
}

/// POST /auth/keys
pub async fn create_key(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Json(body): Json<CreateKeyRequest>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Admin)?;
	state
		.limiter
		.check(RouteClass::Admin, &ctx.key_id.to_string())
		.await?;

	if body.name.is_empty() {
		return Err(PulseError::invalid("name is required").into());
	}
	if body.permissions.is_empty() {
		return Err(PulseError::invalid("at least one permission is required").into());
	}
	let project_id = body.project_id.map(ProjectId::new).transpose()?;

	let raw_key = generate_raw_key();
	let key = state
		.api_keys
		.create_api_key(
			&ctx.org_id,
			project_id.as_ref(),
			&body.name,
			&hash_key(&raw_key),
			&body.permissions,
		)
		.await?;

	tracing::info!(api_key_id = %key.id, org_id = %ctx.org_id, "API key created");
	Ok(created(serde_json::json!({
		"key": raw_key,
		"apiKey": ApiKeyResponse::from(key),
	})))
}

/// GET /auth/keys - keys of the caller's organization.
pub async fn list_keys(
	State(state): State<AppState>,
	Auth(ctx): Auth,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Admin)?;
	state
		.limiter
		.check(RouteClass::Admin, &ctx.key_id.to_string())
		.await?;

	let keys = state.api_keys.list_api_keys_for_org(&ctx.org_id).await?;
	let keys: Vec<ApiKeyResponse> = keys.into_iter().map(ApiKeyResponse::from).collect();
	Ok(ok(keys))
}

/// GET /auth/keys/{id}
pub async fn get_key(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Admin)?;
	state
		.limiter
		.check(RouteClass::Admin, &ctx.key_id.to_string())
		.await?;
	let id = parse_key_id(&id)?;

	let key = fetch_org_key(&state, &ctx, id).await?;
	Ok(ok(ApiKeyResponse::from(key)))
}

/// PUT /auth/keys/{id}
pub async fn update_key(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
	Json(body): Json<UpdateKeyRequest>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Admin)?;
	state
		.limiter
		.check(RouteClass::Admin, &ctx.key_id.to_string())
		.await?;
	let id = parse_key_id(&id)?;

	// Scope check before the write.
	fetch_org_key(&state, &ctx, id).await?;

	if let Some(permissions) = &body.permissions {
		if permissions.is_empty() {
			return Err(PulseError::invalid("permissions must not be empty").into());
		}
	}

	let updated = state
		.api_keys
		.update_api_key(
			id,
			ApiKeyUpdate {
				name: body.name,
				permissions: body.permissions,
				is_active: body.is_active,
			},
		)
		.await?
		.ok_or_else(|| PulseError::NotFound("API key not found".to_string()))?;

	Ok(ok(ApiKeyResponse::from(updated)))
}

/// DELETE /auth/keys/{id}
pub async fn delete_key(
	State(state): State<AppState>,
	Auth(ctx): Auth,
	Path(id): Path<String>,
) -> Result<Response, ApiError> {
	ctx.require_permission(Permission::Admin)?;
	state
		.limiter
		.check(RouteClass::Admin, &ctx.key_id.to_string())
		.await?;
	let id = parse_key_id(&id)?;

	fetch_org_key(&state, &ctx, id).await?;

	let deleted = state.api_keys.delete_api_key(id).await?;
	if !deleted {
		return Err(PulseError::NotFound("API key not found".to_string()).into());
	}
	Ok(ok_message("API key deleted"))
}

/// POST /auth/validate - report the presented key's scope.
pub async fn validate_key(Auth(ctx): Auth) -> Result<Response, ApiError> {
	Ok(ok(serde_json::json!({
		"valid": true,
		"orgId": ctx.org_id.to_string(),
		"projectId": ctx.project_id.as_ref().map(|p| p.to_string()),
		"permissions": ctx.permissions,
	})))
}

/// Fetch a key and verify it belongs to the caller's organization.
/// Cross-org ids read as not found.
async fn fetch_org_key(
	state: &AppState,
	ctx: &pulse_server_auth::AuthContext,
	id: Uuid,
) -> Result<ApiKey, ApiError> {
	let key = state
		.api_keys
		.get_api_key_by_id(id)
		.await?
		.filter(|key| key.org_id == ctx.org_id)
		.ok_or_else(|| PulseError::NotFound("API key not found".to_string()))?;
	Ok(key)
}
