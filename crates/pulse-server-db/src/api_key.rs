// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! API key repository for database operations.
//!
//! Keys are organization-scoped and used for programmatic access. Rows
//! store only the SHA-256 hash of the raw key; lookup during
//! authentication is by hash.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use pulse_core::{ApiKey, OrgId, Permission, ProjectId};

use crate::error::{DbError, Result};
use crate::event::{fmt_ts, parse_ts};

/// Mutable fields for [`ApiKeyStore::update_api_key`]. `None` leaves the
/// field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyUpdate {
	pub name: Option<String>,
	pub permissions: Option<Vec<Permission>>,
	pub is_active: Option<bool>,
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
	async fn create_api_key(
		&self,
		org_id: &OrgId,
		project_id: Option<&ProjectId>,
		name: &str,
		key_hash: &str,
		permissions: &[Permission],
	) -> Result<ApiKey>;
	async fn get_api_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>>;
	async fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;
	async fn list_api_keys_for_org(&self, org_id: &OrgId) -> Result<Vec<ApiKey>>;
	async fn update_api_key(&self, id: Uuid, update: ApiKeyUpdate) -> Result<Option<ApiKey>>;
	async fn delete_api_key(&self, id: Uuid) -> Result<bool>;
	async fn update_last_used(&self, id: Uuid) -> Result<()>;
}

/// Repository for API key database operations.
///
/// All raw keys are stored as hashes, never in plaintext.
#[derive(Clone)]
pub struct ApiKeyRepository {
	pool: SqlitePool,
}

impl ApiKeyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

fn parse_api_key_row(row: &SqliteRow) -> Result<ApiKey> {
	let id_str: String = row.get("id");
	let org_id_str: String = row.get("org_id");
	let project_id_str: Option<String> = row.get("project_id");
	let permissions_json: String = row.get("permissions");
	let created_at_str: String = row.get("created_at");
	let last_used_at_str: Option<String> = row.get("last_used_at");

	let id = Uuid::parse_str(&id_str)
		.map_err(|e| DbError::Internal(format!("Invalid api_key id UUID: {e}")))?;
	let org_id = OrgId::new(org_id_str)
		.map_err(|e| DbError::Internal(format!("Invalid org_id: {e}")))?;
	let project_id = project_id_str
		.map(|s| ProjectId::new(s).map_err(|e| DbError::Internal(format!("Invalid project_id: {e}"))))
		.transpose()?;
	let permissions: Vec<Permission> = serde_json::from_str(&permissions_json)?;
	let last_used_at = last_used_at_str
		.map(|s| parse_ts(&s, "last_used_at"))
		.transpose()?;

	Ok(ApiKey {
		id,
		name: row.get("name"),
		org_id,
		project_id,
		key_hash: row.get("key_hash"),
		permissions,
		is_active: row.get("is_active"),
		created_at: parse_ts(&created_at_str, "created_at")?,
		last_used_at,
	})
}

#[async_trait]
impl ApiKeyStore for ApiKeyRepository {
	#[tracing::instrument(skip(self, key_hash, permissions), fields(org_id = %org_id, name))]
	async fn create_api_key(
		&self,
		org_id: &OrgId,
		project_id: Option<&ProjectId>,
		name: &str,
		key_hash: &str,
		permissions: &[Permission],
	) -> Result<ApiKey> {
		let id = Uuid::new_v4();
		let now = Utc::now();
		let permissions_json = serde_json::to_string(permissions)?;

		let result = sqlx::query(
			r#"
			INSERT INTO api_keys (
				id, name, org_id, project_id, key_hash, permissions, is_active, created_at
			) VALUES (?, ?, ?, ?, ?, ?, 1, ?)
			"#,
		)
		.bind(id.to_string())
		.bind(name)
		.bind(org_id.to_string())
		.bind(project_id.map(|p| p.to_string()))
		.bind(key_hash)
		.bind(&permissions_json)
		.bind(fmt_ts(&now))
		.execute(&self.pool)
		.await;

		if let Err(e) = result {
			let err = DbError::from(e);
			if err.is_unique_violation() {
				return Err(DbError::Conflict("API key collision".to_string()));
			}
			return Err(err);
		}

		tracing::debug!(api_key_id = %id, org_id = %org_id, "API key created");
		Ok(ApiKey {
			id,
			name: name.to_string(),
			org_id: org_id.clone(),
			project_id: project_id.cloned(),
			key_hash: key_hash.to_string(),
			permissions: permissions.to_vec(),
			is_active: true,
			created_at: now,
			last_used_at: None,
		})
	}

	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	async fn get_api_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>> {
		let row = sqlx::query("SELECT * FROM api_keys WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		match row {
			Some(row) => Ok(Some(parse_api_key_row(&row)?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self, key_hash))]
	async fn get_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
		let row = sqlx::query("SELECT * FROM api_keys WHERE key_hash = ?")
			.bind(key_hash)
			.fetch_optional(&self.pool)
			.await?;

		match row {
			Some(row) => {
				let key = parse_api_key_row(&row)?;
				tracing::debug!(api_key_id = %key.id, org_id = %key.org_id, "API key found by hash");
				Ok(Some(key))
			}
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	async fn list_api_keys_for_org(&self, org_id: &OrgId) -> Result<Vec<ApiKey>> {
		let rows = sqlx::query(
			"SELECT * FROM api_keys WHERE org_id = ? ORDER BY created_at DESC",
		)
		.bind(org_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		let mut keys = Vec::with_capacity(rows.len());
		for row in &rows {
			keys.push(parse_api_key_row(row)?);
		}
		Ok(keys)
	}

	#[tracing::instrument(skip(self, update), fields(api_key_id = %id))]
	async fn update_api_key(&self, id: Uuid, update: ApiKeyUpdate) -> Result<Option<ApiKey>> {
		let Some(existing) = self.get_api_key_by_id(id).await? else {
			return Ok(None);
		};

		let name = update.name.unwrap_or(existing.name);
		let permissions = update.permissions.unwrap_or(existing.permissions);
		let is_active = update.is_active.unwrap_or(existing.is_active);
		let permissions_json = serde_json::to_string(&permissions)?;

		sqlx::query(
			"UPDATE api_keys SET name = ?, permissions = ?, is_active = ? WHERE id = ?",
		)
		.bind(&name)
		.bind(&permissions_json)
		.bind(is_active)
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		tracing::debug!(api_key_id = %id, "API key updated");
		Ok(Some(ApiKey {
			name,
			permissions,
			is_active,
			..existing
		}))
	}

	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	async fn delete_api_key(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(api_key_id = %id, "API key deleted");
		}
		Ok(deleted)
	}

	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	async fn update_last_used(&self, id: Uuid) -> Result<()> {
		let now = Utc::now();
		sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
			.bind(fmt_ts(&now))
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}
