// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Funnel repository.
//!
//! Funnels are tenant-scoped; `name` is unique per tenant, enforced by
//! the database index and surfaced as `Conflict`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use pulse_core::{Funnel, FunnelStep, OrgId, ProjectId, Tenant};

use crate::error::{DbError, Result};
use crate::event::{fmt_ts, parse_ts};

#[async_trait]
pub trait FunnelStore: Send + Sync {
	async fn create_funnel(&self, tenant: &Tenant, name: &str, steps: Vec<FunnelStep>)
		-> Result<Funnel>;
	async fn get_funnel(&self, tenant: &Tenant, id: Uuid) -> Result<Option<Funnel>>;
	async fn list_funnels(&self, tenant: &Tenant) -> Result<Vec<Funnel>>;
	async fn update_funnel(
		&self,
		tenant: &Tenant,
		id: Uuid,
		name: Option<String>,
		steps: Option<Vec<FunnelStep>>,
	) -> Result<Option<Funnel>>;
	async fn delete_funnel(&self, tenant: &Tenant, id: Uuid) -> Result<bool>;
}

#[derive(Clone)]
pub struct FunnelRepository {
	pool: SqlitePool,
}

impl FunnelRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

fn parse_funnel_row(row: &SqliteRow) -> Result<Funnel> {
	let id_str: String = row.get("id");
	let org_id_str: String = row.get("org_id");
	let project_id_str: String = row.get("project_id");
	let steps_json: String = row.get("steps");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	let id = Uuid::parse_str(&id_str)
		.map_err(|e| DbError::Internal(format!("Invalid funnel id UUID: {e}")))?;
	let org_id = OrgId::new(org_id_str)
		.map_err(|e| DbError::Internal(format!("Invalid org_id: {e}")))?;
	let project_id = ProjectId::new(project_id_str)
		.map_err(|e| DbError::Internal(format!("Invalid project_id: {e}")))?;
	let steps: Vec<FunnelStep> = serde_json::from_str(&steps_json)?;

	Ok(Funnel {
		id,
		org_id,
		project_id,
		name: row.get("name"),
		steps,
		created_at: parse_ts(&created_at_str, "created_at")?,
		updated_at: parse_ts(&updated_at_str, "updated_at")?,
	})
}

#[async_trait]
impl FunnelStore for FunnelRepository {
	#[tracing::instrument(skip(self, steps), fields(tenant = %tenant, name))]
	async fn create_funnel(
		&self,
		tenant: &Tenant,
		name: &str,
		steps: Vec<FunnelStep>,
	) -> Result<Funnel> {
		let id = Uuid::new_v4();
		let now = Utc::now();
		let steps_json = serde_json::to_string(&steps)?;

		let result = sqlx::query(
			r#"
			INSERT INTO funnels (id, org_id, project_id, name, steps, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(id.to_string())
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.bind(name)
		.bind(&steps_json)
		.bind(fmt_ts(&now))
		.bind(fmt_ts(&now))
		.execute(&self.pool)
		.await;

		if let Err(e) = result {
			let err = DbError::from(e);
			if err.is_unique_violation() {
				return Err(DbError::Conflict(format!(
					"funnel name already exists: {name}"
				)));
			}
			return Err(err);
		}

		tracing::debug!(funnel_id = %id, "funnel created");
		Ok(Funnel {
			id,
			org_id: tenant.org_id.clone(),
			project_id: tenant.project_id.clone(),
			name: name.to_string(),
			steps,
			created_at: now,
			updated_at: now,
		})
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant, funnel_id = %id))]
	async fn get_funnel(&self, tenant: &Tenant, id: Uuid) -> Result<Option<Funnel>> {
		let row = sqlx::query(
			"SELECT * FROM funnels WHERE id = ? AND org_id = ? AND project_id = ?",
		)
		.bind(id.to_string())
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(parse_funnel_row(&row)?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant))]
	async fn list_funnels(&self, tenant: &Tenant) -> Result<Vec<Funnel>> {
		let rows = sqlx::query(
			"SELECT * FROM funnels WHERE org_id = ? AND project_id = ?
			 ORDER BY created_at DESC",
		)
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		let mut funnels = Vec::with_capacity(rows.len());
		for row in &rows {
			funnels.push(parse_funnel_row(row)?);
		}
		Ok(funnels)
	}

	#[tracing::instrument(skip(self, name, steps), fields(tenant = %tenant, funnel_id = %id))]
	async fn update_funnel(
		&self,
		tenant: &Tenant,
		id: Uuid,
		name: Option<String>,
		steps: Option<Vec<FunnelStep>>,
	) -> Result<Option<Funnel>> {
		let Some(existing) = self.get_funnel(tenant, id).await? else {
			return Ok(None);
		};

		let name = name.unwrap_or(existing.name);
		let steps = steps.unwrap_or(existing.steps);
		let steps_json = serde_json::to_string(&steps)?;
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			UPDATE funnels
			SET name = ?, steps = ?, updated_at = ?
			WHERE id = ? AND org_id = ? AND project_id = ?
			"#,
		)
		.bind(&name)
		.bind(&steps_json)
		.bind(fmt_ts(&now))
		.bind(id.to_string())
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.execute(&self.pool)
		.await;

		if let Err(e) = result {
			let err = DbError::from(e);
			if err.is_unique_violation() {
				return Err(DbError::Conflict(format!(
					"funnel name already exists: {name}"
				)));
			}
			return Err(err);
		}

		Ok(Some(Funnel {
			id,
			org_id: tenant.org_id.clone(),
			project_id: tenant.project_id.clone(),
			name,
			steps,
			created_at: existing.created_at,
			updated_at: now,
		}))
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant, funnel_id = %id))]
	async fn delete_funnel(&self, tenant: &Tenant, id: Uuid) -> Result<bool> {
		let result = sqlx::query(
			"DELETE FROM funnels WHERE id = ? AND org_id = ? AND project_id = ?",
		)
		.bind(id.to_string())
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.execute(&self.pool)
		.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(funnel_id = %id, "funnel deleted");
		}
		Ok(deleted)
	}
}
