// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Embedded schema migrations, executed at startup.
//!
//! Statements are idempotent (`IF NOT EXISTS`) so reruns on an existing
//! database are harmless.

use sqlx::SqlitePool;

use crate::error::Result;

const SCHEMA: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS events (
		id TEXT PRIMARY KEY,
		org_id TEXT NOT NULL,
		project_id TEXT NOT NULL,
		user_id TEXT NOT NULL,
		event_name TEXT NOT NULL,
		timestamp TEXT NOT NULL,
		properties TEXT NOT NULL,
		session_id TEXT,
		page_url TEXT,
		user_agent TEXT,
		ip_address TEXT,
		fingerprint TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	"CREATE UNIQUE INDEX IF NOT EXISTS idx_events_fingerprint
		ON events(org_id, project_id, fingerprint)",
	"CREATE INDEX IF NOT EXISTS idx_events_tenant_ts
		ON events(org_id, project_id, timestamp)",
	"CREATE INDEX IF NOT EXISTS idx_events_tenant_name_ts
		ON events(org_id, project_id, event_name, timestamp)",
	"CREATE INDEX IF NOT EXISTS idx_events_tenant_user_ts
		ON events(org_id, project_id, user_id, timestamp)",
	"CREATE INDEX IF NOT EXISTS idx_events_tenant_session_ts
		ON events(org_id, project_id, session_id, timestamp)",
	r#"
	CREATE TABLE IF NOT EXISTS funnels (
		id TEXT PRIMARY KEY,
		org_id TEXT NOT NULL,
		project_id TEXT NOT NULL,
		name TEXT NOT NULL,
		steps TEXT NOT NULL,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	"CREATE UNIQUE INDEX IF NOT EXISTS idx_funnels_tenant_name
		ON funnels(org_id, project_id, name)",
	r#"
	CREATE TABLE IF NOT EXISTS api_keys (
		id TEXT PRIMARY KEY,
		name TEXT NOT NULL,
		org_id TEXT NOT NULL,
		project_id TEXT,
		key_hash TEXT NOT NULL UNIQUE,
		permissions TEXT NOT NULL,
		is_active INTEGER NOT NULL DEFAULT 1,
		created_at TEXT NOT NULL,
		last_used_at TEXT
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_api_keys_org ON api_keys(org_id)",
	r#"
	CREATE TABLE IF NOT EXISTS queue_jobs (
		id TEXT PRIMARY KEY,
		topic TEXT NOT NULL,
		payload TEXT NOT NULL,
		status TEXT NOT NULL,
		attempts INTEGER NOT NULL DEFAULT 0,
		max_attempts INTEGER NOT NULL DEFAULT 3,
		run_at TEXT NOT NULL,
		last_error TEXT,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_queue_jobs_topic_status
		ON queue_jobs(topic, status, run_at)",
];

/// Run all schema migrations against the pool.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	for statement in SCHEMA {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!(statements = SCHEMA.len(), "schema migrations applied");
	Ok(())
}
