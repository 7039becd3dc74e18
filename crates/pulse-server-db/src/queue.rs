// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Durable queue job rows.
//!
//! Jobs survive process restarts; workers claim the oldest runnable job
//! atomically via `UPDATE ... RETURNING`. Retention is bounded: only the
//! most recent completed/failed rows are kept.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::event::{fmt_ts, parse_ts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueJobStatus {
	Queued,
	Running,
	Completed,
	Failed,
}

impl QueueJobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			QueueJobStatus::Queued => "queued",
			QueueJobStatus::Running => "running",
			QueueJobStatus::Completed => "completed",
			QueueJobStatus::Failed => "failed",
		}
	}
}

impl std::str::FromStr for QueueJobStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"queued" => Ok(QueueJobStatus::Queued),
			"running" => Ok(QueueJobStatus::Running),
			"completed" => Ok(QueueJobStatus::Completed),
			"failed" => Ok(QueueJobStatus::Failed),
			_ => Err(format!("unknown queue job status: {s}")),
		}
	}
}

#[derive(Debug, Clone)]
pub struct QueueJob {
	pub id: Uuid,
	pub topic: String,
	pub payload: serde_json::Value,
	pub status: QueueJobStatus,
	pub attempts: u32,
	pub max_attempts: u32,
	pub run_at: DateTime<Utc>,
	pub last_error: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Terminal-state counts for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
	pub queued: i64,
	pub running: i64,
	pub completed: i64,
	pub failed: i64,
}

#[derive(Clone)]
pub struct QueueRepository {
	pool: SqlitePool,
}

fn parse_job_row(row: &SqliteRow) -> Result<QueueJob> {
	let id_str: String = row.get("id");
	let payload_json: String = row.get("payload");
	let status_str: String = row.get("status");
	let attempts: i64 = row.get("attempts");
	let max_attempts: i64 = row.get("max_attempts");
	let run_at_str: String = row.get("run_at");
	let created_at_str: String = row.get("created_at");
	let updated_at_str: String = row.get("updated_at");

	let id = Uuid::parse_str(&id_str)
		.map_err(|e| DbError::Internal(format!("Invalid job id UUID: {e}")))?;
	let status = status_str
		.parse::<QueueJobStatus>()
		.map_err(DbError::Internal)?;

	Ok(QueueJob {
		id,
		topic: row.get("topic"),
		payload: serde_json::from_str(&payload_json)?,
		status,
		attempts: attempts as u32,
		max_attempts: max_attempts as u32,
		run_at: parse_ts(&run_at_str, "run_at")?,
		last_error: row.get("last_error"),
		created_at: parse_ts(&created_at_str, "created_at")?,
		updated_at: parse_ts(&updated_at_str, "updated_at")?,
	})
}

impl QueueRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Persist a new job in `queued` state, runnable immediately.
	#[tracing::instrument(skip(self, payload), fields(topic))]
	pub async fn enqueue(
		&self,
		topic: &str,
		payload: serde_json::Value,
		max_attempts: u32,
	) -> Result<QueueJob> {
		let id = Uuid::new_v4();
		let now = Utc::now();

		sqlx::query(
			r#"
			INSERT INTO queue_jobs (
				id, topic, payload, status, attempts, max_attempts,
				run_at, created_at, updated_at
			) VALUES (?, ?, ?, 'queued', 0, ?, ?, ?, ?)
			"#,
		)
		.bind(id.to_string())
		.bind(topic)
		.bind(payload.to_string())
		.bind(max_attempts as i64)
		.bind(fmt_ts(&now))
		.bind(fmt_ts(&now))
		.bind(fmt_ts(&now))
		.execute(&self.pool)
		.await?;

		tracing::debug!(job_id = %id, topic, "job enqueued");
		Ok(QueueJob {
			id,
			topic: topic.to_string(),
			payload,
			status: QueueJobStatus::Queued,
			attempts: 0,
			max_attempts,
			run_at: now,
			last_error: None,
			created_at: now,
			updated_at: now,
		})
	}

	/// Atomically claim the oldest runnable job for `topic`, bumping its
	/// attempt counter. Returns `None` when nothing is runnable.
	#[tracing::instrument(skip(self), fields(topic))]
	pub async fn claim_next(&self, topic: &str) -> Result<Option<QueueJob>> {
		let now = Utc::now();

		let row = sqlx::query(
			r#"
			UPDATE queue_jobs
			SET status = 'running', attempts = attempts + 1, updated_at = ?
			WHERE id = (
				SELECT id FROM queue_jobs
				WHERE topic = ? AND status = 'queued' AND run_at <= ?
				ORDER BY created_at ASC
				LIMIT 1
			)
			RETURNING *
			"#,
		)
		.bind(fmt_ts(&now))
		.bind(topic)
		.bind(fmt_ts(&now))
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(parse_job_row(&row)?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self), fields(job_id = %id))]
	pub async fn complete(&self, id: Uuid) -> Result<()> {
		let now = Utc::now();
		sqlx::query(
			"UPDATE queue_jobs SET status = 'completed', updated_at = ? WHERE id = ?",
		)
		.bind(fmt_ts(&now))
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Record a failed attempt. With `retry_at` the job goes back to
	/// `queued` for that instant; without, it is terminally `failed`.
	#[tracing::instrument(skip(self, error), fields(job_id = %id))]
	pub async fn fail(
		&self,
		id: Uuid,
		error: &str,
		retry_at: Option<DateTime<Utc>>,
	) -> Result<()> {
		let now = Utc::now();
		match retry_at {
			Some(retry_at) => {
				sqlx::query(
					r#"
					UPDATE queue_jobs
					SET status = 'queued', run_at = ?, last_error = ?, updated_at = ?
					WHERE id = ?
					"#,
				)
				.bind(fmt_ts(&retry_at))
				.bind(error)
				.bind(fmt_ts(&now))
				.bind(id.to_string())
				.execute(&self.pool)
				.await?;
			}
			None => {
				sqlx::query(
					r#"
					UPDATE queue_jobs
					SET status = 'failed', last_error = ?, updated_at = ?
					WHERE id = ?
					"#,
				)
				.bind(error)
				.bind(fmt_ts(&now))
				.bind(id.to_string())
				.execute(&self.pool)
				.await?;
				tracing::warn!(job_id = %id, error, "job failed terminally");
			}
		}
		Ok(())
	}

	/// Requeue jobs left in `running` by a previous process instance.
	#[tracing::instrument(skip(self))]
	pub async fn requeue_stale_running(&self) -> Result<u64> {
		let now = Utc::now();
		let result = sqlx::query(
			"UPDATE queue_jobs SET status = 'queued', run_at = ?, updated_at = ?
			 WHERE status = 'running'",
		)
		.bind(fmt_ts(&now))
		.bind(fmt_ts(&now))
		.execute(&self.pool)
		.await?;

		let requeued = result.rows_affected();
		if requeued > 0 {
			tracing::info!(requeued, "stale running jobs requeued");
		}
		Ok(requeued)
	}

	/// Delete terminal rows beyond the retention bounds, keeping the most
	/// recently updated.
	#[tracing::instrument(skip(self))]
	pub async fn prune(&self, keep_completed: i64, keep_failed: i64) -> Result<u64> {
		let mut pruned = 0;
		for (status, keep) in [("completed", keep_completed), ("failed", keep_failed)] {
			let result = sqlx::query(
				r#"
				DELETE FROM queue_jobs
				WHERE status = ?1 AND id NOT IN (
					SELECT id FROM queue_jobs
					WHERE status = ?1
					ORDER BY updated_at DESC
					LIMIT ?2
				)
				"#,
			)
			.bind(status)
			.bind(keep)
			.execute(&self.pool)
			.await?;
			pruned += result.rows_affected();
		}

		if pruned > 0 {
			tracing::debug!(pruned, "terminal queue jobs pruned");
		}
		Ok(pruned)
	}

	#[tracing::instrument(skip(self))]
	pub async fn counts(&self) -> Result<QueueCounts> {
		let rows = sqlx::query(
			"SELECT status, COUNT(*) AS count FROM queue_jobs GROUP BY status",
		)
		.fetch_all(&self.pool)
		.await?;

		let mut counts = QueueCounts::default();
		for row in &rows {
			let status: String = row.get("status");
			let count: i64 = row.get("count");
			match status.as_str() {
				"queued" => counts.queued = count,
				"running" => counts.running = count,
				"completed" => counts.completed = count,
				"failed" => counts.failed = count,
				_ => {}
			}
		}
		Ok(counts)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::test_pool;
	use serde_json::json;

	async fn repo() -> QueueRepository {
		QueueRepository::new(test_pool().await)
	}

	#[tokio::test]
	async fn enqueue_claim_complete_lifecycle() {
		let repo = repo().await;

		let job = repo
			.enqueue("events.persist", json!({"batch": [1, 2, 3]}), 3)
			.await
			.unwrap();
		assert_eq!(job.status, QueueJobStatus::Queued);
		assert_eq!(job.attempts, 0);

		let claimed = repo.claim_next("events.persist").await.unwrap().unwrap();
		assert_eq!(claimed.id, job.id);
		assert_eq!(claimed.status, QueueJobStatus::Running);
		assert_eq!(claimed.attempts, 1);
		assert_eq!(claimed.payload, json!({"batch": [1, 2, 3]}));

		// Nothing else runnable while the only job is running.
		assert!(repo.claim_next("events.persist").await.unwrap().is_none());

		repo.complete(claimed.id).await.unwrap();
		let counts = repo.counts().await.unwrap();
		assert_eq!(counts.completed, 1);
		assert_eq!(counts.queued, 0);
	}

	#[tokio::test]
	async fn claim_is_topic_scoped_and_fifo() {
		let repo = repo().await;

		let first = repo.enqueue("a", json!(1), 3).await.unwrap();
		repo.enqueue("a", json!(2), 3).await.unwrap();
		repo.enqueue("b", json!(3), 3).await.unwrap();

		let claimed = repo.claim_next("a").await.unwrap().unwrap();
		assert_eq!(claimed.id, first.id);
	}

	#[tokio::test]
	async fn fail_with_retry_requeues_for_later() {
		let repo = repo().await;

		let job = repo.enqueue("t", json!({}), 3).await.unwrap();
		let claimed = repo.claim_next("t").await.unwrap().unwrap();

		let retry_at = Utc::now() + chrono::Duration::hours(1);
		repo.fail(claimed.id, "boom", Some(retry_at)).await.unwrap();

		// Not runnable yet: run_at is in the future.
		assert!(repo.claim_next("t").await.unwrap().is_none());
		let counts = repo.counts().await.unwrap();
		assert_eq!(counts.queued, 1);

		repo.fail(job.id, "boom again", None).await.unwrap();
		let counts = repo.counts().await.unwrap();
		assert_eq!(counts.failed, 1);
	}

	#[tokio::test]
	async fn requeue_stale_running() {
		let repo = repo().await;

		repo.enqueue("t", json!({}), 3).await.unwrap();
		repo.claim_next("t").await.unwrap().unwrap();

		let requeued = repo.requeue_stale_running().await.unwrap();
		assert_eq!(requeued, 1);
		assert!(repo.claim_next("t").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn prune_keeps_most_recent_terminal_rows() {
		let repo = repo().await;

		for i in 0..5 {
			let job = repo.enqueue("t", json!(i), 3).await.unwrap();
			let claimed = repo.claim_next("t").await.unwrap().unwrap();
			assert_eq!(claimed.id, job.id);
			repo.complete(claimed.id).await.unwrap();
		}

		let pruned = repo.prune(2, 50).await.unwrap();
		assert_eq!(pruned, 3);
		let counts = repo.counts().await.unwrap();
		assert_eq!(counts.completed, 2);
	}
}
