// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Event store: tenant-partitioned append log with aggregation primitives.
//!
//! Bulk inserts continue past per-row failures; a unique index on
//! `(org_id, project_id, fingerprint)` backstops the cache-based
//! deduplication, so a dedup cache outage can never produce duplicate
//! rows. All scans and aggregates are scoped by the tenant pair.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use pulse_core::{Event, OrgId, ProjectId, Tenant};

use crate::error::{DbError, Result};

/// Inclusive time range filter.
#[derive(Debug, Clone, Copy)]
pub struct TimeRange {
	pub start: DateTime<Utc>,
	pub end: DateTime<Utc>,
}

/// Metric bucketing interval, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
	Hourly,
	Daily,
	Weekly,
	Monthly,
}

impl Interval {
	pub fn as_str(&self) -> &'static str {
		match self {
			Interval::Hourly => "hourly",
			Interval::Daily => "daily",
			Interval::Weekly => "weekly",
			Interval::Monthly => "monthly",
		}
	}

	/// SQL expression producing the bucket start instant for a row.
	/// Weekly buckets start on the ISO Monday.
	fn bucket_expr(&self) -> &'static str {
		match self {
			Interval::Hourly => "strftime('%Y-%m-%dT%H:00:00.000Z', timestamp)",
			Interval::Daily => "strftime('%Y-%m-%dT00:00:00.000Z', timestamp)",
			Interval::Weekly => {
				"strftime('%Y-%m-%dT00:00:00.000Z', date(timestamp, 'weekday 0', '-6 days'))"
			}
			Interval::Monthly => "strftime('%Y-%m-01T00:00:00.000Z', timestamp)",
		}
	}
}

impl std::str::FromStr for Interval {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"hourly" => Ok(Interval::Hourly),
			"daily" => Ok(Interval::Daily),
			"weekly" => Ok(Interval::Weekly),
			"monthly" => Ok(Interval::Monthly),
			_ => Err(format!("unknown interval: {s}")),
		}
	}
}

/// Predicates for [`EventStore::scan`] and [`EventStore::count`].
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
	pub user_id: Option<String>,
	pub event_name: Option<String>,
	pub session_id: Option<String>,
	pub range: Option<TimeRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
	Ascending,
	Descending,
}

/// Outcome of a bulk insert. Per-row failures never abort the batch.
#[derive(Debug, Default)]
pub struct InsertOutcome {
	pub persisted: Vec<Event>,
	/// Rows rejected by the fingerprint unique index.
	pub duplicates: usize,
	/// Other per-row failures, as `(event_id, reason)`.
	pub failures: Vec<(Uuid, String)>,
}

/// One time bucket of a metric series.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRow {
	pub bucket_start: DateTime<Utc>,
	pub count: u64,
	pub unique_users: u64,
}

/// A single event occurrence projected for engine-side evaluation.
#[derive(Debug, Clone)]
pub struct Occurrence {
	pub user_id: String,
	pub timestamp: DateTime<Utc>,
	pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Per-event-name rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct EventNameSummary {
	pub event_name: String,
	pub count: u64,
	pub unique_users: u64,
}

/// Storage contract for persisted events.
#[async_trait]
pub trait EventStore: Send + Sync {
	/// Bulk insert; returns the persisted subset, the duplicate count,
	/// and per-row failures.
	async fn insert_many(&self, events: Vec<Event>) -> Result<InsertOutcome>;

	/// Events matching `filter`, in the requested timestamp order.
	async fn scan(
		&self,
		tenant: &Tenant,
		filter: &ScanFilter,
		order: ScanOrder,
		limit: i64,
		offset: i64,
	) -> Result<Vec<Event>>;

	/// Number of events matching `filter`.
	async fn count(&self, tenant: &Tenant, filter: &ScanFilter) -> Result<i64>;

	/// Time-bucketed `(count, unique_users)` series for one event name,
	/// sorted ascending by bucket start.
	async fn bucket_counts(
		&self,
		tenant: &Tenant,
		event_name: &str,
		interval: Interval,
		range: TimeRange,
	) -> Result<Vec<BucketRow>>;

	/// Distinct users with events matching the predicate.
	async fn count_distinct_users(
		&self,
		tenant: &Tenant,
		event_name: Option<&str>,
		range: TimeRange,
	) -> Result<i64>;

	/// Every occurrence of `event_name` in range with its properties,
	/// ordered by `(user_id, timestamp)`.
	async fn occurrences(
		&self,
		tenant: &Tenant,
		event_name: &str,
		range: TimeRange,
	) -> Result<Vec<Occurrence>>;

	/// Per-user first occurrence instant of `event_name` in range.
	async fn first_occurrences(
		&self,
		tenant: &Tenant,
		event_name: &str,
		range: TimeRange,
	) -> Result<Vec<(String, DateTime<Utc>)>>;

	/// Distinct user ids with any event in range.
	async fn active_users(&self, tenant: &Tenant, range: TimeRange) -> Result<Vec<String>>;

	/// Per-event-name `(count, unique_users)`, descending by count.
	async fn event_name_summaries(
		&self,
		tenant: &Tenant,
		range: TimeRange,
	) -> Result<Vec<EventNameSummary>>;

	/// Distinct event names for the tenant, ascending.
	async fn distinct_event_names(&self, tenant: &Tenant) -> Result<Vec<String>>;
}

/// SQLite-backed event store.
#[derive(Clone)]
pub struct EventRepository {
	pool: SqlitePool,
}

impl EventRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(raw: &str, column: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

fn parse_event_row(row: &SqliteRow) -> Result<Event> {
	let id_str: String = row.get("id");
	let org_id_str: String = row.get("org_id");
	let project_id_str: String = row.get("project_id");
	let timestamp_str: String = row.get("timestamp");
	let properties_json: String = row.get("properties");
	let created_at_str: String = row.get("created_at");

	let id = Uuid::parse_str(&id_str)
		.map_err(|e| DbError::Internal(format!("Invalid event id UUID: {e}")))?;
	let org_id = OrgId::new(org_id_str)
		.map_err(|e| DbError::Internal(format!("Invalid org_id: {e}")))?;
	let project_id = ProjectId::new(project_id_str)
		.map_err(|e| DbError::Internal(format!("Invalid project_id: {e}")))?;
	let properties: serde_json::Map<String, serde_json::Value> =
		serde_json::from_str(&properties_json)?;

	Ok(Event {
		id,
		org_id,
		project_id,
		user_id: row.get("user_id"),
		event_name: row.get("event_name"),
		timestamp: parse_ts(&timestamp_str, "timestamp")?,
		properties,
		session_id: row.get("session_id"),
		page_url: row.get("page_url"),
		user_agent: row.get("user_agent"),
		ip_address: row.get("ip_address"),
		created_at: parse_ts(&created_at_str, "created_at")?,
	})
}

/// Append `WHERE` fragments and bind values for a scan filter. The
/// tenant predicate always comes first.
struct ScanQuery {
	sql: String,
	binds: Vec<String>,
}

fn scan_query(select: &str, tenant: &Tenant, filter: &ScanFilter) -> ScanQuery {
	let mut sql = format!("{select} WHERE org_id = ? AND project_id = ?");
	let mut binds = vec![tenant.org_id.to_string(), tenant.project_id.to_string()];

	if let Some(user_id) = &filter.user_id {
		sql.push_str(" AND user_id = ?");
		binds.push(user_id.clone());
	}
	if let Some(event_name) = &filter.event_name {
		sql.push_str(" AND event_name = ?");
		binds.push(event_name.clone());
	}
	if let Some(session_id) = &filter.session_id {
		sql.push_str(" AND session_id = ?");
		binds.push(session_id.clone());
	}
	if let Some(range) = &filter.range {
		sql.push_str(" AND timestamp >= ? AND timestamp <= ?");
		binds.push(fmt_ts(&range.start));
		binds.push(fmt_ts(&range.end));
	}

	ScanQuery { sql, binds }
}

#[async_trait]
impl EventStore for EventRepository {
	#[tracing::instrument(skip(self, events), fields(count = events.len()))]
	async fn insert_many(&self, events: Vec<Event>) -> Result<InsertOutcome> {
		let mut outcome = InsertOutcome::default();

		for event in events {
			let result = sqlx::query(
				r#"
				INSERT INTO events (
					id, org_id, project_id, user_id, event_name, timestamp,
					properties, session_id, page_url, user_agent, ip_address,
					fingerprint, created_at
				) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
				"#,
			)
			.bind(event.id.to_string())
			.bind(event.org_id.to_string())
			.bind(event.project_id.to_string())
			.bind(&event.user_id)
			.bind(&event.event_name)
			.bind(fmt_ts(&event.timestamp))
			.bind(serde_json::Value::Object(event.properties.clone()).to_string())
			.bind(&event.session_id)
			.bind(&event.page_url)
			.bind(&event.user_agent)
			.bind(&event.ip_address)
			.bind(event.fingerprint().to_string())
			.bind(fmt_ts(&event.created_at))
			.execute(&self.pool)
			.await;

			match result {
				Ok(_) => outcome.persisted.push(event),
				Err(e) => {
					let err = DbError::from(e);
					if err.is_unique_violation() {
						outcome.duplicates += 1;
						tracing::debug!(event_id = %event.id, "duplicate event skipped by store");
					} else {
						tracing::warn!(event_id = %event.id, error = %err, "event insert failed");
						outcome.failures.push((event.id, err.to_string()));
					}
				}
			}
		}

		tracing::debug!(
			persisted = outcome.persisted.len(),
			duplicates = outcome.duplicates,
			failures = outcome.failures.len(),
			"bulk insert finished"
		);
		Ok(outcome)
	}

	#[tracing::instrument(skip(self, filter), fields(tenant = %tenant))]
	async fn scan(
		&self,
		tenant: &Tenant,
		filter: &ScanFilter,
		order: ScanOrder,
		limit: i64,
		offset: i64,
	) -> Result<Vec<Event>> {
		let ScanQuery { mut sql, binds } = scan_query("SELECT * FROM events", tenant, filter);
		sql.push_str(match order {
			ScanOrder::Ascending => " ORDER BY timestamp ASC",
			ScanOrder::Descending => " ORDER BY timestamp DESC",
		});
		sql.push_str(" LIMIT ? OFFSET ?");

		let mut query = sqlx::query(&sql);
		for bind in &binds {
			query = query.bind(bind);
		}
		let rows = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

		let mut events = Vec::with_capacity(rows.len());
		for row in &rows {
			events.push(parse_event_row(row)?);
		}
		Ok(events)
	}

	#[tracing::instrument(skip(self, filter), fields(tenant = %tenant))]
	async fn count(&self, tenant: &Tenant, filter: &ScanFilter) -> Result<i64> {
		let ScanQuery { sql, binds } =
			scan_query("SELECT COUNT(*) AS count FROM events", tenant, filter);

		let mut query = sqlx::query(&sql);
		for bind in &binds {
			query = query.bind(bind);
		}
		let row = query.fetch_one(&self.pool).await?;
		Ok(row.get("count"))
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant, event_name, interval = interval.as_str()))]
	async fn bucket_counts(
		&self,
		tenant: &Tenant,
		event_name: &str,
		interval: Interval,
		range: TimeRange,
	) -> Result<Vec<BucketRow>> {
		let sql = format!(
			r#"
			SELECT {bucket} AS bucket_start,
			       COUNT(*) AS count,
			       COUNT(DISTINCT user_id) AS unique_users
			FROM events
			WHERE org_id = ? AND project_id = ? AND event_name = ?
			  AND timestamp >= ? AND timestamp <= ?
			GROUP BY bucket_start
			ORDER BY bucket_start ASC
			"#,
			bucket = interval.bucket_expr()
		);

		let rows = sqlx::query(&sql)
			.bind(tenant.org_id.to_string())
			.bind(tenant.project_id.to_string())
			.bind(event_name)
			.bind(fmt_ts(&range.start))
			.bind(fmt_ts(&range.end))
			.fetch_all(&self.pool)
			.await?;

		let mut buckets = Vec::with_capacity(rows.len());
		for row in &rows {
			let bucket_str: String = row.get("bucket_start");
			let count: i64 = row.get("count");
			let unique_users: i64 = row.get("unique_users");
			buckets.push(BucketRow {
				bucket_start: parse_ts(&bucket_str, "bucket_start")?,
				count: count as u64,
				unique_users: unique_users as u64,
			});
		}
		Ok(buckets)
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant))]
	async fn count_distinct_users(
		&self,
		tenant: &Tenant,
		event_name: Option<&str>,
		range: TimeRange,
	) -> Result<i64> {
		let filter = ScanFilter {
			event_name: event_name.map(String::from),
			range: Some(range),
			..Default::default()
		};
		let ScanQuery { sql, binds } = scan_query(
			"SELECT COUNT(DISTINCT user_id) AS count FROM events",
			tenant,
			&filter,
		);

		let mut query = sqlx::query(&sql);
		for bind in &binds {
			query = query.bind(bind);
		}
		let row = query.fetch_one(&self.pool).await?;
		Ok(row.get("count"))
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant, event_name))]
	async fn occurrences(
		&self,
		tenant: &Tenant,
		event_name: &str,
		range: TimeRange,
	) -> Result<Vec<Occurrence>> {
		let rows = sqlx::query(
			r#"
			SELECT user_id, timestamp, properties
			FROM events
			WHERE org_id = ? AND project_id = ? AND event_name = ?
			  AND timestamp >= ? AND timestamp <= ?
			ORDER BY user_id ASC, timestamp ASC
			"#,
		)
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.bind(event_name)
		.bind(fmt_ts(&range.start))
		.bind(fmt_ts(&range.end))
		.fetch_all(&self.pool)
		.await?;

		let mut occurrences = Vec::with_capacity(rows.len());
		for row in &rows {
			let timestamp_str: String = row.get("timestamp");
			let properties_json: String = row.get("properties");
			occurrences.push(Occurrence {
				user_id: row.get("user_id"),
				timestamp: parse_ts(&timestamp_str, "timestamp")?,
				properties: serde_json::from_str(&properties_json)?,
			});
		}
		Ok(occurrences)
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant, event_name))]
	async fn first_occurrences(
		&self,
		tenant: &Tenant,
		event_name: &str,
		range: TimeRange,
	) -> Result<Vec<(String, DateTime<Utc>)>> {
		let rows = sqlx::query(
			r#"
			SELECT user_id, MIN(timestamp) AS first_ts
			FROM events
			WHERE org_id = ? AND project_id = ? AND event_name = ?
			  AND timestamp >= ? AND timestamp <= ?
			GROUP BY user_id
			"#,
		)
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.bind(event_name)
		.bind(fmt_ts(&range.start))
		.bind(fmt_ts(&range.end))
		.fetch_all(&self.pool)
		.await?;

		let mut firsts = Vec::with_capacity(rows.len());
		for row in &rows {
			let user_id: String = row.get("user_id");
			let first_ts: String = row.get("first_ts");
			firsts.push((user_id, parse_ts(&first_ts, "first_ts")?));
		}
		Ok(firsts)
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant))]
	async fn active_users(&self, tenant: &Tenant, range: TimeRange) -> Result<Vec<String>> {
		let rows = sqlx::query(
			r#"
			SELECT DISTINCT user_id
			FROM events
			WHERE org_id = ? AND project_id = ?
			  AND timestamp >= ? AND timestamp <= ?
			"#,
		)
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.bind(fmt_ts(&range.start))
		.bind(fmt_ts(&range.end))
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.iter().map(|row| row.get("user_id")).collect())
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant))]
	async fn event_name_summaries(
		&self,
		tenant: &Tenant,
		range: TimeRange,
	) -> Result<Vec<EventNameSummary>> {
		let rows = sqlx::query(
			r#"
			SELECT event_name,
			       COUNT(*) AS count,
			       COUNT(DISTINCT user_id) AS unique_users
			FROM events
			WHERE org_id = ? AND project_id = ?
			  AND timestamp >= ? AND timestamp <= ?
			GROUP BY event_name
			ORDER BY count DESC, event_name ASC
			"#,
		)
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.bind(fmt_ts(&range.start))
		.bind(fmt_ts(&range.end))
		.fetch_all(&self.pool)
		.await?;

		Ok(rows
			.iter()
			.map(|row| {
				let count: i64 = row.get("count");
				let unique_users: i64 = row.get("unique_users");
				EventNameSummary {
					event_name: row.get("event_name"),
					count: count as u64,
					unique_users: unique_users as u64,
				}
			})
			.collect())
	}

	#[tracing::instrument(skip(self), fields(tenant = %tenant))]
	async fn distinct_event_names(&self, tenant: &Tenant) -> Result<Vec<String>> {
		let rows = sqlx::query(
			"SELECT DISTINCT event_name FROM events
			 WHERE org_id = ? AND project_id = ? ORDER BY event_name ASC",
		)
		.bind(tenant.org_id.to_string())
		.bind(tenant.project_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.iter().map(|row| row.get("event_name")).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::test_pool;
	use chrono::TimeZone;
	use pulse_core::EventPayload;

	fn tenant(org: &str, project: &str) -> Tenant {
		Tenant::new(OrgId::new(org).unwrap(), ProjectId::new(project).unwrap())
	}

	fn event_at(tenant: &Tenant, user: &str, name: &str, ts: &str) -> Event {
		let payload = EventPayload {
			user_id: user.to_string(),
			event_name: name.to_string(),
			timestamp: Some(ts.to_string()),
			..Default::default()
		};
		payload
			.into_event(tenant, Utc::now(), None, None)
			.unwrap()
	}

	fn full_range() -> TimeRange {
		TimeRange {
			start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
			end: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
		}
	}

	async fn repo() -> EventRepository {
		EventRepository::new(test_pool().await)
	}

	#[tokio::test]
	async fn insert_many_persists_and_reports_duplicates() {
		let repo = repo().await;
		let t = tenant("org1", "p1");

		let a = event_at(&t, "u1", "page_view", "2024-01-01T10:00:00Z");
		let b = event_at(&t, "u2", "page_view", "2024-01-01T10:01:00Z");
		// Same identity tuple as `a`, different row id.
		let dup = event_at(&t, "u1", "page_view", "2024-01-01T10:00:00Z");

		let outcome = repo.insert_many(vec![a, b, dup]).await.unwrap();
		assert_eq!(outcome.persisted.len(), 2);
		assert_eq!(outcome.duplicates, 1);
		assert!(outcome.failures.is_empty());

		let count = repo.count(&t, &ScanFilter::default()).await.unwrap();
		assert_eq!(count, 2);
	}

	#[tokio::test]
	async fn scan_is_tenant_scoped_and_ordered() {
		let repo = repo().await;
		let t1 = tenant("org1", "p1");
		let t2 = tenant("org2", "p1");

		repo.insert_many(vec![
			event_at(&t1, "u1", "a", "2024-01-01T10:02:00Z"),
			event_at(&t1, "u1", "b", "2024-01-01T10:01:00Z"),
			event_at(&t2, "u9", "a", "2024-01-01T10:00:00Z"),
		])
		.await
		.unwrap();

		let events = repo
			.scan(&t1, &ScanFilter::default(), ScanOrder::Ascending, 100, 0)
			.await
			.unwrap();
		assert_eq!(events.len(), 2);
		assert_eq!(events[0].event_name, "b");
		assert_eq!(events[1].event_name, "a");
		assert!(events.iter().all(|e| e.org_id.as_str() == "org1"));
	}

	#[tokio::test]
	async fn bucket_counts_daily() {
		let repo = repo().await;
		let t = tenant("org1", "p1");

		repo.insert_many(vec![
			event_at(&t, "u1", "page_view", "2024-01-01T08:00:00Z"),
			event_at(&t, "u2", "page_view", "2024-01-01T09:00:00Z"),
			event_at(&t, "u3", "page_view", "2024-01-01T23:59:59Z"),
			event_at(&t, "u1", "page_view", "2024-01-02T00:00:01Z"),
		])
		.await
		.unwrap();

		let buckets = repo
			.bucket_counts(&t, "page_view", Interval::Daily, full_range())
			.await
			.unwrap();
		assert_eq!(buckets.len(), 2);
		assert_eq!(buckets[0].count, 3);
		assert_eq!(buckets[0].unique_users, 3);
		assert_eq!(
			buckets[0].bucket_start,
			Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
		);
		assert_eq!(buckets[1].count, 1);
		assert_eq!(buckets[1].unique_users, 1);
	}

	#[tokio::test]
	async fn bucket_counts_weekly_starts_on_monday() {
		let repo = repo().await;
		let t = tenant("org1", "p1");

		// 2024-01-03 is a Wednesday; its ISO week starts Monday 2024-01-01.
		// 2024-01-07 is the Sunday of the same week.
		repo.insert_many(vec![
			event_at(&t, "u1", "e", "2024-01-03T12:00:00Z"),
			event_at(&t, "u2", "e", "2024-01-07T12:00:00Z"),
			event_at(&t, "u1", "e", "2024-01-08T00:00:00Z"),
		])
		.await
		.unwrap();

		let buckets = repo
			.bucket_counts(&t, "e", Interval::Weekly, full_range())
			.await
			.unwrap();
		assert_eq!(buckets.len(), 2);
		assert_eq!(
			buckets[0].bucket_start,
			Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
		);
		assert_eq!(buckets[0].count, 2);
		assert_eq!(
			buckets[1].bucket_start,
			Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()
		);
	}

	#[tokio::test]
	async fn distinct_users_and_summaries() {
		let repo = repo().await;
		let t = tenant("org1", "p1");

		repo.insert_many(vec![
			event_at(&t, "u1", "page_view", "2024-01-01T08:00:00Z"),
			event_at(&t, "u1", "purchase", "2024-01-01T09:00:00Z"),
			event_at(&t, "u2", "page_view", "2024-01-01T10:00:00Z"),
		])
		.await
		.unwrap();

		let users = repo
			.count_distinct_users(&t, None, full_range())
			.await
			.unwrap();
		assert_eq!(users, 2);

		let summaries = repo.event_name_summaries(&t, full_range()).await.unwrap();
		assert_eq!(summaries[0].event_name, "page_view");
		assert_eq!(summaries[0].count, 2);
		assert_eq!(summaries[0].unique_users, 2);
		assert_eq!(summaries[1].event_name, "purchase");

		let names = repo.distinct_event_names(&t).await.unwrap();
		assert_eq!(names, vec!["page_view".to_string(), "purchase".to_string()]);
	}

	#[tokio::test]
	async fn first_occurrences_take_the_earliest() {
		let repo = repo().await;
		let t = tenant("org1", "p1");

		repo.insert_many(vec![
			event_at(&t, "u1", "signup", "2024-01-02T08:00:00Z"),
			event_at(&t, "u1", "signup", "2024-01-01T08:00:00Z"),
			event_at(&t, "u2", "signup", "2024-01-03T08:00:00Z"),
		])
		.await
		.unwrap();

		let mut firsts = repo
			.first_occurrences(&t, "signup", full_range())
			.await
			.unwrap();
		firsts.sort();
		assert_eq!(firsts.len(), 2);
		assert_eq!(firsts[0].0, "u1");
		assert_eq!(
			firsts[0].1,
			Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
		);
	}

	#[tokio::test]
	async fn properties_round_trip_through_rows() {
		let repo = repo().await;
		let t = tenant("org1", "p1");

		let mut event = event_at(&t, "u1", "purchase", "2024-01-01T10:00:00Z");
		event.properties.insert(
			"total".to_string(),
			serde_json::json!({"amount": 42.5, "currency": "USD"}),
		);
		repo.insert_many(vec![event]).await.unwrap();

		let events = repo
			.scan(&t, &ScanFilter::default(), ScanOrder::Ascending, 10, 0)
			.await
			.unwrap();
		assert_eq!(
			events[0].properties["total"]["currency"],
			serde_json::json!("USD")
		);
	}
}
