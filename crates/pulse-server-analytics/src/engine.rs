// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use pulse_core::{FilterExpr, PulseError, Tenant};
use pulse_server_cache::Cache;
use pulse_server_db::{
	DbError, EventStore, FunnelStore, Interval, Occurrence, ScanFilter, ScanOrder, TimeRange,
};

use crate::cache_key::cache_key;
use crate::types::{
	EventMetrics, EventSummary, EventSummaryRow, FunnelAnalytics, FunnelStepResult, JourneyEvent,
	MetricsBucket, RetentionAnalytics, RetentionDay, UserJourney, UserSummary,
};

/// TTL for user-specific query results.
const USER_QUERY_TTL: Duration = Duration::from_secs(300);

/// Retention lookback bounds.
const MIN_RETENTION_DAYS: u32 = 1;
const MAX_RETENTION_DAYS: u32 = 365;

/// Default metrics range when the caller gives none.
const DEFAULT_METRICS_RANGE_DAYS: i64 = 30;

/// Hard caps on per-user reads.
const JOURNEY_LIMIT: i64 = 1_000;
const USER_SUMMARY_SCAN_LIMIT: i64 = 10_000;

/// Read-through cached analytics over the event store.
pub struct AnalyticsEngine<S: EventStore, F: FunnelStore> {
	store: Arc<S>,
	funnels: Arc<F>,
	cache: Arc<dyn Cache>,
	query_ttl: Duration,
}

impl<S: EventStore, F: FunnelStore> AnalyticsEngine<S, F> {
	pub fn new(store: Arc<S>, funnels: Arc<F>, cache: Arc<dyn Cache>, query_ttl: Duration) -> Self {
		Self {
			store,
			funnels,
			cache,
			query_ttl,
		}
	}

	// ----- funnel ---------------------------------------------------------

	/// Compute conversion through a funnel's ordered steps.
	///
	/// A user is a member of step `i` only if they reached step `i-1`
	/// and their earliest qualifying occurrence of step `i` is at or
	/// after that instant; a nonzero step `timeWindow` additionally
	/// bounds the gap in seconds. Step counts are monotone by
	/// construction.
	#[tracing::instrument(skip(self, extra_filters), fields(tenant = %tenant, funnel_id = %funnel_id))]
	pub async fn funnel_analytics(
		&self,
		tenant: &Tenant,
		funnel_id: Uuid,
		range: TimeRange,
		extra_filters: Option<&FilterExpr>,
	) -> Result<FunnelAnalytics, PulseError> {
		let funnel = self
			.funnels
			.get_funnel(tenant, funnel_id)
			.await
			.map_err(store_err)?
			.ok_or_else(|| PulseError::NotFound("funnel not found".to_string()))?;

		let key = cache_key(
			"funnel",
			&[
				("org", tenant.org_id.to_string()),
				("project", tenant.project_id.to_string()),
				("id", funnel_id.to_string()),
				("start", range.start.to_rfc3339()),
				("end", range.end.to_rfc3339()),
				("filters", filters_key(extra_filters)),
			],
		);
		if let Some(hit) = self.cached_get::<FunnelAnalytics>(&key).await {
			return Ok(hit);
		}

		let mut steps = Vec::with_capacity(funnel.steps.len());
		// user -> instant at which they reached the previous step
		let mut progress: HashMap<String, DateTime<Utc>> = HashMap::new();

		for (index, step) in funnel.steps.iter().enumerate() {
			let occurrences = self
				.store
				.occurrences(tenant, &step.event_name, range)
				.await
				.map_err(store_err)?;

			let mut per_user: HashMap<String, Vec<DateTime<Utc>>> = HashMap::new();
			for occ in occurrences {
				let step_ok = step
					.filters
					.as_ref()
					.map_or(true, |f| f.matches(&occ.properties));
				let extra_ok = extra_filters.map_or(true, |f| f.matches(&occ.properties));
				if step_ok && extra_ok {
					per_user.entry(occ.user_id).or_default().push(occ.timestamp);
				}
			}

			if index == 0 {
				progress = per_user
					.into_iter()
					.filter_map(|(user, times)| {
						times.into_iter().min().map(|first| (user, first))
					})
					.collect();
			} else {
				let window = step.time_window_secs;
				let mut next = HashMap::new();
				for (user, reached_at) in &progress {
					let Some(times) = per_user.get(user) else {
						continue;
					};
					let deadline = (window > 0)
						.then(|| *reached_at + ChronoDuration::seconds(window as i64));
					// Occurrence lists arrive sorted; the first match is
					// the earliest qualifying one.
					if let Some(ts) = times.iter().find(|ts| {
						**ts >= *reached_at && deadline.map_or(true, |d| **ts <= d)
					}) {
						next.insert(user.clone(), *ts);
					}
				}
				progress = next;
			}

			steps.push((step.event_name.clone(), progress.len() as u64));
		}

		let result = FunnelAnalytics {
			funnel_id: funnel.id,
			funnel_name: funnel.name,
			start_date: range.start,
			end_date: range.end,
			steps: step_results(&steps),
		};

		self.cached_put(&key, &result, self.query_ttl).await;
		Ok(result)
	}

	// ----- retention ------------------------------------------------------

	/// Cohort retention: the cohort is every user whose first occurrence
	/// of `cohort_event` falls in the window; a cohort user is retained
	/// on day `d` when they produced any event within the UTC calendar
	/// day `start + d`.
	#[tracing::instrument(skip(self), fields(tenant = %tenant, cohort_event, days))]
	pub async fn retention(
		&self,
		tenant: &Tenant,
		cohort_event: &str,
		days: u32,
		range: Option<TimeRange>,
	) -> Result<RetentionAnalytics, PulseError> {
		if !(MIN_RETENTION_DAYS..=MAX_RETENTION_DAYS).contains(&days) {
			return Err(PulseError::invalid(format!(
				"days must be between {MIN_RETENTION_DAYS} and {MAX_RETENTION_DAYS}"
			)));
		}

		let end = range.map(|r| r.end).unwrap_or_else(Utc::now);
		let start = range
			.map(|r| r.start)
			.unwrap_or_else(|| end - ChronoDuration::days(2 * days as i64));
		let window = TimeRange { start, end };

		let key = cache_key(
			"retention",
			&[
				("org", tenant.org_id.to_string()),
				("project", tenant.project_id.to_string()),
				("cohort", cohort_event.to_string()),
				("days", days.to_string()),
				("start", start.to_rfc3339()),
				("end", end.to_rfc3339()),
			],
		);
		if let Some(hit) = self.cached_get::<RetentionAnalytics>(&key).await {
			return Ok(hit);
		}

		let cohort: HashSet<String> = self
			.store
			.first_occurrences(tenant, cohort_event, window)
			.await
			.map_err(store_err)?
			.into_iter()
			.map(|(user, _)| user)
			.collect();
		let cohort_size = cohort.len() as u64;

		let mut retention_data = Vec::with_capacity(days as usize);
		for day in 1..=days {
			let day_start = utc_day_start(start + ChronoDuration::days(day as i64));
			let day_range = TimeRange {
				start: day_start,
				end: day_start + ChronoDuration::days(1) - ChronoDuration::milliseconds(1),
			};

			let retained = if cohort.is_empty() {
				0
			} else {
				self.store
					.active_users(tenant, day_range)
					.await
					.map_err(store_err)?
					.into_iter()
					.filter(|user| cohort.contains(user))
					.count() as u64
			};

			let retention_rate = if cohort_size == 0 {
				0.0
			} else {
				round2(100.0 * retained as f64 / cohort_size as f64)
			};
			retention_data.push(RetentionDay {
				day,
				retained_users: retained,
				retention_rate,
			});
		}

		let result = RetentionAnalytics {
			cohort_event: cohort_event.to_string(),
			cohort_size,
			start_date: start,
			end_date: end,
			retention_data,
		};

		self.cached_put(&key, &result, self.query_ttl).await;
		Ok(result)
	}

	// ----- metrics --------------------------------------------------------

	/// Time-bucketed counts and unique users for one event name.
	#[tracing::instrument(skip(self, filters), fields(tenant = %tenant, event_name, interval = interval.as_str()))]
	pub async fn metrics(
		&self,
		tenant: &Tenant,
		event_name: &str,
		interval: Interval,
		range: Option<TimeRange>,
		filters: Option<&FilterExpr>,
	) -> Result<EventMetrics, PulseError> {
		let end = range.map(|r| r.end).unwrap_or_else(Utc::now);
		let start = range
			.map(|r| r.start)
			.unwrap_or_else(|| end - ChronoDuration::days(DEFAULT_METRICS_RANGE_DAYS));
		let window = TimeRange { start, end };

		let key = cache_key(
			"metrics",
			&[
				("org", tenant.org_id.to_string()),
				("project", tenant.project_id.to_string()),
				("event", event_name.to_string()),
				("interval", interval.as_str().to_string()),
				("start", start.to_rfc3339()),
				("end", end.to_rfc3339()),
				("filters", filters_key(filters)),
			],
		);
		if let Some(hit) = self.cached_get::<EventMetrics>(&key).await {
			return Ok(hit);
		}

		let (buckets, total_unique_users) = match filters {
			None => {
				let rows = self
					.store
					.bucket_counts(tenant, event_name, interval, window)
					.await
					.map_err(store_err)?;
				let unique = self
					.store
					.count_distinct_users(tenant, Some(event_name), window)
					.await
					.map_err(store_err)?;
				let buckets = rows
					.into_iter()
					.map(|row| MetricsBucket {
						bucket_start: row.bucket_start,
						count: row.count,
						unique_users: row.unique_users,
					})
					.collect();
				(buckets, unique as u64)
			}
			Some(filters) => {
				let occurrences = self
					.store
					.occurrences(tenant, event_name, window)
					.await
					.map_err(store_err)?;
				bucket_filtered(occurrences, interval, filters)
			}
		};

		let total_count = buckets.iter().map(|b| b.count).sum();
		let result = EventMetrics {
			event_name: event_name.to_string(),
			interval: interval.as_str().to_string(),
			start_date: start,
			end_date: end,
			buckets,
			total_count,
			total_unique_users,
		};

		self.cached_put(&key, &result, self.query_ttl).await;
		Ok(result)
	}

	// ----- user journey ---------------------------------------------------

	/// Chronological events for one user. `NotFound` when the user has
	/// no events in range.
	#[tracing::instrument(skip(self), fields(tenant = %tenant, user_id))]
	pub async fn user_journey(
		&self,
		tenant: &Tenant,
		user_id: &str,
		range: Option<TimeRange>,
	) -> Result<UserJourney, PulseError> {
		let key = cache_key(
			"user_journey",
			&[
				("org", tenant.org_id.to_string()),
				("project", tenant.project_id.to_string()),
				("user", user_id.to_string()),
				("start", range.map(|r| r.start.to_rfc3339()).unwrap_or_default()),
				("end", range.map(|r| r.end.to_rfc3339()).unwrap_or_default()),
			],
		);
		if let Some(hit) = self.cached_get::<UserJourney>(&key).await {
			return Ok(hit);
		}

		let filter = ScanFilter {
			user_id: Some(user_id.to_string()),
			range,
			..Default::default()
		};
		let events = self
			.store
			.scan(tenant, &filter, ScanOrder::Ascending, JOURNEY_LIMIT, 0)
			.await
			.map_err(store_err)?;

		if events.is_empty() {
			return Err(PulseError::NotFound(format!(
				"no events for user {user_id} in range"
			)));
		}

		let result = UserJourney {
			user_id: user_id.to_string(),
			total_events: self.store.count(tenant, &filter).await.map_err(store_err)? as u64,
			events: events
				.into_iter()
				.map(|event| JourneyEvent {
					event_name: event.event_name,
					timestamp: event.timestamp,
					properties: event.properties,
					session_id: event.session_id,
					page_url: event.page_url,
				})
				.collect(),
		};

		self.cached_put(&key, &result, USER_QUERY_TTL).await;
		Ok(result)
	}

	// ----- event summary --------------------------------------------------

	/// Per-event-name totals, descending by count.
	#[tracing::instrument(skip(self), fields(tenant = %tenant))]
	pub async fn event_summary(
		&self,
		tenant: &Tenant,
		range: TimeRange,
	) -> Result<EventSummary, PulseError> {
		let key = cache_key(
			"event_summary",
			&[
				("org", tenant.org_id.to_string()),
				("project", tenant.project_id.to_string()),
				("start", range.start.to_rfc3339()),
				("end", range.end.to_rfc3339()),
			],
		);
		if let Some(hit) = self.cached_get::<EventSummary>(&key).await {
			return Ok(hit);
		}

		let rows = self
			.store
			.event_name_summaries(tenant, range)
			.await
			.map_err(store_err)?;
		let total_unique_users = self
			.store
			.count_distinct_users(tenant, None, range)
			.await
			.map_err(store_err)? as u64;

		let events: Vec<EventSummaryRow> = rows
			.into_iter()
			.map(|row| EventSummaryRow {
				event_name: row.event_name,
				count: row.count,
				unique_users: row.unique_users,
			})
			.collect();
		let total_events = events.iter().map(|row| row.count).sum();

		let result = EventSummary {
			start_date: range.start,
			end_date: range.end,
			events,
			total_events,
			total_unique_users,
		};

		self.cached_put(&key, &result, self.query_ttl).await;
		Ok(result)
	}

	// ----- user summary ---------------------------------------------------

	/// Per-user rollup: totals, first/last seen, per-event counts.
	#[tracing::instrument(skip(self), fields(tenant = %tenant, user_id))]
	pub async fn user_summary(
		&self,
		tenant: &Tenant,
		user_id: &str,
	) -> Result<UserSummary, PulseError> {
		let key = cache_key(
			"user_journey",
			&[
				("org", tenant.org_id.to_string()),
				("project", tenant.project_id.to_string()),
				("user", user_id.to_string()),
				("summary", "1".to_string()),
			],
		);
		if let Some(hit) = self.cached_get::<UserSummary>(&key).await {
			return Ok(hit);
		}

		let filter = ScanFilter {
			user_id: Some(user_id.to_string()),
			..Default::default()
		};
		let events = self
			.store
			.scan(
				tenant,
				&filter,
				ScanOrder::Ascending,
				USER_SUMMARY_SCAN_LIMIT,
				0,
			)
			.await
			.map_err(store_err)?;

		let (Some(first), Some(last)) = (events.first(), events.last()) else {
			return Err(PulseError::NotFound(format!(
				"no events for user {user_id}"
			)));
		};

		let mut counts: HashMap<String, u64> = HashMap::new();
		for event in &events {
			*counts.entry(event.event_name.clone()).or_default() += 1;
		}
		let mut event_counts: Vec<EventSummaryRow> = counts
			.into_iter()
			.map(|(event_name, count)| EventSummaryRow {
				event_name,
				count,
				unique_users: 1,
			})
			.collect();
		event_counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.event_name.cmp(&b.event_name)));

		let result = UserSummary {
			user_id: user_id.to_string(),
			total_events: events.len() as u64,
			first_seen: first.timestamp,
			last_seen: last.timestamp,
			event_counts,
		};

		self.cached_put(&key, &result, USER_QUERY_TTL).await;
		Ok(result)
	}

	// ----- cache-aside plumbing -------------------------------------------

	async fn cached_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
		match self.cache.get(key).await {
			Ok(Some(raw)) => match serde_json::from_str(&raw) {
				Ok(value) => Some(value),
				Err(e) => {
					warn!(key, error = %e, "discarding undecodable cached result");
					None
				}
			},
			Ok(None) => None,
			Err(e) => {
				warn!(key, error = %e, "cache read failed, computing directly");
				None
			}
		}
	}

	async fn cached_put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
		match serde_json::to_string(value) {
			Ok(raw) => {
				if let Err(e) = self.cache.set(key, &raw, ttl).await {
					warn!(key, error = %e, "cache write failed");
				}
			}
			Err(e) => warn!(key, error = %e, "failed to serialize result for cache"),
		}
	}
}

fn store_err(e: DbError) -> PulseError {
	match e {
		DbError::NotFound(message) => PulseError::NotFound(message),
		DbError::Conflict(message) => PulseError::Conflict(message),
		other => {
			warn!(error = %other, "event store error");
			PulseError::TransientDependency("event store unavailable".to_string())
		}
	}
}

/// Round half away from zero to two decimals.
fn round2(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}

fn filters_key(filters: Option<&FilterExpr>) -> String {
	filters
		.and_then(|f| serde_json::to_string(f).ok())
		.unwrap_or_else(|| "none".to_string())
}

fn utc_day_start(ts: DateTime<Utc>) -> DateTime<Utc> {
	ts.date_naive()
		.and_hms_opt(0, 0, 0)
		.expect("midnight is always valid")
		.and_utc()
}

fn step_results(steps: &[(String, u64)]) -> Vec<FunnelStepResult> {
	let mut results = Vec::with_capacity(steps.len());
	let mut previous: Option<u64> = None;

	for (index, (event_name, count)) in steps.iter().enumerate() {
		// Step 1 converts at 100 by definition, even when empty.
		let conversion_rate = match previous {
			None => 100.0,
			Some(0) => 0.0,
			Some(prev) => round2(100.0 * *count as f64 / prev as f64),
		};

		results.push(FunnelStepResult {
			step: index + 1,
			event_name: event_name.clone(),
			count: *count,
			conversion_rate,
			drop_off_rate: round2(100.0 - conversion_rate),
		});
		previous = Some(*count);
	}

	results
}

/// Engine-side bucketing for the filtered metrics path.
fn bucket_filtered(
	occurrences: Vec<Occurrence>,
	interval: Interval,
	filters: &FilterExpr,
) -> (Vec<MetricsBucket>, u64) {
	let mut buckets: BTreeMap<DateTime<Utc>, (u64, HashSet<String>)> = BTreeMap::new();
	let mut all_users = HashSet::new();

	for occ in occurrences {
		if !filters.matches(&occ.properties) {
			continue;
		}
		let start = bucket_start(occ.timestamp, interval);
		let slot = buckets.entry(start).or_default();
		slot.0 += 1;
		slot.1.insert(occ.user_id.clone());
		all_users.insert(occ.user_id);
	}

	let buckets = buckets
		.into_iter()
		.map(|(bucket_start, (count, users))| MetricsBucket {
			bucket_start,
			count,
			unique_users: users.len() as u64,
		})
		.collect();
	(buckets, all_users.len() as u64)
}

fn bucket_start(ts: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
	let date = ts.date_naive();
	let date = match interval {
		Interval::Hourly | Interval::Daily => date,
		Interval::Weekly => date - chrono::Days::new(date.weekday().num_days_from_monday() as u64),
		Interval::Monthly => date.with_day(1).expect("day 1 always valid"),
	};
	let hour = match interval {
		Interval::Hourly => ts.hour(),
		_ => 0,
	};
	date.and_hms_opt(hour, 0, 0)
		.expect("valid wall clock")
		.and_utc()
}
