// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Result shapes for the five analytics operators.
//!
//! These serialize directly into API response `data` payloads
//! (camelCase), and are what the result cache stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step of a computed funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStepResult {
	pub step: usize,
	pub event_name: String,
	pub count: u64,
	/// Percent of the previous step's users who reached this one;
	/// 100 at step 1. Two decimals.
	pub conversion_rate: f64,
	/// `100 - conversion_rate`, two decimals.
	pub drop_off_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelAnalytics {
	pub funnel_id: Uuid,
	pub funnel_name: String,
	pub start_date: DateTime<Utc>,
	pub end_date: DateTime<Utc>,
	pub steps: Vec<FunnelStepResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionDay {
	pub day: u32,
	pub retained_users: u64,
	/// Percent of the cohort active that day, two decimals.
	pub retention_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionAnalytics {
	pub cohort_event: String,
	pub cohort_size: u64,
	pub start_date: DateTime<Utc>,
	pub end_date: DateTime<Utc>,
	pub retention_data: Vec<RetentionDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBucket {
	pub bucket_start: DateTime<Utc>,
	pub count: u64,
	pub unique_users: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetrics {
	pub event_name: String,
	pub interval: String,
	pub start_date: DateTime<Utc>,
	pub end_date: DateTime<Utc>,
	/// Ascending by bucket start.
	pub buckets: Vec<MetricsBucket>,
	pub total_count: u64,
	/// Distinct users across the whole range, not the per-bucket sum.
	pub total_unique_users: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyEvent {
	pub event_name: String,
	pub timestamp: DateTime<Utc>,
	pub properties: serde_json::Map<String, serde_json::Value>,
	pub session_id: Option<String>,
	pub page_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJourney {
	pub user_id: String,
	pub total_events: u64,
	/// Chronological.
	pub events: Vec<JourneyEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummaryRow {
	pub event_name: String,
	pub count: u64,
	pub unique_users: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
	pub start_date: DateTime<Utc>,
	pub end_date: DateTime<Utc>,
	/// Descending by count.
	pub events: Vec<EventSummaryRow>,
	pub total_events: u64,
	pub total_unique_users: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
	pub user_id: String,
	pub total_events: u64,
	pub first_seen: DateTime<Utc>,
	pub last_seen: DateTime<Utc>,
	/// Descending by count.
	pub event_counts: Vec<EventSummaryRow>,
}
