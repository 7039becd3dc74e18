// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Events and their content-addressed fingerprints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::tenant::{OrgId, ProjectId, Tenant};

/// Maximum length of `user_id` and `event_name`.
pub const MAX_FIELD_LENGTH: usize = 255;

/// Maximum serialized size of the `properties` bag.
pub const MAX_PROPERTIES_BYTES: usize = 64 * 1024;

/// Maximum number of events accepted in a single ingest request.
pub const MAX_BATCH_SIZE: usize = 1_000;

/// An observed user action, validated and scoped to a tenant.
///
/// Events are read-only once persisted. `id` and `created_at` are row
/// metadata assigned at receipt; `timestamp` is the instant the action
/// occurred and may arrive out of order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub id: Uuid,
	pub org_id: OrgId,
	pub project_id: ProjectId,
	pub user_id: String,
	pub event_name: String,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub properties: serde_json::Map<String, serde_json::Value>,
	pub session_id: Option<String>,
	pub page_url: Option<String>,
	pub user_agent: Option<String>,
	pub ip_address: Option<String>,
	pub created_at: DateTime<Utc>,
}

impl Event {
	/// Compute the deduplication fingerprint for this event.
	pub fn fingerprint(&self) -> Fingerprint {
		Fingerprint::compute(
			&self.user_id,
			&self.event_name,
			self.timestamp.timestamp_millis(),
			&self.org_id,
			&self.project_id,
		)
	}

	pub fn tenant(&self) -> Tenant {
		Tenant::new(self.org_id.clone(), self.project_id.clone())
	}
}

/// Stable content-addressed identifier used for deduplication.
///
/// Two events with the same `(user_id, event_name, timestamp_millis,
/// org_id, project_id)` tuple are defined to be duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
	pub fn compute(
		user_id: &str,
		event_name: &str,
		timestamp_millis: i64,
		org_id: &OrgId,
		project_id: &ProjectId,
	) -> Self {
		let mut hasher = Sha256::new();
		hasher.update(user_id.as_bytes());
		hasher.update(b":");
		hasher.update(event_name.as_bytes());
		hasher.update(b":");
		hasher.update(timestamp_millis.to_string().as_bytes());
		hasher.update(b":");
		hasher.update(org_id.as_str().as_bytes());
		hasher.update(b":");
		hasher.update(project_id.as_str().as_bytes());
		Self(hex::encode(hasher.finalize()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Raw event payload as submitted by producers.
///
/// Tenant scope is never taken from the payload; the ingestion pipeline
/// assigns it from the authenticated API key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
	/// Defaulted when absent so a missing field surfaces as a per-event
	/// validation failure instead of failing the whole batch.
	#[serde(default)]
	pub user_id: String,
	#[serde(default)]
	pub event_name: String,
	pub timestamp: Option<String>,
	#[serde(default)]
	pub properties: serde_json::Map<String, serde_json::Value>,
	pub session_id: Option<String>,
	pub page_url: Option<String>,
}

impl EventPayload {
	/// Validate this payload and build an [`Event`] scoped to `tenant`.
	///
	/// Returns the list of per-field reasons on failure. A missing
	/// `timestamp` is filled with `received_at`.
	pub fn into_event(
		self,
		tenant: &Tenant,
		received_at: DateTime<Utc>,
		user_agent: Option<String>,
		ip_address: Option<String>,
	) -> Result<Event, Vec<String>> {
		let mut reasons = Vec::new();

		if self.user_id.is_empty() {
			reasons.push("userId is required".to_string());
		} else if self.user_id.len() > MAX_FIELD_LENGTH {
			reasons.push(format!("userId exceeds {MAX_FIELD_LENGTH} characters"));
		}

		if self.event_name.is_empty() {
			reasons.push("eventName is required".to_string());
		} else if self.event_name.len() > MAX_FIELD_LENGTH {
			reasons.push(format!("eventName exceeds {MAX_FIELD_LENGTH} characters"));
		}

		let timestamp = match &self.timestamp {
			None => received_at,
			Some(raw) => match DateTime::parse_from_rfc3339(raw) {
				Ok(ts) => ts.with_timezone(&Utc),
				Err(_) => {
					reasons.push(format!("timestamp is not a valid RFC 3339 instant: {raw}"));
					received_at
				}
			},
		};

		let serialized = serde_json::Value::Object(self.properties.clone()).to_string();
		if serialized.len() > MAX_PROPERTIES_BYTES {
			reasons.push(format!(
				"properties exceed {MAX_PROPERTIES_BYTES} bytes when serialized"
			));
		}

		if !reasons.is_empty() {
			return Err(reasons);
		}

		Ok(Event {
			id: Uuid::new_v4(),
			org_id: tenant.org_id.clone(),
			project_id: tenant.project_id.clone(),
			user_id: self.user_id,
			event_name: self.event_name,
			timestamp,
			properties: self.properties,
			session_id: self.session_id,
			page_url: self.page_url,
			user_agent,
			ip_address,
			created_at: received_at,
		})
	}
}
