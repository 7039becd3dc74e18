// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Request extraction: API key authentication and shared query types.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use pulse_core::PulseError;
use pulse_server_auth::{AuthContext, API_KEY_HEADER};
use pulse_server_db::TimeRange;

use crate::api_response::ApiError;
use crate::state::AppState;

/// Extractor wrapper so handlers can declare `Auth(ctx)` and get a 401
/// on missing or invalid keys.
pub struct Auth(pub AuthContext);

impl FromRequestParts<AppState> for Auth {
	type Rejection = ApiError;

	async fn from_request_parts(
		parts: &mut Parts,
		state: &AppState,
	) -> Result<Self, Self::Rejection> {
		let raw_key = parts
			.headers
			.get(API_KEY_HEADER)
			.and_then(|value| value.to_str().ok());

		let ctx = state.authenticator.authenticate(raw_key).await?;
		Ok(Auth(ctx))
	}
}

/// `startDate`/`endDate` pair accepted by the analytics endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
	pub start_date: Option<String>,
	pub end_date: Option<String>,
}

impl DateRangeQuery {
	/// Parse into a range, or `None` when both bounds are absent.
	pub fn parse(&self) -> Result<Option<TimeRange>, PulseError> {
		match (&self.start_date, &self.end_date) {
			(None, None) => Ok(None),
			(start, end) => {
				let end = match end {
					Some(raw) => parse_instant(raw, "endDate")?,
					None => Utc::now(),
				};
				let start = match start {
					Some(raw) => parse_instant(raw, "startDate")?,
					None => end - chrono::Duration::days(30),
				};
				if start > end {
					return Err(PulseError::invalid("startDate must not be after endDate"));
				}
				Ok(Some(TimeRange { start, end }))
			}
		}
	}

	/// Parse with a default range of the last `default_days` days.
	pub fn parse_or_last_days(&self, default_days: i64) -> Result<TimeRange, PulseError> {
		match self.parse()? {
			Some(range) => Ok(range),
			None => {
				let end = Utc::now();
				Ok(TimeRange {
					start: end - chrono::Duration::days(default_days),
					end,
				})
			}
		}
	}
}

pub fn parse_instant(raw: &str, name: &str) -> Result<DateTime<Utc>, PulseError> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| PulseError::invalid(format!("{name} is not a valid RFC 3339 instant: {raw}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn absent_range_is_none() {
		let query = DateRangeQuery::default();
		assert!(query.parse().unwrap().is_none());
	}

	#[test]
	fn full_range_parses() {
		let query = DateRangeQuery {
			start_date: Some("2024-01-01T00:00:00Z".to_string()),
			end_date: Some("2024-01-02T00:00:00Z".to_string()),
		};
		let range = query.parse().unwrap().unwrap();
		assert!(range.start < range.end);
	}

	#[test]
	fn inverted_range_is_invalid() {
		let query = DateRangeQuery {
			start_date: Some("2024-01-02T00:00:00Z".to_string()),
			end_date: Some("2024-01-01T00:00:00Z".to_string()),
		};
		assert!(query.parse().is_err());
	}

	#[test]
	fn garbage_dates_are_invalid() {
		let query = DateRangeQuery {
			start_date: Some("yesterday".to_string()),
			end_date: None,
		};
		assert!(query.parse().is_err());
	}
}
