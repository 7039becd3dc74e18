// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Funnel definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PulseError;
use crate::filter::FilterExpr;
use crate::tenant::{OrgId, ProjectId};

pub const MIN_FUNNEL_STEPS: usize = 2;
pub const MAX_FUNNEL_STEPS: usize = 10;

/// One step in a funnel: an event name, optional property filters, and an
/// optional time window in seconds relative to the previous step
/// (0 = unbounded).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStep {
	pub event_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub filters: Option<FilterExpr>,
	#[serde(default)]
	pub time_window_secs: u64,
}

/// An ordered sequence of steps through which conversion is measured.
/// Scoped to a tenant; `name` is unique per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
	pub id: Uuid,
	pub org_id: OrgId,
	pub project_id: ProjectId,
	pub name: String,
	pub steps: Vec<FunnelStep>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Funnel {
	/// Validate a funnel's name and steps: 2 to 10 steps, unique step
	/// event names, valid step filters.
	pub fn validate(name: &str, steps: &[FunnelStep]) -> Result<(), PulseError> {
		let mut details = Vec::new();

		if name.is_empty() {
			details.push("name is required".to_string());
		}

		if steps.len() < MIN_FUNNEL_STEPS || steps.len() > MAX_FUNNEL_STEPS {
			details.push(format!(
				"funnel must have between {MIN_FUNNEL_STEPS} and {MAX_FUNNEL_STEPS} steps, got {}",
				steps.len()
			));
		}

		let mut seen = std::collections::HashSet::new();
		for step in steps {
			if step.event_name.is_empty() {
				details.push("step eventName is required".to_string());
			} else if !seen.insert(step.event_name.as_str()) {
				details.push(format!("duplicate step eventName: {}", step.event_name));
			}
			if let Some(filters) = &step.filters {
				if let Err(e) = filters.validate() {
					details.push(e.to_string());
				}
			}
		}

		if details.is_empty() {
			Ok(())
		} else {
			Err(PulseError::invalid_with_details(
				"invalid funnel definition",
				details,
			))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn step(name: &str) -> FunnelStep {
		FunnelStep {
			event_name: name.to_string(),
			filters: None,
			time_window_secs: 0,
		}
	}

	#[test]
	fn accepts_two_to_ten_unique_steps() {
		assert!(Funnel::validate("checkout", &[step("a"), step("b")]).is_ok());

		let ten: Vec<FunnelStep> = (0..10).map(|i| step(&format!("s{i}"))).collect();
		assert!(Funnel::validate("long", &ten).is_ok());
	}

	#[test]
	fn rejects_too_few_or_too_many_steps() {
		assert!(Funnel::validate("one", &[step("a")]).is_err());

		let eleven: Vec<FunnelStep> = (0..11).map(|i| step(&format!("s{i}"))).collect();
		assert!(Funnel::validate("long", &eleven).is_err());
	}

	#[test]
	fn rejects_duplicate_step_names() {
		let err = Funnel::validate("dupe", &[step("a"), step("a")]).unwrap_err();
		match err {
			PulseError::InvalidInput { details, .. } => {
				assert!(details.iter().any(|d| d.contains("duplicate")));
			}
			other => panic!("expected InvalidInput, got {other:?}"),
		}
	}

	#[test]
	fn rejects_empty_name_and_invalid_step_filter() {
		assert!(Funnel::validate("", &[step("a"), step("b")]).is_err());

		let mut bad = step("b");
		bad.filters = Some(FilterExpr::Regex {
			path: "x".to_string(),
			pattern: "[".to_string(),
		});
		assert!(Funnel::validate("f", &[step("a"), bad]).is_err());
	}
}
