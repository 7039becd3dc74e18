// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Property filter predicates.
//!
//! Funnel steps and metric queries constrain the free-form `properties`
//! bag with a small explicit predicate tree: equality, regex, numeric
//! range, and boolean combinators. Paths are dot-separated keys into
//! nested objects (`"checkout.total"`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PulseError;

/// A predicate over an event's `properties` bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterExpr {
	Eq { path: String, value: Value },
	Regex { path: String, pattern: String },
	Range {
		path: String,
		lo: Option<f64>,
		hi: Option<f64>,
	},
	And { exprs: Vec<FilterExpr> },
	Or { exprs: Vec<FilterExpr> },
}

impl FilterExpr {
	/// Validate the expression: regex patterns must compile and range
	/// bounds must be ordered. Run once at the API boundary so that
	/// evaluation never has to report errors.
	pub fn validate(&self) -> Result<(), PulseError> {
		match self {
			FilterExpr::Eq { .. } => Ok(()),
			FilterExpr::Regex { pattern, .. } => Regex::new(pattern)
				.map(|_| ())
				.map_err(|e| PulseError::invalid(format!("invalid filter regex: {e}"))),
			FilterExpr::Range { lo, hi, .. } => {
				if let (Some(lo), Some(hi)) = (lo, hi) {
					if lo > hi {
						return Err(PulseError::invalid(
							"filter range lower bound exceeds upper bound",
						));
					}
				}
				Ok(())
			}
			FilterExpr::And { exprs } | FilterExpr::Or { exprs } => {
				for expr in exprs {
					expr.validate()?;
				}
				Ok(())
			}
		}
	}

	/// Evaluate against a property bag. Absent paths never match; an
	/// invalid regex (rejected by [`validate`](Self::validate) at the
	/// boundary) evaluates to no-match.
	pub fn matches(&self, properties: &serde_json::Map<String, Value>) -> bool {
		match self {
			FilterExpr::Eq { path, value } => {
				lookup(properties, path).map(|v| v == value).unwrap_or(false)
			}
			FilterExpr::Regex { path, pattern } => {
				let Some(Value::String(s)) = lookup(properties, path) else {
					return false;
				};
				Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false)
			}
			FilterExpr::Range { path, lo, hi } => {
				let Some(n) = lookup(properties, path).and_then(Value::as_f64) else {
					return false;
				};
				lo.map(|lo| n >= lo).unwrap_or(true) && hi.map(|hi| n <= hi).unwrap_or(true)
			}
			FilterExpr::And { exprs } => exprs.iter().all(|e| e.matches(properties)),
			FilterExpr::Or { exprs } => exprs.iter().any(|e| e.matches(properties)),
		}
	}
}

fn lookup<'a>(properties: &'a serde_json::Map<String, Value>, path: &str) -> Option<&'a Value> {
	let mut segments = path.split('.');
	let mut current = properties.get(segments.next()?)?;
	for segment in segments {
		current = current.as_object()?.get(segment)?;
	}
	Some(current)
}
