// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Result type alias for domain operations.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Top-level error taxonomy shared across the server crates.
///
/// Handlers map these onto HTTP status codes; the variants carry only
/// user-presentable detail, never internal identifiers.
#[derive(Error, Debug, Clone)]
pub enum PulseError {
	#[error("Invalid input: {message}")]
	InvalidInput {
		message: String,
		details: Vec<String>,
	},

	#[error("Unauthorized: {0}")]
	Unauthorized(String),

	#[error("Forbidden: {0}")]
	Forbidden(String),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Rate limit exceeded: retry after {retry_after_secs} seconds")]
	RateLimited { retry_after_secs: u64 },

	#[error("Dependency unavailable: {0}")]
	TransientDependency(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

impl PulseError {
	/// Shorthand for a validation failure without per-field details.
	pub fn invalid(message: impl Into<String>) -> Self {
		PulseError::InvalidInput {
			message: message.into(),
			details: Vec::new(),
		}
	}

	/// A validation failure listing per-field reasons.
	pub fn invalid_with_details(message: impl Into<String>, details: Vec<String>) -> Self {
		PulseError::InvalidInput {
			message: message.into(),
			details,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_input_display_includes_message() {
		let err = PulseError::invalid("userId is required");
		assert_eq!(err.to_string(), "Invalid input: userId is required");
	}

	#[test]
	fn rate_limited_display_includes_retry_after() {
		let err = PulseError::RateLimited {
			retry_after_secs: 42,
		};
		assert!(err.to_string().contains("42"));
	}
}
