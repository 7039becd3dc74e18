// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Logging and environment configuration.

use serde::Deserialize;

/// Logging configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct LoggingConfig {
	/// Default tracing filter when `RUST_LOG` is unset.
	pub level: String,
	/// Deployment environment name surfaced on `/health`.
	pub environment: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			environment: "development".to_string(),
		}
	}
}

/// Logging configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfigLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub environment: Option<String>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: LoggingConfigLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.environment.is_some() {
			self.environment = other.environment;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		let defaults = LoggingConfig::default();
		LoggingConfig {
			level: self.level.unwrap_or(defaults.level),
			environment: self.environment.unwrap_or(defaults.environment),
		}
	}
}

/// CORS configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct CorsConfig {
	/// Allowed browser origin; `*` allows any.
	pub origin: String,
}

impl Default for CorsConfig {
	fn default() -> Self {
		Self {
			origin: "*".to_string(),
		}
	}
}

/// CORS configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfigLayer {
	#[serde(default)]
	pub origin: Option<String>,
}

impl CorsConfigLayer {
	pub fn merge(&mut self, other: CorsConfigLayer) {
		if other.origin.is_some() {
			self.origin = other.origin;
		}
	}

	pub fn finalize(self) -> CorsConfig {
		CorsConfig {
			origin: self.origin.unwrap_or_else(|| CorsConfig::default().origin),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let logging = LoggingConfigLayer::default().finalize();
		assert_eq!(logging.level, "info");
		assert_eq!(logging.environment, "development");

		let cors = CorsConfigLayer::default().finalize();
		assert_eq!(cors.origin, "*");
	}
}
