// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read config file {path}: {source}")]
	Io {
		path: String,
		source: std::io::Error,
	},

	#[error("Failed to parse config file {path}: {source}")]
	Parse {
		path: String,
		source: toml::de::Error,
	},

	#[error("Invalid configuration value for {name}: {message}")]
	InvalidValue { name: String, message: String },

	#[error("Configuration validation failed: {0}")]
	Validation(String),
}
