// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Centralized configuration management for the Pulse server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe sections with validation
//! - The deployment-facing environment names (`PORT`, `EVENT_BATCH_SIZE`, ...)
//!
//! # Usage
//!
//! ```ignore
//! use pulse_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub ingest: IngestConfig,
	pub rate_limit: RateLimitConfig,
	pub cache: CacheConfig,
	pub cors: CorsConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables
/// 2. Config file (`/etc/pulse/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let ingest = layer.ingest.unwrap_or_default().finalize();
	let rate_limit = layer.rate_limit.unwrap_or_default().finalize();
	let cache = layer.cache.unwrap_or_default().finalize();
	let cors = layer.cors.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	if !http.api_prefix.starts_with('/') {
		return Err(ConfigError::Validation(format!(
			"API_PREFIX must start with '/', got {:?}",
			http.api_prefix
		)));
	}

	info!(
		host = %http.host,
		port = http.port,
		api_prefix = %http.api_prefix,
		database = %database.url,
		batch_size = ingest.batch_size,
		buffer_timeout_ms = ingest.buffer_timeout_ms,
		environment = %logging.environment,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		ingest,
		rate_limit,
		cache,
		cors,
		logging,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_resolve() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.socket_addr(), "0.0.0.0:3000");
		assert_eq!(config.http.api_prefix, "/api/v1");
		assert_eq!(config.ingest.batch_size, 1_000);
		assert_eq!(config.cache.query_ttl_secs, 1_800);
	}

	#[test]
	fn api_prefix_must_be_rooted() {
		let layer = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: None,
				port: None,
				api_prefix: Some("api/v1".to_string()),
			}),
			..Default::default()
		};
		assert!(finalize(layer).is_err());
	}
}
