// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Configuration sources: built-in defaults, an optional TOML file, and
//! environment variables.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	CacheConfigLayer, CorsConfigLayer, DatabaseConfigLayer, HttpConfigLayer, IngestConfigLayer,
	LoggingConfigLayer, RateLimitConfigLayer,
};

/// Source precedence; higher values override lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 0,
	File = 1,
	Environment = 2,
}

pub trait ConfigSource {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults. Produces an empty layer; defaults materialize in
/// each section's `finalize`.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML config file. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// The conventional system location.
	pub fn system() -> Self {
		Self::new("/etc/pulse/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml"
	}

	fn precedence(&self) -> Precedence {
		Precedence::File
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		let raw = match std::fs::read_to_string(&self.path) {
			Ok(raw) => raw,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Ok(ServerConfigLayer::default());
			}
			Err(e) => {
				return Err(ConfigError::Io {
					path: self.path.display().to_string(),
					source: e,
				});
			}
		};

		toml::from_str(&raw).map_err(|e| ConfigError::Parse {
			path: self.path.display().to_string(),
			source: e,
		})
	}
}

/// Environment variables, using the deployment-facing flat names.
pub struct EnvSource;

impl EnvSource {
	fn var(name: &str) -> Option<String> {
		std::env::var(name).ok().filter(|v| !v.is_empty())
	}

	fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
		match Self::var(name) {
			None => Ok(None),
			Some(raw) => raw.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				name: name.to_string(),
				message: format!("could not parse {raw:?}"),
			}),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: Self::var("HOST"),
				port: Self::parse_var("PORT")?,
				api_prefix: Self::var("API_PREFIX"),
			}),
			database: Some(DatabaseConfigLayer {
				url: Self::var("DATABASE_URL"),
			}),
			ingest: Some(IngestConfigLayer {
				batch_size: Self::parse_var("EVENT_BATCH_SIZE")?,
				buffer_timeout_ms: Self::parse_var("EVENT_BUFFER_TIMEOUT_MS")?,
				worker_concurrency: Self::parse_var("EVENT_WORKER_CONCURRENCY")?,
			}),
			rate_limit: Some(RateLimitConfigLayer {
				window_ms: Self::parse_var("RATE_LIMIT_WINDOW_MS")?,
				max_requests: Self::parse_var("RATE_LIMIT_MAX_REQUESTS")?,
			}),
			cache: Some(CacheConfigLayer {
				default_ttl_secs: Self::parse_var("CACHE_TTL")?,
				query_ttl_secs: Self::parse_var("QUERY_CACHE_TTL")?,
			}),
			cors: Some(CorsConfigLayer {
				origin: Self::var("CORS_ORIGIN"),
			}),
			logging: Some(LoggingConfigLayer {
				level: Self::var("LOG_LEVEL"),
				environment: Self::var("ENVIRONMENT"),
			}),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_toml_file_is_empty_layer() {
		let source = TomlSource::new("/nonexistent/pulse-test/server.toml");
		let layer = source.load().unwrap();
		assert!(layer.http.is_none());
		assert!(layer.database.is_none());
	}

	#[test]
	fn toml_parses_sections() {
		let dir = std::env::temp_dir().join("pulse-config-test");
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("server.toml");
		std::fs::write(
			&path,
			"[http]\nport = 4100\n\n[ingest]\nbatch_size = 250\n",
		)
		.unwrap();

		let layer = TomlSource::new(&path).load().unwrap();
		assert_eq!(layer.http.unwrap().port, Some(4100));
		assert_eq!(layer.ingest.unwrap().batch_size, Some(250));

		std::fs::remove_file(&path).ok();
	}

	#[test]
	fn precedence_ordering() {
		assert!(Precedence::Environment > Precedence::File);
		assert!(Precedence::File > Precedence::Defaults);
	}
}
