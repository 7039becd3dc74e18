// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

use serde::Deserialize;

use crate::sections::{
	CacheConfigLayer, CorsConfigLayer, DatabaseConfigLayer, HttpConfigLayer, IngestConfigLayer,
	LoggingConfigLayer, RateLimitConfigLayer,
};

/// Partial server configuration as read from a single source.
///
/// Every field is optional; later sources override earlier ones
/// field-by-field via [`merge`](Self::merge).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub ingest: Option<IngestConfigLayer>,
	#[serde(default)]
	pub rate_limit: Option<RateLimitConfigLayer>,
	#[serde(default)]
	pub cache: Option<CacheConfigLayer>,
	#[serde(default)]
	pub cors: Option<CorsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.ingest, other.ingest, IngestConfigLayer::merge);
		merge_section(
			&mut self.rate_limit,
			other.rate_limit,
			RateLimitConfigLayer::merge,
		);
		merge_section(&mut self.cache, other.cache, CacheConfigLayer::merge);
		merge_section(&mut self.cors, other.cors, CorsConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl Fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(base), Some(other)) => merge(base, other),
		(None, Some(other)) => *base = Some(other),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_overrides_field_by_field() {
		let mut base = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: Some("127.0.0.1".to_string()),
				port: Some(3000),
				api_prefix: None,
			}),
			..Default::default()
		};

		base.merge(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				host: None,
				port: Some(8080),
				api_prefix: None,
			}),
			..Default::default()
		});

		let http = base.http.unwrap().finalize();
		assert_eq!(http.host, "127.0.0.1");
		assert_eq!(http.port, 8080);
	}

	#[test]
	fn merge_adopts_missing_sections() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite::memory:".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(
			base.database.unwrap().finalize().url,
			"sqlite::memory:"
		);
	}
}
