// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

mod cache;
mod database;
mod http;
mod ingest;
mod logging;
mod rate_limit;

pub use cache::{CacheConfig, CacheConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use ingest::{IngestConfig, IngestConfigLayer};
pub use logging::{CorsConfig, CorsConfigLayer, LoggingConfig, LoggingConfigLayer};
pub use rate_limit::{RateLimitConfig, RateLimitConfigLayer};
