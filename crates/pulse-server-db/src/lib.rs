// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! SQLite persistence for the Pulse server.
//!
//! This crate owns the three logical collections (`events`, `funnels`,
//! `api_keys`) plus the durable `queue_jobs` table, the connection pool,
//! and the embedded schema migrations.

pub mod api_key;
pub mod error;
pub mod event;
pub mod funnel;
pub mod migrations;
pub mod pool;
pub mod queue;
pub mod testing;

pub use api_key::{ApiKeyRepository, ApiKeyStore, ApiKeyUpdate};
pub use error::{DbError, Result};
pub use event::{
	BucketRow, EventNameSummary, EventRepository, EventStore, InsertOutcome, Interval, Occurrence,
	ScanFilter, ScanOrder, TimeRange,
};
pub use funnel::{FunnelRepository, FunnelStore};
pub use migrations::run_migrations;
pub use pool::create_pool;
pub use queue::{QueueCounts, QueueJob, QueueJobStatus, QueueRepository};
