// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Analytics query engines: funnel, retention, metrics, user journey,
//! and event summary, layered over the event store with a read-through
//! result cache.
//!
//! Every operator derives a deterministic cache key from its full
//! parameter set. Cache failures (read or write) degrade to direct
//! computation with a warning; they never fail the request.

pub mod cache_key;
pub mod engine;
pub mod types;

pub use cache_key::cache_key;
pub use engine::AnalyticsEngine;
pub use types::{
	EventMetrics, EventSummary, EventSummaryRow, FunnelAnalytics, FunnelStepResult, JourneyEvent,
	MetricsBucket, RetentionAnalytics, RetentionDay, UserJourney, UserSummary,
};
