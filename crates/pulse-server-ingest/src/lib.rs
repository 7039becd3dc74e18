// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Event ingestion pipeline.
//!
//! Raw payloads are validated, scoped to the caller's tenant,
//! fingerprinted and deduplicated against the cache, absorbed into
//! per-tenant buffers, and handed to the durable queue in coalesced
//! batches. A queue worker persists each batch, bumps the realtime
//! counters, and fans the events out to the realtime bus.
//!
//! Everything hangs off an explicit [`IngestionContext`] constructed
//! once at startup and injected; there is no process-wide state.

pub mod buffer;
pub mod context;
pub mod persist;
pub mod sweeper;

pub use buffer::TenantBuffers;
pub use context::{ClientInfo, IngestReport, IngestionContext, SkippedEvent};
pub use persist::{PersistBatch, PersistEventsHandler, EVENT_PERSIST_TOPIC};
pub use sweeper::BufferSweeper;
