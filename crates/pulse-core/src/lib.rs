// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Core domain types for the Pulse event analytics backend.
//!
//! Everything here is storage- and transport-agnostic: tenants, events and
//! their fingerprints, property filters, funnels, and API keys. The server
//! crates layer persistence and HTTP on top of these types.

pub mod api_key;
pub mod error;
pub mod event;
pub mod filter;
pub mod funnel;
pub mod tenant;

pub use api_key::{ApiKey, Permission};
pub use error::{PulseError, Result};
pub use event::{
	Event, EventPayload, Fingerprint, MAX_BATCH_SIZE, MAX_FIELD_LENGTH, MAX_PROPERTIES_BYTES,
};
pub use filter::FilterExpr;
pub use funnel::{Funnel, FunnelStep, MAX_FUNNEL_STEPS, MIN_FUNNEL_STEPS};
pub use tenant::{OrgId, ProjectId, Tenant};
