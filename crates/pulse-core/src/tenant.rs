// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Tenant identifiers.
//!
//! All data and quotas are partitioned by the `(organization, project)`
//! pair. The identifiers are opaque non-empty strings supplied at key
//! creation time, never by event producers.

use serde::{Deserialize, Serialize};

use crate::error::PulseError;

/// Organization identifier. Opaque, non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(String);

impl OrgId {
	pub fn new(id: impl Into<String>) -> Result<Self, PulseError> {
		let id = id.into();
		if id.is_empty() {
			return Err(PulseError::invalid("orgId must not be empty"));
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for OrgId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for OrgId {
	type Err = PulseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

/// Project identifier. Opaque, non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
	pub fn new(id: impl Into<String>) -> Result<Self, PulseError> {
		let id = id.into();
		if id.is_empty() {
			return Err(PulseError::invalid("projectId must not be empty"));
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for ProjectId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for ProjectId {
	type Err = PulseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

/// The `(organization, project)` pair that scopes every query and quota.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenant {
	pub org_id: OrgId,
	pub project_id: ProjectId,
}

impl Tenant {
	pub fn new(org_id: OrgId, project_id: ProjectId) -> Self {
		Self { org_id, project_id }
	}

	/// Canonical tenant key, used for buffer map entries, cache key
	/// namespacing, and realtime room names.
	pub fn key(&self) -> String {
		format!("{}:{}", self.org_id, self.project_id)
	}
}

impl std::fmt::Display for Tenant {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.org_id, self.project_id)
	}
}
