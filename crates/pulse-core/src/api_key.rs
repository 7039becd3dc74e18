// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! API keys and permissions.
//!
//! Keys authenticate producers and dashboards. The raw key is 32 random
//! bytes hex-encoded, shown exactly once at creation; rows store only its
//! SHA-256 hash. A key is scoped to an organization and optionally to a
//! single project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::{OrgId, ProjectId};

/// A permission grantable to an API key. `Admin` implies all others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
	Read,
	Write,
	Admin,
	Analytics,
}

impl Permission {
	pub fn as_str(&self) -> &'static str {
		match self {
			Permission::Read => "read",
			Permission::Write => "write",
			Permission::Admin => "admin",
			Permission::Analytics => "analytics",
		}
	}
}

impl std::fmt::Display for Permission {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl std::str::FromStr for Permission {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"read" => Ok(Permission::Read),
			"write" => Ok(Permission::Write),
			"admin" => Ok(Permission::Admin),
			"analytics" => Ok(Permission::Analytics),
			_ => Err(format!("unknown permission: {s}")),
		}
	}
}

/// An API key row. `key_hash` is the SHA-256 of the raw key; the raw key
/// itself is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
	pub id: Uuid,
	pub name: String,
	pub org_id: OrgId,
	pub project_id: Option<ProjectId>,
	pub key_hash: String,
	pub permissions: Vec<Permission>,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
	/// Whether this key grants `permission`. `Admin` implies all.
	pub fn has_permission(&self, permission: Permission) -> bool {
		self.permissions.contains(&Permission::Admin) || self.permissions.contains(&permission)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn key_with(permissions: Vec<Permission>) -> ApiKey {
		ApiKey {
			id: Uuid::new_v4(),
			name: "test".to_string(),
			org_id: OrgId::new("org").unwrap(),
			project_id: None,
			key_hash: "hash".to_string(),
			permissions,
			is_active: true,
			created_at: Utc::now(),
			last_used_at: None,
		}
	}

	#[test]
	fn admin_implies_all_permissions() {
		let key = key_with(vec![Permission::Admin]);
		assert!(key.has_permission(Permission::Read));
		assert!(key.has_permission(Permission::Write));
		assert!(key.has_permission(Permission::Analytics));
		assert!(key.has_permission(Permission::Admin));
	}

	#[test]
	fn non_admin_permissions_are_exact() {
		let key = key_with(vec![Permission::Read, Permission::Analytics]);
		assert!(key.has_permission(Permission::Read));
		assert!(key.has_permission(Permission::Analytics));
		assert!(!key.has_permission(Permission::Write));
		assert!(!key.has_permission(Permission::Admin));
	}

	#[test]
	fn permission_str_roundtrip() {
		for p in [
			Permission::Read,
			Permission::Write,
			Permission::Admin,
			Permission::Analytics,
		] {
			let parsed: Permission = p.as_str().parse().unwrap();
			assert_eq!(parsed, p);
		}
		assert!("owner".parse::<Permission>().is_err());
	}
}
