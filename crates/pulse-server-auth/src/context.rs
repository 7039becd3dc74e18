// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

use uuid::Uuid;

use pulse_core::{OrgId, Permission, ProjectId, PulseError, Tenant};

/// Authenticated caller context derived from an API key.
///
/// Handlers read tenant scope from here and never from request bodies or
/// query parameters.
#[derive(Debug, Clone)]
pub struct AuthContext {
	pub key_id: Uuid,
	pub org_id: OrgId,
	pub project_id: Option<ProjectId>,
	pub permissions: Vec<Permission>,
}

impl AuthContext {
	/// Require `permission`, treating `admin` as implying all.
	pub fn require_permission(&self, permission: Permission) -> Result<(), PulseError> {
		if self.permissions.contains(&Permission::Admin)
			|| self.permissions.contains(&permission)
		{
			Ok(())
		} else {
			Err(PulseError::Forbidden(format!(
				"missing {permission} permission"
			)))
		}
	}

	/// The full tenant pair. Org-wide keys without a project cannot use
	/// project-scoped routes.
	pub fn tenant(&self) -> Result<Tenant, PulseError> {
		match &self.project_id {
			Some(project_id) => Ok(Tenant::new(self.org_id.clone(), project_id.clone())),
			None => Err(PulseError::Unauthorized(
				"API key is not scoped to a project".to_string(),
			)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ctx(permissions: Vec<Permission>, project: Option<&str>) -> AuthContext {
		AuthContext {
			key_id: Uuid::new_v4(),
			org_id: OrgId::new("org1").unwrap(),
			project_id: project.map(|p| ProjectId::new(p).unwrap()),
			permissions,
		}
	}

	#[test]
	fn admin_implies_all() {
		let ctx = ctx(vec![Permission::Admin], Some("web"));
		assert!(ctx.require_permission(Permission::Read).is_ok());
		assert!(ctx.require_permission(Permission::Write).is_ok());
		assert!(ctx.require_permission(Permission::Analytics).is_ok());
	}

	#[test]
	fn missing_permission_is_forbidden() {
		let ctx = ctx(vec![Permission::Read], Some("web"));
		let err = ctx.require_permission(Permission::Write).unwrap_err();
		assert!(matches!(err, PulseError::Forbidden(_)));
	}

	#[test]
	fn org_wide_key_has_no_tenant() {
		let org_wide = ctx(vec![Permission::Read], None);
		assert!(matches!(
			org_wide.tenant().unwrap_err(),
			PulseError::Unauthorized(_)
		));

		let scoped = ctx(vec![], Some("web"));
		assert_eq!(scoped.tenant().unwrap().key(), "org1:web");
	}
}
