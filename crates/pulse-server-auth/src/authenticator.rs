// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use tracing::{debug, warn};

use pulse_core::PulseError;
use pulse_server_db::ApiKeyStore;

use crate::context::AuthContext;
use crate::key::hash_key;

/// Authenticates raw API keys against the key store.
pub struct Authenticator<S: ApiKeyStore + 'static> {
	store: Arc<S>,
}

impl<S: ApiKeyStore + 'static> Authenticator<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self { store }
	}

	/// Resolve the `X-API-Key` header value into an [`AuthContext`].
	///
	/// Missing, unknown, or inactive keys all fail with `Unauthorized`;
	/// the message never distinguishes the cases. On success the key's
	/// `last_used_at` is touched in a fire-and-forget task.
	#[tracing::instrument(skip(self, raw_key))]
	pub async fn authenticate(&self, raw_key: Option<&str>) -> Result<AuthContext, PulseError> {
		let Some(raw_key) = raw_key.filter(|k| !k.is_empty()) else {
			return Err(PulseError::Unauthorized("API key required".to_string()));
		};

		let key_hash = hash_key(raw_key);
		let key = self
			.store
			.get_api_key_by_hash(&key_hash)
			.await
			.map_err(|e| {
				warn!(error = %e, "API key lookup failed");
				PulseError::TransientDependency("key store unavailable".to_string())
			})?;

		let Some(key) = key else {
			return Err(PulseError::Unauthorized("invalid API key".to_string()));
		};

		if !key.is_active {
			debug!(api_key_id = %key.id, "inactive API key rejected");
			return Err(PulseError::Unauthorized("invalid API key".to_string()));
		}

		let store = Arc::clone(&self.store);
		let key_id = key.id;
		tokio::spawn(async move {
			if let Err(e) = store.update_last_used(key_id).await {
				warn!(api_key_id = %key_id, error = %e, "failed to update API key last_used_at");
			}
		});

		Ok(AuthContext {
			key_id: key.id,
			org_id: key.org_id,
			project_id: key.project_id,
			permissions: key.permissions,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pulse_core::{OrgId, Permission, ProjectId};
	use pulse_server_db::{testing::test_pool, ApiKeyRepository};

	async fn setup() -> (Authenticator<ApiKeyRepository>, String) {
		let repo = Arc::new(ApiKeyRepository::new(test_pool().await));

		let raw = crate::key::generate_raw_key();
		repo.create_api_key(
			&OrgId::new("org1").unwrap(),
			Some(&ProjectId::new("web").unwrap()),
			"test key",
			&hash_key(&raw),
			&[Permission::Read, Permission::Write],
		)
		.await
		.unwrap();

		(Authenticator::new(repo), raw)
	}

	#[tokio::test]
	async fn valid_key_authenticates_with_tenant_scope() {
		let (auth, raw) = setup().await;

		let ctx = auth.authenticate(Some(&raw)).await.unwrap();
		assert_eq!(ctx.org_id.as_str(), "org1");
		assert_eq!(ctx.tenant().unwrap().key(), "org1:web");
		assert!(ctx.require_permission(Permission::Write).is_ok());
	}

	#[tokio::test]
	async fn missing_and_unknown_keys_are_unauthorized() {
		let (auth, _raw) = setup().await;

		assert!(matches!(
			auth.authenticate(None).await.unwrap_err(),
			PulseError::Unauthorized(_)
		));
		assert!(matches!(
			auth.authenticate(Some("")).await.unwrap_err(),
			PulseError::Unauthorized(_)
		));
		assert!(matches!(
			auth.authenticate(Some("not-a-real-key")).await.unwrap_err(),
			PulseError::Unauthorized(_)
		));
	}

	#[tokio::test]
	async fn deactivated_key_is_unauthorized() {
		let repo = Arc::new(ApiKeyRepository::new(test_pool().await));
		let raw = crate::key::generate_raw_key();
		let created = repo
			.create_api_key(
				&OrgId::new("org1").unwrap(),
				None,
				"k",
				&hash_key(&raw),
				&[],
			)
			.await
			.unwrap();

		let auth = Authenticator::new(Arc::clone(&repo));
		assert!(auth.authenticate(Some(&raw)).await.is_ok());

		repo.update_api_key(
			created.id,
			pulse_server_db::ApiKeyUpdate {
				is_active: Some(false),
				..Default::default()
			},
		)
		.await
		.unwrap();

		assert!(matches!(
			auth.authenticate(Some(&raw)).await.unwrap_err(),
			PulseError::Unauthorized(_)
		));
	}
}
