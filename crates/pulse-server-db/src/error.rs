// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl DbError {
	/// Whether the underlying driver error is a unique constraint violation.
	pub fn is_unique_violation(&self) -> bool {
		matches!(
			self,
			DbError::Sqlx(sqlx::Error::Database(db)) if db.is_unique_violation()
		)
	}
}

pub type Result<T> = std::result::Result<T, DbError>;
