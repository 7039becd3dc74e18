// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Test helpers shared by this crate's tests and downstream crates.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::migrations::run_migrations;

/// Create a single-connection in-memory pool with the schema applied.
///
/// A single connection keeps the in-memory database alive and visible to
/// every query in the test.
pub async fn test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.expect("valid sqlite options")
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool");

	run_migrations(&pool).await.expect("migrations apply");
	pool
}
