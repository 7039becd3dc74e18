// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	#[error("Cache unavailable: {0}")]
	Unavailable(String),

	#[error("Invalid cache value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, CacheError>;
