// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

use pulse_server_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("Job failed: {message}")]
	Failed { message: String, retryable: bool },

	#[error("Queue storage error: {0}")]
	Db(#[from] DbError),
}

impl JobError {
	/// A failure worth retrying (dependency hiccup, timeout).
	pub fn retryable(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: true,
		}
	}

	/// A failure that will not succeed on retry (malformed payload).
	pub fn permanent(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: false,
		}
	}
}

pub type Result<T> = std::result::Result<T, JobError>;
