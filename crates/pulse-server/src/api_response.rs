// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Response envelopes and the error-to-status mapping.
//!
//! Success: `{success: true, data, pagination?}`.
//! Failure: `{success: false, error, message?, details?, retryAfter?}`.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;

use pulse_core::PulseError;

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
	pub page: u32,
	pub limit: u32,
	pub total: u64,
	pub total_pages: u64,
}

impl Pagination {
	pub fn new(page: u32, limit: u32, total: u64) -> Self {
		let total_pages = if limit == 0 {
			0
		} else {
			total.div_ceil(limit as u64)
		};
		Self {
			page,
			limit,
			total,
			total_pages,
		}
	}
}

#[derive(Debug, Serialize)]
struct SuccessBody<T: Serialize> {
	success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pagination: Option<Pagination>,
}

/// 200 OK with a data payload.
pub fn ok<T: Serialize>(data: T) -> Response {
	(
		StatusCode::OK,
		Json(SuccessBody {
			success: true,
			data: Some(data),
			message: None,
			pagination: None,
		}),
	)
		.into_response()
}

/// 200 OK with a data payload and pagination.
pub fn ok_paginated<T: Serialize>(data: T, pagination: Pagination) -> Response {
	(
		StatusCode::OK,
		Json(SuccessBody {
			success: true,
			data: Some(data),
			message: None,
			pagination: Some(pagination),
		}),
	)
		.into_response()
}

/// 201 Created with a data payload.
pub fn created<T: Serialize>(data: T) -> Response {
	(
		StatusCode::CREATED,
		Json(SuccessBody {
			success: true,
			data: Some(data),
			message: None,
			pagination: None,
		}),
	)
		.into_response()
}

/// 200 OK with a message only.
pub fn ok_message(message: impl Into<String>) -> Response {
	(
		StatusCode::OK,
		Json(SuccessBody::<()> {
			success: true,
			data: None,
			message: Some(message.into()),
			pagination: None,
		}),
	)
		.into_response()
}

#[derive(Debug, Serialize)]
struct FailureBody {
	success: bool,
	error: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	message: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	details: Vec<String>,
	#[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
	retry_after: Option<u64>,
}

/// Domain error as an HTTP response. Wraps [`PulseError`] so handlers
/// can return `Result<Response, ApiError>` with `?`.
#[derive(Debug)]
pub struct ApiError(pub PulseError);

impl From<PulseError> for ApiError {
	fn from(error: PulseError) -> Self {
		Self(error)
	}
}

impl From<pulse_server_db::DbError> for ApiError {
	fn from(error: pulse_server_db::DbError) -> Self {
		use pulse_server_db::DbError;
		Self(match error {
			DbError::NotFound(message) => PulseError::NotFound(message),
			DbError::Conflict(message) => PulseError::Conflict(message),
			other => {
				tracing::warn!(error = %other, "repository error");
				PulseError::TransientDependency("storage unavailable".to_string())
			}
		})
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, error, message, details, retry_after) = match self.0 {
			PulseError::InvalidInput { message, details } => (
				StatusCode::BAD_REQUEST,
				"invalid_input",
				Some(message),
				details,
				None,
			),
			PulseError::Unauthorized(message) => (
				StatusCode::UNAUTHORIZED,
				"unauthorized",
				Some(message),
				Vec::new(),
				None,
			),
			PulseError::Forbidden(message) => (
				StatusCode::FORBIDDEN,
				"forbidden",
				Some(message),
				Vec::new(),
				None,
			),
			PulseError::NotFound(message) => (
				StatusCode::NOT_FOUND,
				"not_found",
				Some(message),
				Vec::new(),
				None,
			),
			PulseError::Conflict(message) => (
				StatusCode::CONFLICT,
				"conflict",
				Some(message),
				Vec::new(),
				None,
			),
			PulseError::RateLimited { retry_after_secs } => (
				StatusCode::TOO_MANY_REQUESTS,
				"rate_limited",
				Some("rate limit exceeded".to_string()),
				Vec::new(),
				Some(retry_after_secs),
			),
			PulseError::TransientDependency(_) | PulseError::Internal(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"internal_error",
				Some("internal server error".to_string()),
				Vec::new(),
				None,
			),
		};

		(
			status,
			Json(FailureBody {
				success: false,
				error,
				message,
				details,
				retry_after,
			}),
		)
			.into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pagination_rounds_up() {
		let p = Pagination::new(1, 50, 101);
		assert_eq!(p.total_pages, 3);

		let p = Pagination::new(1, 50, 100);
		assert_eq!(p.total_pages, 2);
	}

	#[test]
	fn error_statuses_follow_the_taxonomy() {
		let cases = [
			(PulseError::invalid("x"), StatusCode::BAD_REQUEST),
			(
				PulseError::Unauthorized("x".into()),
				StatusCode::UNAUTHORIZED,
			),
			(PulseError::Forbidden("x".into()), StatusCode::FORBIDDEN),
			(PulseError::NotFound("x".into()), StatusCode::NOT_FOUND),
			(PulseError::Conflict("x".into()), StatusCode::CONFLICT),
			(
				PulseError::RateLimited {
					retry_after_secs: 9,
				},
				StatusCode::TOO_MANY_REQUESTS,
			),
			(
				PulseError::Internal("secret detail".into()),
				StatusCode::INTERNAL_SERVER_ERROR,
			),
		];
		for (error, status) in cases {
			let response = ApiError(error).into_response();
			assert_eq!(response.status(), status);
		}
	}
}
