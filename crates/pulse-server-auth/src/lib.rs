// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! API key authentication, permission checks, and tenant scoping.
//!
//! Requests carry an `X-API-Key` header. The raw key is hashed and
//! looked up; only active keys authenticate. Tenant scope is always
//! taken from the key, never from client-supplied values.

pub mod authenticator;
pub mod context;
pub mod key;

pub use authenticator::Authenticator;
pub use context::AuthContext;
pub use key::{generate_raw_key, hash_key};

/// Header carrying the raw API key.
pub const API_KEY_HEADER: &str = "x-api-key";
