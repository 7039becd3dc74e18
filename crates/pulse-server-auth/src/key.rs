// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Key material generation and hashing.
//!
//! Raw keys are 32 bytes (256 bits) drawn from the OS RNG, hex-encoded
//! to 64 characters. Rows store the SHA-256 hash of the raw key, so a
//! leaked database does not leak usable keys.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a raw key.
const KEY_BYTES: usize = 32;

/// Generate a fresh raw API key. Shown to the caller exactly once.
pub fn generate_raw_key() -> String {
	let mut bytes = [0u8; KEY_BYTES];
	OsRng.fill_bytes(&mut bytes);
	hex::encode(bytes)
}

/// SHA-256 hash of a raw key, hex-encoded, as stored in `api_keys`.
pub fn hash_key(raw_key: &str) -> String {
	hex::encode(Sha256::digest(raw_key.as_bytes()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn raw_keys_are_64_hex_chars() {
		let key = generate_raw_key();
		assert_eq!(key.len(), 64);
		assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn raw_keys_are_unique() {
		let a = generate_raw_key();
		let b = generate_raw_key();
		assert_ne!(a, b);
	}

	proptest! {
		#[test]
		fn hash_is_deterministic(input in ".*") {
			prop_assert_eq!(hash_key(&input), hash_key(&input));
		}

		#[test]
		fn hash_is_64_hex_chars(input in ".*") {
			let hash = hash_key(&input);
			prop_assert_eq!(hash.len(), 64);
			prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
		}
	}
}
