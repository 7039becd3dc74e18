// Copyright (c) 2025 Pulse Contributors
// SPDX-License-Identifier: MIT

//! Deterministic cache key derivation.
//!
//! Keys embed every dimension that affects the result: namespace, then
//! sorted `name:value` pairs joined by `:`. Two structurally identical
//! queries always derive the same key regardless of parameter order.

/// Build a cache key from a namespace and parameter pairs.
pub fn cache_key(namespace: &str, params: &[(&str, String)]) -> String {
	let mut pairs: Vec<String> = params
		.iter()
		.map(|(name, value)| format!("{name}:{value}"))
		.collect();
	pairs.sort();
	format!("{namespace}:{}", pairs.join(":"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn parameter_order_does_not_matter() {
		let a = cache_key(
			"metrics",
			&[
				("event", "page_view".to_string()),
				("interval", "daily".to_string()),
			],
		);
		let b = cache_key(
			"metrics",
			&[
				("interval", "daily".to_string()),
				("event", "page_view".to_string()),
			],
		);
		assert_eq!(a, b);
	}

	#[test]
	fn different_values_produce_different_keys() {
		let a = cache_key("metrics", &[("event", "page_view".to_string())]);
		let b = cache_key("metrics", &[("event", "purchase".to_string())]);
		assert_ne!(a, b);
	}

	proptest! {
		#[test]
		fn keys_are_deterministic(
			ns in "[a-z_]{1,16}",
			k1 in "[a-z]{1,8}", v1 in "[a-z0-9]{0,12}",
			k2 in "[a-z]{1,8}", v2 in "[a-z0-9]{0,12}",
		) {
			let forward = cache_key(&ns, &[(&k1, v1.clone()), (&k2, v2.clone())]);
			let reverse = cache_key(&ns, &[(&k2, v2), (&k1, v1)]);
			prop_assert_eq!(forward, reverse);
		}
	}
}
