// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Creates a new HTTP client with the standard Warden User-Agent header.
pub fn new_client() -> Client {
	builder().build().expect("failed to build HTTP client")
}

/// Creates a new HTTP client builder with the standard Warden User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a custom timeout and the standard User-Agent.
pub fn new_client_with_timeout(timeout: Duration) -> Client {
	builder()
		.timeout(timeout)
		.build()
		.expect("failed to build HTTP client")
}

/// Returns the standard Warden User-Agent string.
///
/// Format: `warden/{os}-{arch}/{version}`
pub fn user_agent() -> String {
	format!(
		"warden/{}-{}/{}",
		std::env::consts::OS,
		std::env::consts::ARCH,
		env!("CARGO_PKG_VERSION")
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		let parts: Vec<&str> = ua.split('/').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "warden");
		assert!(parts[1].contains('-'));
		assert_eq!(parts[2], env!("CARGO_PKG_VERSION"));
	}

	#[test]
	fn builder_builds() {
		assert!(builder().timeout(Duration::from_secs(5)).build().is_ok());
	}
}
