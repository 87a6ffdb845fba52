// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP listener and public origin.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 10;

/// HTTP server configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct HttpConfig {
	pub host: String,
	pub port: u16,
	/// Public origin browsers reach the broker on. The OIDC redirect URI and
	/// the console federation issuer are derived from it.
	pub base_url: String,
	/// Bound on every outbound call to the IdP and the federation endpoint.
	pub client_timeout: Duration,
}

impl Default for HttpConfig {
	fn default() -> Self {
		HttpConfigLayer::default().finalize()
	}
}

impl HttpConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	/// `base_url` joined with an absolute path, without doubling slashes.
	pub fn public_url(&self, path: &str) -> String {
		format!(
			"{}/{}",
			self.base_url.trim_end_matches('/'),
			path.trim_start_matches('/')
		)
	}
}

/// HTTP configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub base_url: Option<String>,
	#[serde(default)]
	pub client_timeout_secs: Option<u64>,
}

impl HttpConfigLayer {
	pub fn merge(&mut self, other: HttpConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.client_timeout_secs.is_some() {
			self.client_timeout_secs = other.client_timeout_secs;
		}
	}

	pub fn finalize(self) -> HttpConfig {
		let port = self.port.unwrap_or(8080);
		HttpConfig {
			host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
			port,
			base_url: self
				.base_url
				.unwrap_or_else(|| format!("http://localhost:{port}")),
			client_timeout: Duration::from_secs(
				self.client_timeout_secs
					.unwrap_or(DEFAULT_CLIENT_TIMEOUT_SECS),
			),
		}
	}
}
