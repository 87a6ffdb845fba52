// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialFactoryConfigLayer {
	pub min_token_length: Option<usize>,
	pub token_ttl_secs: Option<u64>,
	pub gc_sync_threshold: Option<usize>,
	pub gc_limit: Option<usize>,
	pub fetch_deadline_secs: Option<u64>,
}

impl CredentialFactoryConfigLayer {
	pub fn merge(&mut self, other: CredentialFactoryConfigLayer) {
		if other.min_token_length.is_some() {
			self.min_token_length = other.min_token_length;
		}
		if other.token_ttl_secs.is_some() {
			self.token_ttl_secs = other.token_ttl_secs;
		}
		if other.gc_sync_threshold.is_some() {
			self.gc_sync_threshold = other.gc_sync_threshold;
		}
		if other.gc_limit.is_some() {
			self.gc_limit = other.gc_limit;
		}
		if other.fetch_deadline_secs.is_some() {
			self.fetch_deadline_secs = other.fetch_deadline_secs;
		}
	}

	pub fn finalize(self) -> Result<CredentialFactoryConfig, ConfigError> {
		let defaults = CredentialFactoryConfig::default();
		let config = CredentialFactoryConfig {
			min_token_length: self.min_token_length.unwrap_or(defaults.min_token_length),
			token_ttl: self
				.token_ttl_secs
				.map(Duration::from_secs)
				.unwrap_or(defaults.token_ttl),
			gc_sync_threshold: self.gc_sync_threshold.unwrap_or(defaults.gc_sync_threshold),
			gc_limit: self.gc_limit.unwrap_or(defaults.gc_limit),
			fetch_deadline: self
				.fetch_deadline_secs
				.map(Duration::from_secs)
				.unwrap_or(defaults.fetch_deadline),
		};

		if config.min_token_length == 0 {
			return Err(ConfigError::InvalidValue {
				key: "credential_factory.min_token_length".to_string(),
				message: "must be at least 1".to_string(),
			});
		}
		if config.token_ttl.is_zero() {
			return Err(ConfigError::InvalidValue {
				key: "credential_factory.token_ttl_secs".to_string(),
				message: "must be at least 1".to_string(),
			});
		}
		Ok(config)
	}
}

/// Tunables of the bearer token exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialFactoryConfig {
	pub min_token_length: usize,
	pub token_ttl: Duration,
	/// Entry count above which authorize collects garbage before writing.
	pub gc_sync_threshold: usize,
	/// Most expired entries removed by one collection.
	pub gc_limit: usize,
	pub fetch_deadline: Duration,
}

impl Default for CredentialFactoryConfig {
	fn default() -> Self {
		Self {
			min_token_length: 40,
			token_ttl: Duration::from_secs(60),
			gc_sync_threshold: 25,
			gc_limit: 30,
			fetch_deadline: Duration::from_secs(28),
		}
	}
}
