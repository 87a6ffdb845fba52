// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cloud account and polling configuration.

use std::time::Duration;

use serde::Deserialize;
use warden_common_http::RetryConfig;

use crate::error::ConfigError;

pub const DEFAULT_CREDENTIAL_FACTORY_USER: &str = "CredentialFactory";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsConfigLayer {
	pub region: Option<String>,
	pub management_account_id: Option<String>,
	pub credential_factory_user: Option<String>,
	pub probe_attempts: Option<u32>,
	pub probe_delay_ms: Option<u64>,
	pub access_key_attempts: Option<u32>,
	pub access_key_delete_all_after: Option<u32>,
	pub access_key_delay_ms: Option<u64>,
}

impl AwsConfigLayer {
	pub fn merge(&mut self, other: AwsConfigLayer) {
		if other.region.is_some() {
			self.region = other.region;
		}
		if other.management_account_id.is_some() {
			self.management_account_id = other.management_account_id;
		}
		if other.credential_factory_user.is_some() {
			self.credential_factory_user = other.credential_factory_user;
		}
		if other.probe_attempts.is_some() {
			self.probe_attempts = other.probe_attempts;
		}
		if other.probe_delay_ms.is_some() {
			self.probe_delay_ms = other.probe_delay_ms;
		}
		if other.access_key_attempts.is_some() {
			self.access_key_attempts = other.access_key_attempts;
		}
		if other.access_key_delete_all_after.is_some() {
			self.access_key_delete_all_after = other.access_key_delete_all_after;
		}
		if other.access_key_delay_ms.is_some() {
			self.access_key_delay_ms = other.access_key_delay_ms;
		}
	}

	pub fn finalize(self) -> Result<AwsConfig, ConfigError> {
		let config = AwsConfig {
			region: self.region.filter(|s| !s.is_empty()),
			management_account_id: self.management_account_id.filter(|s| !s.is_empty()),
			credential_factory_user: self
				.credential_factory_user
				.filter(|s| !s.is_empty())
				.unwrap_or_else(|| DEFAULT_CREDENTIAL_FACTORY_USER.to_string()),
			probe_attempts: self.probe_attempts.unwrap_or(18),
			probe_delay: Duration::from_millis(self.probe_delay_ms.unwrap_or(1000)),
			access_key_attempts: self.access_key_attempts.unwrap_or(8),
			access_key_delete_all_after: self.access_key_delete_all_after.unwrap_or(4),
			access_key_delay: Duration::from_millis(self.access_key_delay_ms.unwrap_or(1000)),
		};
		config.validate()?;
		Ok(config)
	}
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
	pub region: Option<String>,
	pub management_account_id: Option<String>,
	pub credential_factory_user: String,
	pub probe_attempts: u32,
	pub probe_delay: Duration,
	pub access_key_attempts: u32,
	pub access_key_delete_all_after: u32,
	pub access_key_delay: Duration,
}

impl Default for AwsConfig {
	fn default() -> Self {
		Self {
			region: None,
			management_account_id: None,
			credential_factory_user: DEFAULT_CREDENTIAL_FACTORY_USER.to_string(),
			probe_attempts: 18,
			probe_delay: Duration::from_secs(1),
			access_key_attempts: 8,
			access_key_delete_all_after: 4,
			access_key_delay: Duration::from_secs(1),
		}
	}
}

impl AwsConfig {
	/// Fixed-delay policy for waiting until fresh credentials work.
	pub fn probe_policy(&self) -> RetryConfig {
		RetryConfig::fixed(self.probe_attempts, self.probe_delay)
	}

	/// Jittered exponential policy for access key creation under quota pressure.
	pub fn access_key_policy(&self) -> RetryConfig {
		RetryConfig::exponential(
			self.access_key_attempts,
			self.access_key_delay,
			self.access_key_delay * 8,
		)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.probe_attempts == 0 {
			return Err(ConfigError::InvalidValue {
				key: "aws.probe_attempts".to_string(),
				message: "must be at least 1".to_string(),
			});
		}
		if self.access_key_attempts == 0 {
			return Err(ConfigError::InvalidValue {
				key: "aws.access_key_attempts".to_string(),
				message: "must be at least 1".to_string(),
			});
		}
		if self.access_key_delete_all_after >= self.access_key_attempts {
			return Err(ConfigError::Validation(format!(
				"aws.access_key_delete_all_after ({}) must be less than aws.access_key_attempts ({})",
				self.access_key_delete_all_after, self.access_key_attempts
			)));
		}
		if let Some(id) = &self.management_account_id {
			if id.len() != 12 || !id.bytes().all(|b| b.is_ascii_digit()) {
				return Err(ConfigError::InvalidValue {
					key: "aws.management_account_id".to_string(),
					message: format!("'{id}' is not a 12-digit account id"),
				});
			}
		}
		Ok(())
	}
}
