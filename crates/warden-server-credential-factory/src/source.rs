// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use warden_aws::{
	AllDayMinter, AwsResult, AwsSession, BaseCredentials, CloudApi, CredentialSet, MintPolicy,
};
use warden_common_http::RetryConfig;
use warden_server_config::AwsConfig;

/// Where redeemed tokens get their credentials.
#[async_trait]
pub trait CredentialSource: Send + Sync {
	/// Credentials for `role_name` in the broker's own account.
	async fn mint(
		&self,
		role_name: &str,
		session_name: &str,
		cancel: CancellationToken,
	) -> AwsResult<CredentialSet>;
}

/// Twelve-hour credentials from [`AllDayMinter`], starting from the broker's
/// base credentials on every call.
pub struct AllDaySource {
	api: Arc<dyn CloudApi>,
	base: Arc<dyn BaseCredentials>,
	user_name: String,
	probe: RetryConfig,
	policy: MintPolicy,
}

impl fmt::Debug for AllDaySource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AllDaySource")
			.field("user_name", &self.user_name)
			.field("probe", &self.probe)
			.field("policy", &self.policy)
			.finish_non_exhaustive()
	}
}

impl AllDaySource {
	pub fn new(
		api: Arc<dyn CloudApi>,
		base: Arc<dyn BaseCredentials>,
		user_name: impl Into<String>,
	) -> Self {
		Self {
			api,
			base,
			user_name: user_name.into(),
			probe: RetryConfig::fixed(18, std::time::Duration::from_secs(1)),
			policy: MintPolicy::default(),
		}
	}

	pub fn from_config(
		api: Arc<dyn CloudApi>,
		base: Arc<dyn BaseCredentials>,
		config: &AwsConfig,
	) -> Self {
		let policy = MintPolicy {
			create: config.access_key_policy(),
			delete_all_after: config.access_key_delete_all_after,
			..MintPolicy::default()
		};
		Self::new(api, base, config.credential_factory_user.clone())
			.with_probe_policy(config.probe_policy())
			.with_mint_policy(policy)
	}

	pub fn with_probe_policy(mut self, probe: RetryConfig) -> Self {
		self.probe = probe;
		self
	}

	pub fn with_mint_policy(mut self, policy: MintPolicy) -> Self {
		self.policy = policy;
		self
	}
}

#[async_trait]
impl CredentialSource for AllDaySource {
	#[instrument(skip(self, session_name, cancel))]
	async fn mint(
		&self,
		role_name: &str,
		session_name: &str,
		cancel: CancellationToken,
	) -> AwsResult<CredentialSet> {
		let base = self.base.base_credentials().await?;
		let account_id = base.account_id().to_string();
		let session = AwsSession::new(Arc::clone(&self.api), base)
			.with_probe_policy(self.probe.clone())
			.with_cancellation(cancel);
		AllDayMinter::new(session, self.user_name.clone())
			.with_policy(self.policy.clone())
			.mint(&account_id, role_name, session_name)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_aws::testing::FakeCloud;
	use warden_aws::{Principal, StaticBaseCredentials};

	#[tokio::test]
	async fn test_mints_in_base_account_and_cleans_up() {
		let cloud = Arc::new(FakeCloud::new());
		cloud.add_user("CredentialFactory");
		let base = cloud.seed_credentials("111111111111", Principal::Role("Intranet".to_string()));
		let source = AllDaySource::new(
			cloud.clone(),
			Arc::new(StaticBaseCredentials(base)),
			"CredentialFactory",
		)
		.with_probe_policy(RetryConfig::immediate(3))
		.with_mint_policy(MintPolicy::immediate());

		let creds = source
			.mint("Administrator", "alice@example.com", CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(creds.account_id(), "111111111111");
		assert_eq!(creds.role_name(), Some("Administrator"));
		assert!(cloud.access_keys("CredentialFactory").is_empty());
	}
}
