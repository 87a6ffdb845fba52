// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Twelve-hour credentials in spite of the role chaining ceiling.
//!
//! STS caps sessions assumed from an assumed role at one hour. A session
//! assumed from an IAM user's access key is not chained, so the minter
//! creates a temporary key on a dedicated user, assumes the target role
//! from it for twelve hours, and deletes the key again.
//!
//! The key lives in a [`TemporaryAccessKey`] guard. It is deleted on every
//! exit path: explicitly on return, or from `Drop` if the mint future is
//! cancelled or unwinds.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use warden_common_http::{retry, retry_with_cancel, RetryConfig};

use crate::api::CloudApi;
use crate::credentials::{AccessKey, CredentialSet, Principal};
use crate::error::{AwsError, AwsResult};
use crate::session::AwsSession;

pub const ALL_DAY: Duration = Duration::from_secs(12 * 3600);

#[derive(Debug, Clone)]
pub struct MintPolicy {
	/// Total attempts at `CreateAccessKey`, including the first.
	pub create: RetryConfig,
	/// After this many failed attempts every key on the user is deleted to
	/// reclaim quota.
	pub delete_all_after: u32,
	pub release: RetryConfig,
}

impl Default for MintPolicy {
	fn default() -> Self {
		Self {
			create: RetryConfig::exponential(8, Duration::from_secs(1), Duration::from_secs(8)),
			delete_all_after: 4,
			release: RetryConfig::fixed(5, Duration::from_secs(1)),
		}
	}
}

impl MintPolicy {
	pub fn immediate() -> Self {
		Self {
			create: RetryConfig::immediate(8),
			delete_all_after: 4,
			release: RetryConfig::immediate(3),
		}
	}
}

pub struct AllDayMinter {
	session: AwsSession,
	user_name: String,
	policy: MintPolicy,
}

impl AllDayMinter {
	/// `session` must be allowed to manage access keys of `user_name`.
	pub fn new(session: AwsSession, user_name: impl Into<String>) -> Self {
		Self {
			session,
			user_name: user_name.into(),
			policy: MintPolicy::default(),
		}
	}

	pub fn with_policy(mut self, policy: MintPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn user_name(&self) -> &str {
		&self.user_name
	}

	/// Assume `role_name` in `account_id` for twelve hours.
	///
	/// The returned credentials have been probed. If the temporary key cannot
	/// be deleted afterwards the credentials are discarded and
	/// [`AwsError::AccessKeyCleanup`] is returned.
	#[instrument(skip(self, session_name), fields(user = %self.user_name))]
	pub async fn mint(
		&self,
		account_id: &str,
		role_name: &str,
		session_name: &str,
	) -> AwsResult<CredentialSet> {
		let key = self.create_access_key().await?;
		let minted = self
			.assume_with_key(&key, account_id, role_name, session_name)
			.await;
		let access_key_id = key.access_key_id().to_string();
		let released = key.release(&self.policy.release).await;

		match (minted, released) {
			(Ok(creds), Ok(())) => {
				info!(expiration = %creds.expiration(), "minted all-day credentials");
				Ok(creds)
			}
			(Err(e), _) => Err(e),
			(Ok(_), Err(e)) => Err(AwsError::AccessKeyCleanup {
				access_key_id,
				source: Box::new(e),
			}),
		}
	}

	async fn create_access_key(&self) -> AwsResult<TemporaryAccessKey> {
		let attempt = AtomicU32::new(0);
		let key = retry_with_cancel(
			&self.policy.create,
			self.session.cancellation(),
			|e: &AwsError| matches!(e, AwsError::LimitExceeded) || e.is_throttling(),
			|| {
				let n = attempt.fetch_add(1, Ordering::SeqCst);
				async move {
					if n > 0 && n == self.policy.delete_all_after {
						self.delete_all_access_keys().await?;
					}
					self.session
						.api()
						.create_access_key(self.session.credentials(), &self.user_name)
						.await
				}
			},
		)
		.await?;

		Ok(TemporaryAccessKey {
			api: Arc::clone(self.session.api()),
			owner: self.session.credentials().clone(),
			key,
			released: false,
		})
	}

	async fn delete_all_access_keys(&self) -> AwsResult<()> {
		let api = self.session.api();
		let owner = self.session.credentials();
		let keys = api.list_access_keys(owner, &self.user_name).await?;
		warn!(count = keys.len(), "access key quota exhausted, deleting all keys");
		for access_key_id in keys {
			if let Err(e) = api
				.delete_access_key(owner, &self.user_name, &access_key_id)
				.await
			{
				warn!(access_key_id = %access_key_id, error = %e, "failed to delete access key");
			}
		}
		Ok(())
	}

	async fn assume_with_key(
		&self,
		key: &TemporaryAccessKey,
		account_id: &str,
		role_name: &str,
		session_name: &str,
	) -> AwsResult<CredentialSet> {
		let user_session = self
			.session
			.derive(key.credentials(self.session.credentials().account_id()));
		user_session.wait_until_credentials_work().await?;

		let all_day = user_session
			.assume_role(account_id, role_name, session_name, ALL_DAY)
			.await?;
		Ok(all_day.credentials().clone())
	}
}

/// A static access key that is deleted when the guard goes away.
pub struct TemporaryAccessKey {
	api: Arc<dyn CloudApi>,
	owner: CredentialSet,
	key: AccessKey,
	released: bool,
}

impl TemporaryAccessKey {
	pub fn access_key_id(&self) -> &str {
		&self.key.access_key_id
	}

	/// The key as a credential set. Static keys do not expire, so the
	/// nominal expiry is an hour out.
	pub fn credentials(&self, account_id: &str) -> CredentialSet {
		CredentialSet::new(
			self.key.access_key_id.clone(),
			self.key.secret_access_key.clone(),
			None,
			Utc::now() + chrono::Duration::hours(1),
			account_id,
			Principal::User(self.key.user_name.clone()),
		)
	}

	/// Delete the key, retrying throttled calls. A key that is already gone
	/// counts as deleted.
	pub async fn release(mut self, policy: &RetryConfig) -> AwsResult<()> {
		let result = retry(policy, || {
			self.api
				.delete_access_key(&self.owner, &self.key.user_name, &self.key.access_key_id)
		})
		.await;

		match result {
			Ok(()) => {}
			Err(e) if e.code() == Some("NoSuchEntity") => {}
			Err(e) => {
				error!(access_key_id = %self.key.access_key_id, error = %e, "failed to delete temporary access key");
				return Err(e);
			}
		}
		self.released = true;
		Ok(())
	}
}

impl Drop for TemporaryAccessKey {
	fn drop(&mut self) {
		if self.released {
			return;
		}
		let api = Arc::clone(&self.api);
		let owner = self.owner.clone();
		let user_name = self.key.user_name.clone();
		let access_key_id = self.key.access_key_id.clone();

		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				warn!(access_key_id = %access_key_id, "temporary access key dropped unreleased, deleting in background");
				handle.spawn(async move {
					if let Err(e) = api.delete_access_key(&owner, &user_name, &access_key_id).await {
						error!(access_key_id = %access_key_id, error = %e, "background access key deletion failed");
					}
				});
			}
			Err(_) => {
				error!(access_key_id = %access_key_id, user = %user_name, "temporary access key leaked: no runtime to delete it");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::roles;
	use crate::testing::FakeCloud;
	use tokio_util::sync::CancellationToken;

	const BROKER: &str = "100000000000";
	const TARGET: &str = "200000000000";
	const USER: &str = "CredentialFactory";

	fn setup() -> (Arc<FakeCloud>, AllDayMinter) {
		let cloud = Arc::new(FakeCloud::new().with_management_account(BROKER));
		cloud.add_account(BROKER, "management", &[]);
		cloud.add_account(TARGET, "payments", &[]);
		cloud.add_user(USER);
		let creds = cloud.seed_credentials(BROKER, Principal::Role(roles::ADMINISTRATOR.to_string()));
		let session =
			AwsSession::new(cloud.clone(), creds).with_probe_policy(RetryConfig::immediate(4));
		let minter = AllDayMinter::new(session, USER).with_policy(MintPolicy::immediate());
		(cloud, minter)
	}

	#[tokio::test]
	async fn test_mint_twelve_hours_and_delete_key() {
		let (cloud, minter) = setup();
		let creds = minter
			.mint(TARGET, roles::ADMINISTRATOR, "alice")
			.await
			.unwrap();

		assert_eq!(creds.account_id(), TARGET);
		assert_eq!(creds.role_name(), Some(roles::ADMINISTRATOR));
		assert!(creds.remaining_at(Utc::now()) > Duration::from_secs(11 * 3600));
		assert!(cloud.access_keys(USER).is_empty());
	}

	#[tokio::test]
	async fn test_key_deleted_when_assume_fails() {
		let (cloud, minter) = setup();
		cloud.deny_role(TARGET, roles::AUDITOR);

		let err = minter.mint(TARGET, roles::AUDITOR, "alice").await.unwrap_err();
		assert_eq!(err.code(), Some("AccessDenied"));
		assert!(cloud.access_keys(USER).is_empty());
		assert_eq!(cloud.call_count("DeleteAccessKey"), 1);
	}

	#[tokio::test]
	async fn test_key_deleted_when_probe_never_succeeds() {
		let (cloud, minter) = setup();
		cloud.fail_caller_identity(1000);

		assert!(minter.mint(TARGET, roles::ADMINISTRATOR, "alice").await.is_err());
		assert!(cloud.access_keys(USER).is_empty());
	}

	#[tokio::test]
	async fn test_quota_pressure_deletes_all_keys_then_succeeds() {
		let (cloud, minter) = setup();
		cloud.fail_create_access_key(5);

		minter
			.mint(TARGET, roles::ADMINISTRATOR, "alice")
			.await
			.unwrap();
		assert_eq!(cloud.call_count("ListAccessKeys"), 1);
		assert_eq!(cloud.call_count("CreateAccessKey"), 6);
		assert!(cloud.access_keys(USER).is_empty());
	}

	#[tokio::test]
	async fn test_full_quota_is_reclaimed() {
		let (cloud, minter) = setup();
		cloud.preload_access_keys(USER, 2);

		minter
			.mint(TARGET, roles::ADMINISTRATOR, "alice")
			.await
			.unwrap();
		assert_eq!(cloud.call_count("CreateAccessKey"), 5);
		assert!(cloud.access_keys(USER).is_empty());
	}

	#[tokio::test]
	async fn test_quota_never_frees_up() {
		let (cloud, minter) = setup();
		cloud.fail_create_access_key(100);

		let err = minter
			.mint(TARGET, roles::ADMINISTRATOR, "alice")
			.await
			.unwrap_err();
		assert!(matches!(err, AwsError::LimitExceeded));
		assert_eq!(cloud.call_count("CreateAccessKey"), 8);
	}

	#[tokio::test]
	async fn test_cleanup_failure_discards_credentials() {
		let (cloud, minter) = setup();
		cloud.fail_delete_access_key(true);

		let err = minter
			.mint(TARGET, roles::ADMINISTRATOR, "alice")
			.await
			.unwrap_err();
		assert!(matches!(err, AwsError::AccessKeyCleanup { .. }));
	}

	#[tokio::test]
	async fn test_dropped_guard_deletes_in_background() {
		let (cloud, minter) = setup();
		let key = minter.create_access_key().await.unwrap();
		assert_eq!(cloud.access_keys(USER).len(), 1);

		drop(key);
		for _ in 0..10 {
			tokio::task::yield_now().await;
		}
		assert!(cloud.access_keys(USER).is_empty());
	}

	#[tokio::test]
	async fn test_cancelled_mint_still_deletes_key() {
		let (cloud, minter) = setup();
		let token = CancellationToken::new();
		let minter = AllDayMinter {
			session: minter.session.clone().with_cancellation(token.clone()),
			..minter
		};
		cloud.fail_caller_identity(1000);
		cloud.on_create_access_key({
			let token = token.clone();
			move || token.cancel()
		});

		let err = minter
			.mint(TARGET, roles::ADMINISTRATOR, "alice")
			.await
			.unwrap_err();
		assert!(err.is_cancelled());
		assert!(cloud.access_keys(USER).is_empty());
	}
}
