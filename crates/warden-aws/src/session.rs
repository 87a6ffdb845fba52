// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role assumption chains.
//!
//! An [`AwsSession`] is a credential set plus the means to act with it. Every
//! `assume_*` call returns a new session and leaves the receiver untouched.
//! Fresh credentials are probed with `GetCallerIdentity` until they work
//! before they are handed back, so callers never see credentials that IAM
//! has not finished propagating.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use warden_common_http::{retry_with_cancel, RetryConfig, RetryableError};

use crate::accounts::{Account, CallerIdentity, Identity};
use crate::api::{AssumeRoleRequest, CloudApi};
use crate::credentials::{CredentialSet, Principal};
use crate::error::{AwsError, AwsResult};
use crate::roles::{self, parse_principal_arn};
use crate::selector::AccountSelector;

/// Longest session STS grants to credentials that are themselves an
/// assumed role.
pub const ROLE_CHAINING_LIMIT: Duration = Duration::from_secs(3600);

pub const DEFAULT_SESSION_NAME: &str = "warden";

const MAX_SESSION_NAME_LEN: usize = 64;

#[derive(Clone)]
pub struct AwsSession {
	api: Arc<dyn CloudApi>,
	credentials: CredentialSet,
	probe: RetryConfig,
	cancel: CancellationToken,
	expected_management_account_id: Option<String>,
}

impl std::fmt::Debug for AwsSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AwsSession")
			.field("credentials", &self.credentials)
			.field("probe", &self.probe)
			.finish_non_exhaustive()
	}
}

impl AwsSession {
	pub fn new(api: Arc<dyn CloudApi>, credentials: CredentialSet) -> Self {
		Self {
			api,
			credentials,
			probe: RetryConfig::fixed(18, Duration::from_secs(1)),
			cancel: CancellationToken::new(),
			expected_management_account_id: None,
		}
	}

	pub fn with_probe_policy(mut self, probe: RetryConfig) -> Self {
		self.probe = probe;
		self
	}

	/// Abort every probe and retry loop of this session and the sessions
	/// derived from it once `cancel` fires.
	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;
		self
	}

	/// Fail management account lookups that discover a different account.
	pub fn with_expected_management_account(mut self, account_id: Option<String>) -> Self {
		self.expected_management_account_id = account_id;
		self
	}

	pub fn credentials(&self) -> &CredentialSet {
		&self.credentials
	}

	pub fn api(&self) -> &Arc<dyn CloudApi> {
		&self.api
	}

	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancel
	}

	/// A sibling session acting as `credentials`.
	pub(crate) fn derive(&self, credentials: CredentialSet) -> Self {
		Self {
			api: Arc::clone(&self.api),
			credentials,
			probe: self.probe.clone(),
			cancel: self.cancel.clone(),
			expected_management_account_id: self.expected_management_account_id.clone(),
		}
	}

	pub async fn caller_identity(&self) -> AwsResult<CallerIdentity> {
		self.api.get_caller_identity(&self.credentials).await
	}

	/// Poll `GetCallerIdentity` until it succeeds or the probe policy runs out.
	#[instrument(skip(self), fields(account_id = %self.credentials.account_id(), access_key_id = %self.credentials.access_key_id()))]
	pub async fn wait_until_credentials_work(&self) -> AwsResult<CallerIdentity> {
		let identity = retry_with_cancel(
			&self.probe,
			&self.cancel,
			|e: &AwsError| e.is_propagation() || e.is_retryable(),
			|| self.api.get_caller_identity(&self.credentials),
		)
		.await?;
		debug!(arn = %identity.arn, "credentials are usable");
		Ok(identity)
	}

	/// Assume `role_name` in `account_id`.
	///
	/// Returns the receiver unchanged if it already is that role in that
	/// account. Requests longer than [`ROLE_CHAINING_LIMIT`] from chained
	/// credentials fail before any call is made.
	#[instrument(skip(self, session_name), fields(from_account = %self.credentials.account_id()))]
	pub async fn assume_role(
		&self,
		account_id: &str,
		role_name: &str,
		session_name: &str,
		duration: Duration,
	) -> AwsResult<AwsSession> {
		if self.credentials.account_id() == account_id
			&& self.credentials.role_name() == Some(role_name)
		{
			debug!("already acting as the requested role");
			return Ok(self.clone());
		}

		if self.credentials.principal().is_chained() && duration > ROLE_CHAINING_LIMIT {
			return Err(AwsError::RoleChainingLimit {
				requested_secs: duration.as_secs(),
			});
		}

		let request = AssumeRoleRequest {
			role_arn: roles::role_arn(account_id, role_name),
			session_name: normalize_session_name(session_name),
			duration,
		};

		let issued = retry_with_cancel(
			&self.probe,
			&self.cancel,
			|e: &AwsError| e.is_retryable(),
			|| self.api.assume_role(&self.credentials, &request),
		)
		.await?;

		let next = self.derive(CredentialSet::from_issued(issued, account_id, role_name));
		next.wait_until_credentials_work().await?;

		info!(
			role_arn = %request.role_arn,
			expiration = %next.credentials.expiration(),
			"assumed role"
		);
		Ok(next)
	}

	pub async fn assume_role_arn(
		&self,
		role_arn: &str,
		session_name: &str,
		duration: Duration,
	) -> AwsResult<AwsSession> {
		let parsed = parse_principal_arn(role_arn)?;
		let Principal::Role(role_name) = parsed.principal else {
			return Err(AwsError::InvalidArn(role_arn.to_string()));
		};
		self.assume_role(&parsed.account_id, &role_name, session_name, duration)
			.await
	}

	/// The organization's management account id, or this session's own
	/// account when Organizations is not in use.
	pub async fn management_account_id(&self) -> AwsResult<String> {
		let discovered = match self.api.describe_organization(&self.credentials).await {
			Ok(id) => id,
			Err(AwsError::OrganizationsNotInUse) => self.credentials.account_id().to_string(),
			Err(e) => return Err(e),
		};

		if let Some(expected) = &self.expected_management_account_id {
			if *expected != discovered {
				return Err(AwsError::NonManagementAccount {
					account_id: discovered,
					management_account_id: expected.clone(),
				});
			}
		}
		Ok(discovered)
	}

	/// Fail unless this session's credentials live in the management account.
	pub async fn ensure_management_account(&self) -> AwsResult<()> {
		let management_account_id = self.management_account_id().await?;
		if self.credentials.account_id() != management_account_id {
			return Err(AwsError::NonManagementAccount {
				account_id: self.credentials.account_id().to_string(),
				management_account_id,
			});
		}
		Ok(())
	}

	#[instrument(skip(self, session_name))]
	pub async fn assume_management_role(
		&self,
		role_name: &str,
		session_name: &str,
		duration: Duration,
	) -> AwsResult<AwsSession> {
		let management_account_id = self.management_account_id().await?;
		if self.credentials.account_id() == management_account_id
			&& can_stand_in_for(self.credentials.principal(), role_name)
		{
			debug!(principal = ?self.credentials.principal(), "reusing management account session");
			return Ok(self.clone());
		}
		self.assume_role(&management_account_id, role_name, session_name, duration)
			.await
	}

	/// The narrow read-only session used for every account lookup.
	pub async fn organization_reader(&self, session_name: &str) -> AwsResult<AwsSession> {
		self.assume_management_role(roles::ORGANIZATION_READER, session_name, ROLE_CHAINING_LIMIT)
			.await
			.map_err(wrap_reader_error)
	}

	pub async fn list_accounts(&self, session_name: &str) -> AwsResult<Vec<Account>> {
		let reader = self.organization_reader(session_name).await?;
		reader
			.api
			.list_accounts(&reader.credentials)
			.await
			.map_err(wrap_reader_error)
	}

	pub async fn find_account(
		&self,
		selector: &AccountSelector,
		session_name: &str,
	) -> AwsResult<Account> {
		let reader = self.organization_reader(session_name).await?;
		let accounts = reader
			.api
			.list_accounts(&reader.credentials)
			.await
			.map_err(wrap_reader_error)?;
		let management_account_id = match selector {
			AccountSelector::Management => Some(reader.management_account_id().await?),
			_ => None,
		};
		selector
			.select(&accounts, management_account_id.as_deref())
			.cloned()
	}

	/// Explicit ids are used as given; everything else goes through the
	/// organization reader.
	pub async fn resolve_account_id(
		&self,
		selector: &AccountSelector,
		session_name: &str,
	) -> AwsResult<String> {
		match selector {
			AccountSelector::Id(id) => Ok(id.clone()),
			AccountSelector::Management => self.management_account_id().await,
			_ => Ok(self.find_account(selector, session_name).await?.id),
		}
	}

	pub async fn assume_selected(
		&self,
		selector: &AccountSelector,
		role_name: &str,
		session_name: &str,
		duration: Duration,
	) -> AwsResult<AwsSession> {
		if matches!(selector, AccountSelector::Management) {
			return self
				.assume_management_role(role_name, session_name, duration)
				.await;
		}
		let account_id = self.resolve_account_id(selector, session_name).await?;
		self.assume_role(&account_id, role_name, session_name, duration)
			.await
	}

	pub async fn assume_special_role(
		&self,
		name: &str,
		role_name: &str,
		session_name: &str,
		duration: Duration,
	) -> AwsResult<AwsSession> {
		self.assume_selected(
			&AccountSelector::Special(name.to_string()),
			role_name,
			session_name,
			duration,
		)
		.await
	}

	#[allow(clippy::too_many_arguments)]
	pub async fn assume_service_role(
		&self,
		domain: &str,
		environment: &str,
		quality: &str,
		role_name: &str,
		session_name: &str,
		duration: Duration,
	) -> AwsResult<AwsSession> {
		self.assume_selected(
			&AccountSelector::service(domain, environment, quality),
			role_name,
			session_name,
			duration,
		)
		.await
	}

	pub async fn assume_admin_role(
		&self,
		quality: &str,
		role_name: &str,
		session_name: &str,
		duration: Duration,
	) -> AwsResult<AwsSession> {
		self.assume_selected(
			&AccountSelector::admin(quality),
			role_name,
			session_name,
			duration,
		)
		.await
	}

	/// The caller identity plus its account's classification tags.
	pub async fn identity(&self, session_name: &str) -> AwsResult<Identity> {
		let caller = self.caller_identity().await?;
		let accounts = self.list_accounts(session_name).await?;
		let tags = accounts
			.into_iter()
			.find(|a| a.id == caller.account_id)
			.map(|a| a.tags)
			.unwrap_or_default();
		Ok(Identity {
			principal_arn: caller.arn,
			account_id: caller.account_id,
			tags,
		})
	}
}

/// Whether a principal already in the management account may act in place
/// of `role_name` there.
fn can_stand_in_for(principal: &Principal, role_name: &str) -> bool {
	let administrator = match principal {
		Principal::Role(name) if name == role_name => return true,
		Principal::Role(name) => name == roles::ORGANIZATION_ADMINISTRATOR,
		Principal::User(_) | Principal::Root => true,
	};
	administrator
		&& (role_name == roles::ORGANIZATION_READER || role_name == roles::ORGANIZATION_ADMINISTRATOR)
}

fn wrap_reader_error(err: AwsError) -> AwsError {
	match err {
		AwsError::Cancelled
		| AwsError::NonManagementAccount { .. }
		| AwsError::OrganizationReader(_) => err,
		other => AwsError::OrganizationReader(Box::new(other)),
	}
}

/// Role session names allow `[\w+=,.@-]{2,64}`.
pub fn normalize_session_name(name: &str) -> String {
	let cleaned: String = name
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || "_+=,.@-".contains(c) {
				c
			} else {
				'-'
			}
		})
		.take(MAX_SESSION_NAME_LEN)
		.collect();
	if cleaned.len() < 2 {
		DEFAULT_SESSION_NAME.to_string()
	} else {
		cleaned
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::accounts::{TAG_DOMAIN, TAG_ENVIRONMENT, TAG_QUALITY};
	use crate::testing::FakeCloud;

	const MANAGEMENT: &str = "100000000000";
	const PAYMENTS: &str = "200000000000";

	fn cloud() -> Arc<FakeCloud> {
		let cloud = FakeCloud::new().with_management_account(MANAGEMENT);
		cloud.add_account(MANAGEMENT, "management", &[]);
		cloud.add_account(
			PAYMENTS,
			"payments-production-beta",
			&[
				(TAG_DOMAIN, "payments"),
				(TAG_ENVIRONMENT, "production"),
				(TAG_QUALITY, "beta"),
			],
		);
		cloud.add_account("300000000000", "audit", &[]);
		Arc::new(cloud)
	}

	fn session(cloud: &Arc<FakeCloud>, principal: Principal) -> AwsSession {
		let creds = cloud.seed_credentials(MANAGEMENT, principal);
		AwsSession::new(cloud.clone(), creds).with_probe_policy(RetryConfig::immediate(5))
	}

	mod assume {
		use super::*;

		#[tokio::test]
		async fn test_derived_session_leaves_parent_untouched() {
			let cloud = cloud();
			let base = session(&cloud, Principal::User("root-user".to_string()));
			let before = base.credentials().access_key_id().to_string();

			let admin = base
				.assume_role(PAYMENTS, roles::ADMINISTRATOR, "alice", Duration::from_secs(3600))
				.await
				.unwrap();

			assert_eq!(base.credentials().access_key_id(), before);
			assert_eq!(admin.credentials().account_id(), PAYMENTS);
			assert_eq!(admin.credentials().role_name(), Some(roles::ADMINISTRATOR));
			assert_ne!(admin.credentials().access_key_id(), before);
		}

		#[tokio::test]
		async fn test_same_role_short_circuits() {
			let cloud = cloud();
			let base = session(&cloud, Principal::Role(roles::ADMINISTRATOR.to_string()));
			let same = base
				.assume_role(MANAGEMENT, roles::ADMINISTRATOR, "alice", Duration::from_secs(3600))
				.await
				.unwrap();
			assert_eq!(
				same.credentials().access_key_id(),
				base.credentials().access_key_id()
			);
			assert_eq!(cloud.call_count("AssumeRole"), 0);
		}

		#[tokio::test]
		async fn test_chained_long_session_fails_fast() {
			let cloud = cloud();
			let base = session(&cloud, Principal::Role(roles::ADMINISTRATOR.to_string()));
			let err = base
				.assume_role(PAYMENTS, roles::AUDITOR, "alice", Duration::from_secs(43200))
				.await
				.unwrap_err();
			assert!(matches!(err, AwsError::RoleChainingLimit { requested_secs: 43200 }));
			assert_eq!(cloud.call_count("AssumeRole"), 0);
		}

		#[tokio::test]
		async fn test_probes_until_credentials_work() {
			let cloud = cloud();
			let base = session(&cloud, Principal::User("root-user".to_string()));
			cloud.fail_caller_identity(3);

			base.assume_role(PAYMENTS, roles::AUDITOR, "alice", Duration::from_secs(3600))
				.await
				.unwrap();
			assert_eq!(cloud.call_count("GetCallerIdentity"), 4);
		}

		#[tokio::test]
		async fn test_probe_gives_up_after_policy() {
			let cloud = cloud();
			let base = session(&cloud, Principal::User("root-user".to_string()));
			cloud.fail_caller_identity(100);

			let err = base
				.assume_role(PAYMENTS, roles::AUDITOR, "alice", Duration::from_secs(3600))
				.await
				.unwrap_err();
			assert!(err.is_propagation());
			assert_eq!(cloud.call_count("GetCallerIdentity"), 5);
		}

		#[tokio::test]
		async fn test_cancelled_session_stops_probing() {
			let cloud = cloud();
			let token = CancellationToken::new();
			let base = session(&cloud, Principal::User("root-user".to_string()))
				.with_cancellation(token.clone());
			cloud.fail_caller_identity(100);
			token.cancel();

			let err = base
				.assume_role(PAYMENTS, roles::AUDITOR, "alice", Duration::from_secs(3600))
				.await
				.unwrap_err();
			assert!(err.is_cancelled());
		}

		#[tokio::test]
		async fn test_denied_role_surfaces_error() {
			let cloud = cloud();
			cloud.deny_role(PAYMENTS, roles::AUDITOR);
			let base = session(&cloud, Principal::User("root-user".to_string()));
			let err = base
				.assume_role(PAYMENTS, roles::AUDITOR, "alice", Duration::from_secs(3600))
				.await
				.unwrap_err();
			assert_eq!(err.code(), Some("AccessDenied"));
		}

		#[tokio::test]
		async fn test_assume_role_arn() {
			let cloud = cloud();
			let base = session(&cloud, Principal::User("root-user".to_string()));
			let next = base
				.assume_role_arn(
					&roles::role_arn(PAYMENTS, roles::AUDITOR),
					"alice",
					Duration::from_secs(900),
				)
				.await
				.unwrap();
			assert_eq!(next.credentials().role_name(), Some(roles::AUDITOR));
		}
	}

	mod management {
		use super::*;

		#[tokio::test]
		async fn test_reader_reuses_administrator_session() {
			let cloud = cloud();
			let base = session(
				&cloud,
				Principal::Role(roles::ORGANIZATION_ADMINISTRATOR.to_string()),
			);
			base.organization_reader("alice").await.unwrap();
			assert_eq!(cloud.call_count("AssumeRole"), 0);
		}

		#[tokio::test]
		async fn test_reader_assumed_from_other_role() {
			let cloud = cloud();
			let base = session(&cloud, Principal::Role(roles::ADMINISTRATOR.to_string()));
			let reader = base.organization_reader("alice").await.unwrap();
			assert_eq!(
				reader.credentials().role_name(),
				Some(roles::ORGANIZATION_READER)
			);
			assert_eq!(cloud.call_count("AssumeRole"), 1);
		}

		#[tokio::test]
		async fn test_not_in_use_means_own_account() {
			let cloud = Arc::new(FakeCloud::new());
			let creds = cloud.seed_credentials(PAYMENTS, Principal::Root);
			let base = AwsSession::new(cloud.clone(), creds);
			assert_eq!(base.management_account_id().await.unwrap(), PAYMENTS);
		}

		#[tokio::test]
		async fn test_expected_management_account_mismatch() {
			let cloud = cloud();
			let base = session(&cloud, Principal::Root)
				.with_expected_management_account(Some("999999999999".to_string()));
			let err = base.management_account_id().await.unwrap_err();
			assert!(matches!(err, AwsError::NonManagementAccount { .. }));
		}

		#[tokio::test]
		async fn test_ensure_management_account() {
			let cloud = cloud();
			let elsewhere = AwsSession::new(
				cloud.clone(),
				cloud.seed_credentials(PAYMENTS, Principal::Role(roles::ADMINISTRATOR.to_string())),
			);
			let err = elsewhere.ensure_management_account().await.unwrap_err();
			assert_eq!(
				err.to_string(),
				format!("credentials are for account {PAYMENTS}, not the organization's management account, {MANAGEMENT}")
			);
			session(&cloud, Principal::Root)
				.ensure_management_account()
				.await
				.unwrap();
		}
	}

	mod selection {
		use super::*;

		#[tokio::test]
		async fn test_service_role_resolves_account() {
			let cloud = cloud();
			let base = session(&cloud, Principal::Root);
			let next = base
				.assume_service_role(
					"payments",
					"production",
					"beta",
					roles::AUDITOR,
					"alice",
					Duration::from_secs(3600),
				)
				.await
				.unwrap();
			assert_eq!(next.credentials().account_id(), PAYMENTS);
		}

		#[tokio::test]
		async fn test_unknown_special_account_mints_nothing() {
			let cloud = cloud();
			let base = session(&cloud, Principal::Root);
			let err = base
				.assume_special_role("network", roles::AUDITOR, "alice", Duration::from_secs(3600))
				.await
				.unwrap_err();
			assert!(matches!(err, AwsError::AccountNotFound(_)));
			assert_eq!(cloud.call_count("AssumeRole"), 0);
		}

		#[tokio::test]
		async fn test_ambiguous_admin_account() {
			let cloud = cloud();
			for id in ["400000000000", "500000000000"] {
				cloud.add_account(
					id,
					"admin",
					&[
						(TAG_DOMAIN, "admin"),
						(TAG_ENVIRONMENT, "admin"),
						(TAG_QUALITY, "default"),
					],
				);
			}
			let base = session(&cloud, Principal::Root);
			let err = base
				.assume_admin_role("default", roles::ADMINISTRATOR, "alice", Duration::from_secs(3600))
				.await
				.unwrap_err();
			assert!(matches!(err, AwsError::AmbiguousAccount { count: 2 }));
		}

		#[tokio::test]
		async fn test_identity_carries_tags() {
			let cloud = cloud();
			let base = AwsSession::new(
				cloud.clone(),
				cloud.seed_credentials(PAYMENTS, Principal::User("deployer".to_string())),
			)
			.with_probe_policy(RetryConfig::immediate(3));
			let identity = base.identity("alice").await.unwrap();
			assert_eq!(identity.account_id, PAYMENTS);
			assert_eq!(identity.tags.get(TAG_DOMAIN).map(String::as_str), Some("payments"));
		}
	}

	mod session_names {
		use super::*;

		#[test]
		fn test_truncates_to_64() {
			let long = "a".repeat(100);
			assert_eq!(normalize_session_name(&long).len(), 64);
		}

		#[test]
		fn test_empty_becomes_default() {
			assert_eq!(normalize_session_name(""), "warden");
		}

		#[test]
		fn test_invalid_characters_replaced() {
			assert_eq!(normalize_session_name("alice smith/ops"), "alice-smith-ops");
			assert_eq!(
				normalize_session_name("alice@example.com"),
				"alice@example.com"
			);
		}
	}
}
