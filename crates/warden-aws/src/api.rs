// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The seam between Warden and the cloud control plane.
//!
//! Every call names the [`CredentialSet`] it acts as. No client holds
//! ambient credentials, so a session can be rescoped without touching the
//! client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::accounts::{Account, CallerIdentity};
use crate::credentials::{AccessKey, CredentialSet, IssuedCredentials};
use crate::error::AwsResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
	pub role_arn: String,
	pub session_name: String,
	pub duration: Duration,
}

#[async_trait]
pub trait StsApi: Send + Sync {
	async fn get_caller_identity(&self, creds: &CredentialSet) -> AwsResult<CallerIdentity>;

	async fn assume_role(
		&self,
		creds: &CredentialSet,
		request: &AssumeRoleRequest,
	) -> AwsResult<IssuedCredentials>;
}

#[async_trait]
pub trait IamApi: Send + Sync {
	async fn create_access_key(&self, creds: &CredentialSet, user_name: &str)
		-> AwsResult<AccessKey>;

	async fn delete_access_key(
		&self,
		creds: &CredentialSet,
		user_name: &str,
		access_key_id: &str,
	) -> AwsResult<()>;

	/// Access key ids currently attached to the user.
	async fn list_access_keys(&self, creds: &CredentialSet, user_name: &str)
		-> AwsResult<Vec<String>>;

	async fn list_user_tags(
		&self,
		creds: &CredentialSet,
		user_name: &str,
	) -> AwsResult<BTreeMap<String, String>>;

	async fn tag_user(
		&self,
		creds: &CredentialSet,
		user_name: &str,
		key: &str,
		value: &str,
	) -> AwsResult<()>;

	async fn untag_user(&self, creds: &CredentialSet, user_name: &str, keys: &[String])
		-> AwsResult<()>;
}

#[async_trait]
pub trait OrganizationsApi: Send + Sync {
	/// The organization's management account id. Fails with
	/// `OrganizationsNotInUse` for a standalone account.
	async fn describe_organization(&self, creds: &CredentialSet) -> AwsResult<String>;

	/// Active member accounts with their tags.
	async fn list_accounts(&self, creds: &CredentialSet) -> AwsResult<Vec<Account>>;
}

pub trait CloudApi: StsApi + IamApi + OrganizationsApi {}

impl<T> CloudApi for T where T: StsApi + IamApi + OrganizationsApi {}

/// Source of the broker's own credentials.
#[async_trait]
pub trait BaseCredentials: Send + Sync {
	async fn base_credentials(&self) -> AwsResult<CredentialSet>;
}

/// A fixed credential set, for tests and for callers that resolved their
/// own credentials.
#[derive(Debug, Clone)]
pub struct StaticBaseCredentials(pub CredentialSet);

#[async_trait]
impl BaseCredentials for StaticBaseCredentials {
	async fn base_credentials(&self) -> AwsResult<CredentialSet> {
		Ok(self.0.clone())
	}
}
