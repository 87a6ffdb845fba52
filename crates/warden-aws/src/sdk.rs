// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The cloud API seam backed by the AWS SDK.
//!
//! A client is built per call from the shared base configuration with a
//! static credentials provider and no identity cache, so each call signs
//! with exactly the credential set it was given.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::identity::IdentityCache;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sdk_organizations::types::AccountStatus;
use aws_sdk_sts::error::{ProvideErrorMetadata, SdkError};
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_types::region::Region;
use aws_types::SdkConfig;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use warden_common_secret::SecretString;

use crate::accounts::{Account, CallerIdentity};
use crate::api::{AssumeRoleRequest, BaseCredentials, IamApi, OrganizationsApi, StsApi};
use crate::credentials::{AccessKey, CredentialSet, IssuedCredentials, Principal};
use crate::error::{AwsError, AwsResult};
use crate::roles::parse_principal_arn;

const PROVIDER_NAME: &str = "warden";

/// Ambient credentials are refreshed once they get this close to expiry.
const AMBIENT_REFRESH_MARGIN: Duration = Duration::from_secs(300);

pub struct SdkCloud {
	base: SdkConfig,
	ambient: Mutex<Option<CredentialSet>>,
}

impl SdkCloud {
	/// Load the default SDK configuration chain, optionally pinned to `region`.
	pub async fn load(region: Option<String>) -> Self {
		let mut loader = aws_config::defaults(BehaviorVersion::latest());
		if let Some(region) = region {
			loader = loader.region(Region::new(region));
		}
		Self::from_config(loader.load().await)
	}

	pub fn from_config(base: SdkConfig) -> Self {
		Self {
			base,
			ambient: Mutex::new(None),
		}
	}

	fn config_for(&self, creds: &CredentialSet) -> SdkConfig {
		let provider = Credentials::new(
			creds.access_key_id(),
			creds.secret_access_key().expose().clone(),
			creds.session_token().map(|t| t.expose().clone()),
			Some(creds.expiration().into()),
			PROVIDER_NAME,
		);
		self.base
			.to_builder()
			.identity_cache(IdentityCache::no_cache())
			.credentials_provider(SharedCredentialsProvider::new(provider))
			.build()
	}

	fn sts(&self, creds: &CredentialSet) -> aws_sdk_sts::Client {
		aws_sdk_sts::Client::new(&self.config_for(creds))
	}

	fn iam(&self, creds: &CredentialSet) -> aws_sdk_iam::Client {
		aws_sdk_iam::Client::new(&self.config_for(creds))
	}

	fn organizations(&self, creds: &CredentialSet) -> aws_sdk_organizations::Client {
		aws_sdk_organizations::Client::new(&self.config_for(creds))
	}
}

fn map_sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> AwsError
where
	E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
	R: std::fmt::Debug + Send + Sync + 'static,
{
	match &err {
		SdkError::ServiceError(_) => {
			let code = err.code().unwrap_or("Unknown").to_string();
			let message = err.message().unwrap_or_default().to_string();
			match code.as_str() {
				"LimitExceeded" | "LimitExceededException" => AwsError::LimitExceeded,
				"AWSOrganizationsNotInUseException" => AwsError::OrganizationsNotInUse,
				_ => AwsError::Service {
					operation,
					code,
					message,
				},
			}
		}
		_ => AwsError::Transport {
			operation,
			message: DisplayErrorContext(&err).to_string(),
		},
	}
}

fn to_chrono(operation: &'static str, dt: &aws_smithy_types::DateTime) -> AwsResult<DateTime<Utc>> {
	DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
		.ok_or_else(|| AwsError::missing(operation, "Expiration"))
}

#[async_trait]
impl StsApi for SdkCloud {
	#[instrument(skip(self, creds), fields(access_key_id = %creds.access_key_id()))]
	async fn get_caller_identity(&self, creds: &CredentialSet) -> AwsResult<CallerIdentity> {
		const OP: &str = "GetCallerIdentity";
		let out = self
			.sts(creds)
			.get_caller_identity()
			.send()
			.await
			.map_err(|e| map_sdk_error(OP, e))?;
		Ok(CallerIdentity {
			arn: out.arn().ok_or_else(|| AwsError::missing(OP, "Arn"))?.to_string(),
			account_id: out
				.account()
				.ok_or_else(|| AwsError::missing(OP, "Account"))?
				.to_string(),
			user_id: out.user_id().unwrap_or_default().to_string(),
		})
	}

	#[instrument(skip(self, creds, request), fields(role_arn = %request.role_arn))]
	async fn assume_role(
		&self,
		creds: &CredentialSet,
		request: &AssumeRoleRequest,
	) -> AwsResult<IssuedCredentials> {
		const OP: &str = "AssumeRole";
		let out = self
			.sts(creds)
			.assume_role()
			.role_arn(&request.role_arn)
			.role_session_name(&request.session_name)
			.duration_seconds(request.duration.as_secs().min(i32::MAX as u64) as i32)
			.send()
			.await
			.map_err(|e| map_sdk_error(OP, e))?;
		let issued = out
			.credentials()
			.ok_or_else(|| AwsError::missing(OP, "Credentials"))?;
		Ok(IssuedCredentials {
			access_key_id: issued.access_key_id().to_string(),
			secret_access_key: SecretString::new(issued.secret_access_key().to_string()),
			session_token: SecretString::new(issued.session_token().to_string()),
			expiration: to_chrono(OP, issued.expiration())?,
		})
	}
}

#[async_trait]
impl IamApi for SdkCloud {
	#[instrument(skip(self, creds))]
	async fn create_access_key(
		&self,
		creds: &CredentialSet,
		user_name: &str,
	) -> AwsResult<AccessKey> {
		const OP: &str = "CreateAccessKey";
		let out = self
			.iam(creds)
			.create_access_key()
			.user_name(user_name)
			.send()
			.await
			.map_err(|e| map_sdk_error(OP, e))?;
		let key = out
			.access_key()
			.ok_or_else(|| AwsError::missing(OP, "AccessKey"))?;
		debug!(access_key_id = key.access_key_id(), "created access key");
		Ok(AccessKey {
			user_name: user_name.to_string(),
			access_key_id: key.access_key_id().to_string(),
			secret_access_key: SecretString::new(key.secret_access_key().to_string()),
		})
	}

	#[instrument(skip(self, creds))]
	async fn delete_access_key(
		&self,
		creds: &CredentialSet,
		user_name: &str,
		access_key_id: &str,
	) -> AwsResult<()> {
		self.iam(creds)
			.delete_access_key()
			.user_name(user_name)
			.access_key_id(access_key_id)
			.send()
			.await
			.map_err(|e| map_sdk_error("DeleteAccessKey", e))?;
		Ok(())
	}

	async fn list_access_keys(
		&self,
		creds: &CredentialSet,
		user_name: &str,
	) -> AwsResult<Vec<String>> {
		let mut pages = self
			.iam(creds)
			.list_access_keys()
			.user_name(user_name)
			.into_paginator()
			.send();
		let mut ids = Vec::new();
		while let Some(page) = pages.next().await {
			let page = page.map_err(|e| map_sdk_error("ListAccessKeys", e))?;
			ids.extend(
				page.access_key_metadata()
					.iter()
					.filter_map(|m| m.access_key_id().map(str::to_string)),
			);
		}
		Ok(ids)
	}

	async fn list_user_tags(
		&self,
		creds: &CredentialSet,
		user_name: &str,
	) -> AwsResult<BTreeMap<String, String>> {
		let mut pages = self
			.iam(creds)
			.list_user_tags()
			.user_name(user_name)
			.into_paginator()
			.send();
		let mut tags = BTreeMap::new();
		while let Some(page) = pages.next().await {
			let page = page.map_err(|e| map_sdk_error("ListUserTags", e))?;
			for tag in page.tags() {
				tags.insert(tag.key().to_string(), tag.value().to_string());
			}
		}
		Ok(tags)
	}

	async fn tag_user(
		&self,
		creds: &CredentialSet,
		user_name: &str,
		key: &str,
		value: &str,
	) -> AwsResult<()> {
		const OP: &str = "TagUser";
		let tag = aws_sdk_iam::types::Tag::builder()
			.key(key)
			.value(value)
			.build()
			.map_err(|e| AwsError::service(OP, "InvalidInput", e.to_string()))?;
		self.iam(creds)
			.tag_user()
			.user_name(user_name)
			.tags(tag)
			.send()
			.await
			.map_err(|e| map_sdk_error(OP, e))?;
		Ok(())
	}

	async fn untag_user(
		&self,
		creds: &CredentialSet,
		user_name: &str,
		keys: &[String],
	) -> AwsResult<()> {
		if keys.is_empty() {
			return Ok(());
		}
		self.iam(creds)
			.untag_user()
			.user_name(user_name)
			.set_tag_keys(Some(keys.to_vec()))
			.send()
			.await
			.map_err(|e| map_sdk_error("UntagUser", e))?;
		Ok(())
	}
}

#[async_trait]
impl OrganizationsApi for SdkCloud {
	async fn describe_organization(&self, creds: &CredentialSet) -> AwsResult<String> {
		const OP: &str = "DescribeOrganization";
		let out = self
			.organizations(creds)
			.describe_organization()
			.send()
			.await
			.map_err(|e| map_sdk_error(OP, e))?;
		out.organization()
			.and_then(|o| o.master_account_id())
			.map(str::to_string)
			.ok_or_else(|| AwsError::missing(OP, "MasterAccountId"))
	}

	#[instrument(skip(self, creds), fields(account_id = %creds.account_id()))]
	async fn list_accounts(&self, creds: &CredentialSet) -> AwsResult<Vec<Account>> {
		let client = self.organizations(creds);
		let mut pages = client.list_accounts().into_paginator().send();
		let mut summaries = Vec::new();
		while let Some(page) = pages.next().await {
			let page = page.map_err(|e| map_sdk_error("ListAccounts", e))?;
			summaries.extend(
				page.accounts()
					.iter()
					.filter(|a| a.status() != Some(&AccountStatus::Suspended))
					.filter_map(|a| {
						Some((
							a.id()?.to_string(),
							a.name().unwrap_or_default().to_string(),
							a.email().unwrap_or_default().to_string(),
						))
					}),
			);
		}

		let client = &client;
		let accounts = try_join_all(summaries.into_iter().map(|(id, name, email)| async move {
			let tags = account_tags(client, &id).await?;
			Ok::<_, AwsError>(Account {
				id,
				name,
				email,
				tags,
			})
		}))
		.await?;
		debug!(count = accounts.len(), "listed accounts");
		Ok(accounts)
	}
}

async fn account_tags(
	client: &aws_sdk_organizations::Client,
	account_id: &str,
) -> AwsResult<BTreeMap<String, String>> {
	let mut pages = client
		.list_tags_for_resource()
		.resource_id(account_id)
		.into_paginator()
		.send();
	let mut tags = BTreeMap::new();
	while let Some(page) = pages.next().await {
		let page = page.map_err(|e| map_sdk_error("ListTagsForResource", e))?;
		for tag in page.tags() {
			tags.insert(tag.key().to_string(), tag.value().to_string());
		}
	}
	Ok(tags)
}

#[async_trait]
impl BaseCredentials for SdkCloud {
	/// The broker's own credentials from the default provider chain,
	/// classified with `GetCallerIdentity` and cached until close to expiry.
	async fn base_credentials(&self) -> AwsResult<CredentialSet> {
		let mut cached = self.ambient.lock().await;
		if let Some(creds) = cached.as_ref() {
			if creds.remaining_at(Utc::now()) > AMBIENT_REFRESH_MARGIN {
				return Ok(creds.clone());
			}
		}

		const OP: &str = "ProvideCredentials";
		let provider = self
			.base
			.credentials_provider()
			.ok_or_else(|| AwsError::missing(OP, "credentials provider"))?;
		let raw = provider
			.provide_credentials()
			.await
			.map_err(|e| AwsError::Transport {
				operation: OP,
				message: DisplayErrorContext(&e).to_string(),
			})?;
		let expiration = raw
			.expiry()
			.map(DateTime::<Utc>::from)
			.unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));

		let unclassified = CredentialSet::new(
			raw.access_key_id(),
			SecretString::new(raw.secret_access_key().to_string()),
			raw.session_token().map(|t| SecretString::new(t.to_string())),
			expiration,
			"",
			Principal::Root,
		);
		let caller = self.get_caller_identity(&unclassified).await?;
		let parsed = parse_principal_arn(&caller.arn)?;

		let creds = CredentialSet::new(
			raw.access_key_id(),
			SecretString::new(raw.secret_access_key().to_string()),
			raw.session_token().map(|t| SecretString::new(t.to_string())),
			expiration,
			caller.account_id,
			parsed.principal,
		);
		debug!(arn = %caller.arn, "resolved ambient credentials");
		*cached = Some(creds.clone());
		Ok(creds)
	}
}
