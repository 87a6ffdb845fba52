// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory cloud for tests.
//!
//! [`FakeCloud`] models the parts of STS, IAM and Organizations Warden
//! touches: issued credentials, an access key quota of two per user, user
//! tags, and an organization account list. Faults can be injected to
//! exercise retry and cleanup paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use warden_common_secret::SecretString;

use crate::accounts::{Account, CallerIdentity};
use crate::api::{AssumeRoleRequest, IamApi, OrganizationsApi, StsApi};
use crate::credentials::{AccessKey, CredentialSet, IssuedCredentials, Principal};
use crate::error::{AwsError, AwsResult};
use crate::roles::parse_principal_arn;
use crate::session::ROLE_CHAINING_LIMIT;

const ACCESS_KEY_QUOTA: usize = 2;
const USER_TAG_QUOTA: usize = 50;

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct User {
	keys: Vec<String>,
	tags: BTreeMap<String, String>,
}

#[derive(Clone)]
struct Issued {
	account_id: String,
	principal: Principal,
	session_name: Option<String>,
}

#[derive(Default)]
struct State {
	management_account_id: Option<String>,
	accounts: Vec<Account>,
	users: BTreeMap<String, User>,
	issued: BTreeMap<String, Issued>,
	denied: BTreeSet<(String, String)>,
	caller_identity_failures: u32,
	create_key_failures: u32,
	fail_delete: bool,
	on_create_key: Option<Hook>,
	calls: Vec<&'static str>,
	next_id: u64,
}

impl State {
	fn next_id(&mut self, prefix: &str) -> String {
		self.next_id += 1;
		format!("{prefix}{:016}", self.next_id)
	}

	fn authenticate(&self, creds: &CredentialSet) -> AwsResult<Issued> {
		self.issued
			.get(creds.access_key_id())
			.cloned()
			.ok_or_else(|| {
				AwsError::service(
					"Authenticate",
					"InvalidClientTokenId",
					"The security token included in the request is invalid.",
				)
			})
	}

	fn user_mut(&mut self, operation: &'static str, name: &str) -> AwsResult<&mut User> {
		self.users.get_mut(name).ok_or_else(|| {
			AwsError::service(
				operation,
				"NoSuchEntity",
				format!("The user with name {name} cannot be found."),
			)
		})
	}
}

#[derive(Default)]
pub struct FakeCloud {
	state: Mutex<State>,
}

impl FakeCloud {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make this an organization. Without it `DescribeOrganization` reports
	/// Organizations as not in use.
	pub fn with_management_account(self, account_id: &str) -> Self {
		self.lock().management_account_id = Some(account_id.to_string());
		self
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn record(&self, call: &'static str) {
		self.lock().calls.push(call);
	}

	pub fn add_account(&self, id: &str, name: &str, tags: &[(&str, &str)]) {
		self.lock().accounts.push(Account {
			id: id.to_string(),
			name: name.to_string(),
			email: format!("{name}@example.com"),
			tags: tags
				.iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect(),
		});
	}

	pub fn add_user(&self, name: &str) {
		self.lock().users.entry(name.to_string()).or_default();
	}

	/// Register credentials the cloud will accept and return them.
	pub fn seed_credentials(&self, account_id: &str, principal: Principal) -> CredentialSet {
		let mut state = self.lock();
		let access_key_id = state.next_id(if principal.is_chained() { "ASIA" } else { "AKIA" });
		state.issued.insert(
			access_key_id.clone(),
			Issued {
				account_id: account_id.to_string(),
				principal: principal.clone(),
				session_name: principal.is_chained().then(|| "seed".to_string()),
			},
		);
		let session_token = principal.is_chained().then(|| SecretString::from("seed-token"));
		CredentialSet::new(
			access_key_id,
			SecretString::from("seed-secret"),
			session_token,
			Utc::now() + chrono::Duration::hours(1),
			account_id,
			principal,
		)
	}

	pub fn deny_role(&self, account_id: &str, role_name: &str) {
		self.lock()
			.denied
			.insert((account_id.to_string(), role_name.to_string()));
	}

	/// The next `n` `GetCallerIdentity` calls fail as if the credentials had
	/// not propagated yet.
	pub fn fail_caller_identity(&self, n: u32) {
		self.lock().caller_identity_failures = n;
	}

	/// The next `n` `CreateAccessKey` calls fail with `LimitExceeded`.
	pub fn fail_create_access_key(&self, n: u32) {
		self.lock().create_key_failures = n;
	}

	pub fn fail_delete_access_key(&self, fail: bool) {
		self.lock().fail_delete = fail;
	}

	/// Run `hook` after every successful `CreateAccessKey`.
	pub fn on_create_access_key(&self, hook: impl Fn() + Send + Sync + 'static) {
		self.lock().on_create_key = Some(Arc::new(hook));
	}

	/// Attach `n` pre-existing keys to `user`.
	pub fn preload_access_keys(&self, user: &str, n: usize) {
		let mut state = self.lock();
		let ids: Vec<String> = (0..n).map(|_| state.next_id("AKIAOLD")).collect();
		state.users.entry(user.to_string()).or_default().keys.extend(ids);
	}

	pub fn access_keys(&self, user: &str) -> Vec<String> {
		self.lock()
			.users
			.get(user)
			.map(|u| u.keys.clone())
			.unwrap_or_default()
	}

	pub fn user_tags(&self, user: &str) -> BTreeMap<String, String> {
		self.lock()
			.users
			.get(user)
			.map(|u| u.tags.clone())
			.unwrap_or_default()
	}

	pub fn call_count(&self, call: &str) -> usize {
		self.lock().calls.iter().filter(|c| **c == call).count()
	}
}

#[async_trait]
impl StsApi for FakeCloud {
	async fn get_caller_identity(&self, creds: &CredentialSet) -> AwsResult<CallerIdentity> {
		self.record("GetCallerIdentity");
		let mut state = self.lock();
		if state.caller_identity_failures > 0 {
			state.caller_identity_failures -= 1;
			return Err(AwsError::service(
				"GetCallerIdentity",
				"InvalidClientTokenId",
				"The security token included in the request is invalid.",
			));
		}
		let issued = state.authenticate(creds)?;
		let arn = match &issued.principal {
			Principal::Role(name) => format!(
				"arn:aws:sts::{}:assumed-role/{name}/{}",
				issued.account_id,
				issued.session_name.as_deref().unwrap_or("session")
			),
			Principal::User(name) => format!("arn:aws:iam::{}:user/{name}", issued.account_id),
			Principal::Root => format!("arn:aws:iam::{}:root", issued.account_id),
		};
		Ok(CallerIdentity {
			arn,
			account_id: issued.account_id,
			user_id: creds.access_key_id().to_string(),
		})
	}

	async fn assume_role(
		&self,
		creds: &CredentialSet,
		request: &AssumeRoleRequest,
	) -> AwsResult<IssuedCredentials> {
		self.record("AssumeRole");
		let mut state = self.lock();
		let caller = state.authenticate(creds)?;

		if caller.principal.is_chained() && request.duration > ROLE_CHAINING_LIMIT {
			return Err(AwsError::service(
				"AssumeRole",
				"ValidationError",
				"The requested DurationSeconds exceeds the 1 hour session limit for roles assumed by role chaining.",
			));
		}

		let target = parse_principal_arn(&request.role_arn)?;
		let Principal::Role(role_name) = target.principal else {
			return Err(AwsError::InvalidArn(request.role_arn.clone()));
		};
		if state
			.denied
			.contains(&(target.account_id.clone(), role_name.clone()))
		{
			return Err(AwsError::service(
				"AssumeRole",
				"AccessDenied",
				format!("not authorized to perform: sts:AssumeRole on resource: {}", request.role_arn),
			));
		}

		let access_key_id = state.next_id("ASIA");
		state.issued.insert(
			access_key_id.clone(),
			Issued {
				account_id: target.account_id,
				principal: Principal::Role(role_name),
				session_name: Some(request.session_name.clone()),
			},
		);
		Ok(IssuedCredentials {
			access_key_id,
			secret_access_key: SecretString::from("assumed-secret"),
			session_token: SecretString::from("assumed-token"),
			expiration: Utc::now()
				+ chrono::Duration::from_std(request.duration)
					.unwrap_or_else(|_| chrono::Duration::hours(1)),
		})
	}
}

#[async_trait]
impl IamApi for FakeCloud {
	async fn create_access_key(
		&self,
		creds: &CredentialSet,
		user_name: &str,
	) -> AwsResult<AccessKey> {
		self.record("CreateAccessKey");
		let (hook, access_key_id) = {
			let mut state = self.lock();
			let caller = state.authenticate(creds)?;
			if state.create_key_failures > 0 {
				state.create_key_failures -= 1;
				return Err(AwsError::LimitExceeded);
			}
			let access_key_id = state.next_id("AKIA");
			let user = state.user_mut("CreateAccessKey", user_name)?;
			if user.keys.len() >= ACCESS_KEY_QUOTA {
				return Err(AwsError::LimitExceeded);
			}
			user.keys.push(access_key_id.clone());
			state.issued.insert(
				access_key_id.clone(),
				Issued {
					account_id: caller.account_id,
					principal: Principal::User(user_name.to_string()),
					session_name: None,
				},
			);
			(state.on_create_key.clone(), access_key_id)
		};

		if let Some(hook) = hook {
			hook();
		}
		Ok(AccessKey {
			user_name: user_name.to_string(),
			access_key_id,
			secret_access_key: SecretString::from("user-secret"),
		})
	}

	async fn delete_access_key(
		&self,
		creds: &CredentialSet,
		user_name: &str,
		access_key_id: &str,
	) -> AwsResult<()> {
		self.record("DeleteAccessKey");
		let mut state = self.lock();
		state.authenticate(creds)?;
		if state.fail_delete {
			return Err(AwsError::service(
				"DeleteAccessKey",
				"ServiceFailure",
				"injected failure",
			));
		}
		let user = state.user_mut("DeleteAccessKey", user_name)?;
		let before = user.keys.len();
		user.keys.retain(|k| k != access_key_id);
		if user.keys.len() == before {
			return Err(AwsError::service(
				"DeleteAccessKey",
				"NoSuchEntity",
				format!("The Access Key with id {access_key_id} cannot be found."),
			));
		}
		state.issued.remove(access_key_id);
		Ok(())
	}

	async fn list_access_keys(
		&self,
		creds: &CredentialSet,
		user_name: &str,
	) -> AwsResult<Vec<String>> {
		self.record("ListAccessKeys");
		let mut state = self.lock();
		state.authenticate(creds)?;
		Ok(state.user_mut("ListAccessKeys", user_name)?.keys.clone())
	}

	async fn list_user_tags(
		&self,
		creds: &CredentialSet,
		user_name: &str,
	) -> AwsResult<BTreeMap<String, String>> {
		self.record("ListUserTags");
		let mut state = self.lock();
		state.authenticate(creds)?;
		Ok(state.user_mut("ListUserTags", user_name)?.tags.clone())
	}

	async fn tag_user(
		&self,
		creds: &CredentialSet,
		user_name: &str,
		key: &str,
		value: &str,
	) -> AwsResult<()> {
		self.record("TagUser");
		let mut state = self.lock();
		state.authenticate(creds)?;
		let user = state.user_mut("TagUser", user_name)?;
		if !user.tags.contains_key(key) && user.tags.len() >= USER_TAG_QUOTA {
			return Err(AwsError::LimitExceeded);
		}
		user.tags.insert(key.to_string(), value.to_string());
		Ok(())
	}

	async fn untag_user(
		&self,
		creds: &CredentialSet,
		user_name: &str,
		keys: &[String],
	) -> AwsResult<()> {
		self.record("UntagUser");
		let mut state = self.lock();
		state.authenticate(creds)?;
		let user = state.user_mut("UntagUser", user_name)?;
		for key in keys {
			user.tags.remove(key);
		}
		Ok(())
	}
}

#[async_trait]
impl OrganizationsApi for FakeCloud {
	async fn describe_organization(&self, creds: &CredentialSet) -> AwsResult<String> {
		self.record("DescribeOrganization");
		let state = self.lock();
		state.authenticate(creds)?;
		state
			.management_account_id
			.clone()
			.ok_or(AwsError::OrganizationsNotInUse)
	}

	async fn list_accounts(&self, creds: &CredentialSet) -> AwsResult<Vec<Account>> {
		self.record("ListAccounts");
		let state = self.lock();
		state.authenticate(creds)?;
		Ok(state.accounts.clone())
	}
}
