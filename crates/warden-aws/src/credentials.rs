// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Immutable credential sets.
//!
//! A [`CredentialSet`] is never modified after construction. Assuming a role
//! from one produces a fresh set, so any number of tasks may share a base
//! identity without observing each other's rescoping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_common_secret::SecretString;

/// The kind of identity a credential set acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Principal {
	/// An assumed role. Credentials rooted here are chained.
	Role(String),
	/// A long-lived IAM user, e.g. via a static access key.
	User(String),
	Root,
}

impl Principal {
	pub fn role_name(&self) -> Option<&str> {
		match self {
			Principal::Role(name) => Some(name),
			_ => None,
		}
	}

	pub fn is_chained(&self) -> bool {
		matches!(self, Principal::Role(_))
	}
}

#[derive(Debug, Clone)]
pub struct CredentialSet {
	access_key_id: String,
	secret_access_key: SecretString,
	session_token: Option<SecretString>,
	expiration: DateTime<Utc>,
	account_id: String,
	principal: Principal,
}

impl CredentialSet {
	pub fn new(
		access_key_id: impl Into<String>,
		secret_access_key: SecretString,
		session_token: Option<SecretString>,
		expiration: DateTime<Utc>,
		account_id: impl Into<String>,
		principal: Principal,
	) -> Self {
		Self {
			access_key_id: access_key_id.into(),
			secret_access_key,
			session_token,
			expiration,
			account_id: account_id.into(),
			principal,
		}
	}

	/// Credentials issued by STS for `role_name` in `account_id`.
	pub fn from_issued(issued: IssuedCredentials, account_id: &str, role_name: &str) -> Self {
		Self::new(
			issued.access_key_id,
			issued.secret_access_key,
			Some(issued.session_token),
			issued.expiration,
			account_id,
			Principal::Role(role_name.to_string()),
		)
	}

	pub fn access_key_id(&self) -> &str {
		&self.access_key_id
	}

	pub fn secret_access_key(&self) -> &SecretString {
		&self.secret_access_key
	}

	pub fn session_token(&self) -> Option<&SecretString> {
		self.session_token.as_ref()
	}

	pub fn expiration(&self) -> DateTime<Utc> {
		self.expiration
	}

	pub fn account_id(&self) -> &str {
		&self.account_id
	}

	pub fn principal(&self) -> &Principal {
		&self.principal
	}

	pub fn role_name(&self) -> Option<&str> {
		self.principal.role_name()
	}

	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.expiration <= now
	}

	/// Time left before expiry, zero once expired.
	pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
		(self.expiration - now).to_std().unwrap_or(Duration::ZERO)
	}
}

/// Raw credentials as returned by `AssumeRole`.
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
	pub access_key_id: String,
	pub secret_access_key: SecretString,
	pub session_token: SecretString,
	pub expiration: DateTime<Utc>,
}

/// A static access key freshly created for an IAM user.
#[derive(Debug, Clone)]
pub struct AccessKey {
	pub user_name: String,
	pub access_key_id: String,
	pub secret_access_key: SecretString,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn sample(expiration: DateTime<Utc>) -> CredentialSet {
		CredentialSet::new(
			"ASIAEXAMPLE",
			SecretString::from("secret"),
			Some(SecretString::from("token")),
			expiration,
			"123456789012",
			Principal::Role("Administrator".to_string()),
		)
	}

	#[test]
	fn test_debug_redacts_secrets() {
		let creds = sample(Utc::now());
		let rendered = format!("{creds:?}");
		assert!(rendered.contains("ASIAEXAMPLE"));
		assert!(!rendered.contains("secret\""));
		assert!(!rendered.contains("token\""));
	}

	#[test]
	fn test_expiry_math() {
		let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
		let creds = sample(now + chrono::Duration::minutes(5));
		assert!(!creds.is_expired_at(now));
		assert_eq!(creds.remaining_at(now), Duration::from_secs(300));
		let later = now + chrono::Duration::minutes(10);
		assert!(creds.is_expired_at(later));
		assert_eq!(creds.remaining_at(later), Duration::ZERO);
	}

	#[test]
	fn test_chained_principal() {
		assert!(Principal::Role("Auditor".to_string()).is_chained());
		assert!(!Principal::User("CredentialFactory".to_string()).is_chained());
		assert!(!Principal::Root.is_chained());
	}
}
