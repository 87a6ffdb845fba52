// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Account addressing.
//!
//! A selector resolves to exactly one account or fails. Two matches is an
//! error, never a silent pick of the first.

use std::fmt;

use crate::accounts::Account;
use crate::error::AwsError;

pub const ADMIN_DOMAIN: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSelector {
	Id(String),
	Service {
		domain: String,
		environment: String,
		quality: String,
	},
	/// A fixed-purpose account (audit, deploy, network, ...) addressed by name.
	Special(String),
	Management,
}

impl AccountSelector {
	pub fn service(
		domain: impl Into<String>,
		environment: impl Into<String>,
		quality: impl Into<String>,
	) -> Self {
		AccountSelector::Service {
			domain: domain.into(),
			environment: environment.into(),
			quality: quality.into(),
		}
	}

	pub fn admin(quality: impl Into<String>) -> Self {
		Self::service(ADMIN_DOMAIN, ADMIN_DOMAIN, quality)
	}

	/// Whether `account` is addressed by this selector. `Management` needs
	/// the organization's management account id to answer.
	pub fn matches(&self, account: &Account, management_account_id: Option<&str>) -> bool {
		match self {
			AccountSelector::Id(id) => account.id == *id,
			AccountSelector::Service {
				domain,
				environment,
				quality,
			} => {
				account.domain() == Some(domain.as_str())
					&& account.environment() == Some(environment.as_str())
					&& account.quality() == Some(quality.as_str())
			}
			AccountSelector::Special(name) => account.name == *name,
			AccountSelector::Management => management_account_id == Some(account.id.as_str()),
		}
	}

	pub fn select<'a>(
		&self,
		accounts: &'a [Account],
		management_account_id: Option<&str>,
	) -> Result<&'a Account, AwsError> {
		let mut matching = accounts
			.iter()
			.filter(|a| self.matches(a, management_account_id));
		match (matching.next(), matching.count()) {
			(None, _) => Err(AwsError::AccountNotFound(self.to_string())),
			(Some(account), 0) => Ok(account),
			(Some(_), rest) => Err(AwsError::AmbiguousAccount { count: rest + 1 }),
		}
	}
}

impl fmt::Display for AccountSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AccountSelector::Id(id) => write!(f, "{id}"),
			AccountSelector::Service {
				domain,
				environment,
				quality,
			} => write!(f, "{domain} {environment} {quality}"),
			AccountSelector::Special(name) => write!(f, "{name}"),
			AccountSelector::Management => f.write_str("management"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::accounts::{TAG_DOMAIN, TAG_ENVIRONMENT, TAG_QUALITY};
	use std::collections::BTreeMap;

	fn account(id: &str, name: &str, tags: &[(&str, &str)]) -> Account {
		Account {
			id: id.to_string(),
			name: name.to_string(),
			email: format!("{name}@example.com"),
			tags: tags
				.iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect::<BTreeMap<_, _>>(),
		}
	}

	fn service(id: &str, d: &str, e: &str, q: &str) -> Account {
		account(
			id,
			&format!("{d}-{e}-{q}"),
			&[(TAG_DOMAIN, d), (TAG_ENVIRONMENT, e), (TAG_QUALITY, q)],
		)
	}

	fn org() -> Vec<Account> {
		vec![
			account("000000000001", "management", &[]),
			account("000000000002", "audit", &[]),
			service("000000000003", "payments", "production", "beta"),
			service("000000000004", "payments", "staging", "beta"),
			service("000000000005", "admin", "admin", "default"),
		]
	}

	#[test]
	fn test_single_match_resolves() {
		let accounts = org();
		let picked = AccountSelector::service("payments", "production", "beta")
			.select(&accounts, None)
			.unwrap();
		assert_eq!(picked.id, "000000000003");
	}

	#[test]
	fn test_no_match_is_not_found() {
		let accounts = org();
		let err = AccountSelector::service("payments", "production", "gamma")
			.select(&accounts, None)
			.unwrap_err();
		assert!(matches!(err, AwsError::AccountNotFound(_)));
	}

	#[test]
	fn test_two_matches_is_ambiguous() {
		let mut accounts = org();
		accounts.push(service("000000000006", "payments", "production", "beta"));
		let err = AccountSelector::service("payments", "production", "beta")
			.select(&accounts, None)
			.unwrap_err();
		assert!(matches!(err, AwsError::AmbiguousAccount { count: 2 }));
	}

	#[test]
	fn test_admin_and_special() {
		let accounts = org();
		assert_eq!(
			AccountSelector::admin("default")
				.select(&accounts, None)
				.unwrap()
				.id,
			"000000000005"
		);
		assert_eq!(
			AccountSelector::Special("audit".to_string())
				.select(&accounts, None)
				.unwrap()
				.id,
			"000000000002"
		);
	}

	#[test]
	fn test_management_needs_known_id() {
		let accounts = org();
		assert!(AccountSelector::Management.select(&accounts, None).is_err());
		assert_eq!(
			AccountSelector::Management
				.select(&accounts, Some("000000000001"))
				.unwrap()
				.name,
			"management"
		);
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn selection_succeeds_iff_exactly_one_match(copies in 0usize..4, noise in 0usize..4) {
				let mut accounts = Vec::new();
				for i in 0..copies {
					accounts.push(service(&format!("1000000000{i:02}"), "d", "e", "q"));
				}
				for i in 0..noise {
					accounts.push(service(&format!("2000000000{i:02}"), "d", "e", "other"));
				}
				let result = AccountSelector::service("d", "e", "q").select(&accounts, None);
				match copies {
					0 => prop_assert!(matches!(result, Err(AwsError::AccountNotFound(_)))),
					1 => prop_assert_eq!(&result.unwrap().id, "100000000000"),
					n => prop_assert!(
						matches!(result, Err(AwsError::AmbiguousAccount { count }) if count == n),
						"expected ambiguity across {} accounts, got {:?}",
						n,
						result
					),
				}
			}
		}
	}
}
