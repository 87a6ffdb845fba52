// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use serde::Serialize;

pub const TAG_DOMAIN: &str = "Domain";
pub const TAG_ENVIRONMENT: &str = "Environment";
pub const TAG_QUALITY: &str = "Quality";

/// A member account of the organization with its classification tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
	pub id: String,
	pub name: String,
	pub email: String,
	pub tags: BTreeMap<String, String>,
}

impl Account {
	pub fn tag(&self, key: &str) -> Option<&str> {
		self.tags.get(key).map(String::as_str)
	}

	pub fn domain(&self) -> Option<&str> {
		self.tag(TAG_DOMAIN)
	}

	pub fn environment(&self) -> Option<&str> {
		self.tag(TAG_ENVIRONMENT)
	}

	pub fn quality(&self) -> Option<&str> {
		self.tag(TAG_QUALITY)
	}
}

/// Who a credential set says it is, per `GetCallerIdentity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
	pub arn: String,
	pub account_id: String,
	pub user_id: String,
}

/// A resolved principal together with its account's classification tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
	pub principal_arn: String,
	pub account_id: String,
	pub tags: BTreeMap<String, String>,
}
