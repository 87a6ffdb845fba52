// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Well-known role names and IAM ARN parsing.

use crate::credentials::Principal;
use crate::error::AwsError;

pub const ORGANIZATION_READER: &str = "OrganizationReader";
pub const ORGANIZATION_ADMINISTRATOR: &str = "OrganizationAdministrator";
pub const ADMINISTRATOR: &str = "Administrator";
pub const AUDITOR: &str = "Auditor";

pub fn role_arn(account_id: &str, role_name: &str) -> String {
	format!("arn:aws:iam::{account_id}:role/{role_name}")
}

/// A parsed IAM or STS principal ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalArn {
	pub partition: String,
	pub account_id: String,
	pub principal: Principal,
}

/// Parse `arn:<partition>:{iam|sts}::<account>:<resource>`.
///
/// Understands `role/<path/>name`, `assumed-role/<name>/<session>`,
/// `user/<path/>name` and `root`.
pub fn parse_principal_arn(arn: &str) -> Result<PrincipalArn, AwsError> {
	let invalid = || AwsError::InvalidArn(arn.to_string());

	let mut parts = arn.splitn(6, ':');
	let (Some("arn"), Some(partition), Some(service), Some(""), Some(account_id), Some(resource)) = (
		parts.next(),
		parts.next(),
		parts.next(),
		parts.next(),
		parts.next(),
		parts.next(),
	) else {
		return Err(invalid());
	};

	if service != "iam" && service != "sts" {
		return Err(invalid());
	}
	if account_id.len() != 12 || !account_id.bytes().all(|b| b.is_ascii_digit()) {
		return Err(invalid());
	}

	let principal = if resource == "root" {
		Principal::Root
	} else if let Some(rest) = resource.strip_prefix("assumed-role/") {
		let name = rest.split('/').next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
		Principal::Role(name.to_string())
	} else if let Some(rest) = resource.strip_prefix("role/") {
		let name = rest.rsplit('/').next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
		Principal::Role(name.to_string())
	} else if let Some(rest) = resource.strip_prefix("user/") {
		let name = rest.rsplit('/').next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
		Principal::User(name.to_string())
	} else {
		return Err(invalid());
	};

	Ok(PrincipalArn {
		partition: partition.to_string(),
		account_id: account_id.to_string(),
		principal,
	})
}
