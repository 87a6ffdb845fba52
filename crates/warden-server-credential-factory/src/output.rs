// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use warden_aws::CredentialSet;

pub const CREDENTIAL_PROCESS_VERSION: u8 = 1;

/// The JSON a `credential_process` command prints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialProcessOutput {
	pub access_key_id: String,
	pub secret_access_key: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_token: Option<String>,
	/// RFC3339.
	pub expiration: String,
	pub version: u8,
}

impl From<&CredentialSet> for CredentialProcessOutput {
	fn from(creds: &CredentialSet) -> Self {
		Self {
			access_key_id: creds.access_key_id().to_string(),
			secret_access_key: creds.secret_access_key().expose().clone(),
			session_token: creds.session_token().map(|t| t.expose().clone()),
			expiration: creds.expiration().to_rfc3339_opts(SecondsFormat::Secs, true),
			version: CREDENTIAL_PROCESS_VERSION,
		}
	}
}

impl fmt::Debug for CredentialProcessOutput {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CredentialProcessOutput")
			.field("access_key_id", &self.access_key_id)
			.field("secret_access_key", &"[REDACTED]")
			.field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
			.field("expiration", &self.expiration)
			.field("version", &self.version)
			.finish()
	}
}
