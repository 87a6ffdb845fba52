// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The stored side of an authorized bearer token.
//!
//! Stored under `CredentialFactory:<token>` with the value
//! `"<principal id> <role name> expiry <RFC3339>"`.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{StoreError, StoreResult};

pub const TAG_KEY_PREFIX: &str = "CredentialFactory:";
/// Written by earlier deployments. Only garbage collection looks at it.
pub const LEGACY_TAG_KEY_PREFIX: &str = "substrate-credential-factory:";

const EXPIRY_MARKER: &str = "expiry";

pub fn tag_key(token: &str) -> String {
	format!("{TAG_KEY_PREFIX}{token}")
}

pub fn is_token_key(key: &str) -> bool {
	key.starts_with(TAG_KEY_PREFIX) || key.starts_with(LEGACY_TAG_KEY_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerTokenRecord {
	pub principal_id: String,
	pub role_name: String,
	pub expiry: DateTime<Utc>,
}

impl BearerTokenRecord {
	/// A record expiring `ttl` after `now`, truncated to whole seconds.
	pub fn new(
		principal_id: impl Into<String>,
		role_name: impl Into<String>,
		now: DateTime<Utc>,
		ttl: Duration,
	) -> Self {
		let expiry = now + chrono::Duration::seconds(ttl.as_secs() as i64);
		let expiry = DateTime::from_timestamp(expiry.timestamp(), 0).unwrap_or(expiry);
		Self {
			principal_id: principal_id.into(),
			role_name: role_name.into(),
			expiry,
		}
	}

	pub fn encode(&self) -> String {
		format!(
			"{} {} {EXPIRY_MARKER} {}",
			self.principal_id,
			self.role_name,
			self.expiry.to_rfc3339_opts(SecondsFormat::Secs, true)
		)
	}

	pub fn parse(value: &str) -> StoreResult<Self> {
		let malformed = || StoreError::MalformedRecord(value.to_string());
		let parts: Vec<&str> = value.split_whitespace().collect();
		let [principal_id, role_name, marker, expiry] = parts.as_slice() else {
			return Err(malformed());
		};
		if *marker != EXPIRY_MARKER {
			return Err(malformed());
		}
		let expiry = DateTime::parse_from_rfc3339(expiry)
			.map_err(|_| malformed())?
			.with_timezone(&Utc);
		Ok(Self {
			principal_id: principal_id.to_string(),
			role_name: role_name.to_string(),
			expiry,
		})
	}

	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		now > self.expiry
	}
}
