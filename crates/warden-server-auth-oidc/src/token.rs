// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use warden_common_secret::SecretString;

use crate::error::OidcResult;
use crate::verify::IdTokenVerifier;

/// Claims Warden reads from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	pub iss: String,
	pub sub: String,
	pub exp: i64,
	pub iat: i64,
	#[serde(default)]
	pub email: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Google Workspace hosted domain.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hd: Option<String>,
}

impl IdTokenClaims {
	/// The identity Warden authorizes and names sessions after.
	pub fn principal_id(&self) -> &str {
		&self.email
	}

	pub fn email_domain(&self) -> Option<&str> {
		self.email.split_once('@').map(|(_, domain)| domain)
	}
}

/// Where a request's identity stands. Every request starts out
/// [`IdToken::Anonymous`] or [`IdToken::PendingVerification`] and only a
/// successful [`IdToken::verify`] yields [`IdToken::Verified`].
#[derive(Debug, Clone, Default)]
pub enum IdToken {
	#[default]
	Anonymous,
	PendingVerification(SecretString),
	Verified(IdTokenClaims),
}

impl IdToken {
	pub fn from_cookie(value: Option<&str>) -> Self {
		match value.filter(|v| !v.is_empty()) {
			Some(raw) => IdToken::PendingVerification(SecretString::from(raw)),
			None => IdToken::Anonymous,
		}
	}

	/// Verifies a pending token. Anonymous and verified tokens pass through.
	pub async fn verify(self, verifier: &IdTokenVerifier) -> OidcResult<IdToken> {
		match self {
			IdToken::PendingVerification(raw) => {
				let claims = verifier.verify(raw.expose()).await?;
				Ok(IdToken::Verified(claims))
			}
			other => Ok(other),
		}
	}

	pub fn claims(&self) -> Option<&IdTokenClaims> {
		match self {
			IdToken::Verified(claims) => Some(claims),
			_ => None,
		}
	}

	pub fn principal_id(&self) -> Option<&str> {
		self.claims().map(IdTokenClaims::principal_id)
	}
}
