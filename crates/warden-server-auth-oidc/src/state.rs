// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The OAuth `state` parameter and the random values minted per login.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{OidcError, OidcResult};

const NONCE_BYTES: usize = 12;
const CSRF_BYTES: usize = 48;

/// Round-tripped through the IdP untouched. `Nonce` must come back in the
/// ID token; `Next` is where the browser goes once logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
	#[serde(rename = "Next")]
	pub next: String,
	#[serde(rename = "Nonce")]
	pub nonce: String,
}

impl LoginState {
	/// A state for a new login attempt with a fresh nonce.
	pub fn new(next: impl Into<String>) -> Self {
		Self {
			next: next.into(),
			nonce: nonce(),
		}
	}

	pub fn encode(&self) -> OidcResult<String> {
		let json = serde_json::to_vec(self).map_err(|e| OidcError::InvalidState(e.to_string()))?;
		Ok(URL_SAFE_NO_PAD.encode(json))
	}

	/// `None` for an empty parameter.
	pub fn decode(raw: &str) -> OidcResult<Option<Self>> {
		if raw.is_empty() {
			return Ok(None);
		}
		let json = URL_SAFE_NO_PAD
			.decode(raw)
			.map_err(|e| OidcError::InvalidState(format!("not base64url: {e}")))?;
		serde_json::from_slice(&json)
			.map(Some)
			.map_err(|e| OidcError::InvalidState(e.to_string()))
	}

	/// `next` if it is a path on this site, `/` otherwise.
	pub fn redirect_target(&self) -> &str {
		if is_local_path(&self.next) {
			&self.next
		} else {
			"/"
		}
	}
}

fn is_local_path(next: &str) -> bool {
	next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}

/// 12 random bytes, base64url.
pub fn nonce() -> String {
	URL_SAFE.encode(random_bytes::<NONCE_BYTES>())
}

/// 48 random bytes, base64url without padding.
pub fn csrf_value() -> String {
	URL_SAFE_NO_PAD.encode(random_bytes::<CSRF_BYTES>())
}

fn random_bytes<const N: usize>() -> [u8; N] {
	let mut bytes = [0u8; N];
	OsRng.fill_bytes(&mut bytes);
	bytes
}
