// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ID token verification.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::{instrument, warn};

use crate::error::{OidcError, OidcResult};
use crate::jwks::KeySource;
use crate::token::IdTokenClaims;

/// Clock skew tolerated on `exp` and `iat`.
pub const LEEWAY_SECS: u64 = 60;

#[derive(Clone)]
pub struct IdTokenVerifier {
	keys: Arc<dyn KeySource>,
	client_id: String,
	issuer: String,
}

impl std::fmt::Debug for IdTokenVerifier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IdTokenVerifier")
			.field("client_id", &self.client_id)
			.field("issuer", &self.issuer)
			.finish_non_exhaustive()
	}
}

impl IdTokenVerifier {
	pub fn new(
		keys: Arc<dyn KeySource>,
		client_id: impl Into<String>,
		issuer: impl Into<String>,
	) -> Self {
		Self {
			keys,
			client_id: client_id.into(),
			issuer: issuer.into(),
		}
	}

	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	/// Checks the RS256 signature against the IdP's keys, then `aud`, `iss`,
	/// `exp` and `iat`.
	#[instrument(skip_all, fields(issuer = %self.issuer))]
	pub async fn verify(&self, raw: &str) -> OidcResult<IdTokenClaims> {
		let result = self.verify_inner(raw).await;
		if let Err(e) = &result {
			warn!(error = %e, "ID token verification failed");
		}
		result
	}

	/// [`Self::verify`] plus the login nonce check.
	pub async fn verify_with_nonce(&self, raw: &str, nonce: &str) -> OidcResult<IdTokenClaims> {
		let claims = self.verify(raw).await?;
		if claims.nonce.as_deref() != Some(nonce) {
			warn!(principal_id = %claims.principal_id(), "ID token nonce mismatch");
			return Err(OidcError::NonceMismatch);
		}
		Ok(claims)
	}

	async fn verify_inner(&self, raw: &str) -> OidcResult<IdTokenClaims> {
		let header = decode_header(raw).map_err(|e| OidcError::MalformedToken(e.to_string()))?;
		if header.alg != Algorithm::RS256 {
			return Err(OidcError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
		}
		let kid = header
			.kid
			.ok_or_else(|| OidcError::MalformedToken("header has no kid".to_string()))?;
		let key = self.keys.key(&kid).await?;

		let mut validation = Validation::new(Algorithm::RS256);
		validation.leeway = LEEWAY_SECS;
		validation.set_audience(&[self.client_id.as_str()]);
		validation.set_issuer(&[self.issuer.as_str()]);
		validation.set_required_spec_claims(&["exp", "iat", "aud", "iss", "sub"]);

		let claims = decode::<IdTokenClaims>(raw, &key, &validation)?.claims;
		let latest_iat = Utc::now().timestamp() + LEEWAY_SECS as i64;
		if claims.iat > latest_iat {
			return Err(OidcError::IssuedInFuture { iat: claims.iat });
		}
		if claims.email.is_empty() {
			return Err(OidcError::MissingClaim("email"));
		}
		Ok(claims)
	}
}
