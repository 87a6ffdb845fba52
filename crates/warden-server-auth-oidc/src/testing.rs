// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test signing keys and a fixed role directory.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use warden_common_secret::SecretString;

use crate::directory::RoleDirectory;
use crate::error::{OidcError, OidcResult};
use crate::jwks::{Jwk, JwkSet, StaticKeys};
use crate::token::IdTokenClaims;
use crate::verify::IdTokenVerifier;

pub const TEST_CLIENT_ID: &str = "0oatestclient";
pub const TEST_ISSUER: &str = "https://example.okta.com/oauth2/default";
pub const TEST_KID: &str = "test-key";

const SIGNING_KEY_PEM: &str = include_str!("../testdata/signing_key.pem");

pub struct TestSigner {
	encoding: EncodingKey,
	n: String,
	e: String,
}

impl TestSigner {
	pub fn shared() -> &'static TestSigner {
		static SIGNER: OnceLock<TestSigner> = OnceLock::new();
		SIGNER.get_or_init(TestSigner::load)
	}

	fn load() -> Self {
		let private =
			RsaPrivateKey::from_pkcs1_pem(SIGNING_KEY_PEM).expect("test signing key parses");
		Self {
			encoding: EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes())
				.expect("test signing key loads"),
			n: URL_SAFE_NO_PAD.encode(private.n().to_bytes_be()),
			e: URL_SAFE_NO_PAD.encode(private.e().to_bytes_be()),
		}
	}

	pub fn kid(&self) -> &str {
		TEST_KID
	}

	pub fn jwk(&self) -> Jwk {
		Jwk {
			kty: "RSA".to_string(),
			kid: Some(TEST_KID.to_string()),
			alg: Some("RS256".to_string()),
			key_use: Some("sig".to_string()),
			n: Some(self.n.clone()),
			e: Some(self.e.clone()),
		}
	}

	pub fn jwks(&self) -> JwkSet {
		JwkSet {
			keys: vec![self.jwk()],
		}
	}

	/// The key set as an IdP publishes it.
	pub fn jwks_json(&self) -> serde_json::Value {
		serde_json::json!({
			"keys": [{
				"kty": "RSA",
				"kid": TEST_KID,
				"alg": "RS256",
				"use": "sig",
				"n": self.n,
				"e": self.e,
			}]
		})
	}

	pub fn keys(&self) -> StaticKeys {
		StaticKeys::from_jwks(&self.jwks())
	}

	/// A verifier for [`TEST_CLIENT_ID`] and [`TEST_ISSUER`] trusting this key.
	pub fn verifier(&self) -> IdTokenVerifier {
		IdTokenVerifier::new(Arc::new(self.keys()), TEST_CLIENT_ID, TEST_ISSUER)
	}

	/// An RS256 ID token for `claims`, addressed to [`TEST_CLIENT_ID`].
	pub fn sign(&self, claims: &IdTokenClaims) -> String {
		self.sign_with_kid(claims, TEST_KID)
	}

	pub fn sign_with_kid(&self, claims: &IdTokenClaims, kid: &str) -> String {
		let mut payload = serde_json::to_value(claims).expect("claims serialize");
		payload["aud"] = serde_json::Value::String(TEST_CLIENT_ID.to_string());
		let mut header = Header::new(Algorithm::RS256);
		header.kid = Some(kid.to_string());
		encode(&header, &payload, &self.encoding).expect("token signs")
	}
}

/// Claims for `email`, issued now and valid for an hour.
pub fn claims_for(email: &str, nonce: Option<&str>) -> IdTokenClaims {
	let now = Utc::now().timestamp();
	IdTokenClaims {
		iss: TEST_ISSUER.to_string(),
		sub: format!("00u-{email}"),
		exp: now + 3600,
		iat: now,
		email: email.to_string(),
		nonce: nonce.map(str::to_string),
		name: None,
		hd: None,
	}
}

/// Role names keyed by principal id.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleDirectory {
	roles: HashMap<String, String>,
}

impl StaticRoleDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_role(mut self, principal_id: &str, role_name: &str) -> Self {
		self.roles
			.insert(principal_id.to_string(), role_name.to_string());
		self
	}
}

#[async_trait]
impl RoleDirectory for StaticRoleDirectory {
	async fn role_name(
		&self,
		_access_token: &SecretString,
		claims: &IdTokenClaims,
	) -> OidcResult<String> {
		self.roles
			.get(claims.principal_id())
			.cloned()
			.ok_or_else(|| OidcError::UndefinedRole(claims.principal_id().to_string()))
	}
}
