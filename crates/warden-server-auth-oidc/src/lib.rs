// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OpenID Connect for Warden.
//!
//! Supports Google, Azure AD and Okta, detected from the client id. The flow
//! is the plain authorization code flow:
//!
//! 1. [`LoginState`] carries a fresh nonce and the post-login path through
//!    the IdP in the `state` parameter.
//! 2. [`OidcClient::exchange_code`] trades the returned code for tokens.
//! 3. [`IdTokenVerifier`] checks the ID token signature against the IdP's
//!    published keys, the standard claims and the nonce.
//! 4. [`RoleDirectory`] asks the IdP which cloud role the user holds.
//!
//! Tokens and the client secret are [`warden_common_secret::SecretString`]s
//! and never appear in logs.

pub mod client;
pub mod directory;
pub mod error;
pub mod jwks;
pub mod provider;
pub mod state;
pub mod token;
pub mod verify;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{OidcClient, TokenResponse};
pub use directory::{IdpRoleDirectory, RoleDirectory};
pub use error::{OidcError, OidcResult};
pub use jwks::{
	HttpKeySource, Jwk, JwkSet, KeySource, StaticKeys, KEYS_REFETCH_INTERVAL, KEYS_TTL,
};
pub use provider::{scopes, Endpoints};
pub use state::{csrf_value, nonce, LoginState};
pub use token::{IdToken, IdTokenClaims};
pub use verify::{IdTokenVerifier, LEEWAY_SECS};
