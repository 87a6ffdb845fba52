// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type OidcResult<T> = Result<T, OidcError>;

#[derive(Debug, Error)]
pub enum OidcError {
	// =========================================================================
	// Transport
	// =========================================================================
	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("failed to parse response: {0}")]
	Parse(String),

	/// The IdP answered with an OAuth error or a non-success status.
	#[error("identity provider error: {0}")]
	Provider(String),

	#[error("invalid endpoint: {0}")]
	Endpoint(String),

	// =========================================================================
	// Verification
	// =========================================================================
	#[error("malformed JWT: {0}")]
	MalformedToken(String),

	#[error("signing key {0} not found")]
	KeyNotFound(String),

	#[error("unsupported signing algorithm {0}")]
	UnsupportedAlgorithm(String),

	#[error("ID token rejected: {0}")]
	InvalidToken(#[from] jsonwebtoken::errors::Error),

	#[error("ID token not issued until {iat}")]
	IssuedInFuture { iat: i64 },

	#[error("ID token is missing the {0} claim")]
	MissingClaim(&'static str),

	#[error("nonce in the ID token does not match the login state")]
	NonceMismatch,

	#[error("invalid login state: {0}")]
	InvalidState(String),

	// =========================================================================
	// Directory
	// =========================================================================
	#[error("no AWS role name is defined for {0}")]
	UndefinedRole(String),
}

impl OidcError {
	/// Whether this error means the presented token cannot be trusted, as
	/// opposed to the IdP being unreachable.
	pub fn is_verification_failure(&self) -> bool {
		matches!(
			self,
			OidcError::MalformedToken(_)
				| OidcError::KeyNotFound(_)
				| OidcError::UnsupportedAlgorithm(_)
				| OidcError::InvalidToken(_)
				| OidcError::IssuedInFuture { .. }
				| OidcError::MissingClaim(_)
				| OidcError::NonceMismatch
				| OidcError::InvalidState(_)
		)
	}
}
