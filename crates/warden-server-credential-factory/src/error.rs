// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the bearer token exchange.

use http::StatusCode;
use thiserror::Error;
use warden_aws::AwsError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type Result<T> = std::result::Result<T, FactoryError>;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("malformed token record: {0:?}")]
	MalformedRecord(String),

	#[error(transparent)]
	Aws(#[from] AwsError),
}

#[derive(Debug, Error)]
pub enum FactoryError {
	// =========================================================================
	// Caller errors
	// =========================================================================
	#[error("query string parameter token is required")]
	TokenRequired,

	#[error("token must be at least {min} characters")]
	TokenTooShort { min: usize },

	#[error("token not previously authorized")]
	NotAuthorized,

	#[error("token authorization expired")]
	Expired,

	// =========================================================================
	// Internal errors
	// =========================================================================
	#[error("token store: {0}")]
	Store(#[from] StoreError),

	#[error("minting credentials: {0}")]
	Mint(#[from] AwsError),

	#[error("minting credentials took longer than {secs}s")]
	DeadlineExceeded { secs: u64 },
}

impl FactoryError {
	pub fn status(&self) -> StatusCode {
		match self {
			FactoryError::TokenRequired | FactoryError::NotAuthorized | FactoryError::Expired => {
				StatusCode::FORBIDDEN
			}
			FactoryError::TokenTooShort { .. } => StatusCode::BAD_REQUEST,
			FactoryError::Store(_) | FactoryError::Mint(_) | FactoryError::DeadlineExceeded { .. } => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_mapping() {
		assert_eq!(FactoryError::TokenRequired.status(), StatusCode::FORBIDDEN);
		assert_eq!(FactoryError::NotAuthorized.status(), StatusCode::FORBIDDEN);
		assert_eq!(FactoryError::Expired.status(), StatusCode::FORBIDDEN);
		assert_eq!(
			FactoryError::TokenTooShort { min: 40 }.status(),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(
			FactoryError::Mint(AwsError::Cancelled).status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[test]
	fn test_messages() {
		assert_eq!(
			FactoryError::TokenRequired.to_string(),
			"query string parameter token is required"
		);
		assert_eq!(FactoryError::NotAuthorized.to_string(), "token not previously authorized");
		assert_eq!(FactoryError::Expired.to_string(), "token authorization expired");
	}
}
