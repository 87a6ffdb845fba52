// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for cloud credential operations.

use thiserror::Error;
use warden_common_http::{Cancelled, RetryableError};

/// Result type alias for cloud operations.
pub type AwsResult<T> = Result<T, AwsError>;

/// Error codes the cloud control plane uses for request throttling.
const THROTTLING_CODES: &[&str] = &[
	"Throttling",
	"ThrottlingException",
	"ThrottledException",
	"RequestLimitExceeded",
	"TooManyRequestsException",
	"PriorRequestNotComplete",
];

/// Error codes returned while freshly minted credentials or keys are still
/// propagating.
const PROPAGATION_CODES: &[&str] = &[
	"InvalidClientTokenId",
	"SignatureDoesNotMatch",
	"AccessDenied",
	"AccessDeniedException",
	"AuthFailure",
];

#[derive(Debug, Error)]
pub enum AwsError {
	// =========================================================================
	// Selection Errors
	// =========================================================================
	#[error("AWS account not found: {0}")]
	AccountNotFound(String),

	#[error("found {count} AWS accounts when expecting only one")]
	AmbiguousAccount { count: usize },

	// =========================================================================
	// Setup Errors
	// =========================================================================
	#[error("credentials are for account {account_id}, not the organization's management account, {management_account_id}")]
	NonManagementAccount {
		account_id: String,
		management_account_id: String,
	},

	#[error("AWS Organizations is not in use")]
	OrganizationsNotInUse,

	#[error("invalid ARN: {0}")]
	InvalidArn(String),

	#[error("could not read the organization: {0}")]
	OrganizationReader(#[source] Box<AwsError>),

	// =========================================================================
	// Quota and Duration Errors
	// =========================================================================
	#[error("access key limit exceeded")]
	LimitExceeded,

	#[error("cannot request {requested_secs}s from chained role credentials; role chaining is limited to 3600s")]
	RoleChainingLimit { requested_secs: u64 },

	// =========================================================================
	// Service Errors
	// =========================================================================
	#[error("{operation} failed: {code}: {message}")]
	Service {
		operation: &'static str,
		code: String,
		message: String,
	},

	#[error("{operation} could not reach AWS: {message}")]
	Transport {
		operation: &'static str,
		message: String,
	},

	#[error("{operation} response is missing {field}")]
	MissingField {
		operation: &'static str,
		field: &'static str,
	},

	#[error("federation endpoint error: {0}")]
	Federation(String),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	// =========================================================================
	// Lifecycle Errors
	// =========================================================================
	#[error("operation cancelled")]
	Cancelled,

	#[error("temporary access key {access_key_id} could not be deleted: {source}")]
	AccessKeyCleanup {
		access_key_id: String,
		#[source]
		source: Box<AwsError>,
	},
}

impl AwsError {
	pub fn service(operation: &'static str, code: impl Into<String>, message: impl Into<String>) -> Self {
		AwsError::Service {
			operation,
			code: code.into(),
			message: message.into(),
		}
	}

	pub fn missing(operation: &'static str, field: &'static str) -> Self {
		AwsError::MissingField { operation, field }
	}

	pub fn code(&self) -> Option<&str> {
		match self {
			AwsError::Service { code, .. } => Some(code),
			AwsError::LimitExceeded => Some("LimitExceeded"),
			AwsError::OrganizationsNotInUse => Some("AWSOrganizationsNotInUseException"),
			_ => None,
		}
	}

	pub fn is_throttling(&self) -> bool {
		self.code().is_some_and(|c| THROTTLING_CODES.contains(&c))
	}

	/// Errors that go away on their own once IAM and STS converge.
	pub fn is_propagation(&self) -> bool {
		self.code().is_some_and(|c| PROPAGATION_CODES.contains(&c))
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, AwsError::Cancelled)
	}
}

impl RetryableError for AwsError {
	fn is_retryable(&self) -> bool {
		match self {
			AwsError::Transport { .. } => true,
			AwsError::Http(e) => e.is_retryable(),
			_ => self.is_throttling(),
		}
	}
}

impl From<Cancelled> for AwsError {
	fn from(_: Cancelled) -> Self {
		AwsError::Cancelled
	}
}
