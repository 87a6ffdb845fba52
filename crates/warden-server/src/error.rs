// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server error types and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use warden_aws::AwsError;
use warden_server_auth_oidc::OidcError;
use warden_server_config::ConfigError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

#[derive(Debug, Error)]
pub enum ServerError {
	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("request took longer than {secs}s")]
	Timeout { secs: u64 },

	#[error(transparent)]
	Aws(#[from] AwsError),

	#[error(transparent)]
	Oidc(#[from] OidcError),

	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("internal error: {0}")]
	Internal(String),
}

impl ServerError {
	pub fn status(&self) -> StatusCode {
		match self {
			ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ServerError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
			ServerError::Aws(e) => match e {
				AwsError::AccountNotFound(_) => StatusCode::NOT_FOUND,
				AwsError::AmbiguousAccount { .. } => StatusCode::BAD_REQUEST,
				_ if e.code() == Some("AccessDenied") => StatusCode::FORBIDDEN,
				_ => StatusCode::INTERNAL_SERVER_ERROR,
			},
			ServerError::Oidc(_) | ServerError::Config(_) | ServerError::Internal(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	fn kind(&self) -> &'static str {
		match self {
			ServerError::BadRequest(_) => "bad_request",
			ServerError::Timeout { .. } => "timeout",
			ServerError::Aws(_) => "aws_error",
			ServerError::Oidc(_) => "oidc_error",
			ServerError::Config(_) => "config_error",
			ServerError::Internal(_) => "internal_error",
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		} else {
			tracing::warn!(error = %self, "request rejected");
		}
		let body = ErrorResponse {
			error: self.kind().to_string(),
			message: self.to_string(),
		};
		(status, Json(body)).into_response()
	}
}
