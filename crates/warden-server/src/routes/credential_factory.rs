// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential Factory routes.
//!
//! Errors use the `{"Error": "..."}` body `credential_process` helpers
//! expect, not the server's usual error shape.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use warden_server_auth::AuthorizerContext;
use warden_server_credential_factory::FactoryError;

use crate::api::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
	#[serde(default)]
	pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FactoryErrorResponse {
	#[serde(rename = "Error")]
	pub error: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
	#[serde(rename = "principalId")]
	pub principal_id: String,
	#[serde(rename = "RoleName")]
	pub role_name: String,
	#[serde(rename = "Expiry")]
	pub expiry: String,
}

fn factory_error(e: FactoryError) -> Response {
	let status = e.status();
	if status.is_server_error() {
		tracing::error!(error = %e, "credential factory failed");
	}
	(status, Json(FactoryErrorResponse { error: e.to_string() })).into_response()
}

fn caller(context: &AuthorizerContext) -> Result<(&str, &str), Response> {
	match (context.principal_id.as_deref(), context.role_name.as_deref()) {
		(Some(principal_id), Some(role_name)) => Ok((principal_id, role_name)),
		_ => Err((
			StatusCode::FORBIDDEN,
			Json(FactoryErrorResponse {
				error: "no role resolved for this session".to_string(),
			}),
		)
			.into_response()),
	}
}

/// GET /credential-factory - Credentials for the signed-in caller's role.
pub async fn mint(
	State(state): State<AppState>,
	Extension(context): Extension<AuthorizerContext>,
) -> Response {
	let (principal_id, role_name) = match caller(&context) {
		Ok(caller) => caller,
		Err(response) => return response,
	};
	match state.factory.mint(principal_id, role_name).await {
		Ok(output) => Json(output).into_response(),
		Err(e) => factory_error(e),
	}
}

/// GET /credential-factory/authorize?token=... - Let `token` be redeemed as
/// the signed-in caller.
pub async fn authorize(
	State(state): State<AppState>,
	Extension(context): Extension<AuthorizerContext>,
	Query(query): Query<TokenQuery>,
) -> Response {
	let (principal_id, role_name) = match caller(&context) {
		Ok(caller) => caller,
		Err(response) => return response,
	};
	match state
		.factory
		.authorize(query.token.as_deref(), principal_id, role_name)
		.await
	{
		Ok(record) => Json(AuthorizeResponse {
			principal_id: record.principal_id,
			role_name: record.role_name,
			expiry: record
				.expiry
				.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
		})
		.into_response(),
		Err(e) => factory_error(e),
	}
}

/// GET /credential-factory/fetch?token=... - Redeem an authorized token.
/// Not behind the gateway: the token is the credential.
pub async fn fetch(State(state): State<AppState>, Query(query): Query<TokenQuery>) -> Response {
	match state.factory.fetch(query.token.as_deref()).await {
		Ok(output) => Json(output).into_response(),
		Err(e) => factory_error(e),
	}
}
