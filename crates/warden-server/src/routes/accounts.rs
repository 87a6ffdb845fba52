// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `/accounts`: list the organization, or sign in to one account's console.
//!
//! Console sign-in goes through the caller's own role first. Assuming the
//! target role from there is what checks the caller may use it.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use warden_aws::{AllDayMinter, AwsSession, CredentialSet, ROLE_CHAINING_LIMIT};
use warden_server_auth::AuthorizerContext;

use crate::api::AppState;
use crate::error::ServerError;
use crate::gateway::redirect_found;

pub const CREDENTIALS_EXPIRE_HEADER: &str = "X-Substrate-Credentials-Expire";

#[derive(Debug, Default, Deserialize)]
pub struct AccountsQuery {
	#[serde(default)]
	pub number: Option<String>,
	#[serde(default)]
	pub role: Option<String>,
	#[serde(default)]
	pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
	pub id: String,
	pub name: String,
	pub tags: BTreeMap<String, String>,
}

/// GET /accounts - Console sign-in with `number` and `role`, the account
/// list without.
pub async fn accounts(
	State(state): State<AppState>,
	Extension(context): Extension<AuthorizerContext>,
	Query(query): Query<AccountsQuery>,
) -> Result<Response, ServerError> {
	let principal_id = context.principal_id.clone().unwrap_or_default();
	let cancel = CancellationToken::new();
	let _cancel_on_drop = cancel.clone().drop_guard();
	let deadline = state.sessions.deadline;

	let work = async {
		let base = state.base_session(cancel.clone()).await?;
		let number = query.number.as_deref().filter(|s| !s.is_empty());
		let role = query.role.as_deref().filter(|s| !s.is_empty());
		match (number, role) {
			(Some(account_id), Some(role_name)) => {
				let caller_role = context.role_name.as_deref().ok_or_else(|| {
					ServerError::BadRequest("no role resolved for this session".to_string())
				})?;
				console_redirect(
					&state,
					&base,
					caller_role,
					account_id,
					role_name,
					&principal_id,
					query.next.as_deref(),
				)
				.await
			}
			(None, None) => list_accounts(&base, &principal_id).await,
			_ => Err(ServerError::BadRequest(
				"number and role must be given together".to_string(),
			)),
		}
	};

	tokio::time::timeout(deadline, work)
		.await
		.map_err(|_| ServerError::Timeout {
			secs: deadline.as_secs(),
		})?
}

async fn list_accounts(base: &AwsSession, principal_id: &str) -> Result<Response, ServerError> {
	let accounts = base.list_accounts(principal_id).await?;
	let summaries: Vec<AccountSummary> = accounts
		.into_iter()
		.map(|account| AccountSummary {
			id: account.id,
			name: account.name,
			tags: account.tags,
		})
		.collect();
	Ok(Json(summaries).into_response())
}

#[instrument(skip(state, base, principal_id, next))]
async fn console_redirect(
	state: &AppState,
	base: &AwsSession,
	caller_role: &str,
	account_id: &str,
	role_name: &str,
	principal_id: &str,
	next: Option<&str>,
) -> Result<Response, ServerError> {
	let own_account = base.credentials().account_id().to_string();
	let as_caller = base
		.assume_role(&own_account, caller_role, principal_id, ROLE_CHAINING_LIMIT)
		.await?;
	let one_hour = as_caller
		.assume_role(account_id, role_name, principal_id, ROLE_CHAINING_LIMIT)
		.await?;

	let creds = match all_day(state, base, account_id, role_name, principal_id).await {
		Ok(creds) => creds,
		Err(e) => {
			warn!(error = %e, "falling back to one hour console session");
			one_hour.credentials().clone()
		}
	};

	let url = state.federation.signin_url(&creds, next).await?;
	let expires = creds.expiration().to_rfc3339_opts(SecondsFormat::Secs, true);
	info!(expiration = %expires, "console sign-in issued");

	let mut response = redirect_found(url.as_str());
	let value = HeaderValue::from_str(&expires)
		.map_err(|e| ServerError::Internal(format!("expiry header: {e}")))?;
	response.headers_mut().insert(CREDENTIALS_EXPIRE_HEADER, value);
	Ok(response)
}

async fn all_day(
	state: &AppState,
	base: &AwsSession,
	account_id: &str,
	role_name: &str,
	principal_id: &str,
) -> Result<CredentialSet, ServerError> {
	let minter = AllDayMinter::new(base.clone(), state.sessions.credential_factory_user.clone())
		.with_policy(state.sessions.mint.clone());
	Ok(minter.mint(account_id, role_name, principal_id).await?)
}
