// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The OIDC login handshake.
//!
//! ```text
//! Unauthenticated → RedirectedToIdp → CallbackReceived → TokenExchanged
//!                                                       → Verified → SessionCookiesIssued
//! ```
//!
//! A request without both `code` and `state` starts a login. A request with
//! both is the IdP's callback. Cookies are only ever issued after the ID
//! token and its nonce check out.

use std::fmt;

use serde::Deserialize;
use tracing::{info, instrument, warn};
use warden_server_auth_oidc::{csrf_value, IdTokenVerifier, LoginState, OidcClient, OidcError};
use warden_server_config::IdpKind;

use crate::cookies::{hosted_domain_cookie, session_cookies, SetCookie};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
	Unauthenticated,
	RedirectedToIdp,
	CallbackReceived,
	TokenExchanged,
	Verified,
	SessionCookiesIssued,
}

impl fmt::Display for LoginStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			LoginStage::Unauthenticated => "unauthenticated",
			LoginStage::RedirectedToIdp => "redirected to IdP",
			LoginStage::CallbackReceived => "callback received",
			LoginStage::TokenExchanged => "token exchanged",
			LoginStage::Verified => "verified",
			LoginStage::SessionCookiesIssued => "session cookies issued",
		})
	}
}

/// `/login` parameters, from the query string or a form post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginParams {
	#[serde(default)]
	pub code: Option<String>,
	#[serde(default)]
	pub state: Option<String>,
	#[serde(default)]
	pub next: Option<String>,
	#[serde(default)]
	pub error_description: Option<String>,
}

#[derive(Debug)]
pub enum LoginResponse {
	/// `302 Found` to `location`, setting `cookies`.
	Redirect {
		stage: LoginStage,
		location: String,
		cookies: Vec<SetCookie>,
	},
	/// The IdP sent the user back with an error. Shown with a link to
	/// start over rather than redirecting automatically.
	IdpError {
		description: String,
		retry_url: String,
	},
	/// Diagnostic for a failed callback. No cookies are set.
	Failed { stage: LoginStage, error: String },
}

impl LoginResponse {
	pub fn cookies(&self) -> &[SetCookie] {
		match self {
			LoginResponse::Redirect { cookies, .. } => cookies,
			_ => &[],
		}
	}

	fn failed(stage: LoginStage, error: &OidcError) -> Self {
		warn!(%stage, error = %error, "login failed");
		LoginResponse::Failed {
			stage,
			error: error.to_string(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct LoginFlow {
	client: OidcClient,
	verifier: IdTokenVerifier,
}

impl LoginFlow {
	pub fn new(client: OidcClient, verifier: IdTokenVerifier) -> Self {
		Self { client, verifier }
	}

	/// `hosted_domain` is the `hd` cookie, if any.
	#[instrument(skip_all, fields(idp = %self.client.idp()))]
	pub async fn handle(&self, params: &LoginParams, hosted_domain: Option<&str>) -> LoginResponse {
		let code = params.code.as_deref().filter(|c| !c.is_empty());
		let state = params.state.as_deref().filter(|s| !s.is_empty());
		match (code, state) {
			(Some(code), Some(state)) => self.callback(code, state).await,
			_ => self.start(params, hosted_domain),
		}
	}

	fn start(&self, params: &LoginParams, hosted_domain: Option<&str>) -> LoginResponse {
		let state = LoginState::new(params.next.clone().unwrap_or_default());
		let encoded = match state.encode() {
			Ok(encoded) => encoded,
			Err(e) => return LoginResponse::failed(LoginStage::Unauthenticated, &e),
		};
		let location = self
			.client
			.authorization_url(&encoded, &state.nonce, hosted_domain)
			.to_string();

		match params.error_description.as_deref().filter(|d| !d.is_empty()) {
			Some(description) => LoginResponse::IdpError {
				description: description.to_string(),
				retry_url: location,
			},
			None => LoginResponse::Redirect {
				stage: LoginStage::RedirectedToIdp,
				location,
				cookies: Vec::new(),
			},
		}
	}

	async fn callback(&self, code: &str, raw_state: &str) -> LoginResponse {
		let state = match LoginState::decode(raw_state) {
			Ok(Some(state)) => state,
			Ok(None) => {
				return LoginResponse::failed(
					LoginStage::CallbackReceived,
					&OidcError::InvalidState("empty".to_string()),
				)
			}
			Err(e) => return LoginResponse::failed(LoginStage::CallbackReceived, &e),
		};

		let tokens = match self.client.exchange_code(code).await {
			Ok(tokens) => tokens,
			Err(e) => return LoginResponse::failed(LoginStage::CallbackReceived, &e),
		};

		let claims = match self
			.verifier
			.verify_with_nonce(tokens.id_token.expose(), &state.nonce)
			.await
		{
			Ok(claims) => claims,
			Err(e) => return LoginResponse::failed(LoginStage::TokenExchanged, &e),
		};

		let mut cookies = session_cookies(&tokens.access_token, &tokens.id_token, &csrf_value());
		if self.client.idp() == IdpKind::Google {
			if let Some(domain) = claims.hd.as_deref().or_else(|| claims.email_domain()) {
				cookies.push(hosted_domain_cookie(domain));
			}
		}

		info!(principal_id = %claims.principal_id(), "login succeeded");
		LoginResponse::Redirect {
			stage: LoginStage::SessionCookiesIssued,
			location: state.redirect_target().to_string(),
			cookies,
		}
	}
}
