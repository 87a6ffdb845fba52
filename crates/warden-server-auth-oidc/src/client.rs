// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization code flow against the configured IdP.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;
use warden_common_secret::SecretString;
use warden_server_config::{IdpKind, OidcConfig, DEFAULT_CLIENT_TIMEOUT_SECS};

use crate::error::{OidcError, OidcResult};
use crate::provider::{scopes, Endpoints};

/// Response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
	pub access_token: SecretString,
	pub id_token: SecretString,
	#[serde(default)]
	pub token_type: Option<String>,
	#[serde(default)]
	pub expires_in: Option<u64>,
	#[serde(default)]
	pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
	error: String,
	error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OidcClient {
	idp: IdpKind,
	client_id: String,
	client_secret: SecretString,
	redirect_uri: String,
	endpoints: Endpoints,
	http: reqwest::Client,
}

impl OidcClient {
	/// # Panics
	///
	/// Panics if the HTTP client cannot be built.
	#[instrument(skip_all, fields(idp = %config.idp))]
	pub fn new(config: &OidcConfig, redirect_uri: impl Into<String>) -> OidcResult<Self> {
		let http = warden_common_http::new_client_with_timeout(Duration::from_secs(
			DEFAULT_CLIENT_TIMEOUT_SECS,
		));
		Ok(Self {
			idp: config.idp,
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			redirect_uri: redirect_uri.into(),
			endpoints: Endpoints::for_config(config)?,
			http,
		})
	}

	pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = endpoints;
		self
	}

	/// Use `http` for the token exchange. It should carry a timeout.
	pub fn with_http(mut self, http: reqwest::Client) -> Self {
		self.http = http;
		self
	}

	pub fn idp(&self) -> IdpKind {
		self.idp
	}

	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	pub fn http(&self) -> &reqwest::Client {
		&self.http
	}

	/// The IdP URL to send the browser to. `hosted_domain` pre-selects a
	/// Google Workspace domain and is ignored for other IdPs.
	pub fn authorization_url(&self, state: &str, nonce: &str, hosted_domain: Option<&str>) -> Url {
		let mut url = self.endpoints.authorize.clone();
		{
			let mut query = url.query_pairs_mut();
			query
				.append_pair("client_id", &self.client_id)
				.append_pair("nonce", nonce)
				.append_pair("redirect_uri", &self.redirect_uri)
				.append_pair("response_type", "code")
				.append_pair("scope", &scopes(self.idp))
				.append_pair("state", state);
			if self.idp == IdpKind::Google {
				if let Some(hd) = hosted_domain.filter(|hd| !hd.is_empty()) {
					query.append_pair("hd", hd);
				}
			}
		}
		url
	}

	fn basic_auth_header(&self) -> String {
		let credentials = format!("{}:{}", self.client_id, self.client_secret.expose());
		format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
	}

	#[instrument(skip(self, code), fields(idp = %self.idp))]
	pub async fn exchange_code(&self, code: &str) -> OidcResult<TokenResponse> {
		debug!("exchanging authorization code for tokens");

		let response = self
			.http
			.post(self.endpoints.token.clone())
			.header("Accept", "application/json")
			.header("Authorization", self.basic_auth_header())
			.form(&[
				("grant_type", "authorization_code"),
				("code", code),
				("redirect_uri", &self.redirect_uri),
			])
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;

		if let Ok(error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
			if !error.error.is_empty() {
				return Err(OidcError::Provider(error.error_description.unwrap_or(error.error)));
			}
		}
		if !status.is_success() {
			return Err(OidcError::Provider(format!("token endpoint returned {status}")));
		}

		serde_json::from_str(&body)
			.map_err(|e| OidcError::Parse(format!("failed to parse token response: {e}")))
	}
}
