// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Console sign-in URLs.
//!
//! Temporary credentials are traded at the federation endpoint for a
//! one-time sign-in token. Only that token and the final URL ever reach the
//! browser.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::credentials::CredentialSet;
use crate::error::{AwsError, AwsResult};

pub const DEFAULT_FEDERATION_ENDPOINT: &str = "https://signin.aws.amazon.com/federation";
pub const DEFAULT_DESTINATION: &str = "https://console.aws.amazon.com/";
const CONSOLE_HOST: &str = "console.aws.amazon.com";

#[derive(Serialize)]
struct SessionPayload<'a> {
	#[serde(rename = "sessionId")]
	session_id: &'a str,
	#[serde(rename = "sessionKey")]
	session_key: &'a str,
	#[serde(rename = "sessionToken")]
	session_token: &'a str,
}

#[derive(Deserialize)]
struct SigninTokenResponse {
	#[serde(rename = "SigninToken")]
	signin_token: String,
}

#[derive(Debug, Clone)]
pub struct ConsoleFederation {
	http: reqwest::Client,
	endpoint: Url,
	issuer: String,
}

impl ConsoleFederation {
	/// `issuer` is the origin the console links back to, e.g.
	/// `https://warden.example.com/`.
	pub fn new(http: reqwest::Client, issuer: impl Into<String>) -> AwsResult<Self> {
		let endpoint = Url::parse(DEFAULT_FEDERATION_ENDPOINT)
			.map_err(|e| AwsError::Federation(e.to_string()))?;
		Ok(Self {
			http,
			endpoint,
			issuer: issuer.into(),
		})
	}

	pub fn with_endpoint(mut self, endpoint: Url) -> Self {
		self.endpoint = endpoint;
		self
	}

	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	#[instrument(skip(self, creds), fields(account_id = %creds.account_id()))]
	pub async fn signin_token(&self, creds: &CredentialSet) -> AwsResult<String> {
		let session_token = creds.session_token().ok_or_else(|| {
			AwsError::Federation("console federation needs temporary credentials".to_string())
		})?;
		let session = serde_json::to_string(&SessionPayload {
			session_id: creds.access_key_id(),
			session_key: creds.secret_access_key().expose(),
			session_token: session_token.expose(),
		})
		.map_err(|e| AwsError::Federation(e.to_string()))?;

		let response = self
			.http
			.get(self.endpoint.clone())
			.query(&[("Action", "getSigninToken"), ("Session", session.as_str())])
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(AwsError::Federation(format!(
				"getSigninToken returned {status}: {body}"
			)));
		}

		let parsed: SigninTokenResponse = response
			.json()
			.await
			.map_err(|e| AwsError::Federation(format!("unreadable getSigninToken response: {e}")))?;
		debug!("obtained console sign-in token");
		Ok(parsed.signin_token)
	}

	/// A console URL signed in as `creds`, landing on `destination` when it
	/// is a console URL and on the console home page otherwise.
	pub async fn signin_url(
		&self,
		creds: &CredentialSet,
		destination: Option<&str>,
	) -> AwsResult<Url> {
		let token = self.signin_token(creds).await?;
		let mut url = self.endpoint.clone();
		url.query_pairs_mut()
			.clear()
			.append_pair("Action", "login")
			.append_pair("Destination", &validate_destination(destination))
			.append_pair("Issuer", &self.issuer)
			.append_pair("SigninToken", &token);
		Ok(url)
	}
}

/// `destination` if it is an https URL on the console, else the default.
pub fn validate_destination(destination: Option<&str>) -> String {
	let Some(candidate) = destination.filter(|d| !d.is_empty()) else {
		return DEFAULT_DESTINATION.to_string();
	};
	let Ok(url) = Url::parse(candidate) else {
		return DEFAULT_DESTINATION.to_string();
	};
	let on_console = url.host_str().is_some_and(|host| {
		host == CONSOLE_HOST || host.ends_with(&format!(".{CONSOLE_HOST}"))
	});
	if url.scheme() == "https" && on_console && url.username().is_empty() && url.password().is_none() {
		url.to_string()
	} else {
		DEFAULT_DESTINATION.to_string()
	}
}
