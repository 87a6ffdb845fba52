// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-IdP endpoints and scopes.
//!
//! Google and Azure AD have fixed endpoints (Azure scoped to a tenant).
//! Okta endpoints hang off the configured authorization server.

use url::Url;
use warden_server_config::{IdpKind, OidcConfig};

use crate::error::{OidcError, OidcResult};

const GOOGLE_ISSUER: &str = "https://accounts.google.com";
const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_KEYS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_DIRECTORY_URL: &str = "https://admin.googleapis.com";

const AZURE_LOGIN_URL: &str = "https://login.microsoftonline.com";
const AZURE_GRAPH_URL: &str = "https://graph.microsoft.com";

const BASE_SCOPES: &str = "openid email profile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
	/// Expected `iss` claim.
	pub issuer: String,
	pub authorize: Url,
	pub token: Url,
	pub keys: Url,
	/// Origin of the API that carries the per-user role name.
	pub directory: Url,
}

impl Endpoints {
	pub fn for_config(config: &OidcConfig) -> OidcResult<Self> {
		match config.idp {
			IdpKind::Google => Ok(Self {
				issuer: GOOGLE_ISSUER.to_string(),
				authorize: parse(GOOGLE_AUTHORIZE_URL)?,
				token: parse(GOOGLE_TOKEN_URL)?,
				keys: parse(GOOGLE_KEYS_URL)?,
				directory: parse(GOOGLE_DIRECTORY_URL)?,
			}),
			IdpKind::AzureAd => {
				let tenant = config
					.azure_tenant_id
					.as_deref()
					.ok_or_else(|| OidcError::Endpoint("Azure AD needs a tenant id".to_string()))?;
				Ok(Self {
					issuer: format!("{AZURE_LOGIN_URL}/{tenant}/v2.0"),
					authorize: parse(&format!("{AZURE_LOGIN_URL}/{tenant}/oauth2/v2.0/authorize"))?,
					token: parse(&format!("{AZURE_LOGIN_URL}/{tenant}/oauth2/v2.0/token"))?,
					keys: parse(&format!("{AZURE_LOGIN_URL}/{tenant}/discovery/v2.0/keys"))?,
					directory: parse(AZURE_GRAPH_URL)?,
				})
			}
			IdpKind::Okta => {
				let issuer = config
					.okta_issuer
					.as_deref()
					.ok_or_else(|| OidcError::Endpoint("Okta needs an issuer".to_string()))?;
				let issuer_url = parse(issuer)?;
				let directory = parse(&issuer_url.origin().ascii_serialization())?;
				Ok(Self {
					issuer: issuer.to_string(),
					authorize: parse(&format!("{issuer}/v1/authorize"))?,
					token: parse(&format!("{issuer}/v1/token"))?,
					keys: parse(&format!("{issuer}/v1/keys"))?,
					directory,
				})
			}
		}
	}

	/// Endpoints rooted at `base`, for pointing a client at a local server.
	pub fn rooted_at(base: &Url, issuer: impl Into<String>) -> OidcResult<Self> {
		let join = |path: &str| {
			base.join(path)
				.map_err(|e| OidcError::Endpoint(format!("{base}{path}: {e}")))
		};
		Ok(Self {
			issuer: issuer.into(),
			authorize: join("/authorize")?,
			token: join("/token")?,
			keys: join("/keys")?,
			directory: base.clone(),
		})
	}
}

/// The scopes requested at authorization, which must include whatever the
/// role directory lookup needs.
pub fn scopes(idp: IdpKind) -> String {
	let extra = match idp {
		IdpKind::Google => "https://www.googleapis.com/auth/admin.directory.user.readonly",
		IdpKind::Okta => "okta.users.read.self",
		IdpKind::AzureAd => "CustomSecAttributeAssignment.Read.All User.Read",
	};
	format!("{BASE_SCOPES} {extra}")
}

fn parse(s: &str) -> OidcResult<Url> {
	Url::parse(s).map_err(|e| OidcError::Endpoint(format!("{s}: {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_common_secret::SecretString;

	fn config(client_id: &str) -> OidcConfig {
		OidcConfig {
			idp: IdpKind::detect(client_id),
			client_id: client_id.to_string(),
			client_secret: SecretString::from("secret"),
			okta_issuer: Some("https://example.okta.com/oauth2/default".to_string()),
			azure_tenant_id: Some("contoso".to_string()),
			redirect_path: "/login".to_string(),
		}
	}

	#[test]
	fn test_okta_endpoints_follow_issuer() {
		let endpoints = Endpoints::for_config(&config("0oa1example")).unwrap();
		assert_eq!(endpoints.issuer, "https://example.okta.com/oauth2/default");
		assert_eq!(
			endpoints.keys.as_str(),
			"https://example.okta.com/oauth2/default/v1/keys"
		);
		assert_eq!(endpoints.directory.as_str(), "https://example.okta.com/");
	}

	#[test]
	fn test_google_endpoints() {
		let endpoints =
			Endpoints::for_config(&config("123-abc.apps.googleusercontent.com")).unwrap();
		assert_eq!(endpoints.issuer, GOOGLE_ISSUER);
		assert_eq!(endpoints.token.as_str(), GOOGLE_TOKEN_URL);
	}

	#[test]
	fn test_azure_endpoints_are_tenant_scoped() {
		let endpoints =
			Endpoints::for_config(&config("6f1b2c3d-1111-4222-8333-444455556666")).unwrap();
		assert_eq!(endpoints.issuer, "https://login.microsoftonline.com/contoso/v2.0");
		assert_eq!(
			endpoints.authorize.as_str(),
			"https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize"
		);
	}

	#[test]
	fn test_scopes_grant_directory_access() {
		assert!(scopes(IdpKind::Okta).ends_with("okta.users.read.self"));
		assert!(scopes(IdpKind::Google).starts_with("openid email profile "));
		assert!(scopes(IdpKind::AzureAd).contains("User.Read"));
	}
}
