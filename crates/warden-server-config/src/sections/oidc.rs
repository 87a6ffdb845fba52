// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OIDC client registration with the identity provider.

use serde::Deserialize;
use warden_common_secret::SecretString;

use crate::error::ConfigError;

/// Identity provider family, inferred from the shape of the client id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdpKind {
	Google,
	AzureAd,
	Okta,
}

impl IdpKind {
	/// Google client ids end in `.apps.googleusercontent.com`, Azure AD
	/// application ids are lowercase UUIDs, anything else is Okta.
	pub fn detect(client_id: &str) -> Self {
		if client_id.ends_with(".apps.googleusercontent.com") {
			IdpKind::Google
		} else if is_lowercase_uuid(client_id) {
			IdpKind::AzureAd
		} else {
			IdpKind::Okta
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			IdpKind::Google => "google",
			IdpKind::AzureAd => "azure-ad",
			IdpKind::Okta => "okta",
		}
	}
}

impl std::fmt::Display for IdpKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

fn is_lowercase_uuid(s: &str) -> bool {
	let bytes = s.as_bytes();
	bytes.len() == 36
		&& bytes.iter().enumerate().all(|(i, b)| match i {
			8 | 13 | 18 | 23 => *b == b'-',
			_ => b.is_ascii_digit() || (b'a'..=b'f').contains(b),
		})
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OidcConfigLayer {
	pub client_id: Option<String>,
	pub client_secret: Option<SecretString>,
	/// Okta authorization server, e.g. `https://example.okta.com/oauth2/default`.
	pub okta_issuer: Option<String>,
	pub azure_tenant_id: Option<String>,
	pub redirect_path: Option<String>,
}

impl OidcConfigLayer {
	pub fn merge(&mut self, other: OidcConfigLayer) {
		if other.client_id.is_some() {
			self.client_id = other.client_id;
		}
		if other.client_secret.is_some() {
			self.client_secret = other.client_secret;
		}
		if other.okta_issuer.is_some() {
			self.okta_issuer = other.okta_issuer;
		}
		if other.azure_tenant_id.is_some() {
			self.azure_tenant_id = other.azure_tenant_id;
		}
		if other.redirect_path.is_some() {
			self.redirect_path = other.redirect_path;
		}
	}

	pub fn finalize(self) -> Result<OidcConfig, ConfigError> {
		let client_id = self
			.client_id
			.filter(|s| !s.is_empty())
			.ok_or_else(|| ConfigError::Missing("oidc.client_id".to_string()))?;

		let client_secret = self
			.client_secret
			.filter(|s| !s.is_empty())
			.ok_or_else(|| ConfigError::Missing("oidc.client_secret".to_string()))?;

		let idp = IdpKind::detect(&client_id);
		let okta_issuer = self
			.okta_issuer
			.map(|s| s.trim_end_matches('/').to_string())
			.filter(|s| !s.is_empty());
		let azure_tenant_id = self.azure_tenant_id.filter(|s| !s.is_empty());

		match idp {
			IdpKind::Okta if okta_issuer.is_none() => {
				return Err(ConfigError::Validation(
					"oidc.okta_issuer is required for an Okta client id".to_string(),
				));
			}
			IdpKind::AzureAd if azure_tenant_id.is_none() => {
				return Err(ConfigError::Validation(
					"oidc.azure_tenant_id is required for an Azure AD client id".to_string(),
				));
			}
			_ => {}
		}

		if let Some(issuer) = &okta_issuer {
			if !issuer.starts_with("https://") && !issuer.starts_with("http://") {
				return Err(ConfigError::InvalidValue {
					key: "oidc.okta_issuer".to_string(),
					message: format!("'{issuer}' is not an absolute URL"),
				});
			}
		}

		let redirect_path = self.redirect_path.unwrap_or_else(|| "/login".to_string());
		if !redirect_path.starts_with('/') {
			return Err(ConfigError::InvalidValue {
				key: "oidc.redirect_path".to_string(),
				message: "must start with '/'".to_string(),
			});
		}

		Ok(OidcConfig {
			idp,
			client_id,
			client_secret,
			okta_issuer,
			azure_tenant_id,
			redirect_path,
		})
	}
}

#[derive(Debug, Clone)]
pub struct OidcConfig {
	pub idp: IdpKind,
	pub client_id: String,
	pub client_secret: SecretString,
	pub okta_issuer: Option<String>,
	pub azure_tenant_id: Option<String>,
	pub redirect_path: String,
}
