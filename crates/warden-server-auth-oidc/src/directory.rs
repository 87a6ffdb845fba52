// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The cloud role name each user is entitled to, as recorded in the IdP's
//! user directory.
//!
//! - Okta: `profile.AWS_RoleName` on `/api/v1/users/me`.
//! - Google: the `AWS.RoleName` custom schema field on the Admin SDK user.
//! - Azure AD: the `AWS.RoleName` custom security attribute in Graph.

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;
use warden_common_secret::SecretString;
use warden_server_config::IdpKind;

use crate::error::{OidcError, OidcResult};
use crate::token::IdTokenClaims;

#[async_trait]
pub trait RoleDirectory: Send + Sync {
	/// The role name for the verified identity, looked up with the user's
	/// own access token.
	async fn role_name(&self, access_token: &SecretString, claims: &IdTokenClaims)
		-> OidcResult<String>;
}

#[derive(Debug, Clone)]
pub struct IdpRoleDirectory {
	idp: IdpKind,
	http: reqwest::Client,
	base: Url,
}

impl IdpRoleDirectory {
	/// `base` is the directory API origin, see [`crate::Endpoints::directory`].
	pub fn new(idp: IdpKind, http: reqwest::Client, base: Url) -> Self {
		Self { idp, http, base }
	}

	fn lookup_url(&self, principal_id: &str) -> OidcResult<Url> {
		let join = |path: &str| {
			self.base
				.join(path)
				.map_err(|e| OidcError::Endpoint(format!("{path}: {e}")))
		};
		match self.idp {
			IdpKind::Okta => join("/api/v1/users/me"),
			IdpKind::Google => {
				let mut url = join("/admin/directory/v1/users/")?;
				url.path_segments_mut()
					.map_err(|_| OidcError::Endpoint(self.base.to_string()))?
					.pop_if_empty()
					.push(principal_id);
				url.query_pairs_mut()
					.append_pair("customFieldMask", "AWS")
					.append_pair("projection", "custom")
					.append_pair("viewType", "domain_public");
				Ok(url)
			}
			IdpKind::AzureAd => {
				let mut url = join("/v1.0/users/")?;
				url.path_segments_mut()
					.map_err(|_| OidcError::Endpoint(self.base.to_string()))?
					.pop_if_empty()
					.push(principal_id);
				url.query_pairs_mut()
					.append_pair("$select", "customSecurityAttributes");
				Ok(url)
			}
		}
	}

	fn role_pointer(&self) -> &'static str {
		match self.idp {
			IdpKind::Okta => "/profile/AWS_RoleName",
			IdpKind::Google => "/customSchemas/AWS/RoleName",
			IdpKind::AzureAd => "/customSecurityAttributes/AWS/RoleName",
		}
	}
}

#[async_trait]
impl RoleDirectory for IdpRoleDirectory {
	#[instrument(skip(self, access_token, claims), fields(idp = %self.idp, principal_id = %claims.principal_id()))]
	async fn role_name(
		&self,
		access_token: &SecretString,
		claims: &IdTokenClaims,
	) -> OidcResult<String> {
		let url = self.lookup_url(claims.principal_id())?;
		let response = self
			.http
			.get(url)
			.header("Accept", "application/json")
			.bearer_auth(access_token.expose())
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(OidcError::Provider(format!(
				"directory lookup returned {status}: {body}"
			)));
		}

		let profile: serde_json::Value = response
			.json()
			.await
			.map_err(|e| OidcError::Parse(format!("failed to parse directory entry: {e}")))?;
		let role_name = profile
			.pointer(self.role_pointer())
			.and_then(|v| v.as_str())
			.filter(|s| !s.is_empty())
			.ok_or_else(|| OidcError::UndefinedRole(claims.principal_id().to_string()))?;
		debug!(role_name, "resolved role from directory");
		Ok(role_name.to_string())
	}
}
