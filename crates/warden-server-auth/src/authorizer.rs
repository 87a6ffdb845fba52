// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The access decision made ahead of every protected route.
//!
//! [`Authorizer::authorize`] never fails. Anything that goes wrong while
//! establishing who the caller is or which role they hold leaves the
//! decision at [`Effect::Deny`] with the error recorded in the context.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};
use warden_common_secret::SecretString;
use warden_server_auth_oidc::{IdToken, IdTokenClaims, IdTokenVerifier, RoleDirectory};

use crate::cookies::RequestCookies;
use crate::location::login_location;

pub const POLICY_VERSION: &str = "2012-10-17";
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// Upper bound on verifying the ID token and looking up the role together.
pub const AUTHORIZE_DEADLINE: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
	Allow,
	Deny,
}

impl fmt::Display for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Effect::Allow => "Allow",
			Effect::Deny => "Deny",
		})
	}
}

#[derive(Debug, Clone)]
pub struct AuthorizerRequest {
	pub method: String,
	pub path: String,
	pub raw_query: Option<String>,
	pub cookies: RequestCookies,
	/// Route ARN or route key the policy statement covers.
	pub route: String,
}

/// What downstream handlers know about the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorizerContext {
	#[serde(skip)]
	pub access_token: Option<SecretString>,
	#[serde(rename = "IDToken", skip_serializing_if = "Option::is_none")]
	pub id_token: Option<IdTokenClaims>,
	#[serde(rename = "principalId", skip_serializing_if = "Option::is_none")]
	pub principal_id: Option<String>,
	#[serde(rename = "RoleName", skip_serializing_if = "Option::is_none")]
	pub role_name: Option<String>,
	#[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(rename = "Location")]
	pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
	#[serde(rename = "Version")]
	pub version: &'static str,
	#[serde(rename = "Statement")]
	pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyStatement {
	#[serde(rename = "Action")]
	pub action: Vec<String>,
	#[serde(rename = "Effect")]
	pub effect: Effect,
	#[serde(rename = "Resource")]
	pub resource: Vec<String>,
}

impl PolicyDocument {
	pub fn invoke(effect: Effect, route: &str) -> Self {
		Self {
			version: POLICY_VERSION,
			statement: vec![PolicyStatement {
				action: vec![INVOKE_ACTION.to_string()],
				effect,
				resource: vec![route.to_string()],
			}],
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct Decision {
	#[serde(skip)]
	pub effect: Effect,
	#[serde(rename = "principalId")]
	pub principal_id: String,
	#[serde(rename = "context")]
	pub context: AuthorizerContext,
	#[serde(rename = "policyDocument")]
	pub policy: PolicyDocument,
}

impl Decision {
	pub fn is_allowed(&self) -> bool {
		self.effect == Effect::Allow
	}
}

#[derive(Clone)]
pub struct Authorizer {
	verifier: IdTokenVerifier,
	directory: Arc<dyn RoleDirectory>,
	deadline: Duration,
}

impl fmt::Debug for Authorizer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Authorizer")
			.field("verifier", &self.verifier)
			.field("deadline", &self.deadline)
			.finish_non_exhaustive()
	}
}

impl Authorizer {
	pub fn new(verifier: IdTokenVerifier, directory: Arc<dyn RoleDirectory>) -> Self {
		Self {
			verifier,
			directory,
			deadline: AUTHORIZE_DEADLINE,
		}
	}

	pub fn with_deadline(mut self, deadline: Duration) -> Self {
		self.deadline = deadline;
		self
	}

	#[instrument(skip_all, fields(method = %request.method, path = %request.path))]
	pub async fn authorize(&self, request: &AuthorizerRequest) -> Decision {
		let mut context = AuthorizerContext {
			access_token: request.cookies.access_token.clone(),
			location: login_location(&request.path, request.raw_query.as_deref()),
			..Default::default()
		};

		let raw_id_token = request.cookies.id_token.as_ref().map(|t| t.expose().as_str());
		let effect = match tokio::time::timeout(self.deadline, self.resolve(&mut context, raw_id_token))
			.await
		{
			Ok(effect) => effect,
			Err(_) => {
				warn!(deadline_secs = self.deadline.as_secs(), "authorizer timed out");
				context.role_name = None;
				context.error = Some(format!(
					"authorization did not complete within {}s",
					self.deadline.as_secs()
				));
				Effect::Deny
			}
		};

		let principal_id = context.principal_id.clone().unwrap_or_default();
		info!(
			%effect,
			principal_id = %principal_id,
			role_name = context.role_name.as_deref().unwrap_or(""),
			"authorizer decision"
		);
		Decision {
			effect,
			principal_id,
			policy: PolicyDocument::invoke(effect, &request.route),
			context,
		}
	}

	/// Verify the ID token and resolve the role into `context`.
	async fn resolve(&self, context: &mut AuthorizerContext, raw_id_token: Option<&str>) -> Effect {
		let id_token = match IdToken::from_cookie(raw_id_token).verify(&self.verifier).await {
			Ok(token) => token,
			Err(e) => {
				context.error = Some(e.to_string());
				IdToken::Anonymous
			}
		};

		let mut effect = Effect::Deny;
		if let IdToken::Verified(claims) = &id_token {
			context.principal_id = Some(claims.principal_id().to_string());
			context.id_token = Some(claims.clone());
			match &context.access_token {
				Some(access_token) => match self.directory.role_name(access_token, claims).await {
					Ok(role_name) => {
						context.role_name = Some(role_name);
						effect = Effect::Allow;
					}
					Err(e) => {
						warn!(error = %e, principal_id = %claims.principal_id(), "role lookup failed");
						context.error = Some(e.to_string());
					}
				},
				None => {
					context.error = Some("access token cookie is missing".to_string());
				}
			}
		}
		effect
	}
}
