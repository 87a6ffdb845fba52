// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and routing.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use warden_aws::{AwsSession, BaseCredentials, CloudApi, ConsoleFederation, MintPolicy};
use warden_common_http::{new_client_with_timeout, RetryConfig};
use warden_server_auth::{Authorizer, LoginFlow};
use warden_server_auth_oidc::{
	Endpoints, HttpKeySource, IdTokenVerifier, IdpRoleDirectory, OidcClient,
};
use warden_server_config::ServerConfig;
use warden_server_credential_factory::{AllDaySource, CredentialFactory, IamTagStore};

use crate::error::ServerError;
use crate::{gateway, routes};

/// Shared by every handler. Holds no per-request state.
#[derive(Clone)]
pub struct AppState {
	pub login: Arc<LoginFlow>,
	pub authorizer: Arc<Authorizer>,
	pub factory: CredentialFactory,
	pub cloud: Arc<dyn CloudApi>,
	pub base: Arc<dyn BaseCredentials>,
	pub federation: Arc<ConsoleFederation>,
	pub sessions: SessionSettings,
}

/// How sessions for `/accounts` are built.
#[derive(Debug, Clone)]
pub struct SessionSettings {
	pub probe: RetryConfig,
	pub mint: MintPolicy,
	pub credential_factory_user: String,
	pub management_account_id: Option<String>,
	/// Upper bound on one `/accounts` request.
	pub deadline: Duration,
}

impl SessionSettings {
	pub fn from_config(config: &ServerConfig) -> Self {
		Self {
			probe: config.aws.probe_policy(),
			mint: MintPolicy {
				create: config.aws.access_key_policy(),
				delete_all_after: config.aws.access_key_delete_all_after,
				..MintPolicy::default()
			},
			credential_factory_user: config.aws.credential_factory_user.clone(),
			management_account_id: config.aws.management_account_id.clone(),
			deadline: config.credential_factory.fetch_deadline,
		}
	}
}

impl AppState {
	/// A session acting as the broker itself.
	pub async fn base_session(
		&self,
		cancel: tokio_util::sync::CancellationToken,
	) -> Result<AwsSession, ServerError> {
		let creds = self.base.base_credentials().await?;
		Ok(AwsSession::new(Arc::clone(&self.cloud), creds)
			.with_probe_policy(self.sessions.probe.clone())
			.with_cancellation(cancel)
			.with_expected_management_account(self.sessions.management_account_id.clone()))
	}
}

/// Wire the production state from configuration.
pub fn create_app_state(
	config: &ServerConfig,
	cloud: Arc<dyn CloudApi>,
	base: Arc<dyn BaseCredentials>,
) -> Result<AppState, ServerError> {
	let http = new_client_with_timeout(config.http.client_timeout);

	let endpoints = Endpoints::for_config(&config.oidc)?;
	let client = OidcClient::new(&config.oidc, config.redirect_uri())?.with_http(http.clone());
	let keys = HttpKeySource::new(http.clone(), endpoints.keys.clone());
	let verifier = IdTokenVerifier::new(
		Arc::new(keys),
		config.oidc.client_id.clone(),
		endpoints.issuer.clone(),
	);
	let directory =
		IdpRoleDirectory::new(config.oidc.idp, http.clone(), endpoints.directory.clone());
	let authorizer = Authorizer::new(verifier.clone(), Arc::new(directory))
		.with_deadline(config.http.client_timeout * 2);

	let store = IamTagStore::new(
		Arc::clone(&cloud),
		Arc::clone(&base),
		config.aws.credential_factory_user.clone(),
	);
	let source = AllDaySource::from_config(Arc::clone(&cloud), Arc::clone(&base), &config.aws);
	let factory = CredentialFactory::new(
		Arc::new(store),
		Arc::new(source),
		config.credential_factory.clone(),
	);

	let federation = ConsoleFederation::new(http, config.http.public_url("/"))?;

	Ok(AppState {
		login: Arc::new(LoginFlow::new(client, verifier)),
		authorizer: Arc::new(authorizer),
		factory,
		cloud,
		base,
		federation: Arc::new(federation),
		sessions: SessionSettings::from_config(config),
	})
}

/// Create the router with all routes.
///
/// `/login`, `/health` and `/credential-factory/fetch` are public. Every
/// other route goes through the gateway first.
pub fn create_router(state: AppState) -> Router {
	let gated = Router::new()
		.route("/", get(routes::index::whoami))
		.route("/accounts", get(routes::accounts::accounts))
		.route(
			"/credential-factory",
			get(routes::credential_factory::mint),
		)
		.route(
			"/credential-factory/authorize",
			get(routes::credential_factory::authorize),
		)
		.route_layer(from_fn_with_state(state.clone(), gateway::authorize_request));

	Router::new()
		.route("/health", get(routes::health::health_check))
		.route(
			"/login",
			get(routes::login::login_get).post(routes::login::login_post),
		)
		.route(
			"/credential-factory/fetch",
			get(routes::credential_factory::fetch),
		)
		.merge(gated)
		.with_state(state)
}
