// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Integration tests for the HTTP surface.
//!
//! Tests cover:
//! - Gateway redirects for anonymous requests
//! - The login handshake against a mock IdP token endpoint
//! - Credential Factory authorize, fetch and replay
//! - Account listing and console sign-in

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;
use url::Url;
use warden_aws::testing::FakeCloud;
use warden_aws::{ConsoleFederation, MintPolicy, Principal, StaticBaseCredentials};
use warden_common_http::RetryConfig;
use warden_common_secret::SecretString;
use warden_server::{create_router, AppState, SessionSettings};
use warden_server_auth::{Authorizer, LoginFlow};
use warden_server_auth_oidc::testing::{
	claims_for, StaticRoleDirectory, TestSigner, TEST_CLIENT_ID, TEST_ISSUER,
};
use warden_server_auth_oidc::{Endpoints, LoginState, OidcClient};
use warden_server_config::{CredentialFactoryConfig, IdpKind, OidcConfig};
use warden_server_credential_factory::{AllDaySource, CredentialFactory, IamTagStore};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BROKER_ACCOUNT: &str = "111111111111";
const MANAGEMENT_ACCOUNT: &str = "000000000000";
const MEMBER_ACCOUNT: &str = "222222222222";
const USER: &str = "CredentialFactory";
const TOKEN: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCD";

struct TestApp {
	router: Router,
	cloud: Arc<FakeCloud>,
	idp: MockServer,
	federation: MockServer,
}

impl TestApp {
	async fn new() -> Self {
		let idp = MockServer::start().await;
		let federation = MockServer::start().await;

		let cloud = Arc::new(FakeCloud::new().with_management_account(MANAGEMENT_ACCOUNT));
		cloud.add_user(USER);
		cloud.add_account(MANAGEMENT_ACCOUNT, "management", &[]);
		cloud.add_account(
			BROKER_ACCOUNT,
			"admin",
			&[("Domain", "admin"), ("Environment", "admin"), ("Quality", "default")],
		);
		cloud.add_account(
			MEMBER_ACCOUNT,
			"payments-production",
			&[("Domain", "payments"), ("Environment", "production"), ("Quality", "beta")],
		);
		let base = Arc::new(StaticBaseCredentials(
			cloud.seed_credentials(BROKER_ACCOUNT, Principal::Role("Intranet".to_string())),
		));

		let oidc = OidcConfig {
			idp: IdpKind::Okta,
			client_id: TEST_CLIENT_ID.to_string(),
			client_secret: SecretString::from("secret"),
			okta_issuer: Some(TEST_ISSUER.to_string()),
			azure_tenant_id: None,
			redirect_path: "/login".to_string(),
		};
		let idp_base = Url::parse(&idp.uri()).unwrap();
		let client = OidcClient::new(&oidc, "https://warden.example.com/login")
			.unwrap()
			.with_endpoints(Endpoints::rooted_at(&idp_base, TEST_ISSUER).unwrap());
		let verifier = TestSigner::shared().verifier();
		let directory = StaticRoleDirectory::new()
			.with_role("alice@example.com", "Administrator")
			.with_role("bob@example.com", "Auditor");

		let source = AllDaySource::new(cloud.clone(), base.clone(), USER)
			.with_probe_policy(RetryConfig::immediate(3))
			.with_mint_policy(MintPolicy::immediate());
		let factory = CredentialFactory::new(
			Arc::new(IamTagStore::new(cloud.clone(), base.clone(), USER)),
			Arc::new(source),
			CredentialFactoryConfig::default(),
		);

		let federation_endpoint = Url::parse(&format!("{}/federation", federation.uri())).unwrap();
		let console = ConsoleFederation::new(
			warden_common_http::new_client(),
			"https://warden.example.com/",
		)
		.unwrap()
		.with_endpoint(federation_endpoint);

		let state = AppState {
			login: Arc::new(LoginFlow::new(client, verifier.clone())),
			authorizer: Arc::new(Authorizer::new(verifier, Arc::new(directory))),
			factory,
			cloud: cloud.clone(),
			base,
			federation: Arc::new(console),
			sessions: SessionSettings {
				probe: RetryConfig::immediate(3),
				mint: MintPolicy::immediate(),
				credential_factory_user: USER.to_string(),
				management_account_id: None,
				deadline: Duration::from_secs(28),
			},
		};

		Self {
			router: create_router(state),
			cloud,
			idp,
			federation,
		}
	}

	async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
		let mut request = Request::builder().uri(uri);
		if let Some(cookie) = cookie {
			request = request.header(COOKIE, cookie);
		}
		self.router
			.clone()
			.oneshot(request.body(Body::empty()).unwrap())
			.await
			.unwrap()
	}
}

fn session_cookie(email: &str) -> String {
	format!(
		"a=access-token; id={}",
		TestSigner::shared().sign(&claims_for(email, None))
	)
}

async fn body_string(response: Response) -> String {
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
	serde_json::from_str(&body_string(response).await).unwrap()
}

fn location(response: &Response) -> &str {
	response.headers().get(LOCATION).unwrap().to_str().unwrap()
}

// ============================================================================
// Gateway
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
	let app = TestApp::new().await;
	let response = app.get("/health", None).await;
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn test_anonymous_request_redirects_to_login() {
	let app = TestApp::new().await;
	let response = app.get("/accounts?number=123&role=Auditor", None).await;
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(
		location(&response),
		"/login?next=%2Faccounts%3Fnumber%3D123%26role%3DAuditor"
	);
}

#[tokio::test]
async fn test_forged_id_token_redirects_to_login() {
	let app = TestApp::new().await;
	let response = app
		.get("/credential-factory", Some("a=access-token; id=a.b.c"))
		.await;
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(location(&response), "/login?next=%2Fcredential-factory");
}

#[tokio::test]
async fn test_unmapped_user_is_denied() {
	let app = TestApp::new().await;
	let response = app
		.get("/", Some(&session_cookie("mallory@example.com")))
		.await;
	assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_whoami_reports_context() {
	let app = TestApp::new().await;
	let response = app.get("/", Some(&session_cookie("alice@example.com"))).await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["principalId"], "alice@example.com");
	assert_eq!(json["RoleName"], "Administrator");
	assert!(json.get("AccessToken").is_none());
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_redirects_to_idp() {
	let app = TestApp::new().await;
	let response = app.get("/login?next=%2Faccounts", None).await;
	assert_eq!(response.status(), StatusCode::FOUND);
	assert!(response.headers().get(SET_COOKIE).is_none());
	let url = Url::parse(location(&response)).unwrap();
	assert_eq!(url.path(), "/authorize");
	let state = url
		.query_pairs()
		.find(|(k, _)| k == "state")
		.map(|(_, v)| v.into_owned())
		.unwrap();
	assert_eq!(LoginState::decode(&state).unwrap().unwrap().next, "/accounts");
}

#[tokio::test]
async fn test_login_idp_error_renders_page() {
	let app = TestApp::new().await;
	let response = app
		.get("/login?error_description=%3Cb%3Enope%3C%2Fb%3E", None)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	assert!(response.headers().get(LOCATION).is_none());
	assert!(response.headers().get(SET_COOKIE).is_none());
	let body = body_string(response).await;
	assert!(body.contains("&lt;b&gt;nope&lt;/b&gt;"));
	assert!(body.contains("/authorize?"));
}

#[tokio::test]
async fn test_login_callback_sets_session_cookies() {
	let app = TestApp::new().await;
	let state = LoginState {
		next: "/credential-factory".to_string(),
		nonce: "n0nce".to_string(),
	};
	Mock::given(method("POST"))
		.and(path("/token"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"access_token": "access-token",
			"id_token": TestSigner::shared().sign(&claims_for("alice@example.com", Some("n0nce"))),
			"token_type": "Bearer",
		})))
		.expect(1)
		.mount(&app.idp)
		.await;

	let uri = format!("/login?code=abc&state={}", state.encode().unwrap());
	let response = app.get(&uri, None).await;
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(location(&response), "/credential-factory");

	let cookies: Vec<&str> = response
		.headers()
		.get_all(SET_COOKIE)
		.iter()
		.map(|v| v.to_str().unwrap())
		.collect();
	assert_eq!(cookies.len(), 3);
	assert!(cookies[0].starts_with("a=access-token; HttpOnly; Max-Age=43200"));
	assert!(cookies[1].starts_with("id="));
	assert!(cookies[2].starts_with("csrf="));
	assert!(cookies.iter().all(|c| c.contains("Secure")));
}

#[tokio::test]
async fn test_login_post_callback() {
	let app = TestApp::new().await;
	let state = LoginState::new("/");
	Mock::given(method("POST"))
		.and(path("/token"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"access_token": "access-token",
			"id_token": TestSigner::shared().sign(&claims_for("alice@example.com", Some(&state.nonce))),
		})))
		.mount(&app.idp)
		.await;

	let body = format!("code=abc&state={}", state.encode().unwrap());
	let response = app
		.router
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/login")
				.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
				.body(Body::from(body))
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 3);
}

#[tokio::test]
async fn test_login_nonce_mismatch_sets_no_cookies() {
	let app = TestApp::new().await;
	let state = LoginState {
		next: "/".to_string(),
		nonce: "expected".to_string(),
	};
	Mock::given(method("POST"))
		.and(path("/token"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"access_token": "access-token",
			"id_token": TestSigner::shared().sign(&claims_for("alice@example.com", Some("other"))),
		})))
		.mount(&app.idp)
		.await;

	let uri = format!("/login?code=abc&state={}", state.encode().unwrap());
	let response = app.get(&uri, None).await;
	assert_eq!(response.status(), StatusCode::OK);
	assert!(response.headers().get(SET_COOKIE).is_none());
	assert_eq!(
		response.headers().get(CONTENT_TYPE).unwrap(),
		"text/plain; charset=utf-8"
	);
	assert!(body_string(response).await.contains("nonce"));
}

// ============================================================================
// Credential Factory
// ============================================================================

#[tokio::test]
async fn test_credential_factory_exchange() {
	let app = TestApp::new().await;
	let cookie = session_cookie("alice@example.com");

	let response = app
		.get(&format!("/credential-factory/authorize?token={TOKEN}"), Some(&cookie))
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert_eq!(json["principalId"], "alice@example.com");
	assert_eq!(json["RoleName"], "Administrator");
	assert!(app
		.cloud
		.user_tags(USER)
		.contains_key(&format!("CredentialFactory:{TOKEN}")));

	let response = app
		.get(&format!("/credential-factory/fetch?token={TOKEN}"), None)
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	assert!(json["AccessKeyId"].as_str().unwrap().starts_with("ASIA"));
	assert!(json["SecretAccessKey"].is_string());
	assert!(json["SessionToken"].is_string());
	assert_eq!(json["Version"], 1);
	assert!(app.cloud.access_keys(USER).is_empty());

	let response = app
		.get(&format!("/credential-factory/fetch?token={TOKEN}"), None)
		.await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	assert_eq!(
		body_json(response).await,
		serde_json::json!({"Error": "token not previously authorized"})
	);
}

#[tokio::test]
async fn test_authorize_short_token_is_bad_request() {
	let app = TestApp::new().await;
	let response = app
		.get(
			"/credential-factory/authorize?token=short",
			Some(&session_cookie("alice@example.com")),
		)
		.await;
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(app.cloud.call_count("TagUser"), 0);
	assert_eq!(app.cloud.call_count("ListUserTags"), 0);
}

#[tokio::test]
async fn test_authorize_requires_session() {
	let app = TestApp::new().await;
	let response = app
		.get(&format!("/credential-factory/authorize?token={TOKEN}"), None)
		.await;
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(app.cloud.call_count("TagUser"), 0);
}

#[tokio::test]
async fn test_fetch_without_token_is_forbidden() {
	let app = TestApp::new().await;
	let response = app.get("/credential-factory/fetch", None).await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	assert_eq!(
		body_json(response).await["Error"],
		"query string parameter token is required"
	);
}

#[tokio::test]
async fn test_credential_factory_direct_mint() {
	let app = TestApp::new().await;
	let response = app
		.get("/credential-factory", Some(&session_cookie("bob@example.com")))
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	let expiration = chrono::DateTime::parse_from_rfc3339(json["Expiration"].as_str().unwrap()).unwrap();
	assert!(expiration > chrono::Utc::now() + chrono::Duration::hours(11));
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_accounts_lists_organization() {
	let app = TestApp::new().await;
	let response = app
		.get("/accounts", Some(&session_cookie("alice@example.com")))
		.await;
	assert_eq!(response.status(), StatusCode::OK);
	let json = body_json(response).await;
	let ids: Vec<&str> = json
		.as_array()
		.unwrap()
		.iter()
		.map(|a| a["id"].as_str().unwrap())
		.collect();
	assert_eq!(ids, vec![MANAGEMENT_ACCOUNT, BROKER_ACCOUNT, MEMBER_ACCOUNT]);
	assert_eq!(json[2]["tags"]["Domain"], "payments");
}

#[tokio::test]
async fn test_accounts_console_sign_in() {
	let app = TestApp::new().await;
	Mock::given(method("GET"))
		.and(path("/federation"))
		.and(query_param("Action", "getSigninToken"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(serde_json::json!({"SigninToken": "one-time"})),
		)
		.expect(1)
		.mount(&app.federation)
		.await;

	let uri = format!(
		"/accounts?number={MEMBER_ACCOUNT}&role=Auditor&next=https%3A%2F%2Fconsole.aws.amazon.com%2Fs3%2F"
	);
	let response = app
		.get(&uri, Some(&session_cookie("alice@example.com")))
		.await;
	assert_eq!(response.status(), StatusCode::FOUND);

	let url = Url::parse(location(&response)).unwrap();
	let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
	assert!(query.contains(&("Action".to_string(), "login".to_string())));
	assert!(query.contains(&("SigninToken".to_string(), "one-time".to_string())));
	assert!(query.contains(&(
		"Destination".to_string(),
		"https://console.aws.amazon.com/s3/".to_string()
	)));

	let expires = response
		.headers()
		.get("X-Substrate-Credentials-Expire")
		.unwrap()
		.to_str()
		.unwrap();
	let expires = chrono::DateTime::parse_from_rfc3339(expires).unwrap();
	assert!(expires > chrono::Utc::now() + chrono::Duration::hours(11));
	assert!(app.cloud.access_keys(USER).is_empty());
}

#[tokio::test]
async fn test_accounts_denied_role_is_forbidden() {
	let app = TestApp::new().await;
	app.cloud.deny_role(MEMBER_ACCOUNT, "Administrator");
	let response = app
		.get(
			&format!("/accounts?number={MEMBER_ACCOUNT}&role=Administrator"),
			Some(&session_cookie("alice@example.com")),
		)
		.await;
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	assert_eq!(body_json(response).await["error"], "aws_error");
}

#[tokio::test]
async fn test_accounts_needs_both_number_and_role() {
	let app = TestApp::new().await;
	let response = app
		.get(
			&format!("/accounts?number={MEMBER_ACCOUNT}"),
			Some(&session_cookie("alice@example.com")),
		)
		.await;
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
