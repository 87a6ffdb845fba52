// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `/login`, the OIDC redirect target.

use axum::extract::{Query, State};
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use tracing::error;
use warden_server_auth::{cookie_value, LoginParams, LoginResponse, HOSTED_DOMAIN_COOKIE};

use crate::api::AppState;
use crate::gateway::redirect_found;

/// GET /login - Start a login, or complete one when the IdP redirects back.
pub async fn login_get(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(params): Query<LoginParams>,
) -> Response {
	login(&state, &headers, &params).await
}

/// POST /login - As GET, for IdPs that use `response_mode=form_post`.
pub async fn login_post(
	State(state): State<AppState>,
	headers: HeaderMap,
	Form(params): Form<LoginParams>,
) -> Response {
	login(&state, &headers, &params).await
}

async fn login(state: &AppState, headers: &HeaderMap, params: &LoginParams) -> Response {
	let hosted_domain = cookie_value(headers, HOSTED_DOMAIN_COOKIE);
	let outcome = state.login.handle(params, hosted_domain.as_deref()).await;
	render(outcome)
}

fn render(outcome: LoginResponse) -> Response {
	match outcome {
		LoginResponse::Redirect {
			location, cookies, ..
		} => {
			let mut response = redirect_found(&location);
			for cookie in cookies {
				match HeaderValue::from_str(&cookie.to_string()) {
					Ok(value) => {
						response.headers_mut().append(SET_COOKIE, value);
					}
					Err(e) => {
						error!(cookie = cookie.name, error = %e, "cookie is not a valid header value");
						return (StatusCode::INTERNAL_SERVER_ERROR, "could not set session cookie")
							.into_response();
					}
				}
			}
			response
		}
		LoginResponse::IdpError {
			description,
			retry_url,
		} => (
			StatusCode::OK,
			[(CONTENT_TYPE, "text/html; charset=utf-8")],
			idp_error_page(&description, &retry_url),
		)
			.into_response(),
		LoginResponse::Failed { stage, error } => (
			StatusCode::OK,
			[(CONTENT_TYPE, "text/plain; charset=utf-8")],
			format!("login failed after stage: {stage}\n\n{error}\n"),
		)
			.into_response(),
	}
}

fn idp_error_page(description: &str, retry_url: &str) -> String {
	format!(
		"<!DOCTYPE html>\n<html>\n<head><title>Login failed</title></head>\n<body>\n\
		 <p>The identity provider reported an error:</p>\n<pre>{}</pre>\n\
		 <p><a href=\"{}\">Try again</a></p>\n</body>\n</html>\n",
		escape_html(description),
		escape_html(retry_url),
	)
}

fn escape_html(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	for c in s.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_escape_html() {
		assert_eq!(
			escape_html(r#"<script>alert("x")</script> & 'y'"#),
			"&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
		);
	}

	#[test]
	fn test_idp_error_page_escapes_description() {
		let page = idp_error_page("<b>denied</b>", "https://idp.example/authorize?a=1&b=2");
		assert!(page.contains("&lt;b&gt;denied&lt;/b&gt;"));
		assert!(page.contains("href=\"https://idp.example/authorize?a=1&amp;b=2\""));
	}
}
