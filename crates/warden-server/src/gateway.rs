// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The request gateway: every protected route is authorized before its
//! handler runs.
//!
//! A denied request is sent to `/login?next=...`. An allowed request carries
//! the [`AuthorizerContext`] in its extensions.

use axum::extract::{Request, State};
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use warden_server_auth::{AuthorizerContext, AuthorizerRequest, RequestCookies};

use crate::api::AppState;

pub async fn authorize_request(
	State(state): State<AppState>,
	mut request: Request,
	next: Next,
) -> Response {
	let method = request.method().to_string();
	let path = request.uri().path().to_string();
	let authorizer_request = AuthorizerRequest {
		route: format!("{method} {path}"),
		raw_query: request.uri().query().map(str::to_string),
		cookies: RequestCookies::from_headers(request.headers()),
		method,
		path,
	};

	let decision = state.authorizer.authorize(&authorizer_request).await;
	if !decision.is_allowed() {
		return redirect_found(&decision.context.location);
	}

	request.extensions_mut().insert::<AuthorizerContext>(decision.context);
	next.run(request).await
}

/// `302 Found`. axum's `Redirect` only offers 303, 307 and 308.
pub fn redirect_found(location: &str) -> Response {
	(StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}
