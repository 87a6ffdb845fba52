// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{Extension, Json};
use warden_server_auth::AuthorizerContext;

/// GET / - Who the gateway thinks the caller is.
pub async fn whoami(Extension(context): Extension<AuthorizerContext>) -> Json<AuthorizerContext> {
	Json(context)
}
