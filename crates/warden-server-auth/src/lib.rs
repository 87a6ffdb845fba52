// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Browser authentication for Warden.
//!
//! [`LoginFlow`] runs the OIDC handshake at `/login` and issues the session
//! cookies. [`Authorizer`] reads those cookies on every other request and
//! decides whether the caller may proceed and with which role.

pub mod authorizer;
pub mod cookies;
pub mod location;
pub mod login;

pub use authorizer::{
	Authorizer, AuthorizerContext, AuthorizerRequest, Decision, Effect, PolicyDocument,
	PolicyStatement,
};
pub use cookies::{
	cookie_value, hosted_domain_cookie, session_cookies, RequestCookies, SetCookie,
	ACCESS_TOKEN_COOKIE, CSRF_COOKIE, HOSTED_DOMAIN_COOKIE, ID_TOKEN_COOKIE, SESSION_MAX_AGE,
};
pub use location::{login_location, original_target, LOGIN_PATH};
pub use login::{LoginFlow, LoginParams, LoginResponse, LoginStage};
