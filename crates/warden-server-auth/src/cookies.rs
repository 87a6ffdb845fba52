// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session cookies.
//!
//! A login sets `a` (access token), `id` (ID token) and `csrf`, all
//! `HttpOnly; Secure` with a 12 hour `Max-Age`. Google logins also remember
//! the hosted domain in `hd` so the next login can pre-select it.

use std::fmt;
use std::time::Duration;

use http::header::COOKIE;
use http::HeaderMap;
use warden_common_secret::SecretString;

pub const ACCESS_TOKEN_COOKIE: &str = "a";
pub const ID_TOKEN_COOKIE: &str = "id";
pub const CSRF_COOKIE: &str = "csrf";
pub const HOSTED_DOMAIN_COOKIE: &str = "hd";

pub const SESSION_MAX_AGE: Duration = Duration::from_secs(43200);
pub const HOSTED_DOMAIN_MAX_AGE: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// A `Set-Cookie` header value.
#[derive(Clone, PartialEq, Eq)]
pub struct SetCookie {
	pub name: &'static str,
	value: String,
	pub max_age: Duration,
}

impl SetCookie {
	pub fn new(name: &'static str, value: impl Into<String>, max_age: Duration) -> Self {
		Self {
			name,
			value: value.into(),
			max_age,
		}
	}

	pub fn value(&self) -> &str {
		&self.value
	}
}

impl fmt::Display for SetCookie {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}={}; HttpOnly; Max-Age={}; Path=/; Secure",
			self.name,
			self.value,
			self.max_age.as_secs()
		)
	}
}

// Cookie values are tokens.
impl fmt::Debug for SetCookie {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SetCookie")
			.field("name", &self.name)
			.field("value", &"[REDACTED]")
			.field("max_age", &self.max_age)
			.finish()
	}
}

pub fn session_cookies(
	access_token: &SecretString,
	id_token: &SecretString,
	csrf: &str,
) -> Vec<SetCookie> {
	vec![
		SetCookie::new(ACCESS_TOKEN_COOKIE, access_token.expose().as_str(), SESSION_MAX_AGE),
		SetCookie::new(ID_TOKEN_COOKIE, id_token.expose().as_str(), SESSION_MAX_AGE),
		SetCookie::new(CSRF_COOKIE, csrf, SESSION_MAX_AGE),
	]
}

pub fn hosted_domain_cookie(domain: &str) -> SetCookie {
	SetCookie::new(HOSTED_DOMAIN_COOKIE, domain, HOSTED_DOMAIN_MAX_AGE)
}

/// Value of the named cookie, across every `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get_all(COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(';'))
		.find_map(|cookie| {
			let (cookie_name, value) = cookie.trim().split_once('=')?;
			(cookie_name == name).then(|| value.to_string())
		})
}

/// The cookies Warden reads on each request.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
	pub access_token: Option<SecretString>,
	pub id_token: Option<SecretString>,
	pub hosted_domain: Option<String>,
}

impl RequestCookies {
	pub fn from_headers(headers: &HeaderMap) -> Self {
		Self {
			access_token: cookie_value(headers, ACCESS_TOKEN_COOKIE).map(SecretString::new),
			id_token: cookie_value(headers, ID_TOKEN_COOKIE).map(SecretString::new),
			hosted_domain: cookie_value(headers, HOSTED_DOMAIN_COOKIE),
		}
	}
}
