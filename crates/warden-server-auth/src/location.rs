// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use url::form_urlencoded;

pub const LOGIN_PATH: &str = "/login";

/// The original path and query, as it goes into `next`.
pub fn original_target(path: &str, raw_query: Option<&str>) -> String {
	match raw_query.filter(|q| !q.is_empty()) {
		Some(query) => format!("{path}?{query}"),
		None => path.to_string(),
	}
}

/// `/login?next=<path and query>`, where a denied request is sent.
pub fn login_location(path: &str, raw_query: Option<&str>) -> String {
	let query = form_urlencoded::Serializer::new(String::new())
		.append_pair("next", &original_target(path, raw_query))
		.finish();
	format!("{LOGIN_PATH}?{query}")
}
