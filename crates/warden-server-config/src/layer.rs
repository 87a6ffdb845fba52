// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	AwsConfigLayer, CredentialFactoryConfigLayer, HttpConfigLayer, LoggingConfigLayer,
	OidcConfigLayer,
};

/// Server configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub oidc: Option<OidcConfigLayer>,
	#[serde(default)]
	pub aws: Option<AwsConfigLayer>,
	#[serde(default)]
	pub credential_factory: Option<CredentialFactoryConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_option(&mut self.oidc, other.oidc, OidcConfigLayer::merge);
		merge_option(&mut self.aws, other.aws, AwsConfigLayer::merge);
		merge_option(
			&mut self.credential_factory,
			other.credential_factory,
			CredentialFactoryConfigLayer::merge,
		);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer::default());
		assert!(base.http.is_none());
		assert!(base.aws.is_none());
	}

	#[test]
	fn test_merge_other_overwrites_field_by_field() {
		let mut base = ServerConfigLayer {
			aws: Some(AwsConfigLayer {
				region: Some("us-west-2".to_string()),
				probe_attempts: Some(18),
				..Default::default()
			}),
			..Default::default()
		};
		let other = ServerConfigLayer {
			aws: Some(AwsConfigLayer {
				probe_attempts: Some(3),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);
		let aws = base.aws.unwrap();
		assert_eq!(aws.region.as_deref(), Some("us-west-2"));
		assert_eq!(aws.probe_attempts, Some(3));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				port: Some(9000),
				..Default::default()
			}),
			..Default::default()
		};
		let other = ServerConfigLayer {
			oidc: Some(OidcConfigLayer {
				client_id: Some("x.apps.googleusercontent.com".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);
		assert_eq!(base.http.unwrap().port, Some(9000));
		assert!(base.oidc.unwrap().client_id.is_some());
	}
}
