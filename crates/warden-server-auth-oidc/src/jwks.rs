// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! IdP signing keys.
//!
//! [`HttpKeySource`] memoises the published key set for an hour. A token
//! naming a key it has not seen triggers a refetch, at most once per
//! [`KEYS_REFETCH_INTERVAL`], so forged `kid`s cannot drive traffic to the IdP.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{OidcError, OidcResult};

pub const KEYS_TTL: Duration = Duration::from_secs(3600);
pub const KEYS_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

#[async_trait]
pub trait KeySource: Send + Sync {
	async fn key(&self, kid: &str) -> OidcResult<DecodingKey>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
	pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
	pub kty: String,
	#[serde(default)]
	pub kid: Option<String>,
	#[serde(default)]
	pub alg: Option<String>,
	#[serde(default, rename = "use")]
	pub key_use: Option<String>,
	#[serde(default)]
	pub n: Option<String>,
	#[serde(default)]
	pub e: Option<String>,
}

impl JwkSet {
	/// RSA signing keys by id. Keys without an id, encryption keys and
	/// other key types are skipped.
	pub fn signing_keys(&self) -> HashMap<String, DecodingKey> {
		self.keys
			.iter()
			.filter(|k| k.kty == "RSA" && k.key_use.as_deref() != Some("enc"))
			.filter_map(|k| {
				let kid = k.kid.clone()?;
				let key = DecodingKey::from_rsa_components(k.n.as_deref()?, k.e.as_deref()?).ok()?;
				Some((kid, key))
			})
			.collect()
	}
}

struct CachedKeys {
	keys: HashMap<String, DecodingKey>,
	fetched_at: Instant,
}

pub struct HttpKeySource {
	http: reqwest::Client,
	url: Url,
	ttl: Duration,
	refetch_interval: Duration,
	cache: RwLock<Option<CachedKeys>>,
}

impl std::fmt::Debug for HttpKeySource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpKeySource")
			.field("url", &self.url.as_str())
			.field("ttl", &self.ttl)
			.finish_non_exhaustive()
	}
}

impl HttpKeySource {
	pub fn new(http: reqwest::Client, url: Url) -> Self {
		Self {
			http,
			url,
			ttl: KEYS_TTL,
			refetch_interval: KEYS_REFETCH_INTERVAL,
			cache: RwLock::new(None),
		}
	}

	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;
		self
	}

	pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
		self.refetch_interval = interval;
		self
	}

	#[instrument(skip(self), fields(url = %self.url))]
	async fn fetch(&self) -> OidcResult<HashMap<String, DecodingKey>> {
		let response = self.http.get(self.url.clone()).send().await?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(OidcError::Provider(format!("key set returned {status}: {body}")));
		}
		let set: JwkSet = response
			.json()
			.await
			.map_err(|e| OidcError::Parse(format!("failed to parse key set: {e}")))?;
		let keys = set.signing_keys();
		debug!(count = keys.len(), "fetched signing keys");
		Ok(keys)
	}
}

#[async_trait]
impl KeySource for HttpKeySource {
	async fn key(&self, kid: &str) -> OidcResult<DecodingKey> {
		{
			let cache = self.cache.read().await;
			if let Some(cached) = cache.as_ref() {
				if cached.fetched_at.elapsed() < self.ttl {
					if let Some(key) = cached.keys.get(kid) {
						return Ok(key.clone());
					}
				}
			}
		}

		let mut cache = self.cache.write().await;
		// Someone else may have refreshed while we waited for the lock.
		if let Some(cached) = cache.as_ref() {
			let age = cached.fetched_at.elapsed();
			if age < self.ttl {
				if let Some(key) = cached.keys.get(kid) {
					return Ok(key.clone());
				}
				if age < self.refetch_interval {
					debug!(kid, "unknown signing key, key set fetched too recently to refetch");
					return Err(OidcError::KeyNotFound(kid.to_string()));
				}
			}
		}
		debug!(kid, "signing key not cached, refetching key set");
		let keys = self.fetch().await?;
		let found = keys.get(kid).cloned();
		*cache = Some(CachedKeys {
			keys,
			fetched_at: Instant::now(),
		});
		found.ok_or_else(|| OidcError::KeyNotFound(kid.to_string()))
	}
}

/// A fixed key set.
#[derive(Clone, Default)]
pub struct StaticKeys {
	keys: HashMap<String, DecodingKey>,
}

impl StaticKeys {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_jwks(set: &JwkSet) -> Self {
		Self {
			keys: set.signing_keys(),
		}
	}

	pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
		self.keys.insert(kid.into(), key);
		self
	}
}

#[async_trait]
impl KeySource for StaticKeys {
	async fn key(&self, kid: &str) -> OidcResult<DecodingKey> {
		self.keys
			.get(kid)
			.cloned()
			.ok_or_else(|| OidcError::KeyNotFound(kid.to_string()))
	}
}
