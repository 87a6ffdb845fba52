// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::error::StoreResult;
use crate::record::{is_token_key, BearerTokenRecord};
use crate::store::TokenStore;

/// Token keys whose record is expired or unreadable, at most `limit`.
pub fn expired_keys(
	entries: &BTreeMap<String, String>,
	now: DateTime<Utc>,
	limit: usize,
) -> Vec<String> {
	entries
		.iter()
		.filter(|(key, _)| is_token_key(key))
		.filter(|(_, value)| {
			BearerTokenRecord::parse(value)
				.map(|record| record.is_expired_at(now))
				.unwrap_or(true)
		})
		.map(|(key, _)| key.clone())
		.take(limit)
		.collect()
}

/// Number of token entries in `entries`.
pub fn token_count(entries: &BTreeMap<String, String>) -> usize {
	entries.keys().filter(|key| is_token_key(key)).count()
}

#[instrument(skip(store, entries))]
pub async fn collect_garbage(
	store: &dyn TokenStore,
	entries: &BTreeMap<String, String>,
	now: DateTime<Utc>,
	limit: usize,
) -> StoreResult<usize> {
	let keys = expired_keys(entries, now, limit);
	if keys.is_empty() {
		return Ok(0);
	}
	store.delete(&keys).await?;
	debug!(removed = keys.len(), "collected expired tokens");
	Ok(keys.len())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::{tag_key, LEGACY_TAG_KEY_PREFIX};
	use crate::store::MemoryTokenStore;
	use chrono::TimeZone;
	use std::time::Duration;

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
	}

	fn record(offset_secs: i64) -> String {
		BearerTokenRecord::new("p", "r", now() + chrono::Duration::seconds(offset_secs), Duration::ZERO)
			.encode()
	}

	fn entries() -> BTreeMap<String, String> {
		BTreeMap::from([
			(tag_key("live"), record(30)),
			(tag_key("old"), record(-30)),
			(tag_key("junk"), "not a record".to_string()),
			(format!("{LEGACY_TAG_KEY_PREFIX}legacy"), record(-3600)),
			("Team".to_string(), "not a record".to_string()),
		])
	}

	#[test]
	fn test_selects_expired_and_unreadable_tokens() {
		let keys = expired_keys(&entries(), now(), 30);
		assert_eq!(
			keys,
			vec![
				"CredentialFactory:junk".to_string(),
				"CredentialFactory:old".to_string(),
				"substrate-credential-factory:legacy".to_string(),
			]
		);
	}

	#[test]
	fn test_respects_limit() {
		assert_eq!(expired_keys(&entries(), now(), 1).len(), 1);
	}

	#[test]
	fn test_counts_only_tokens() {
		assert_eq!(token_count(&entries()), 4);
	}

	#[tokio::test]
	async fn test_collect_deletes_from_store() {
		let store = MemoryTokenStore::new();
		for (key, value) in entries() {
			store.put(&key, &value).await.unwrap();
		}
		let snapshot = store.entries().await.unwrap();
		let removed = collect_garbage(&store, &snapshot, now(), 30).await.unwrap();
		assert_eq!(removed, 3);
		let left: Vec<String> = store.entries().await.unwrap().into_keys().collect();
		assert_eq!(left, vec!["CredentialFactory:live".to_string(), "Team".to_string()]);
	}
}
