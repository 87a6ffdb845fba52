// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Key/value storage for authorized tokens.
///
/// Keys are full tag keys (see [`crate::record::tag_key`]). [`take`] is the
/// point at which a token is spent: of any number of concurrent calls for
/// the same key, at most one returns the value.
///
/// [`take`]: TokenStore::take
#[async_trait]
pub trait TokenStore: Send + Sync {
	async fn entries(&self) -> StoreResult<BTreeMap<String, String>>;

	async fn get(&self, key: &str) -> StoreResult<Option<String>>;

	async fn put(&self, key: &str, value: &str) -> StoreResult<()>;

	/// Remove `key` and return the value it had.
	async fn take(&self, key: &str) -> StoreResult<Option<String>>;

	async fn delete(&self, keys: &[String]) -> StoreResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
	entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
		self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
	async fn entries(&self) -> StoreResult<BTreeMap<String, String>> {
		Ok(self.lock().clone())
	}

	async fn get(&self, key: &str) -> StoreResult<Option<String>> {
		Ok(self.lock().get(key).cloned())
	}

	async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
		self.lock().insert(key.to_string(), value.to_string());
		Ok(())
	}

	async fn take(&self, key: &str) -> StoreResult<Option<String>> {
		Ok(self.lock().remove(key))
	}

	async fn delete(&self, keys: &[String]) -> StoreResult<()> {
		let mut entries = self.lock();
		for key in keys {
			entries.remove(key);
		}
		Ok(())
	}
}
