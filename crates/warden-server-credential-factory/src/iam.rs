// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token storage in the tags of an IAM user.
//!
//! IAM has no conditional delete, so `take` is a read followed by
//! `UntagUser`. Takes are serialised within the process, which makes the
//! untag the point a token is spent for every fetch this process serves.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use warden_aws::{BaseCredentials, CloudApi};

use crate::error::StoreResult;
use crate::store::TokenStore;

pub struct IamTagStore {
	api: Arc<dyn CloudApi>,
	base: Arc<dyn BaseCredentials>,
	user_name: String,
	take_lock: Mutex<()>,
}

impl fmt::Debug for IamTagStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IamTagStore")
			.field("user_name", &self.user_name)
			.finish_non_exhaustive()
	}
}

impl IamTagStore {
	pub fn new(
		api: Arc<dyn CloudApi>,
		base: Arc<dyn BaseCredentials>,
		user_name: impl Into<String>,
	) -> Self {
		Self {
			api,
			base,
			user_name: user_name.into(),
			take_lock: Mutex::new(()),
		}
	}

	pub fn user_name(&self) -> &str {
		&self.user_name
	}
}

#[async_trait]
impl TokenStore for IamTagStore {
	async fn entries(&self) -> StoreResult<BTreeMap<String, String>> {
		let creds = self.base.base_credentials().await?;
		Ok(self.api.list_user_tags(&creds, &self.user_name).await?)
	}

	async fn get(&self, key: &str) -> StoreResult<Option<String>> {
		Ok(self.entries().await?.remove(key))
	}

	#[instrument(skip_all, fields(user = %self.user_name))]
	async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
		let creds = self.base.base_credentials().await?;
		self.api.tag_user(&creds, &self.user_name, key, value).await?;
		Ok(())
	}

	#[instrument(skip_all, fields(user = %self.user_name))]
	async fn take(&self, key: &str) -> StoreResult<Option<String>> {
		let _guard = self.take_lock.lock().await;
		let creds = self.base.base_credentials().await?;
		let Some(value) = self.api.list_user_tags(&creds, &self.user_name).await?.remove(key) else {
			return Ok(None);
		};
		self.api
			.untag_user(&creds, &self.user_name, &[key.to_string()])
			.await?;
		debug!("token tag removed");
		Ok(Some(value))
	}

	#[instrument(skip_all, fields(user = %self.user_name, count = keys.len()))]
	async fn delete(&self, keys: &[String]) -> StoreResult<()> {
		if keys.is_empty() {
			return Ok(());
		}
		let creds = self.base.base_credentials().await?;
		self.api.untag_user(&creds, &self.user_name, keys).await?;
		Ok(())
	}
}
