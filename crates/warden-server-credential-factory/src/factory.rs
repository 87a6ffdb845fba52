// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorize a client-chosen token from a browser session, then redeem it
//! once for credentials.
//!
//! ```text
//! client ──token──▶ browser ──authorize(token)──▶ store[token] = (principal, role, expiry)
//! client ──fetch(token)──▶ take(store[token]) ──▶ mint(role) ──▶ CredentialProcessOutput
//! ```
//!
//! The record is removed before anything is minted, so a token is spent
//! even if minting fails.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use warden_server_config::CredentialFactoryConfig;

use crate::error::{FactoryError, Result};
use crate::gc::{collect_garbage, token_count};
use crate::output::CredentialProcessOutput;
use crate::record::{tag_key, BearerTokenRecord};
use crate::source::CredentialSource;
use crate::store::TokenStore;

#[derive(Clone)]
pub struct CredentialFactory {
	store: Arc<dyn TokenStore>,
	source: Arc<dyn CredentialSource>,
	config: CredentialFactoryConfig,
}

impl fmt::Debug for CredentialFactory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CredentialFactory")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl CredentialFactory {
	pub fn new(
		store: Arc<dyn TokenStore>,
		source: Arc<dyn CredentialSource>,
		config: CredentialFactoryConfig,
	) -> Self {
		Self {
			store,
			source,
			config,
		}
	}

	pub fn config(&self) -> &CredentialFactoryConfig {
		&self.config
	}

	/// Record that `token` may be redeemed as `role_name` by `principal_id`.
	#[instrument(skip(self, token))]
	pub async fn authorize(
		&self,
		token: Option<&str>,
		principal_id: &str,
		role_name: &str,
	) -> Result<BearerTokenRecord> {
		let token = self.validate(token)?;

		let entries = self.store.entries().await?;
		let sync_gc = token_count(&entries) > self.config.gc_sync_threshold;
		if sync_gc {
			collect_garbage(self.store.as_ref(), &entries, Utc::now(), self.config.gc_limit).await?;
		}

		let record = BearerTokenRecord::new(principal_id, role_name, Utc::now(), self.config.token_ttl);
		self.store.put(&tag_key(token), &record.encode()).await?;
		info!(expiry = %record.expiry, "bearer token authorized");

		if !sync_gc {
			let store = Arc::clone(&self.store);
			let limit = self.config.gc_limit;
			tokio::spawn(async move {
				let result = match store.entries().await {
					Ok(entries) => collect_garbage(store.as_ref(), &entries, Utc::now(), limit).await,
					Err(e) => Err(e),
				};
				if let Err(e) = result {
					warn!(error = %e, "background token collection failed");
				}
			});
		}

		Ok(record)
	}

	/// Spend `token` and mint credentials for the role it was authorized as.
	#[instrument(skip_all)]
	pub async fn fetch(&self, token: Option<&str>) -> Result<CredentialProcessOutput> {
		let token = token.filter(|t| !t.is_empty()).ok_or(FactoryError::TokenRequired)?;

		let value = self.store.take(&tag_key(token)).await?;
		let record = match value.as_deref().map(BearerTokenRecord::parse) {
			Some(Ok(record)) => record,
			Some(Err(e)) => {
				warn!(error = %e, "unreadable token record");
				return Err(FactoryError::NotAuthorized);
			}
			None => {
				warn!("token not previously authorized");
				return Err(FactoryError::NotAuthorized);
			}
		};
		if record.is_expired_at(Utc::now()) {
			warn!(principal_id = %record.principal_id, expiry = %record.expiry, "token authorization expired");
			return Err(FactoryError::Expired);
		}

		self.mint(&record.principal_id, &record.role_name).await
	}

	/// Credentials for `role_name`, with `principal_id` as the session name,
	/// bounded by the fetch deadline.
	#[instrument(skip(self))]
	pub async fn mint(&self, principal_id: &str, role_name: &str) -> Result<CredentialProcessOutput> {
		let cancel = CancellationToken::new();
		let _cancel_on_drop = cancel.clone().drop_guard();
		let deadline = self.config.fetch_deadline;

		let creds = tokio::time::timeout(deadline, self.source.mint(role_name, principal_id, cancel))
			.await
			.map_err(|_| FactoryError::DeadlineExceeded {
				secs: deadline.as_secs(),
			})??;

		info!(expiration = %creds.expiration(), "credentials minted");
		Ok(CredentialProcessOutput::from(&creds))
	}

	fn validate<'a>(&self, token: Option<&'a str>) -> Result<&'a str> {
		let token = token.filter(|t| !t.is_empty()).ok_or(FactoryError::TokenRequired)?;
		if token.len() < self.config.min_token_length {
			return Err(FactoryError::TokenTooShort {
				min: self.config.min_token_length,
			});
		}
		Ok(token)
	}
}
