// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential Factory: cloud credentials for clients that cannot hold a
//! browser session.
//!
//! A client picks a random token and has a signed-in browser authorize it
//! ([`CredentialFactory::authorize`]). The client then redeems the token,
//! exactly once and within a minute, for twelve-hour credentials in the
//! `credential_process` format ([`CredentialFactory::fetch`]).
//!
//! Authorized tokens live in a [`TokenStore`]. In production that is the tag
//! set of a dedicated IAM user ([`IamTagStore`]).

pub mod error;
pub mod factory;
pub mod gc;
pub mod iam;
pub mod output;
pub mod record;
pub mod source;
pub mod store;

pub use error::{FactoryError, Result, StoreError, StoreResult};
pub use factory::CredentialFactory;
pub use gc::{collect_garbage, expired_keys, token_count};
pub use iam::IamTagStore;
pub use output::{CredentialProcessOutput, CREDENTIAL_PROCESS_VERSION};
pub use record::{is_token_key, tag_key, BearerTokenRecord, LEGACY_TAG_KEY_PREFIX, TAG_KEY_PREFIX};
pub use source::{AllDaySource, CredentialSource};
pub use store::{MemoryTokenStore, TokenStore};
