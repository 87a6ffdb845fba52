// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for credential material.
//!
//! Secret access keys, STS session tokens, IdP access tokens and the OIDC
//! client secret all travel through Warden wrapped in [`Secret<T>`]:
//!
//! - `Debug` and `Display` print `[REDACTED]`, so `tracing` fields and error
//!   chains never carry the value
//! - `Serialize` writes `"[REDACTED]"`; code that must put a secret on the
//!   wire (the credential-process JSON, the federation session payload)
//!   calls [`Secret::expose`] explicitly
//! - the inner value is zeroized on drop
//!
//! ```
//! use warden_common_secret::SecretString;
//!
//! let key = SecretString::new("wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY".to_string());
//! assert_eq!(format!("{key}"), "[REDACTED]");
//! assert_eq!(key.expose(), "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must never be logged or serialized in the clear.
///
/// There is deliberately no `Deref`; reading the value means calling
/// [`Secret::expose`], which keeps every use visible at the call site.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// The common case: secret strings.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the secret value.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl Secret<String> {
	/// True when the wrapped string is empty. Handy for config validation,
	/// which must not expose the value just to check for presence.
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl From<String> for Secret<String> {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for Secret<String> {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
