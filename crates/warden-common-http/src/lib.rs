// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Warden.
//!
//! This crate provides:
//! - A pre-configured HTTP client with a consistent User-Agent header
//! - The backoff primitive every component uses to wait out eventually
//!   consistent state (fixed or jittered exponential, bounded, cancellable)

mod client;
mod retry;

pub use client::{builder, new_client, new_client_with_timeout, user_agent};
pub use retry::{
	retry, retry_if, retry_with_cancel, sleep_or_cancel, Cancelled, RetryConfig, RetryableError,
};
