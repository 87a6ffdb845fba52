// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bounded retry with fixed or jittered exponential backoff.
//!
//! Every loop in Warden that waits for eventually consistent cloud state goes
//! through here: probing freshly assumed credentials, creating access keys
//! under quota pressure, deleting the temporary key on the way out. Loops
//! are always bounded by [`RetryConfig::max_attempts`] and can be aborted
//! through a [`CancellationToken`].

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Same delay between every attempt, no jitter.
	pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
		Self {
			max_attempts,
			base_delay: delay,
			max_delay: delay,
			backoff_factor: 1.0,
			jitter: false,
		}
	}

	/// Doubling delay from `base_delay`, capped at `max_delay`, with jitter.
	pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
		Self {
			max_attempts,
			base_delay,
			max_delay,
			backoff_factor: 2.0,
			jitter: true,
		}
	}

	/// No sleeping at all. Used by tests so bounded loops finish instantly.
	pub fn immediate(max_attempts: u32) -> Self {
		Self::fixed(max_attempts, Duration::ZERO)
	}

	/// Delay to wait after the given zero-based failed attempt.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exponential_delay =
			self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
		let capped_delay = exponential_delay.min(self.max_delay.as_secs_f64());

		let final_delay = if self.jitter {
			let jitter_factor = 0.5 + fastrand::f64();
			capped_delay * jitter_factor
		} else {
			capped_delay
		};

		Duration::from_secs_f64(final_delay)
	}
}

pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}

		if let Some(status) = self.status() {
			let retryable_statuses = [
				StatusCode::TOO_MANY_REQUESTS,
				StatusCode::REQUEST_TIMEOUT,
				StatusCode::INTERNAL_SERVER_ERROR,
				StatusCode::BAD_GATEWAY,
				StatusCode::SERVICE_UNAVAILABLE,
				StatusCode::GATEWAY_TIMEOUT,
			];
			return retryable_statuses.contains(&status);
		}

		false
	}
}

/// A loop was aborted through its cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("operation cancelled")
	}
}

impl std::error::Error for Cancelled {}

/// Sleep for `delay` unless `cancel` fires first.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
	if cancel.is_cancelled() {
		return Err(Cancelled);
	}
	if delay.is_zero() {
		return Ok(());
	}
	tokio::select! {
		_ = cancel.cancelled() => Err(Cancelled),
		_ = tokio::time::sleep(delay) => Ok(()),
	}
}

/// Retry `f` while its error reports itself retryable.
pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, f: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Debug,
{
	drive(cfg, E::is_retryable, plain_sleep, f).await
}

/// Retry `f` while `should_retry` accepts its error.
pub async fn retry_if<F, Fut, T, E, P>(cfg: &RetryConfig, should_retry: P, f: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: std::fmt::Debug,
	P: Fn(&E) -> bool,
{
	drive(cfg, should_retry, plain_sleep, f).await
}

/// Like [`retry_if`], but every sleep races `cancel`. A cancelled token ends
/// the loop with `E::from(Cancelled)`.
pub async fn retry_with_cancel<F, Fut, T, E, P>(
	cfg: &RetryConfig,
	cancel: &CancellationToken,
	should_retry: P,
	f: F,
) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: From<Cancelled> + std::fmt::Debug,
	P: Fn(&E) -> bool,
{
	if cancel.is_cancelled() {
		return Err(E::from(Cancelled));
	}
	let sleep = |delay: Duration| {
		let cancel = cancel.clone();
		async move { sleep_or_cancel(delay, &cancel).await.map_err(E::from) }
	};
	drive(cfg, should_retry, sleep, f).await
}

async fn plain_sleep<E>(delay: Duration) -> Result<(), E> {
	tokio::time::sleep(delay).await;
	Ok(())
}

async fn drive<F, Fut, T, E, P, S, SFut>(
	cfg: &RetryConfig,
	should_retry: P,
	mut sleep: S,
	mut f: F,
) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: std::fmt::Debug,
	P: Fn(&E) -> bool,
	S: FnMut(Duration) -> SFut,
	SFut: Future<Output = Result<(), E>>,
{
	let mut attempt = 0;

	loop {
		match f().await {
			Ok(result) => return Ok(result),
			Err(err) => {
				attempt += 1;

				if !should_retry(&err) {
					warn!(
							error = ?err,
							attempt = attempt,
							"non-retryable error encountered"
					);
					return Err(err);
				}

				if attempt >= cfg.max_attempts {
					warn!(
							error = ?err,
							attempt = attempt,
							max_attempts = cfg.max_attempts,
							"max retry attempts exhausted"
					);
					return Err(err);
				}

				let delay = cfg.delay_for(attempt - 1);
				debug!(
						error = ?err,
						attempt = attempt,
						max_attempts = cfg.max_attempts,
						delay_ms = delay.as_millis(),
						"retrying after error"
				);

				sleep(delay).await?;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[derive(Debug, PartialEq)]
	enum MockError {
		Transient,
		Permanent,
		Cancelled,
	}

	impl RetryableError for MockError {
		fn is_retryable(&self) -> bool {
			matches!(self, MockError::Transient)
		}
	}

	impl From<Cancelled> for MockError {
		fn from(_: Cancelled) -> Self {
			MockError::Cancelled
		}
	}

	mod bounded_loops {
		use super::*;

		#[tokio::test]
		async fn test_non_retryable_error_fails_immediately() {
			let attempt_count = Arc::new(AtomicU32::new(0));
			let counter = Arc::clone(&attempt_count);

			let result: Result<(), MockError> = retry(&RetryConfig::immediate(5), || {
				let count = Arc::clone(&counter);
				async move {
					count.fetch_add(1, Ordering::SeqCst);
					Err(MockError::Permanent)
				}
			})
			.await;

			assert_eq!(result, Err(MockError::Permanent));
			assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
		}

		#[tokio::test]
		async fn test_retryable_error_retries_up_to_max_attempts() {
			let attempt_count = Arc::new(AtomicU32::new(0));
			let counter = Arc::clone(&attempt_count);

			let result: Result<(), MockError> = retry(&RetryConfig::immediate(3), || {
				let count = Arc::clone(&counter);
				async move {
					count.fetch_add(1, Ordering::SeqCst);
					Err(MockError::Transient)
				}
			})
			.await;

			assert_eq!(result, Err(MockError::Transient));
			assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
		}

		#[tokio::test]
		async fn test_succeeds_after_retries() {
			let attempt_count = Arc::new(AtomicU32::new(0));
			let counter = Arc::clone(&attempt_count);

			let result: Result<&str, MockError> = retry(&RetryConfig::immediate(5), || {
				let count = Arc::clone(&counter);
				async move {
					if count.fetch_add(1, Ordering::SeqCst) < 2 {
						Err(MockError::Transient)
					} else {
						Ok("success")
					}
				}
			})
			.await;

			assert_eq!(result, Ok("success"));
			assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
		}

		#[tokio::test]
		async fn test_retry_if_uses_predicate_not_trait() {
			let attempt_count = Arc::new(AtomicU32::new(0));
			let counter = Arc::clone(&attempt_count);

			let result: Result<(), MockError> =
				retry_if(&RetryConfig::immediate(4), |_| true, || {
					let count = Arc::clone(&counter);
					async move {
						count.fetch_add(1, Ordering::SeqCst);
						Err(MockError::Permanent)
					}
				})
				.await;

			assert!(result.is_err());
			assert_eq!(attempt_count.load(Ordering::SeqCst), 4);
		}

		#[tokio::test(start_paused = true)]
		async fn test_fixed_policy_sleeps_between_attempts() {
			let start = tokio::time::Instant::now();
			let cfg = RetryConfig::fixed(3, Duration::from_secs(1));

			let result: Result<(), MockError> =
				retry(&cfg, || async { Err(MockError::Transient) }).await;

			assert!(result.is_err());
			assert_eq!(start.elapsed(), Duration::from_secs(2));
		}
	}

	mod cancellation {
		use super::*;

		#[tokio::test]
		async fn test_cancelled_token_stops_before_first_attempt() {
			let token = CancellationToken::new();
			token.cancel();
			let attempt_count = Arc::new(AtomicU32::new(0));
			let counter = Arc::clone(&attempt_count);

			let result: Result<(), MockError> =
				retry_with_cancel(&RetryConfig::immediate(5), &token, |_| true, || {
					let count = Arc::clone(&counter);
					async move {
						count.fetch_add(1, Ordering::SeqCst);
						Err(MockError::Transient)
					}
				})
				.await;

			assert_eq!(result, Err(MockError::Cancelled));
			assert_eq!(attempt_count.load(Ordering::SeqCst), 0);
		}

		#[tokio::test(start_paused = true)]
		async fn test_cancel_during_sleep_aborts_loop() {
			let token = CancellationToken::new();
			let cfg = RetryConfig::fixed(100, Duration::from_secs(60));
			let canceller = token.clone();
			tokio::spawn(async move {
				tokio::time::sleep(Duration::from_secs(90)).await;
				canceller.cancel();
			});

			let attempt_count = Arc::new(AtomicU32::new(0));
			let counter = Arc::clone(&attempt_count);
			let result: Result<(), MockError> = retry_with_cancel(&cfg, &token, |_| true, || {
				let count = Arc::clone(&counter);
				async move {
					count.fetch_add(1, Ordering::SeqCst);
					Err(MockError::Transient)
				}
			})
			.await;

			assert_eq!(result, Err(MockError::Cancelled));
			assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
		}

		#[tokio::test]
		async fn test_sleep_or_cancel_zero_delay_returns_immediately() {
			let token = CancellationToken::new();
			assert_eq!(sleep_or_cancel(Duration::ZERO, &token).await, Ok(()));
			token.cancel();
			assert_eq!(sleep_or_cancel(Duration::ZERO, &token).await, Err(Cancelled));
		}
	}

	mod delays {
		use super::*;

		#[test]
		fn test_jitter_adds_randomness() {
			let with_jitter = RetryConfig::exponential(
				3,
				Duration::from_millis(100),
				Duration::from_secs(5),
			);
			let without_jitter = RetryConfig {
				jitter: false,
				..with_jitter.clone()
			};

			let plain: Vec<Duration> = (0..10).map(|_| without_jitter.delay_for(1)).collect();
			let jittered: Vec<Duration> = (0..10).map(|_| with_jitter.delay_for(1)).collect();

			assert!(plain.windows(2).all(|w| w[0] == w[1]));
			assert!(!jittered.windows(2).all(|w| w[0] == w[1]));
		}

		#[test]
		fn test_delay_respects_max_delay() {
			let cfg = RetryConfig {
				max_attempts: 10,
				base_delay: Duration::from_secs(1),
				max_delay: Duration::from_secs(5),
				backoff_factor: 10.0,
				jitter: false,
			};

			for attempt in 0..10 {
				assert!(cfg.delay_for(attempt) <= Duration::from_secs(5));
			}
		}

		#[test]
		fn test_fixed_delay_is_constant() {
			let cfg = RetryConfig::fixed(18, Duration::from_secs(1));
			for attempt in 0..18 {
				assert_eq!(cfg.delay_for(attempt), Duration::from_secs(1));
			}
		}
	}
}
