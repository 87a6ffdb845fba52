// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for Warden server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`WARDEN_SERVER_*`)
//!
//! Secrets (`WARDEN_SERVER_OIDC_CLIENT_SECRET`) may be given through a
//! `_FILE` variant.
//!
//! # Usage
//!
//! ```ignore
//! use warden_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod secrets;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use secrets::load_secret_env;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub logging: LoggingConfig,
	pub oidc: OidcConfig,
	pub aws: AwsConfig,
	pub credential_factory: CredentialFactoryConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		self.http.socket_addr()
	}

	/// Absolute URL the IdP sends the browser back to.
	pub fn redirect_uri(&self) -> String {
		self.http.public_url(&self.oidc.redirect_path)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARDEN_SERVER_*`)
/// 2. Config file (`/etc/warden/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let oidc = layer.oidc.unwrap_or_default().finalize()?;
	let aws = layer.aws.unwrap_or_default().finalize()?;
	let credential_factory = layer.credential_factory.unwrap_or_default().finalize()?;

	validate_config(&http)?;

	info!(
		host = %http.host,
		port = http.port,
		base_url = %http.base_url,
		idp = %oidc.idp,
		client_id = %oidc.client_id,
		region = aws.region.as_deref().unwrap_or("<default>"),
		management_account_id = aws.management_account_id.as_deref().unwrap_or("<discovered>"),
		credential_factory_user = %aws.credential_factory_user,
		token_ttl_secs = credential_factory.token_ttl.as_secs(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		logging,
		oidc,
		aws,
		credential_factory,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(http: &HttpConfig) -> Result<(), ConfigError> {
	if !http.base_url.starts_with("https://") && !http.base_url.starts_with("http://") {
		return Err(ConfigError::InvalidValue {
			key: "http.base_url".to_string(),
			message: format!("'{}' is not an absolute URL", http.base_url),
		});
	}
	if http.client_timeout.is_zero() {
		return Err(ConfigError::InvalidValue {
			key: "http.client_timeout_secs".to_string(),
			message: "must be at least 1 second".to_string(),
		});
	}

	Ok(())
}
