// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AwsConfigLayer, CredentialFactoryConfigLayer, HttpConfigLayer, LoggingConfigLayer,
	OidcConfigLayer,
};
use crate::secrets::load_secret_env;

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/warden/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: WARDEN_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			logging: Some(load_logging_from_env()),
			oidc: Some(load_oidc_from_env()?),
			aws: Some(load_aws_from_env()?),
			credential_factory: Some(load_credential_factory_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	env_parse(name, "u16")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	env_parse(name, "u32")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	env_parse(name, "u64")
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	env_parse(name, "usize")
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("WARDEN_SERVER_HOST"),
		port: env_u16("WARDEN_SERVER_PORT")?,
		base_url: env_var("WARDEN_SERVER_BASE_URL"),
		client_timeout_secs: env_u64("WARDEN_SERVER_HTTP_CLIENT_TIMEOUT_SECS")?,
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("WARDEN_SERVER_LOG_LEVEL"),
	}
}

fn load_oidc_from_env() -> Result<OidcConfigLayer, ConfigError> {
	Ok(OidcConfigLayer {
		client_id: env_var("WARDEN_SERVER_OIDC_CLIENT_ID"),
		client_secret: load_secret_env("WARDEN_SERVER_OIDC_CLIENT_SECRET")?,
		okta_issuer: env_var("WARDEN_SERVER_OIDC_OKTA_ISSUER"),
		azure_tenant_id: env_var("WARDEN_SERVER_OIDC_AZURE_TENANT_ID"),
		redirect_path: env_var("WARDEN_SERVER_OIDC_REDIRECT_PATH"),
	})
}

fn load_aws_from_env() -> Result<AwsConfigLayer, ConfigError> {
	Ok(AwsConfigLayer {
		region: env_var("WARDEN_SERVER_AWS_REGION"),
		management_account_id: env_var("WARDEN_SERVER_AWS_MANAGEMENT_ACCOUNT_ID"),
		credential_factory_user: env_var("WARDEN_SERVER_AWS_CREDENTIAL_FACTORY_USER"),
		probe_attempts: env_u32("WARDEN_SERVER_AWS_PROBE_ATTEMPTS")?,
		probe_delay_ms: env_u64("WARDEN_SERVER_AWS_PROBE_DELAY_MS")?,
		access_key_attempts: env_u32("WARDEN_SERVER_AWS_ACCESS_KEY_ATTEMPTS")?,
		access_key_delete_all_after: env_u32("WARDEN_SERVER_AWS_ACCESS_KEY_DELETE_ALL_AFTER")?,
		access_key_delay_ms: env_u64("WARDEN_SERVER_AWS_ACCESS_KEY_DELAY_MS")?,
	})
}

fn load_credential_factory_from_env() -> Result<CredentialFactoryConfigLayer, ConfigError> {
	Ok(CredentialFactoryConfigLayer {
		min_token_length: env_usize("WARDEN_SERVER_CREDENTIAL_FACTORY_MIN_TOKEN_LENGTH")?,
		token_ttl_secs: env_u64("WARDEN_SERVER_CREDENTIAL_FACTORY_TOKEN_TTL_SECS")?,
		gc_sync_threshold: env_usize("WARDEN_SERVER_CREDENTIAL_FACTORY_GC_SYNC_THRESHOLD")?,
		gc_limit: env_usize("WARDEN_SERVER_CREDENTIAL_FACTORY_GC_LIMIT")?,
		fetch_deadline_secs: env_u64("WARDEN_SERVER_CREDENTIAL_FACTORY_FETCH_DEADLINE_SECS")?,
	})
}
