// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

fn default_level() -> String {
	"info,tower_http::trace=debug,aws_config=warn,aws_smithy_runtime=warn".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LoggingConfigLayer {
	pub level: Option<String>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self.level.unwrap_or_else(default_level),
		}
	}
}

/// `level` is an `EnvFilter` directive string; `RUST_LOG` overrides it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
	pub level: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: default_level(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_defaults() {
		assert_eq!(LoggingConfigLayer::default().finalize(), LoggingConfig::default());
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: LoggingConfigLayer = toml::from_str(r#"level = "warden=trace""#).unwrap();
		assert_eq!(layer.finalize().level, "warden=trace");
	}

	#[test]
	fn test_merge_keeps_base_when_unset() {
		let mut base = LoggingConfigLayer {
			level: Some("debug".to_string()),
		};
		base.merge(LoggingConfigLayer::default());
		assert_eq!(base.level.as_deref(), Some("debug"));
	}
}
