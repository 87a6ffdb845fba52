// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret loading with `_FILE` indirection.
//!
//! A secret named `VAR` may be supplied directly or, preferably, as a path in
//! `VAR_FILE` (a mounted secret). The file form wins when both are set and a
//! single trailing newline is stripped from the file contents.

use std::env;
use std::fs;
use std::path::PathBuf;

use warden_common_secret::SecretString;

use crate::error::ConfigError;

pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, ConfigError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(ConfigError::Secret(format!("{file_var} is set but empty")));
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
			path: path.clone(),
			source: e,
		})?;

		let secret = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(Some(SecretString::new(secret)));
	}

	match env::var(var) {
		Ok(value) if !value.is_empty() => Ok(Some(SecretString::new(value))),
		_ => Ok(None),
	}
}
