// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for warden-server.

pub mod aws;
pub mod credential_factory;
pub mod http;
pub mod logging;
pub mod oidc;

pub use aws::{AwsConfig, AwsConfigLayer, DEFAULT_CREDENTIAL_FACTORY_USER};
pub use credential_factory::{CredentialFactoryConfig, CredentialFactoryConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer, DEFAULT_CLIENT_TIMEOUT_SECS};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use oidc::{IdpKind, OidcConfig, OidcConfigLayer};
