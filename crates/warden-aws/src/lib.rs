// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AWS plumbing for Warden.
//!
//! [`AwsSession`] walks role-assumption chains from the organization's
//! management account into member accounts. [`AllDayMinter`] trades a
//! short-lived IAM user access key for a 12-hour role session, and
//! [`ConsoleFederation`] turns temporary credentials into console URLs.

pub mod accounts;
pub mod all_day;
pub mod api;
pub mod credentials;
pub mod error;
pub mod federation;
pub mod roles;
pub mod sdk;
pub mod selector;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use accounts::{Account, CallerIdentity, Identity};
pub use all_day::{AllDayMinter, MintPolicy, ALL_DAY};
pub use api::{
	AssumeRoleRequest, BaseCredentials, CloudApi, IamApi, OrganizationsApi, StaticBaseCredentials,
	StsApi,
};
pub use credentials::{AccessKey, CredentialSet, IssuedCredentials, Principal};
pub use error::{AwsError, AwsResult};
pub use federation::{validate_destination, ConsoleFederation};
pub use roles::{parse_principal_arn, role_arn, PrincipalArn};
pub use sdk::SdkCloud;
pub use selector::AccountSelector;
pub use session::{normalize_session_name, AwsSession, ROLE_CHAINING_LIMIT};
