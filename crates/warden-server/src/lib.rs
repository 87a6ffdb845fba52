// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden credential broker server.
//!
//! Browsers sign in at `/login` through the organization's IdP. The gateway
//! then authorizes every other request from the session cookies and hands
//! handlers the caller's principal and cloud role.

pub mod api;
pub mod error;
pub mod gateway;
pub mod routes;

pub use api::{create_app_state, create_router, AppState, SessionSettings};
pub use error::{ErrorResponse, ServerError};
pub use warden_server_config::ServerConfig;
