// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP handlers.

pub mod accounts;
pub mod credential_factory;
pub mod health;
pub mod index;
pub mod login;
