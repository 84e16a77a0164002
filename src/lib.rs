// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Moderation Gate - session, role and report-key gateway
//!
//! This crate fronts a content-moderation API. It verifies caller sessions
//! against an external identity provider, caches what it learns, and decides
//! per route whether a request may reach the moderation handlers.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and middleware chains (Axum)
//! - `auth` - Session validation, roles, report access keys
//! - `cache` - TTL cache over an in-process LRU or Redis
//! - `storage` - Auditor directory and moderation store

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;
