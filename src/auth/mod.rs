// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session verification, role resolution and report access keys for the
//! moderation API.
//!
//! ## Auth Flow
//!
//! 1. The caller sends its session identifier in the `x-sid` header (or the
//!    `sid` query parameter)
//! 2. The session gate validates it through [`SessionValidator`]:
//!    - cached verification for at most the session TTL
//!    - otherwise one bounded call to the identity provider
//! 3. The role gate maps the verified username to a [`Role`] through the
//!    auditor directory, cached separately
//! 4. Report detail routes additionally require the access key minted for
//!    that report by [`ReportKeyIssuer`]
//!
//! ## Security
//!
//! - Session identifiers are hashed before they reach the cache
//! - Report keys are compared through an HMAC tag, in constant time
//! - Identity provider failures are never cached and never leak upstream
//!   details to the client

pub mod error;
pub mod extractor;
pub mod middleware;
pub mod provider;
pub mod report_keys;
pub mod roles;
pub mod session;

pub use error::{AuthError, AuthErrorKind};
pub use extractor::{CurrentRole, KeyVerified, SessionContext, Verified};
pub use middleware::{AuthGate, GateMode, GatePolicy, Soft, Strict};
pub use provider::{HttpIdentityProvider, IdentityProvider, ProviderError, VerifiedIdentity};
pub use report_keys::{ReportAccessKey, ReportKeyError, ReportKeyIssuer};
pub use roles::{Role, RoleResolver};
pub use session::{Session, SessionValidator};
