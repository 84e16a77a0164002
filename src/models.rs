// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the moderation routes. All types derive
//! `Serialize` and `ToSchema` for JSON handling and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Reviews**: moderation verdicts recorded against submissions
//! - **Reports**: flagged submissions, shared through a keyed URL
//! - **Identity**: who the gate thinks the caller is

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;

// =============================================================================
// Review Models
// =============================================================================

/// Outcome of a moderation review.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    Rejected,
    NeedsChanges,
}

/// A recorded review of one submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Review {
    pub submission_id: u64,
    pub verdict: ReviewVerdict,
    pub notes: Option<String>,
    pub reviewer: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Review state of one submission as shown to a caller.
///
/// `reviewer` and `notes` are only filled in for auditors.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct ReviewView {
    pub submission_id: u64,
    /// `null` while the submission is still waiting for a review
    pub verdict: Option<ReviewVerdict>,
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ReviewView {
    pub fn new(submission_id: u64, review: Option<&Review>, role: Role) -> Self {
        let detailed = role.is_auditor();
        Self {
            submission_id,
            verdict: review.map(|r| r.verdict),
            reviewed_at: review.map(|r| r.reviewed_at),
            reviewer: review.filter(|_| detailed).map(|r| r.reviewer.clone()),
            notes: review
                .filter(|_| detailed)
                .and_then(|r| r.notes.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewsResponse {
    /// Role the caller was resolved to
    pub role: Role,
    pub reviews: Vec<ReviewView>,
}

/// Request body for recording a verdict.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub verdict: ReviewVerdict,
    #[serde(default)]
    pub notes: Option<String>,
}

// =============================================================================
// Report Models
// =============================================================================

/// A stored report against a submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Report {
    pub id: u64,
    pub submission_id: u64,
    pub reason: String,
    pub reported_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReportRequest {
    pub submission_id: u64,
    pub reason: String,
}

/// Returned once when a report is created. The key is not retrievable later.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportCreatedResponse {
    pub report_id: u64,
    pub key: String,
    /// Shareable detail URL under the advertised API host
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// Identity Models
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WhoAmIResponse {
    pub authenticated: bool,
    pub username: Option<String>,
    pub role: Role,
    pub session_expires_at: Option<DateTime<Utc>>,
    /// Error code of a failed verification, when a session was presented
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review() -> Review {
        Review {
            submission_id: 7,
            verdict: ReviewVerdict::Rejected,
            notes: Some("duplicate upload".to_string()),
            reviewer: "alice".to_string(),
            reviewed_at: Utc::now(),
        }
    }

    #[test]
    fn anonymous_view_hides_reviewer_details() {
        let review = review();
        let view = ReviewView::new(7, Some(&review), Role::Anonymous);
        assert_eq!(view.verdict, Some(ReviewVerdict::Rejected));
        assert!(view.reviewer.is_none());
        assert!(view.notes.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn auditor_view_includes_reviewer_details() {
        let review = review();
        let view = ReviewView::new(7, Some(&review), Role::Auditor);
        assert_eq!(view.reviewer.as_deref(), Some("alice"));
        assert_eq!(view.notes.as_deref(), Some("duplicate upload"));
    }

    #[test]
    fn pending_submission_has_no_verdict() {
        let view = ReviewView::new(9, None, Role::Auditor);
        assert_eq!(view.submission_id, 9);
        assert!(view.verdict.is_none());
        assert!(view.reviewer.is_none());
    }

    #[test]
    fn verdict_uses_snake_case() {
        let verdict: ReviewVerdict = serde_json::from_str(r#""needs_changes""#).unwrap();
        assert_eq!(verdict, ReviewVerdict::NeedsChanges);
    }
}
