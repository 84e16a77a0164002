// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory reviews and reports.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::ApiError;
use crate::models::{CreateReportRequest, Report, Review, ReviewRequest};

#[derive(Default)]
pub struct ModerationStore {
    reviews: HashMap<u64, Review>,
    reports: HashMap<u64, Report>,
    next_report_id: u64,
}

impl ModerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reviews for `submission_ids`, in request order. `None` for submissions
    /// nobody has reviewed yet.
    pub fn reviews_for(&self, submission_ids: &[u64]) -> Vec<(u64, Option<Review>)> {
        submission_ids
            .iter()
            .map(|id| (*id, self.reviews.get(id).cloned()))
            .collect()
    }

    /// Record `request` against every submission in `submission_ids`. A later
    /// review replaces an earlier one.
    pub fn record_review(
        &mut self,
        submission_ids: &[u64],
        request: &ReviewRequest,
        reviewer: &str,
    ) -> Vec<Review> {
        let reviewed_at = Utc::now();
        submission_ids
            .iter()
            .map(|id| {
                let review = Review {
                    submission_id: *id,
                    verdict: request.verdict,
                    notes: request.notes.clone(),
                    reviewer: reviewer.to_string(),
                    reviewed_at,
                };
                self.reviews.insert(*id, review.clone());
                review
            })
            .collect()
    }

    pub fn create_report(
        &mut self,
        request: CreateReportRequest,
        reported_by: &str,
    ) -> Result<Report, ApiError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(ApiError::unprocessable("Report reason must not be empty"));
        }

        self.next_report_id += 1;
        let report = Report {
            id: self.next_report_id,
            submission_id: request.submission_id,
            reason: reason.to_string(),
            reported_by: reported_by.to_string(),
            created_at: Utc::now(),
        };
        self.reports.insert(report.id, report.clone());
        Ok(report)
    }

    pub fn report(&self, report_id: u64) -> Result<Report, ApiError> {
        self.reports
            .get(&report_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Report not found"))
    }
}
